//! Codecs for the delimiter-joined string lists kept in the preferences file.
//!
//! Favorite and hidden app lists are joined with `##`, the locked app list
//! with `,`. Existing preference files depend on these exact conventions.

pub const COLLECTION_DELIMITER: &str = "##";
pub const LOCKED_APPS_DELIMITER: &str = ",";

/// Splits a `##`-joined list. An empty string is an empty list.
pub fn parse_collection(list: &str) -> Vec<String> { split_joined(list, COLLECTION_DELIMITER) }

pub fn flatten_collection<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    join(items, COLLECTION_DELIMITER)
}

/// Splits the `,`-joined locked app list. An empty string is an empty list.
pub fn parse_locked_apps(list: &str) -> Vec<String> { split_joined(list, LOCKED_APPS_DELIMITER) }

pub fn join_locked_apps<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    join(items, LOCKED_APPS_DELIMITER)
}

fn split_joined(list: &str, delimiter: &str) -> Vec<String> {
    if list.is_empty() {
        return Vec::new();
    }
    if !list.contains(delimiter) {
        return vec![list.to_string()];
    }

    let mut parts: Vec<String> = list.split(delimiter).map(str::to_string).collect();
    // Trailing empty segments are dropped, leading and inner ones are kept.
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

fn join<'a, I>(items: I, delimiter: &str) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let mut out = String::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push_str(delimiter);
        }
        out.push_str(item);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> { items.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn collection_round_trips_for_empty_single_and_many() {
        for items in [set(&[]), set(&["x"]), set(&["x", "y"]), set(&["com.a", "com.b", "org.c"])]
        {
            let flat = flatten_collection(&items);
            let parsed: BTreeSet<String> = parse_collection(&flat).into_iter().collect();
            assert_eq!(items, parsed);
        }
    }

    #[test]
    fn collection_uses_double_hash_delimiter() {
        let items = vec!["x".to_string(), "y".to_string()];
        assert_eq!("x##y", flatten_collection(&items));
        assert_eq!(vec!["a", "b", "c"], parse_collection("a##b##c"));
    }

    #[test]
    fn empty_string_parses_as_empty_list() {
        assert!(parse_collection("").is_empty());
        assert!(parse_locked_apps("").is_empty());
    }

    #[test]
    fn single_element_without_delimiter_is_kept_whole() {
        assert_eq!(vec!["com.example.app"], parse_collection("com.example.app"));
        assert_eq!(vec!["a#b"], parse_collection("a#b"));
        assert_eq!(vec!["com.example.app"], parse_locked_apps("com.example.app"));
    }

    #[test]
    fn trailing_delimiter_is_tolerated() {
        assert_eq!(vec!["a"], parse_collection("a##"));
        assert_eq!(vec!["a", "b"], parse_locked_apps("a,b,"));
    }

    #[test]
    fn locked_apps_use_comma_delimiter() {
        let items = vec!["com.a".to_string(), "com.b".to_string()];
        let flat = join_locked_apps(&items);
        assert_eq!("com.a,com.b", flat);
        assert_eq!(items, parse_locked_apps(&flat));
    }
}
