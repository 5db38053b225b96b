use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::task::LaunchDescriptor;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct LaunchRecord {
    count: u64,
    last_launch: SystemTime,
}

/// How often each app was switched to. Keyed by the `package/component`
/// form so the top entries can be turned into favorites directly.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LaunchStatistics {
    launches: BTreeMap<String, LaunchRecord>,
}

impl LaunchStatistics {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut buf = String::new();
        File::open(path)?.read_to_string(&mut buf)?;
        Ok(ron::from_str(&buf)?)
    }

    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() { Self::load(path) } else { Ok(Self::default()) }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        File::create(path)?.write_all(ron::ser::to_string(self)?.as_bytes())?;
        Ok(())
    }

    pub fn trace_launch(&mut self, launch: &LaunchDescriptor) {
        let now = SystemTime::now();
        let record = self
            .launches
            .entry(launch.to_string())
            .or_insert(LaunchRecord { count: 0, last_launch: now });
        record.count += 1;
        record.last_launch = now;
        trace!(%launch, count = record.count, "traced launch");
    }

    pub fn launch_count(&self, launch: &LaunchDescriptor) -> u64 {
        self.launches.get(&launch.to_string()).map_or(0, |r| r.count)
    }

    /// The `count` most launched apps, most launched first. Ties go to the
    /// most recent launch.
    pub fn topmost_launches(&self, count: usize) -> Vec<String> {
        let mut ranked: Vec<_> = self.launches.iter().collect();
        ranked.sort_by(|(a_key, a), (b_key, b)| {
            b.count
                .cmp(&a.count)
                .then(b.last_launch.cmp(&a.last_launch))
                .then(a_key.cmp(b_key))
        });
        ranked.into_iter().take(count).map(|(key, _)| key.clone()).collect()
    }

    pub fn is_empty(&self) -> bool { self.launches.is_empty() }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn launch(package: &str) -> LaunchDescriptor { LaunchDescriptor::new(package, "Main") }

    #[test]
    fn topmost_orders_by_count() {
        let mut stats = LaunchStatistics::default();
        for _ in 0..3 {
            stats.trace_launch(&launch("com.b"));
        }
        stats.trace_launch(&launch("com.a"));
        stats.trace_launch(&launch("com.c"));
        stats.trace_launch(&launch("com.c"));

        assert_eq!(vec!["com.b/Main", "com.c/Main"], stats.topmost_launches(2));
        assert_eq!(3, stats.topmost_launches(10).len());
        assert_eq!(3, stats.launch_count(&launch("com.b")));
        assert_eq!(0, stats.launch_count(&launch("com.z")));
    }

    #[test]
    fn persists_as_ron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats").join("stats.ron");
        let mut stats = LaunchStatistics::default();
        stats.trace_launch(&launch("com.a"));
        stats.save(&path).unwrap();

        assert_eq!(stats, LaunchStatistics::load(&path).unwrap());
        let missing = LaunchStatistics::load_or_default(&dir.path().join("nope.ron")).unwrap();
        assert!(missing.is_empty());
    }
}
