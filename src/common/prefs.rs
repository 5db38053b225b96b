//! Persisted app lists: locked, hidden and favorite apps.
//!
//! The lists are stored as delimiter-joined strings (see [`crate::common::util`])
//! and every mutation is written through to disk immediately.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::common::util::{
    flatten_collection, join_locked_apps, parse_collection, parse_locked_apps,
};

pub type SharedPrefs = Arc<RwLock<PreferenceStore>>;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("Failed to access preferences file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse preferences file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// On-disk shape. Each field holds a joined list.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
struct PrefsFile {
    locked_apps: String,
    hidden_apps: String,
    favorite_apps: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppLists {
    /// Packages pinned by the user; exempt from bulk kills. Ordered.
    pub locked: Vec<String>,
    /// Packages never shown in the switcher.
    pub hidden: BTreeSet<String>,
    /// Launch descriptors (as strings) pinned to the favorites bar. Ordered.
    pub favorites: Vec<String>,
}

#[derive(Debug)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    lists: AppLists,
}

impl PreferenceStore {
    /// A store that is never written to disk.
    pub fn in_memory(lists: AppLists) -> Self { Self { path: None, lists } }

    /// Opens the store at `path`. A missing file yields empty lists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let lists = Self::load(&path)?;
        Ok(Self { path: Some(path), lists })
    }

    pub fn into_shared(self) -> SharedPrefs { Arc::new(RwLock::new(self)) }

    fn load(path: &Path) -> Result<AppLists, PrefsError> {
        if !path.exists() {
            return Ok(AppLists::default());
        }
        let buf = std::fs::read_to_string(path)?;
        let file: PrefsFile = toml::from_str(&buf)?;
        Ok(AppLists {
            locked: parse_locked_apps(&file.locked_apps),
            hidden: parse_collection(&file.hidden_apps).into_iter().collect(),
            favorites: parse_collection(&file.favorite_apps),
        })
    }

    pub fn reload(&mut self) -> Result<(), PrefsError> {
        if let Some(path) = &self.path {
            self.lists = Self::load(path)?;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<(), PrefsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = PrefsFile {
            locked_apps: join_locked_apps(&self.lists.locked),
            hidden_apps: flatten_collection(&self.lists.hidden),
            favorite_apps: flatten_collection(&self.lists.favorites),
        };
        let buf = toml::to_string(&file)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, buf)?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!("Failed to persist preferences: {e}");
        }
    }

    pub fn lists(&self) -> &AppLists { &self.lists }

    pub fn is_locked(&self, package: &str) -> bool {
        self.lists.locked.iter().any(|p| p == package)
    }

    pub fn is_hidden(&self, package: &str) -> bool { self.lists.hidden.contains(package) }

    pub fn add_to_locked_apps(&mut self, package: &str) -> bool {
        if self.is_locked(package) {
            return false;
        }
        debug!(package, "adding to locked apps");
        self.lists.locked.push(package.to_string());
        self.persist();
        true
    }

    pub fn remove_from_locked_apps(&mut self, package: &str) -> bool {
        let before = self.lists.locked.len();
        self.lists.locked.retain(|p| p != package);
        if self.lists.locked.len() == before {
            return false;
        }
        debug!(package, "removing from locked apps");
        self.persist();
        true
    }

    pub fn add_to_hidden_apps(&mut self, package: &str) -> bool {
        if !self.lists.hidden.insert(package.to_string()) {
            return false;
        }
        self.persist();
        true
    }

    pub fn remove_from_hidden_apps(&mut self, package: &str) -> bool {
        if !self.lists.hidden.remove(package) {
            return false;
        }
        self.persist();
        true
    }

    pub fn add_to_favorites(&mut self, item: &str) -> bool {
        if self.lists.favorites.iter().any(|f| f == item) {
            return false;
        }
        self.lists.favorites.push(item.to_string());
        self.persist();
        true
    }

    pub fn remove_from_favorites(&mut self, item: &str) -> bool {
        let before = self.lists.favorites.len();
        self.lists.favorites.retain(|f| f != item);
        if self.lists.favorites.len() == before {
            return false;
        }
        self.persist();
        true
    }

    /// Replaces the favorites wholesale, e.g. after pruning stale entries.
    pub fn set_favorites(&mut self, favorites: Vec<String>) {
        if self.lists.favorites == favorites {
            return;
        }
        self.lists.favorites = favorites;
        self.persist();
    }
}
