//! Read-through cache of decoded, resized application icons.
//!
//! Entries are keyed by package, requested size and display density, and are
//! evicted least-recently-used first once either the entry count or the
//! decoded pixel budget is exceeded.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::config::IconCacheSettings;
use crate::model::bitmap::Bitmap;
use crate::sys::package::{PackageItem, PackageResolver};
use crate::sys::view::DisplayMetrics;

/// Size used for icons stored at the package's own resolution.
const CANONICAL: u32 = 0;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct IconKey {
    package: String,
    size_dp: u32,
    density_bits: u32,
}

struct CacheInner {
    entries: LruCache<IconKey, Arc<Bitmap>>,
    pixels: usize,
    max_pixels: usize,
    density: f32,
}

impl CacheInner {
    fn insert(&mut self, key: IconKey, bitmap: Arc<Bitmap>) {
        self.pixels += bitmap.pixel_count();
        if let Some((_, old)) = self.entries.push(key, bitmap) {
            self.pixels -= old.pixel_count();
        }
        // Always keep the newest entry, even if it alone is over budget.
        self.evict_over_budget();
    }

    fn evict_over_budget(&mut self) {
        while self.pixels > self.max_pixels && self.entries.len() > 1 {
            let Some((key, old)) = self.entries.pop_lru() else { break };
            trace!(package = key.package, "evicting icon");
            self.pixels -= old.pixel_count();
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.pixels = 0;
    }
}

pub struct IconCache {
    inner: Mutex<CacheInner>,
}

impl IconCache {
    pub fn new(settings: &IconCacheSettings) -> IconCache {
        IconCache {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity(settings)),
                pixels: 0,
                max_pixels: settings.max_pixels,
                density: DisplayMetrics::default().density,
            }),
        }
    }

    /// Applies new bounds, evicting least-recently-used entries until the
    /// cache fits them.
    pub fn resize(&self, settings: &IconCacheSettings) {
        let capacity = capacity(settings);
        let mut inner = self.inner.lock();
        if inner.entries.cap() == capacity && inner.max_pixels == settings.max_pixels {
            return;
        }
        debug!(entries = capacity, pixels = settings.max_pixels, "resizing icon cache");
        inner.entries.resize(capacity);
        inner.pixels = inner.entries.iter().map(|(_, bitmap)| bitmap.pixel_count()).sum();
        inner.max_pixels = settings.max_pixels;
        inner.evict_over_budget();
    }

    /// The icon for `item` scaled to `size_dp` at the display's density.
    ///
    /// Returns `None` if the package has no icon or it cannot be decoded.
    pub fn get_resized(
        &self,
        resolver: &dyn PackageResolver,
        item: &PackageItem,
        metrics: DisplayMetrics,
        size_dp: u32,
    ) -> Option<Arc<Bitmap>> {
        let key = IconKey {
            package: item.package.clone(),
            size_dp,
            density_bits: metrics.density.to_bits(),
        };
        if let Some(hit) = self.inner.lock().entries.get(&key) {
            return Some(hit.clone());
        }

        let source = self.get_package_icon_cached(resolver, item)?;
        let px = metrics.px(size_dp);
        let resized = Arc::new(source.resized(px, px));
        self.inner.lock().insert(key, resized.clone());
        Some(resized)
    }

    /// The icon for `item` at its own resolution.
    pub fn get_package_icon_cached(
        &self,
        resolver: &dyn PackageResolver,
        item: &PackageItem,
    ) -> Option<Arc<Bitmap>> {
        let key = IconKey {
            package: item.package.clone(),
            size_dp: CANONICAL,
            density_bits: 0,
        };
        if let Some(hit) = self.inner.lock().entries.get(&key) {
            return Some(hit.clone());
        }

        // Decode outside the lock; a concurrent miss just decodes twice.
        let bytes = resolver.icon_data(item)?;
        let bitmap = match Bitmap::decode(&bytes) {
            Ok(bitmap) => Arc::new(bitmap),
            Err(e) => {
                debug!(package = item.package, "undecodable icon: {e}");
                return None;
            }
        };
        self.inner.lock().insert(key, bitmap.clone());
        Some(bitmap)
    }

    /// Drops every entry, e.g. after the installed package set changed.
    pub fn invalidate_all(&self) {
        debug!("invalidating icon cache");
        self.inner.lock().clear();
    }

    /// Records the display density, clearing the cache if it changed.
    /// Returns whether anything was invalidated.
    pub fn set_density(&self, density: f32) -> bool {
        let mut inner = self.inner.lock();
        if inner.density == density {
            return false;
        }
        debug!(from = inner.density, to = density, "display density changed");
        inner.density = density;
        inner.clear();
        true
    }

    pub fn len(&self) -> usize { self.inner.lock().entries.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn pixel_count(&self) -> usize { self.inner.lock().pixels }
}

fn capacity(settings: &IconCacheSettings) -> NonZeroUsize {
    NonZeroUsize::new(settings.max_entries).unwrap_or(NonZeroUsize::MIN)
}
