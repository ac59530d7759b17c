// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference-counted storage for decoded tiles.
//!
//! A tile cache outlives tile managers and is usually shared between every
//! viewer in a process. Each loaded tile holds one reference to its entry;
//! only entries nobody references may be evicted.

use core::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use loupe_geometry::IntRect;
use loupe_source::TileBitmap;

/// Identity of a decoded tile: which image, which region, which sample size.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Key of the image source.
    pub image_key: String,
    /// Region of the full resolution image.
    pub src_rect: IntRect,
    /// Downsampling factor.
    pub sample_size: u32,
}

impl TileKey {
    /// Creates a key.
    pub fn new(image_key: impl Into<String>, src_rect: IntRect, sample_size: u32) -> Self {
        Self {
            image_key: image_key.into(),
            src_rect,
            sample_size,
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.src_rect;
        write!(
            f,
            "{}_{},{},{},{}_{}",
            self.image_key, r.x0, r.y0, r.x1, r.y1, self.sample_size
        )
    }
}

/// Storage for decoded tiles with acquire/release reference counting.
///
/// Every successful [`acquire`](Self::acquire) and every
/// [`insert`](Self::insert) takes a reference that must be returned with
/// [`release`](Self::release).
pub trait TileBitmapCache: Send + Sync + fmt::Debug {
    /// Looks up `key` and takes a reference on a hit.
    fn acquire(&self, key: &TileKey) -> Option<TileBitmap>;

    /// Stores `bitmap` under `key` and takes a reference.
    ///
    /// If the key is already present the stored bitmap wins and is returned,
    /// so concurrent loaders of the same tile end up sharing one bitmap.
    fn insert(&self, key: TileKey, bitmap: TileBitmap) -> TileBitmap;

    /// Returns a reference taken by `acquire` or `insert`.
    fn release(&self, key: &TileKey);
}

/// Counters reported by [`LruTileBitmapCache::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries.
    pub entries: usize,
    /// Entries with at least one reference.
    pub referenced: usize,
    /// Bytes held by all entries.
    pub bytes: usize,
    /// Successful lookups.
    pub hits: u64,
    /// Failed lookups.
    pub misses: u64,
    /// Entries removed to stay within budget.
    pub evictions: u64,
}

#[derive(Debug)]
struct Entry {
    bitmap: TileBitmap,
    refs: u32,
    last_access: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<TileKey, Entry>,
    bytes: usize,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock = self.clock.wrapping_add(1);
        self.clock
    }

    fn trim(&mut self, max_bytes: usize) {
        while self.bytes > max_bytes {
            let victim = self
                .entries
                .iter()
                .filter(|(_, e)| e.refs == 0)
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            let Some(key) = victim else {
                // Everything left is in use.
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.bytes -= entry.bitmap.byte_count();
                self.evictions += 1;
                tracing::trace!(%key, "evicted tile bitmap");
            }
        }
    }
}

/// In-memory [`TileBitmapCache`] bounded by bytes, evicting the least
/// recently used unreferenced entries first.
///
/// Referenced entries are never evicted, so the cache may temporarily exceed
/// its budget while many tiles are on screen.
#[derive(Debug)]
pub struct LruTileBitmapCache {
    max_bytes: usize,
    inner: Mutex<Inner>,
}

impl LruTileBitmapCache {
    /// Default budget: 256 MiB.
    pub const DEFAULT_MAX_BYTES: usize = 256 * 1024 * 1024;

    /// Creates a cache that holds at most `max_bytes` of unreferenced pixels.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Byte budget.
    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            referenced: inner.entries.values().filter(|e| e.refs > 0).count(),
            bytes: inner.bytes,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    /// Drops every unreferenced entry.
    pub fn trim_unreferenced(&self) {
        self.lock().trim(0);
    }
}

impl Default for LruTileBitmapCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_BYTES)
    }
}

impl TileBitmapCache for LruTileBitmapCache {
    fn acquire(&self, key: &TileKey) -> Option<TileBitmap> {
        let mut inner = self.lock();
        let now = inner.tick();
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.refs += 1;
                entry.last_access = now;
                let bitmap = entry.bitmap.clone();
                inner.hits += 1;
                Some(bitmap)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    fn insert(&self, key: TileKey, bitmap: TileBitmap) -> TileBitmap {
        let mut inner = self.lock();
        let now = inner.tick();
        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.refs += 1;
            entry.last_access = now;
            return entry.bitmap.clone();
        }
        inner.bytes += bitmap.byte_count();
        inner.entries.insert(
            key,
            Entry {
                bitmap: bitmap.clone(),
                refs: 1,
                last_access: now,
            },
        );
        inner.trim(self.max_bytes);
        bitmap
    }

    fn release(&self, key: &TileKey) {
        let mut inner = self.lock();
        match inner.entries.get_mut(key) {
            Some(entry) if entry.refs > 0 => entry.refs -= 1,
            _ => {
                tracing::warn!(%key, "released a tile bitmap that holds no reference");
                return;
            }
        }
        inner.trim(self.max_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(bytes: usize) -> TileBitmap {
        TileBitmap::rgba8(1, 1, vec![0; bytes])
    }

    fn key(n: u32) -> TileKey {
        TileKey::new("img", IntRect::new(0, 0, n, n), 1)
    }

    #[test]
    fn key_display_is_stable() {
        let key = TileKey::new("file:///a.jpg", IntRect::new(0, 1000, 1000, 2000), 4);
        assert_eq!(key.to_string(), "file:///a.jpg_0,1000,1000,2000_4", "display format");
    }

    #[test]
    fn insert_then_acquire_returns_the_same_bitmap() {
        let cache = LruTileBitmapCache::new(1024);
        let stored = cache.insert(key(1), bitmap(16));
        cache.release(&key(1));
        let again = cache.acquire(&key(1)).unwrap();
        assert!(again.ptr_eq(&stored), "cache hit shares the bitmap");
        assert_eq!(cache.stats().hits, 1, "one hit");
        assert!(cache.acquire(&key(2)).is_none(), "unknown key misses");
    }

    #[test]
    fn duplicate_insert_keeps_the_first_bitmap() {
        let cache = LruTileBitmapCache::new(1024);
        let first = cache.insert(key(1), bitmap(16));
        let second = cache.insert(key(1), bitmap(16));
        assert!(second.ptr_eq(&first), "stored bitmap wins");
        assert_eq!(cache.stats().bytes, 16, "counted once");
    }

    #[test]
    fn referenced_entries_survive_pressure() {
        let cache = LruTileBitmapCache::new(32);
        cache.insert(key(1), bitmap(16));
        cache.insert(key(2), bitmap(16));
        cache.insert(key(3), bitmap(16));
        let stats = cache.stats();
        assert_eq!(stats.entries, 3, "nothing evictable while referenced");
        assert_eq!(stats.evictions, 0, "no evictions");

        cache.release(&key(1));
        let stats = cache.stats();
        assert_eq!(stats.entries, 2, "released entry evicted");
        assert!(cache.acquire(&key(1)).is_none(), "key 1 is gone");
    }

    #[test]
    fn least_recently_used_goes_first() {
        let cache = LruTileBitmapCache::new(48);
        for n in 1..=3 {
            cache.insert(key(n), bitmap(16));
            cache.release(&key(n));
        }
        // Touch 1 so that 2 becomes the oldest.
        cache.acquire(&key(1));
        cache.release(&key(1));
        cache.insert(key(4), bitmap(16));
        cache.release(&key(4));
        assert!(cache.acquire(&key(2)).is_none(), "oldest evicted");
        assert!(cache.acquire(&key(1)).is_some(), "recently used kept");
    }

    #[test]
    fn trim_unreferenced_keeps_live_tiles() {
        let cache = LruTileBitmapCache::default();
        cache.insert(key(1), bitmap(16));
        cache.insert(key(2), bitmap(16));
        cache.release(&key(2));
        cache.trim_unreferenced();
        let stats = cache.stats();
        assert_eq!((stats.entries, stats.referenced), (1, 1), "only the live tile remains");
    }
}
