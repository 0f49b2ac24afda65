//! Partial-template cache.
//!
//! Partials are small fragments (headers, footers, nav bars) included by many
//! views. Reading and stripping them once per build instead of once per
//! include is the point of this module.
//!
//! # Semantics
//!
//! - Keyed by the partial's absolute path.
//! - A miss loads the file, strips its front matter and stores the result.
//! - No TTL, no size bound, no per-key invalidation. [`PartialCache::flush`]
//!   empties the whole cache and reports how many entries it dropped.
//!
//! # Concurrency
//!
//! Directory builds render views in parallel, so several threads can ask for
//! the same partial at once. Each key owns a slot guarded by its own mutex:
//! the first caller loads while holding the slot, later callers block on it
//! and then read the stored value. A key is therefore loaded at most once
//! between flushes. A failed load removes its empty slot again, so the next
//! caller retries and names that never load do not pile up in the map.
//!
//! `flush` swaps the key map out under the map lock. A `get` that already
//! holds a slot finishes against the detached slot; the next `get` for that
//! key starts a fresh one.

use crate::front_matter;
use crate::types::PipelineFile;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PartialError {
    #[error("Partial not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read partial {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// A loaded fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial {
    pub path: PathBuf,
    /// Contents with any front matter removed.
    pub contents: String,
    pub metadata: Option<serde_yaml::Value>,
    /// When the file was read from disk.
    pub read_at: DateTime<Utc>,
}

impl Partial {
    /// Read and strip a partial from disk.
    pub fn load(path: &Path) -> Result<Self, PartialError> {
        let file = PipelineFile::load(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PartialError::NotFound(path.to_path_buf()),
            _ => PartialError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let file = front_matter::strip(file);
        Ok(Self {
            path: path.to_path_buf(),
            contents: file.contents,
            metadata: file.metadata,
            read_at: Utc::now(),
        })
    }
}

type Slot = Arc<Mutex<Option<Arc<Partial>>>>;

/// Shared, flushable cache of loaded partials.
#[derive(Debug, Default)]
pub struct PartialCache {
    slots: Mutex<HashMap<PathBuf, Slot>>,
    hits: AtomicU32,
    loads: AtomicU32,
}

impl PartialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the partial at `path`, loading it from disk on a miss.
    pub fn get(&self, path: &Path) -> Result<Arc<Partial>, PartialError> {
        self.get_with(path, Partial::load)
    }

    /// Like [`get`](Self::get) with a custom loader for misses.
    pub fn get_with<F>(&self, path: &Path, loader: F) -> Result<Arc<Partial>, PartialError>
    where
        F: FnOnce(&Path) -> Result<Partial, PartialError>,
    {
        let slot = lock(&self.slots)
            .entry(path.to_path_buf())
            .or_default()
            .clone();

        let mut value = lock(&slot);
        if let Some(partial) = value.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(partial));
        }

        let partial = match loader(path) {
            Ok(partial) => Arc::new(partial),
            Err(e) => {
                drop(value);
                self.forget_empty(path, &slot);
                return Err(e);
            }
        };
        self.loads.fetch_add(1, Ordering::Relaxed);
        *value = Some(Arc::clone(&partial));
        Ok(partial)
    }

    /// Remove `slot` from the map if it is still the entry for `path` and
    /// nothing has been stored in it. A slot another caller is loading into
    /// stays.
    fn forget_empty(&self, path: &Path, slot: &Slot) {
        let mut slots = lock(&self.slots);
        if let Some(current) = slots.get(path)
            && Arc::ptr_eq(current, slot)
            && is_vacant(current)
        {
            slots.remove(path);
        }
    }

    /// Drop every entry. Returns how many loaded partials were evicted.
    pub fn flush(&self) -> usize {
        let detached = std::mem::take(&mut *lock(&self.slots));
        detached
            .values()
            .filter(|slot| lock(slot).is_some())
            .count()
    }

    /// Number of loaded partials currently cached.
    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| lock(slot).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_vacant(slot: &Slot) -> bool {
    match slot.try_lock() {
        Ok(value) => value.is_none(),
        Err(TryLockError::Poisoned(e)) => e.into_inner().is_none(),
        Err(TryLockError::WouldBlock) => false,
    }
}

/// Hit/load counters since the cache was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub loads: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.loads
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} loaded ({} total)",
                self.hits,
                self.loads,
                self.total()
            )
        } else {
            write!(f, "{} loaded", self.loads)
        }
    }
}
