//! Transform output cache.
//!
//! Watch-mode rebuilds only re-run chains for modules whose content or
//! effective options changed. Entries are keyed by absolute path and
//! validated against a content hash and an options fingerprint.

use crate::descriptor::RuleKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// FNV-1a hash of a byte slice.
pub fn content_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[derive(Debug, Clone)]
struct CacheEntry {
    kind: RuleKind,
    hash: u64,
    fingerprint: u64,
    output: Arc<str>,
}

/// Compiled module outputs from earlier builds.
#[derive(Debug, Default)]
pub struct TransformCache {
    entries: HashMap<PathBuf, CacheEntry>,
    hits: usize,
    misses: usize,
}

/// Cache handle shared between the watcher and build threads.
pub type SharedCache = Arc<Mutex<TransformCache>>;

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedCache {
        Arc::new(Mutex::new(Self::new()))
    }

    /// A cached output, if the source and options are unchanged.
    pub fn get(&mut self, path: &Path, hash: u64, fingerprint: u64) -> Option<Arc<str>> {
        match self.entries.get(path) {
            Some(entry) if entry.hash == hash && entry.fingerprint == fingerprint => {
                self.hits += 1;
                Some(Arc::clone(&entry.output))
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, path: PathBuf, kind: RuleKind, hash: u64, fingerprint: u64, output: Arc<str>) {
        self.entries.insert(path, CacheEntry { kind, hash, fingerprint, output });
    }

    /// Drop the entry for a changed or removed file.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Drop every entry compiled by a rule of `kind`. Returns how many went.
    pub fn invalidate_kind(&mut self, kind: RuleKind) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.kind != kind);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}
