//! Bounded store of generated silence files, keyed by duration.
//!
//! Silence of a given length is deterministic, so one file per duration is
//! reused across chunks and runs. Entries are evicted in insertion order
//! once the cache is full. An evicted file is deleted as soon as no run
//! still holds it.

use crate::engine::AudioEngine;
use crate::error::Result;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::TempDir;

/// A silence waveform on disk. Deleted when the last handle drops.
#[derive(Debug)]
pub struct SilenceFile {
    path: PathBuf,
    seconds: f64,
}

impl SilenceFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }
}

impl Drop for SilenceFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::debug!(path = %self.path.display(), error = %e, "Failed to remove silence file");
        }
    }
}

#[derive(Default)]
struct CacheState {
    order: VecDeque<u64>,
    entries: HashMap<u64, Arc<SilenceFile>>,
}

/// FIFO cache of silence files.
pub struct SilenceCache {
    capacity: usize,
    dir: TempDir,
    state: Mutex<CacheState>,
    counter: AtomicU64,
}

impl SilenceCache {
    /// Creates an empty cache holding at most `capacity` files (minimum 1).
    pub fn new(capacity: usize) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("scriptvox_silence_")
            .tempdir()?;
        Ok(Self {
            capacity: capacity.max(1),
            dir,
            state: Mutex::new(CacheState::default()),
            counter: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, seconds: f64) -> bool {
        self.lock().entries.contains_key(&key(seconds))
    }

    /// Returns the cached file for `seconds`, generating it on a miss.
    ///
    /// Generation runs outside the lock. Two runs missing on the same
    /// duration may both generate; the first insert wins and the other
    /// file is discarded.
    pub async fn get_or_generate(
        &self,
        engine: &AudioEngine,
        seconds: f64,
    ) -> Result<Arc<SilenceFile>> {
        let cached = self.lock().entries.get(&key(seconds)).cloned();
        if let Some(hit) = cached {
            tracing::debug!(seconds, "Silence cache hit");
            return Ok(hit);
        }

        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.path().join(format!("silence_{}s_{}.wav", seconds, id));
        let file = SilenceFile { path, seconds };

        if let Err(e) = engine.generate_silence(seconds, file.path()).await {
            tracing::error!(seconds, error = %e, "Failed to generate silence segment");
            // Dropping `file` removes any partial output.
            return Err(e);
        }

        Ok(self.insert(Arc::new(file)))
    }

    fn insert(&self, file: Arc<SilenceFile>) -> Arc<SilenceFile> {
        let k = key(file.seconds);
        let mut state = self.lock();
        if let Some(existing) = state.entries.get(&k) {
            return Arc::clone(existing);
        }

        while state.entries.len() >= self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            if let Some(evicted) = state.entries.remove(&oldest) {
                tracing::debug!(seconds = evicted.seconds, "Evicted silence file");
            }
        }

        state.order.push_back(k);
        state.entries.insert(k, Arc::clone(&file));
        file
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SilenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SilenceCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("dir", &self.dir.path())
            .finish()
    }
}

fn key(seconds: f64) -> u64 {
    // 0.0 and -0.0 share a key.
    (seconds + 0.0).to_bits()
}
