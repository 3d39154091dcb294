//! Cache artifact addressing and per-key transcode serialization.

use dashmap::DashMap;
use object_store::path::Path as ObjectPath;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Browser-playable PCM WAV
    Audio,
    /// Downsampled peak envelope as JSON
    Waveform,
}

impl ArtifactKind {
    pub fn dir(self) -> &'static str {
        match self {
            ArtifactKind::Audio => "audio",
            ArtifactKind::Waveform => "waveform",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Audio => "wav",
            ArtifactKind::Waveform => "json",
        }
    }
}

/// `{cache_prefix}/{kind}/{sha256_hex(file_path)}.{ext}`
pub fn cache_key(cache_prefix: &str, kind: ArtifactKind, file_path: &str) -> ObjectPath {
    let digest = hex::encode(Sha256::digest(file_path.as_bytes()));
    ObjectPath::from(format!(
        "{}/{}/{}.{}",
        cache_prefix.trim_matches('/'),
        kind.dir(),
        digest,
        kind.extension()
    ))
}

/// Async mutex per key, so only one miss per artifact runs the transcoder
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds a key's lock; the map entry is dropped once nobody else wants it
pub struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // map ref + ours: nobody else is waiting
        self.owner
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) <= 1);
    }
}
