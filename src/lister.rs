use futures::TryStreamExt;
use log::{debug, info};
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;

use crate::constants::RECORDING_EXTENSION;
use crate::error::{ArchiveError, Result};

const PROGRESS_EVERY: usize = 10_000;

/// A recording object found while listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub size: u64,
}

/// List every `.wav` object under `prefix`.
///
/// The listing stream follows the store's continuation tokens, so this only
/// returns once every page has been read. Any page failure aborts the listing.
pub async fn list_recordings(store: &dyn ObjectStore, prefix: &ObjectPath) -> Result<Vec<ListedObject>> {
    let scoped = if prefix.as_ref().is_empty() {
        None
    } else {
        Some(prefix)
    };
    let mut stream = store.list(scoped);
    let mut objects = Vec::new();
    let mut seen = 0usize;

    while let Some(meta) = stream.try_next().await.map_err(|e| ArchiveError::Listing {
        prefix: prefix.to_string(),
        source: e,
    })? {
        seen += 1;
        if seen % PROGRESS_EVERY == 0 {
            info!("Listing '{}': {} keys scanned, {} recordings", prefix, seen, objects.len());
        }

        let key = meta.location.to_string();
        if !is_recording(&key) {
            continue;
        }
        objects.push(ListedObject {
            key,
            size: meta.size,
        });
    }

    debug!("Listed {} recordings under '{}' ({} keys)", objects.len(), prefix, seen);
    Ok(objects)
}

fn is_recording(key: &str) -> bool {
    let ext = RECORDING_EXTENSION.len();
    key.len() >= ext
        && key.is_char_boundary(key.len() - ext)
        && key[key.len() - ext..].eq_ignore_ascii_case(RECORDING_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use object_store::PutPayload;

    #[test]
    fn test_is_recording() {
        assert!(is_recording("recordings/1_2_2025/a.wav"));
        assert!(is_recording("recordings/1_2_2025/a.WAV"));
        assert!(!is_recording("recordings/1_2_2025/a.mp3"));
        assert!(!is_recording("wav"));
        assert!(!is_recording("recordings/1_2_2025/é"));
    }

    #[tokio::test]
    async fn test_lists_only_recordings_under_prefix() {
        let store = InMemory::new();
        for key in [
            "recordings/9_26_2025/a.wav",
            "recordings/9_26_2025/b.WAV",
            "recordings/9_26_2025/notes.txt",
            "recordings/9_27_2025/c.wav",
            "cache/audio/x.wav",
        ] {
            store
                .put(&ObjectPath::from(key), PutPayload::from_static(b"RIFF"))
                .await
                .unwrap();
        }

        let mut listed = list_recordings(&store, &ObjectPath::from("recordings/9_26_2025"))
            .await
            .unwrap();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        let keys: Vec<&str> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["recordings/9_26_2025/a.wav", "recordings/9_26_2025/b.WAV"]);
        assert_eq!(listed[0].size, 4);

        let all = list_recordings(&store, &ObjectPath::from("")).await.unwrap();
        assert_eq!(all.len(), 4);
    }
}
