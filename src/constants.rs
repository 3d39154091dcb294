use std::time::Duration;

/// Expected database schema version
/// All index databases must use this version for compatibility
pub const EXPECTED_DB_VERSION: &str = "1";

/// Default prefix under which original recordings live in the bucket
pub const DEFAULT_RECORDINGS_PREFIX: &str = "recordings";

/// Default prefix under which derived cache artifacts live in the bucket
pub const DEFAULT_CACHE_PREFIX: &str = "cache";

/// File extension of recordings the lister picks up
pub const RECORDING_EXTENSION: &str = ".wav";

/// Canonical output rate of the transcoder (telephony audio)
pub const DEFAULT_SAMPLE_RATE: u32 = 8000;

/// Number of points in a waveform artifact
pub const WAVEFORM_POINTS: usize = 1000;

/// Upserts per transaction during a full-bucket sync
pub const DEFAULT_SYNC_BATCH_SIZE: usize = 1000;

/// Pause between batches of a full-bucket sync
pub const DEFAULT_SYNC_BATCH_PAUSE: Duration = Duration::from_millis(100);

/// Interval of the recurring current-day sync
pub const DEFAULT_CURRENT_DAY_SYNC_INTERVAL_SECS: u64 = 300;

/// Upper bound on a single transcoder run
pub const DEFAULT_TRANSCODE_TIMEOUT_SECS: u64 = 120;

/// Page size of `GET /recordings` when no limit is given
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Largest page `GET /recordings` will return
pub const MAX_PAGE_SIZE: u64 = 1000;
