use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_CACHE_PREFIX, DEFAULT_CURRENT_DAY_SYNC_INTERVAL_SECS, DEFAULT_RECORDINGS_PREFIX,
    DEFAULT_SAMPLE_RATE, DEFAULT_SYNC_BATCH_PAUSE, DEFAULT_SYNC_BATCH_SIZE,
    DEFAULT_TRANSCODE_TIMEOUT_SECS,
};

fn default_api_port() -> u16 {
    3000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/recordings.sqlite")
}

fn default_recordings_prefix() -> String {
    DEFAULT_RECORDINGS_PREFIX.to_string()
}

fn default_cache_prefix() -> String {
    DEFAULT_CACHE_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

/// Server configuration file structure
///
/// ```toml
/// database_path = "data/recordings.sqlite"
/// api_port = 3000
///
/// [storage]
/// backend = "s3"
/// bucket = "call-recordings"
/// region = "us-west-004"
/// endpoint = "https://s3.us-west-004.backblazeb2.com"
/// credential_profile = "b2"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// SQLite metadata index location (default: data/recordings.sqlite)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// HTTP API port (default: 3000)
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Bucket prefix holding the original recordings (default: recordings)
    #[serde(default = "default_recordings_prefix")]
    pub recordings_prefix: String,
    /// Bucket prefix holding derived artifacts (default: cache)
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    /// Object store holding recordings and cache artifacts
    pub storage: StorageConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Object store backend (maps to [storage] section in TOML)
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Directory tree on a local or mounted filesystem
    Local { root: PathBuf },
    /// S3-compatible bucket (AWS, Backblaze B2, MinIO)
    S3 {
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
        /// Credential profile name looked up in ~/.config/call_archive/credentials.toml
        credential_profile: String,
    },
    /// Process-local store, contents are lost on exit
    Memory,
}

/// External transcoder settings (maps to [transcoder] section in TOML)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// Transcoder executable (default: ffmpeg)
    pub program: String,
    /// Output sample rate in Hz (default: 8000)
    pub sample_rate: u32,
    /// Maximum run time of a single transcode in seconds (default: 120)
    pub timeout_secs: u64,
    /// Directory for temporary transcoder output (default: system temp dir)
    pub temp_dir: Option<PathBuf>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            timeout_secs: DEFAULT_TRANSCODE_TIMEOUT_SECS,
            temp_dir: None,
        }
    }
}

impl TranscoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Index sync settings (maps to [sync] section in TOML)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Run the current-day sync on a timer while serving (default: true)
    #[serde(default = "default_true")]
    pub periodic: bool,
    /// Seconds between current-day syncs (default: 300)
    pub interval_secs: u64,
    /// Upserts per transaction in a full sync (default: 1000)
    pub batch_size: usize,
    /// Pause between full-sync batches in milliseconds (default: 100)
    pub batch_pause_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            periodic: true,
            interval_secs: DEFAULT_CURRENT_DAY_SYNC_INTERVAL_SECS,
            batch_size: DEFAULT_SYNC_BATCH_SIZE,
            batch_pause_ms: DEFAULT_SYNC_BATCH_PAUSE.as_millis() as u64,
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

impl ArchiveConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: ArchiveConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.recordings_prefix.trim_matches('/') == self.cache_prefix.trim_matches('/') {
            return Err("recordings_prefix and cache_prefix must differ".to_string());
        }
        if self.cache_prefix.trim_matches('/').is_empty() {
            return Err("cache_prefix must not be empty".to_string());
        }
        if self.transcoder.program.trim().is_empty() {
            return Err("transcoder.program must not be empty".to_string());
        }
        if self.transcoder.sample_rate == 0 {
            return Err("transcoder.sample_rate must be greater than zero".to_string());
        }
        if self.transcoder.timeout_secs == 0 {
            return Err("transcoder.timeout_secs must be greater than zero".to_string());
        }
        if self.sync.batch_size == 0 {
            return Err("sync.batch_size must be greater than zero".to_string());
        }
        if self.sync.periodic && self.sync.interval_secs == 0 {
            return Err("sync.interval_secs must be greater than zero when periodic sync is enabled".to_string());
        }
        if let StorageConfig::S3 { bucket, .. } = &self.storage {
            if bucket.trim().is_empty() {
                return Err("storage.bucket must not be empty".to_string());
            }
        }
        Ok(())
    }
}
