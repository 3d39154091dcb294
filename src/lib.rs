// Library interface for the binary and integration tests

pub mod cache;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod db;
pub mod error;
pub mod filename;
pub mod index;
pub mod lister;
pub mod pipeline;
pub mod queries;
pub mod query;
pub mod range;
pub mod schema;
pub mod serve;
pub mod services;
pub mod store;
pub mod sync;
pub mod transcode;
pub mod waveform;

// Re-export the expected database version for convenience
pub use constants::EXPECTED_DB_VERSION;
