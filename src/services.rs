use log::info;
use std::sync::Arc;

use crate::config::ArchiveConfig;
use crate::error::Result;
use crate::index::MetadataIndex;
use crate::pipeline::AudioPipeline;
use crate::store::RecordingStore;
use crate::sync::SyncEngine;
use crate::transcode::{FfmpegTranscoder, Transcoder};

/// Process-wide services shared by the HTTP handlers and the sync timer
pub struct ArchiveServices {
    pub index: Arc<MetadataIndex>,
    pub store: Arc<RecordingStore>,
    pub pipeline: Arc<AudioPipeline>,
    pub sync: Arc<SyncEngine>,
}

impl ArchiveServices {
    /// Open the index and object store described by `config`
    pub async fn open(config: &ArchiveConfig) -> Result<Self> {
        let store = Arc::new(RecordingStore::from_config(config)?);
        let index = Arc::new(MetadataIndex::open(&config.database_path).await?);
        let transcoder: Arc<dyn Transcoder> = Arc::new(FfmpegTranscoder::from_config(&config.transcoder));
        info!(
            "Opened index at {} (transcoder: {}, {} Hz)",
            config.database_path.display(),
            config.transcoder.program,
            config.transcoder.sample_rate
        );
        Ok(Self::assemble(
            index,
            store,
            transcoder,
            config,
        ))
    }

    /// Wire services from already-built parts
    pub fn assemble(
        index: Arc<MetadataIndex>,
        store: Arc<RecordingStore>,
        transcoder: Arc<dyn Transcoder>,
        config: &ArchiveConfig,
    ) -> Self {
        let pipeline = Arc::new(AudioPipeline::new(
            store.clone(),
            transcoder,
            config.transcoder.temp_dir.clone(),
        ));
        let sync = Arc::new(SyncEngine::new(
            index.clone(),
            store.clone(),
            config.sync.clone(),
        ));
        Self {
            index,
            store,
            pipeline,
            sync,
        }
    }

    pub async fn close(&self) {
        self.index.close().await;
        info!("Closed metadata index");
    }
}
