//! Transcode-and-cache pipeline for playback audio and waveforms.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use log::{info, warn};
use object_store::path::Path as ObjectPath;
use object_store::ObjectMeta;
use serde::Serialize;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{cache_key, ArtifactKind, KeyedLocks};
use crate::constants::WAVEFORM_POINTS;
use crate::error::{ArchiveError, Result, TranscodeError};
use crate::range::{ByteRange, RangeResolution};
use crate::store::{RecordingStore, SourceStream};
use crate::transcode::Transcoder;
use crate::waveform::{read_wav_samples, WaveformData};

pub enum AudioBody {
    Buffered(Bytes),
    Stream(SourceStream),
}

/// Audio ready to be written to a client
pub struct AudioResponse {
    pub file_path: String,
    pub body: AudioBody,
    /// Full artifact length in bytes
    pub total_length: u64,
    /// Served range for partial responses
    pub range: Option<Range<u64>>,
    pub last_modified: Option<DateTime<Utc>>,
    /// True when the artifact already existed in the cache
    pub cached: bool,
}

impl AudioResponse {
    pub fn content_length(&self) -> u64 {
        match &self.range {
            Some(range) => range.end - range.start,
            None => self.total_length,
        }
    }

    /// Last path segment, used for Content-Disposition
    pub fn filename(&self) -> &str {
        self.file_path
            .rsplit('/')
            .next()
            .unwrap_or(self.file_path.as_str())
    }

    /// Collect the body into memory
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self.body {
            AudioBody::Buffered(data) => Ok(data),
            AudioBody::Stream(stream) => {
                let key = self.file_path;
                let data = stream
                    .map_err(|e| ArchiveError::from_store(&key, e))
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok::<_, ArchiveError>(acc)
                    })
                    .await?;
                Ok(data.freeze())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WaveformResponse {
    #[serde(flatten)]
    pub data: WaveformData,
    pub cached: bool,
}

pub struct AudioPipeline {
    store: Arc<RecordingStore>,
    transcoder: Arc<dyn Transcoder>,
    locks: KeyedLocks,
    temp_dir: Option<PathBuf>,
}

impl AudioPipeline {
    pub fn new(store: Arc<RecordingStore>, transcoder: Arc<dyn Transcoder>, temp_dir: Option<PathBuf>) -> Self {
        Self {
            store,
            transcoder,
            locks: KeyedLocks::new(),
            temp_dir,
        }
    }

    pub fn audio_key(&self, file_path: &str) -> ObjectPath {
        cache_key(self.store.cache_prefix(), ArtifactKind::Audio, file_path)
    }

    pub fn waveform_key(&self, file_path: &str) -> ObjectPath {
        cache_key(self.store.cache_prefix(), ArtifactKind::Waveform, file_path)
    }

    /// Serve the playable WAV for `file_path`, transcoding it on the first request
    pub async fn serve_audio(&self, file_path: &str, range: Option<ByteRange>) -> Result<AudioResponse> {
        let key = self.audio_key(file_path);
        if let Some(meta) = self.store.head(&key).await? {
            return self.serve_cached(file_path, &key, meta, range).await;
        }

        let _guard = self.locks.lock(key.as_ref()).await;
        // a request queued behind the transcode that filled the cache
        if let Some(meta) = self.store.head(&key).await? {
            return self.serve_cached(file_path, &key, meta, range).await;
        }

        let data = self.transcode_and_persist(file_path, &key).await?;
        serve_buffer(file_path, data, range)
    }

    async fn serve_cached(
        &self,
        file_path: &str,
        key: &ObjectPath,
        meta: ObjectMeta,
        range: Option<ByteRange>,
    ) -> Result<AudioResponse> {
        match range.map(|r| r.resolve(meta.size)) {
            None => {
                let (meta, stream) = self.store.get_stream(key, file_path).await?;
                Ok(AudioResponse {
                    file_path: file_path.to_string(),
                    body: AudioBody::Stream(stream),
                    total_length: meta.size,
                    range: None,
                    last_modified: Some(meta.last_modified),
                    cached: true,
                })
            }
            Some(RangeResolution::Unsatisfiable) => Err(ArchiveError::RangeNotSatisfiable { length: meta.size }),
            Some(RangeResolution::Partial(requested)) => {
                let result = self.store.get_range(key, file_path, requested).await?;
                let served = result.range.clone();
                let total_length = result.meta.size;
                let last_modified = result.meta.last_modified;
                Ok(AudioResponse {
                    file_path: file_path.to_string(),
                    body: AudioBody::Stream(result.into_stream()),
                    total_length,
                    range: Some(served),
                    last_modified: Some(last_modified),
                    cached: true,
                })
            }
        }
    }

    /// Fetch the source, transcode it into a temp file and upload the result
    async fn transcode_and_persist(&self, file_path: &str, key: &ObjectPath) -> Result<Bytes> {
        let source = self.store.source_path(file_path);
        let (meta, stream) = self.store.get_stream(&source, file_path).await?;
        info!("Transcoding {} ({} bytes)", file_path, meta.size);

        let output = self.temp_output()?;
        self.transcoder
            .transcode_to_file(stream, &output)
            .await
            .map_err(|source| ArchiveError::Transcode {
                key: file_path.to_string(),
                source,
            })?;

        let data = Bytes::from(tokio::fs::read(&output).await?);
        if data.is_empty() {
            return Err(ArchiveError::Transcode {
                key: file_path.to_string(),
                source: TranscodeError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "transcoder produced no output",
                )),
            });
        }

        self.store.put_artifact(key, file_path, data.clone()).await?;
        info!("Cached {} as {} ({} bytes)", file_path, key, data.len());
        Ok(data)
    }

    fn temp_output(&self) -> Result<tempfile::TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("transcode-").suffix(".wav");
        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path())
    }

    /// Waveform envelope for `file_path`, generated and cached on first request
    pub async fn waveform(&self, file_path: &str) -> Result<WaveformResponse> {
        let key = self.waveform_key(file_path);
        if let Some(data) = self.load_waveform(&key, file_path).await? {
            return Ok(WaveformResponse { data, cached: true });
        }

        let _guard = self.locks.lock(key.as_ref()).await;
        if let Some(data) = self.load_waveform(&key, file_path).await? {
            return Ok(WaveformResponse { data, cached: true });
        }

        let (samples, sample_rate) = self.waveform_samples(file_path).await?;
        let data = WaveformData::from_samples(&samples, sample_rate, WAVEFORM_POINTS);
        let json = serde_json::to_vec(&data).map_err(std::io::Error::from)?;
        self.store
            .put_artifact(&key, file_path, Bytes::from(json))
            .await?;
        info!("Cached waveform for {} ({} samples)", file_path, data.total_samples);

        Ok(WaveformResponse { data, cached: false })
    }

    async fn load_waveform(&self, key: &ObjectPath, file_path: &str) -> Result<Option<WaveformData>> {
        let raw = match self.store.get_bytes(key, file_path).await {
            Ok(raw) => raw,
            Err(ArchiveError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        match serde_json::from_slice(&raw) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                warn!("Ignoring unreadable waveform artifact {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Samples from the cached WAV, or a raw decode of the source when there is none
    async fn waveform_samples(&self, file_path: &str) -> Result<(Vec<i16>, u32)> {
        let audio_key = self.audio_key(file_path);
        if self.store.head(&audio_key).await?.is_some() {
            let raw = self.store.get_bytes(&audio_key, file_path).await?;
            match read_wav_samples(&raw) {
                Ok(decoded) => return Ok(decoded),
                Err(e) => warn!("Cached audio for {} is unreadable ({}), decoding source", file_path, e),
            }
        }

        let source = self.store.source_path(file_path);
        let (_, stream) = self.store.get_stream(&source, file_path).await?;
        let samples = self
            .transcoder
            .decode_pcm(stream)
            .await
            .map_err(|source| ArchiveError::Transcode {
                key: file_path.to_string(),
                source,
            })?;
        Ok((samples, self.transcoder.sample_rate()))
    }
}

fn serve_buffer(file_path: &str, data: Bytes, range: Option<ByteRange>) -> Result<AudioResponse> {
    let total_length = data.len() as u64;
    let (body, served) = match range.map(|r| r.resolve(total_length)) {
        None => (data, None),
        Some(RangeResolution::Unsatisfiable) => {
            return Err(ArchiveError::RangeNotSatisfiable {
                length: total_length,
            })
        }
        Some(RangeResolution::Partial(r)) => (data.slice(r.start as usize..r.end as usize), Some(r)),
    };
    Ok(AudioResponse {
        file_path: file_path.to_string(),
        body: AudioBody::Buffered(body),
        total_length,
        range: served,
        last_modified: None,
        cached: false,
    })
}
