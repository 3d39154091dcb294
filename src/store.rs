use bytes::Bytes;
use futures::stream::BoxStream;
use log::info;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{GetOptions, GetRange, GetResult, ObjectMeta, ObjectStore, PutPayload};
use std::ops::Range;
use std::sync::Arc;

use crate::config::{ArchiveConfig, StorageConfig};
use crate::credentials::{get_s3_credential, load_credentials};
use crate::error::{ArchiveError, Result};

/// Byte stream of an object body
pub type SourceStream = BoxStream<'static, object_store::Result<Bytes>>;

/// Bucket holding the original recordings and the derived cache artifacts
pub struct RecordingStore {
    inner: Arc<dyn ObjectStore>,
    recordings_prefix: String,
    cache_prefix: String,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn ObjectStore>, recordings_prefix: &str, cache_prefix: &str) -> Self {
        Self {
            inner,
            recordings_prefix: recordings_prefix.trim_matches('/').to_string(),
            cache_prefix: cache_prefix.trim_matches('/').to_string(),
        }
    }

    /// Build the backend selected in the [storage] section
    pub fn from_config(config: &ArchiveConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config.storage {
            StorageConfig::Local { root } => {
                std::fs::create_dir_all(root)?;
                info!("Using local storage at {}", root.display());
                let fs = LocalFileSystem::new_with_prefix(root)
                    .map_err(|e| ArchiveError::Config(format!("invalid storage root: {}", e)))?;
                Arc::new(fs)
            }
            StorageConfig::S3 {
                bucket,
                region,
                endpoint,
                credential_profile,
            } => {
                let credentials = load_credentials().map_err(|e| {
                    ArchiveError::Config(format!("failed to load credentials: {}", e))
                })?;
                let credential = get_s3_credential(&credentials, credential_profile)
                    .map_err(ArchiveError::Config)?;

                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_access_key_id(&credential.access_key_id)
                    .with_secret_access_key(&credential.secret_access_key);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                info!("Using S3 bucket '{}' (profile: {})", bucket, credential_profile);
                Arc::new(
                    builder
                        .build()
                        .map_err(|e| ArchiveError::Config(format!("invalid S3 settings: {}", e)))?,
                )
            }
            StorageConfig::Memory => {
                info!("Using in-memory storage, contents are lost on exit");
                Arc::new(InMemory::new())
            }
        };

        Ok(Self::new(
            inner,
            &config.recordings_prefix,
            &config.cache_prefix,
        ))
    }

    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.inner
    }

    pub fn recordings_prefix(&self) -> &str {
        &self.recordings_prefix
    }

    pub fn cache_prefix(&self) -> &str {
        &self.cache_prefix
    }

    /// Location of a recording given its path relative to the recordings root
    pub fn source_path(&self, file_path: &str) -> ObjectPath {
        join(&self.recordings_prefix, file_path)
    }

    /// Location of a recordings sub-prefix such as a date folder
    pub fn recordings_subprefix(&self, child: &str) -> ObjectPath {
        join(&self.recordings_prefix, child)
    }

    /// Object metadata, or `None` if the object does not exist
    pub async fn head(&self, location: &ObjectPath) -> Result<Option<ObjectMeta>> {
        match self.inner.head(location).await {
            Ok(meta) => Ok(Some(meta)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(ArchiveError::Storage {
                key: location.to_string(),
                source: e,
            }),
        }
    }

    /// Open the full body of an object as a stream
    pub async fn get_stream(&self, location: &ObjectPath, key: &str) -> Result<(ObjectMeta, SourceStream)> {
        let result = self
            .inner
            .get(location)
            .await
            .map_err(|e| ArchiveError::from_store(key, e))?;
        let meta = result.meta.clone();
        Ok((meta, result.into_stream()))
    }

    /// Fetch an inclusive-exclusive byte range of an object
    pub async fn get_range(&self, location: &ObjectPath, key: &str, range: Range<u64>) -> Result<GetResult> {
        let options = GetOptions {
            range: Some(GetRange::Bounded(range)),
            ..Default::default()
        };
        self.inner
            .get_opts(location, options)
            .await
            .map_err(|e| ArchiveError::from_store(key, e))
    }

    pub async fn get_bytes(&self, location: &ObjectPath, key: &str) -> Result<Bytes> {
        let result = self
            .inner
            .get(location)
            .await
            .map_err(|e| ArchiveError::from_store(key, e))?;
        result
            .bytes()
            .await
            .map_err(|e| ArchiveError::from_store(key, e))
    }

    /// Write a cache artifact
    pub async fn put_artifact(&self, location: &ObjectPath, key: &str, data: Bytes) -> Result<()> {
        self.inner
            .put(location, PutPayload::from(data))
            .await
            .map_err(|e| ArchiveError::CacheUpload {
                key: key.to_string(),
                source: e,
            })?;
        Ok(())
    }
}

fn join(prefix: &str, child: &str) -> ObjectPath {
    let child = child.trim_matches('/');
    if prefix.is_empty() {
        ObjectPath::from(child)
    } else {
        ObjectPath::from(format!("{}/{}", prefix, child))
    }
}
