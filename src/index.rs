//! SQLite-backed metadata index over the recordings in the store.

use log::{debug, warn};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};

use crate::db;
use crate::error::{ArchiveError, Result};
use crate::filename::{parse_recording_key, ParsedRecording};
use crate::lister::ListedObject;
use crate::queries::files;
use crate::query::FileQuery;

/// One indexed recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub file_path: String,
    pub phone: String,
    pub email: String,
    pub call_date: String,
    pub call_time: String,
    pub duration_ms: i64,
    pub file_size: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FileRecord {
    /// Build a row from parsed key metadata, stamped with `now_ms`
    pub fn from_parsed(parsed: ParsedRecording, file_size: u64, now_ms: i64) -> Self {
        Self {
            file_path: parsed.file_path,
            phone: parsed.phone,
            email: parsed.email,
            call_date: parsed.call_date,
            call_time: parsed.call_time,
            duration_ms: parsed.duration_ms,
            file_size: i64::try_from(file_size).unwrap_or(i64::MAX),
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            file_path: row.try_get(0)?,
            phone: row.try_get(1)?,
            email: row.try_get(2)?,
            call_date: row.try_get(3)?,
            call_time: row.try_get(4)?,
            duration_ms: row.try_get(5)?,
            file_size: row.try_get(6)?,
            created_at: row.try_get(7)?,
            updated_at: row.try_get(8)?,
        })
    }
}

/// One page of query results plus the size of the full filtered set
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub rows: Vec<FileRecord>,
    pub total_count: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total_files: u64,
    pub database_path: String,
    /// Main database file plus its WAL, in bytes
    pub database_size: u64,
}

pub struct MetadataIndex {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl MetadataIndex {
    /// Open (or create) the index at `db_path` and verify its schema version
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = db::open_database_with_path(db_path).await?;
        Self::from_pool(pool, db_path.to_path_buf()).await
    }

    /// Wrap an existing pool, creating the schema if needed
    pub async fn from_pool(pool: SqlitePool, db_path: PathBuf) -> Result<Self> {
        db::init_database_schema(&pool).await?;
        db::ensure_schema_version(&pool)
            .await
            .map_err(|e| ArchiveError::Config(e.to_string()))?;
        Ok(Self { pool, db_path })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or overwrite the row for `record.file_path`
    pub async fn upsert(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(&files::upsert(record))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Parse and upsert a batch of listed objects in one transaction.
    ///
    /// Keys that do not follow the naming convention are skipped. Returns the
    /// number of rows written.
    pub async fn upsert_batch(&self, objects: &[ListedObject], root_prefix: &str) -> Result<usize> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;
        let mut indexed = 0usize;
        let mut skipped = 0usize;

        for object in objects {
            let Some(parsed) = parse_recording_key(&object.key, root_prefix) else {
                skipped += 1;
                continue;
            };
            let record = FileRecord::from_parsed(parsed, object.size, now_ms);
            sqlx::query(&files::upsert(&record))
                .execute(&mut *tx)
                .await?;
            indexed += 1;
        }

        tx.commit().await?;
        if skipped > 0 {
            debug!("Skipped {} keys that do not match the naming convention", skipped);
        }
        Ok(indexed)
    }

    /// Index a single key. Returns false when the key cannot be parsed.
    pub async fn index_key(&self, key: &str, size: u64, root_prefix: &str) -> Result<bool> {
        match parse_recording_key(key, root_prefix) {
            Some(parsed) => {
                let now_ms = chrono::Utc::now().timestamp_millis();
                self.upsert(&FileRecord::from_parsed(parsed, size, now_ms))
                    .await?;
                Ok(true)
            }
            None => {
                warn!("Not indexing '{}': key does not match the naming convention", key);
                Ok(false)
            }
        }
    }

    pub async fn exists(&self, file_path: &str) -> Result<bool> {
        let row = sqlx::query(&files::exists(file_path))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn get(&self, file_path: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query(&files::select_by_path(file_path))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(FileRecord::from_row).transpose()?)
    }

    /// Run a filtered, sorted page query and its count in one read transaction
    pub async fn query(&self, query: &FileQuery) -> Result<QueryPage> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(&files::select_page(query))
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(FileRecord::from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total: i64 = sqlx::query_scalar(&files::count_filtered(query))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let total_count = total.max(0) as u64;
        let has_more = match query.limit {
            Some(limit) => query.offset.saturating_add(limit) < total_count,
            None => false,
        };

        Ok(QueryPage {
            rows,
            total_count,
            has_more,
        })
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let total: i64 = sqlx::query_scalar(&files::count_all())
            .fetch_one(&self.pool)
            .await?;

        let mut database_size = file_len(&self.db_path);
        let mut wal = self.db_path.clone().into_os_string();
        wal.push("-wal");
        database_size += file_len(Path::new(&wal));

        Ok(IndexStats {
            total_files: total.max(0) as u64,
            database_path: self.db_path.display().to_string(),
            database_size,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
