use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Executor, Row};
use std::path::Path;
use std::time::Duration;

use crate::constants::EXPECTED_DB_VERSION;
use crate::queries::{ddl, metadata};

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Open the index database for production use, creating it if needed
/// Enables WAL mode so the periodic sync can write while handlers read
pub async fn open_database_with_path(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
}

/// Create tables and indexes if they don't exist
pub async fn init_database_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(ddl::create_metadata_table().as_str()).await?;
    pool.execute(ddl::create_files_table().as_str()).await?;
    pool.execute(ddl::create_files_date_time_index().as_str())
        .await?;
    pool.execute(ddl::create_files_phone_index().as_str()).await?;
    pool.execute(ddl::create_files_email_index().as_str()).await?;
    pool.execute(ddl::create_files_duration_index().as_str())
        .await?;
    Ok(())
}

/// Query a single metadata value by key
pub async fn query_metadata<'e, E>(executor: E, key: &str) -> Result<Option<String>, sqlx::Error>
where
    E: Executor<'e, Database = sqlx::Sqlite>,
{
    let sql = metadata::select_by_key(key);
    let result = sqlx::query(&sql).fetch_optional(executor).await?;
    Ok(result.map(|row| row.get::<String, _>(0)))
}

/// Update or insert a metadata key-value pair
pub async fn upsert_metadata<'e, E>(executor: E, key: &str, value: &str) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = sqlx::Sqlite>,
{
    let sql = metadata::upsert(key, value);
    sqlx::query(&sql).execute(executor).await?;
    Ok(())
}

/// Stamp a fresh database with the schema version, or verify an existing one
pub async fn ensure_schema_version(pool: &SqlitePool) -> Result<(), DynError> {
    match query_metadata(pool, "version").await? {
        None => {
            let sql = metadata::insert("version", EXPECTED_DB_VERSION);
            sqlx::query(&sql).execute(pool).await?;
            Ok(())
        }
        Some(version) if version == EXPECTED_DB_VERSION => Ok(()),
        Some(version) => Err(format!(
            "Unsupported database version: '{}'. This application only supports version '{}'",
            version, EXPECTED_DB_VERSION
        )
        .into()),
    }
}

/// Create a database in a temporary directory for testing
/// The directory is removed when the returned guard drops
pub async fn create_test_connection_in_temporary_file(
) -> Result<(SqlitePool, tempfile::TempDir), DynError> {
    let dir = tempfile::tempdir()?;
    let pool = open_database_with_path(&dir.path().join("test.sqlite")).await?;
    Ok((pool, dir))
}
