use sea_query::{ColumnDef, Index, SqliteQueryBuilder, Table};

use crate::schema::{Files, Metadata};

/// CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)
pub fn create_metadata_table() -> String {
    Table::create()
        .table(Metadata::Table)
        .if_not_exists()
        .col(ColumnDef::new(Metadata::Key).string().primary_key())
        .col(ColumnDef::new(Metadata::Value).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS files (
///     file_path TEXT PRIMARY KEY,
///     phone TEXT NOT NULL DEFAULT '',
///     email TEXT NOT NULL DEFAULT '',
///     call_date TEXT NOT NULL,
///     call_time TEXT NOT NULL DEFAULT '',
///     duration_ms INTEGER NOT NULL DEFAULT 0,
///     file_size INTEGER NOT NULL DEFAULT 0,
///     created_at INTEGER NOT NULL,
///     updated_at INTEGER NOT NULL
/// )
pub fn create_files_table() -> String {
    Table::create()
        .table(Files::Table)
        .if_not_exists()
        .col(ColumnDef::new(Files::FilePath).string().primary_key())
        .col(ColumnDef::new(Files::Phone).string().not_null().default(""))
        .col(ColumnDef::new(Files::Email).string().not_null().default(""))
        .col(ColumnDef::new(Files::CallDate).string().not_null())
        .col(ColumnDef::new(Files::CallTime).string().not_null().default(""))
        .col(
            ColumnDef::new(Files::DurationMs)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(Files::FileSize)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(ColumnDef::new(Files::CreatedAt).big_integer().not_null())
        .col(ColumnDef::new(Files::UpdatedAt).big_integer().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_files_date_time ON files(call_date, call_time)
pub fn create_files_date_time_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_files_date_time")
        .table(Files::Table)
        .col(Files::CallDate)
        .col(Files::CallTime)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_files_phone ON files(phone)
pub fn create_files_phone_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_files_phone")
        .table(Files::Table)
        .col(Files::Phone)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_files_email ON files(email)
pub fn create_files_email_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_files_email")
        .table(Files::Table)
        .col(Files::Email)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_files_duration ON files(duration_ms)
pub fn create_files_duration_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_files_duration")
        .table(Files::Table)
        .col(Files::DurationMs)
        .to_string(SqliteQueryBuilder)
}
