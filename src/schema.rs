use sea_query::Iden;

/// Metadata table - key-value store for database configuration
#[derive(Iden)]
pub enum Metadata {
    Table,
    Key,
    Value,
}

/// Files table - one row per known recording
#[derive(Iden, Clone, Copy)]
pub enum Files {
    Table,
    FilePath,
    Phone,
    Email,
    CallDate,
    CallTime,
    DurationMs,
    FileSize,
    CreatedAt,
    UpdatedAt,
}
