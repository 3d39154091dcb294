//! SQL statements built with sea-query, one module per table.

pub mod ddl;
pub mod files;
pub mod metadata;
