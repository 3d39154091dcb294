use sea_query::{
    Expr, Func, LikeExpr, OnConflict, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder,
};

use crate::index::FileRecord;
use crate::query::{DurationMode, FileQuery, SortColumn, SortDirection, MAX_OFFSET};
use crate::schema::Files;

const COLUMNS: [Files; 9] = [
    Files::FilePath,
    Files::Phone,
    Files::Email,
    Files::CallDate,
    Files::CallTime,
    Files::DurationMs,
    Files::FileSize,
    Files::CreatedAt,
    Files::UpdatedAt,
];

/// INSERT INTO files (...) VALUES (...)
/// ON CONFLICT (file_path) DO UPDATE SET phone, email, call_date, call_time,
/// duration_ms, file_size, updated_at = excluded.*
///
/// created_at keeps the value of the first insert.
pub fn upsert(record: &FileRecord) -> String {
    Query::insert()
        .into_table(Files::Table)
        .columns(COLUMNS)
        .values_panic([
            record.file_path.as_str().into(),
            record.phone.as_str().into(),
            record.email.as_str().into(),
            record.call_date.as_str().into(),
            record.call_time.as_str().into(),
            record.duration_ms.into(),
            record.file_size.into(),
            record.created_at.into(),
            record.updated_at.into(),
        ])
        .on_conflict(
            OnConflict::column(Files::FilePath)
                .update_columns([
                    Files::Phone,
                    Files::Email,
                    Files::CallDate,
                    Files::CallTime,
                    Files::DurationMs,
                    Files::FileSize,
                    Files::UpdatedAt,
                ])
                .to_owned(),
        )
        .to_string(SqliteQueryBuilder)
}

/// SELECT 1 FROM files WHERE file_path = ?
pub fn exists(file_path: &str) -> String {
    Query::select()
        .expr(Expr::val(1))
        .from(Files::Table)
        .and_where(Expr::col(Files::FilePath).eq(file_path))
        .to_string(SqliteQueryBuilder)
}

/// SELECT <all columns> FROM files WHERE file_path = ?
pub fn select_by_path(file_path: &str) -> String {
    Query::select()
        .columns(COLUMNS)
        .from(Files::Table)
        .and_where(Expr::col(Files::FilePath).eq(file_path))
        .to_string(SqliteQueryBuilder)
}

/// SELECT COUNT(file_path) FROM files
pub fn count_all() -> String {
    Query::select()
        .expr(Func::count(Expr::col(Files::FilePath)))
        .from(Files::Table)
        .to_string(SqliteQueryBuilder)
}

/// SELECT <all columns> FROM files WHERE <filters>
/// ORDER BY <sort column> <dir>, call_date DESC, call_time DESC, file_path ASC
/// LIMIT ? OFFSET ?
pub fn select_page(query: &FileQuery) -> String {
    let mut stmt = Query::select();
    stmt.columns(COLUMNS).from(Files::Table);
    apply_filters(&mut stmt, query);

    let order = match query.sort_direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    };
    stmt.order_by(sort_column(query.sort_column), order)
        .order_by(Files::CallDate, Order::Desc)
        .order_by(Files::CallTime, Order::Desc)
        .order_by(Files::FilePath, Order::Asc);

    let offset = query.offset.min(MAX_OFFSET);
    match query.limit {
        Some(limit) => {
            stmt.limit(limit.min(MAX_OFFSET));
        }
        // SQLite only accepts OFFSET after a LIMIT
        None if offset > 0 => {
            stmt.limit(MAX_OFFSET);
        }
        None => {}
    }
    if offset > 0 {
        stmt.offset(offset);
    }

    stmt.to_string(SqliteQueryBuilder)
}

/// SELECT COUNT(file_path) FROM files WHERE <filters>
///
/// Shares its predicate with [`select_page`].
pub fn count_filtered(query: &FileQuery) -> String {
    let mut stmt = Query::select();
    stmt.expr(Func::count(Expr::col(Files::FilePath)))
        .from(Files::Table);
    apply_filters(&mut stmt, query);
    stmt.to_string(SqliteQueryBuilder)
}

fn apply_filters(stmt: &mut SelectStatement, query: &FileQuery) {
    for expr in filter_exprs(query) {
        stmt.and_where(expr);
    }
}

/// Conjunctive predicate for a query, one expression per active filter
fn filter_exprs(query: &FileQuery) -> Vec<SimpleExpr> {
    let mut exprs = Vec::new();

    if let Some(start) = query.date_start {
        exprs.push(Expr::col(Files::CallDate).gte(start.format("%Y-%m-%d").to_string()));
    }
    if let Some(end) = query.date_end {
        exprs.push(Expr::col(Files::CallDate).lte(end.format("%Y-%m-%d").to_string()));
    }
    if let Some(phone) = &query.phone {
        exprs.push(Expr::col(Files::Phone).like(contains(phone)));
    }
    if let Some(email) = &query.email {
        exprs.push(Expr::expr(Func::lower(Expr::col(Files::Email))).like(contains(&email.to_lowercase())));
    }
    if let Some(duration) = &query.duration {
        let threshold = duration.threshold_ms();
        exprs.push(match duration.mode {
            DurationMode::Min => Expr::col(Files::DurationMs).gte(threshold),
            DurationMode::Max => Expr::col(Files::DurationMs).lte(threshold),
        });
    }
    if let Some(time) = &query.time {
        let (lower, upper) = time.bounds();
        exprs.push(Expr::col(Files::CallTime).ne(""));
        if let Some(lower) = lower {
            exprs.push(Expr::col(Files::CallTime).gte(lower));
        }
        if let Some(upper) = upper {
            exprs.push(Expr::col(Files::CallTime).lte(upper));
        }
    }

    exprs
}

fn sort_column(column: SortColumn) -> Files {
    match column {
        SortColumn::Date => Files::CallDate,
        SortColumn::Time => Files::CallTime,
        SortColumn::Phone => Files::Phone,
        SortColumn::Email => Files::Email,
        SortColumn::Duration => Files::DurationMs,
    }
}

/// `%needle%` with LIKE wildcards in the needle escaped
fn contains(needle: &str) -> LikeExpr {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    LikeExpr::new(escaped).escape('!')
}
