//! Filter, sort and page options for recording queries.
//!
//! Inbound HTTP parameters arrive as loose strings; [`FileQuery::from_params`]
//! turns them into a fully typed query. Values that cannot be understood are
//! dropped (the filter is simply not applied) instead of failing the request.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::filename::parse_date_folder;

/// SQLite integers are signed 64-bit
pub const MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    Date,
    Time,
    Phone,
    Email,
    Duration,
}

impl SortColumn {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "date" | "calldate" | "call_date" => Some(SortColumn::Date),
            "time" | "calltime" | "call_time" => Some(SortColumn::Time),
            "phone" => Some(SortColumn::Phone),
            "email" => Some(SortColumn::Email),
            "duration" | "durationms" | "duration_ms" => Some(SortColumn::Duration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDirection::Asc),
            "desc" | "descending" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Direction of the duration comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationMode {
    /// Keep calls at least this long
    #[default]
    Min,
    /// Keep calls at most this long
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationFilter {
    pub seconds: f64,
    pub mode: DurationMode,
}

impl DurationFilter {
    /// Threshold in the unit stored in the index
    pub fn threshold_ms(&self) -> i64 {
        (self.seconds * 1000.0).round() as i64
    }
}

/// Time-of-day filter on `call_time`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeFilter {
    /// Inclusive window; either side may be open
    Range {
        start: Option<NaiveTime>,
        end: Option<NaiveTime>,
    },
    /// Calls at or before the bound
    Older(NaiveTime),
    /// Calls at or after the bound
    Newer(NaiveTime),
}

impl TimeFilter {
    /// Inclusive `(lower, upper)` bounds as stored strings
    pub fn bounds(&self) -> (Option<String>, Option<String>) {
        let fmt = |t: &NaiveTime| t.format("%H:%M:%S").to_string();
        match self {
            TimeFilter::Range { start, end } => (start.as_ref().map(fmt), end.as_ref().map(fmt)),
            TimeFilter::Older(t) => (None, Some(fmt(t))),
            TimeFilter::Newer(t) => (Some(fmt(t)), None),
        }
    }
}

/// Every option a recordings query understands
#[derive(Debug, Clone, PartialEq)]
pub struct FileQuery {
    /// Inclusive lower bound on `call_date`
    pub date_start: Option<NaiveDate>,
    /// Inclusive upper bound on `call_date`
    pub date_end: Option<NaiveDate>,
    /// Substring of `phone`
    pub phone: Option<String>,
    /// Case-insensitive substring of `email`
    pub email: Option<String>,
    pub duration: Option<DurationFilter>,
    pub time: Option<TimeFilter>,
    pub sort_column: SortColumn,
    pub sort_direction: SortDirection,
    pub offset: u64,
    /// `None` returns every matching row
    pub limit: Option<u64>,
}

impl Default for FileQuery {
    fn default() -> Self {
        Self {
            date_start: None,
            date_end: None,
            phone: None,
            email: None,
            duration: None,
            time: None,
            sort_column: SortColumn::default(),
            sort_direction: SortDirection::default(),
            offset: 0,
            limit: Some(DEFAULT_PAGE_SIZE),
        }
    }
}

/// Raw query string of `GET /recordings`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingsParams {
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub duration_min: Option<String>,
    pub duration_mode: Option<String>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub time_mode: Option<String>,
    pub sort_column: Option<String>,
    pub sort_direction: Option<String>,
}

impl FileQuery {
    /// Normalize loosely typed request parameters
    pub fn from_params(params: &RecordingsParams) -> Self {
        let date_start = params.date_start.as_deref().and_then(parse_date_param);
        let date_end = params.date_end.as_deref().and_then(parse_date_param);

        let duration = params
            .duration_min
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(|seconds| DurationFilter {
                seconds,
                mode: match params.duration_mode.as_deref().map(|m| m.trim().to_ascii_lowercase()) {
                    Some(m) if m == "max" => DurationMode::Max,
                    _ => DurationMode::Min,
                },
            });

        let time = build_time_filter(
            params.time_start.as_deref().and_then(parse_time_param),
            params.time_end.as_deref().and_then(parse_time_param),
            params.time_mode.as_deref(),
        );

        let limit = params
            .limit
            .as_deref()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = params
            .offset
            .as_deref()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0)
            .min(MAX_OFFSET);

        FileQuery {
            date_start,
            date_end,
            phone: non_empty(params.phone.as_deref()),
            email: non_empty(params.email.as_deref()),
            duration,
            time,
            sort_column: params
                .sort_column
                .as_deref()
                .and_then(SortColumn::parse)
                .unwrap_or_default(),
            sort_direction: params
                .sort_direction
                .as_deref()
                .and_then(SortDirection::parse)
                .unwrap_or_default(),
            offset,
            limit: Some(limit),
        }
    }
}

/// Accept `M_D_YYYY` (store folder form) or ISO `YYYY-MM-DD`
pub fn parse_date_param(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date_folder(value))
}

/// Accept 24-hour `HH:MM` or `HH:MM:SS`
pub fn parse_time_param(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

fn build_time_filter(
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
    mode: Option<&str>,
) -> Option<TimeFilter> {
    let mode = mode.map(|m| m.trim().to_ascii_lowercase());
    match mode.as_deref() {
        Some("older") => start.or(end).map(TimeFilter::Older),
        Some("newer") => start.or(end).map(TimeFilter::Newer),
        _ => {
            if start.is_none() && end.is_none() {
                None
            } else {
                Some(TimeFilter::Range { start, end })
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
