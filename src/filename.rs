//! Metadata extraction from recording object keys.
//!
//! Keys follow `{M_D_YYYY}/{phone} by {email} @ {h_mm_ss AM|PM}_{durationMs}.wav`.
//! Only the date folder is mandatory; every part of the filename is optional
//! and falls back to an empty value so partially named files stay indexable.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+) by ").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"by (\S+@[^\s_]+)").unwrap());
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@ (\d{1,2})_(\d{1,2})_(\d{1,2}) ?([AaPp][Mm])").unwrap());
static DURATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)_(\d+)\.wav$").unwrap());

/// Fields derived from a single recording key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecording {
    /// `{dateFolder}/{filename}` relative to the recordings root
    pub file_path: String,
    pub phone: String,
    pub email: String,
    /// ISO `YYYY-MM-DD`
    pub call_date: String,
    /// 24-hour `HH:MM:SS`, empty if the filename carries no usable time
    pub call_time: String,
    pub duration_ms: i64,
}

/// Parse an object key into recording metadata.
///
/// Returns `None` when the key has no `{dateFolder}/{filename}` shape or the
/// date folder is not a valid `M_D_YYYY` date.
pub fn parse_recording_key(key: &str, root_prefix: &str) -> Option<ParsedRecording> {
    let relative = strip_root(key, root_prefix);

    let (folder, filename) = relative.split_once('/')?;
    if folder.is_empty() || filename.is_empty() || filename.contains('/') {
        return None;
    }

    let call_date = parse_date_folder(folder)?;

    Some(ParsedRecording {
        file_path: format!("{}/{}", folder, filename),
        phone: extract_phone(filename),
        email: extract_email(filename),
        call_date: call_date.format("%Y-%m-%d").to_string(),
        call_time: extract_time(filename),
        duration_ms: extract_duration_ms(filename),
    })
}

/// Remove a leading `/` and the root prefix (if present) from a key
pub fn strip_root<'a>(key: &'a str, root_prefix: &str) -> &'a str {
    let key = key.trim_start_matches('/');
    let root = root_prefix.trim_matches('/');
    if root.is_empty() {
        return key;
    }
    match key.strip_prefix(root) {
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => key,
    }
}

/// Parse a `M_D_YYYY` folder name into a calendar date
pub fn parse_date_folder(folder: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = folder.split('_').collect();
    if parts.len() != 3 {
        return None;
    }
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }
    let month: u32 = parts[0].parse().ok()?;
    let day: u32 = parts[1].parse().ok()?;
    let year: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Format a date as the store's folder name (`M_D_YYYY`, no zero padding)
pub fn date_folder(date: NaiveDate) -> String {
    date.format("%-m_%-d_%Y").to_string()
}

fn extract_phone(filename: &str) -> String {
    PHONE_RE
        .captures(filename)
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}

fn extract_email(filename: &str) -> String {
    EMAIL_RE
        .captures(filename)
        .map(|c| {
            let email = &c[1];
            let cut = email.len().saturating_sub(4);
            match email.get(cut..) {
                Some(ext) if ext.eq_ignore_ascii_case(".wav") => email[..cut].to_string(),
                _ => email.to_string(),
            }
        })
        .unwrap_or_default()
}

fn extract_time(filename: &str) -> String {
    TIME_RE
        .captures(filename)
        .and_then(|c| to_24_hour(&c[1], &c[2], &c[3], &c[4]))
        .unwrap_or_default()
}

fn extract_duration_ms(filename: &str) -> i64 {
    DURATION_RE
        .captures(filename)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

/// Convert `h`, `mm`, `ss`, `AM|PM` into `HH:MM:SS`
fn to_24_hour(hour: &str, minute: &str, second: &str, meridiem: &str) -> Option<String> {
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    let second: u32 = second.parse().ok()?;
    if !(1..=12).contains(&hour) || minute >= 60 || second >= 60 {
        return None;
    }
    let pm = meridiem.eq_ignore_ascii_case("pm");
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    Some(format!("{:02}:{:02}:{:02}", hour, minute, second))
}
