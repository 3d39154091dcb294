//! Single-range `Range: bytes=...` handling.

use std::ops::Range;

/// A requested byte range before it is resolved against a length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=a-b` (inclusive end)
    FromTo(u64, u64),
    /// `bytes=a-`
    From(u64),
    /// `bytes=-n`, the last n bytes
    Suffix(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeResolution {
    /// Serve this half-open range with 206
    Partial(Range<u64>),
    /// Start is past the end, respond 416
    Unsatisfiable,
}

impl ByteRange {
    /// Parse a header value. Returns `None` for anything malformed,
    /// including multi-range requests, so callers fall back to the full body.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.trim().strip_prefix("bytes=")?.trim();
        if spec.contains(',') {
            return None;
        }
        let (start, end) = spec.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            (true, true) => None,
            (true, false) => end.parse().ok().map(ByteRange::Suffix),
            (false, true) => start.parse().ok().map(ByteRange::From),
            (false, false) => {
                let start: u64 = start.parse().ok()?;
                let end: u64 = end.parse().ok()?;
                if end < start {
                    return None;
                }
                Some(ByteRange::FromTo(start, end))
            }
        }
    }

    /// Resolve against an object of `length` bytes, clamping the end
    pub fn resolve(self, length: u64) -> RangeResolution {
        let range = match self {
            ByteRange::FromTo(start, end) => start..end.saturating_add(1).min(length),
            ByteRange::From(start) => start..length,
            ByteRange::Suffix(n) => length.saturating_sub(n)..length,
        };
        if range.start >= length || range.start >= range.end {
            RangeResolution::Unsatisfiable
        } else {
            RangeResolution::Partial(range)
        }
    }
}

/// `bytes {start}-{end_inclusive}/{length}`
pub fn content_range(range: &Range<u64>, length: u64) -> String {
    format!("bytes {}-{}/{}", range.start, range.end.saturating_sub(1), length)
}

/// `bytes */{length}` for 416 responses
pub fn unsatisfied_range(length: u64) -> String {
    format!("bytes */{}", length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(ByteRange::parse("bytes=100-199"), Some(ByteRange::FromTo(100, 199)));
        assert_eq!(ByteRange::parse("bytes=100-"), Some(ByteRange::From(100)));
        assert_eq!(ByteRange::parse("bytes=-500"), Some(ByteRange::Suffix(500)));
    }

    #[test]
    fn test_malformed_is_ignored() {
        for header in [
            "",
            "bytes=",
            "bytes=-",
            "bytes=abc-",
            "items=0-10",
            "bytes=10-5",
            "bytes=0-1,5-9",
        ] {
            assert_eq!(ByteRange::parse(header), None, "{header}");
        }
    }

    #[test]
    fn test_resolve() {
        let len = 1000;
        assert_eq!(
            ByteRange::FromTo(100, 199).resolve(len),
            RangeResolution::Partial(100..200)
        );
        assert_eq!(
            ByteRange::FromTo(900, 5000).resolve(len),
            RangeResolution::Partial(900..1000)
        );
        assert_eq!(ByteRange::From(10).resolve(len), RangeResolution::Partial(10..1000));
        assert_eq!(ByteRange::Suffix(100).resolve(len), RangeResolution::Partial(900..1000));
        assert_eq!(ByteRange::Suffix(5000).resolve(len), RangeResolution::Partial(0..1000));
        assert_eq!(ByteRange::From(1000).resolve(len), RangeResolution::Unsatisfiable);
        assert_eq!(ByteRange::Suffix(0).resolve(len), RangeResolution::Unsatisfiable);
    }

    #[test]
    fn test_content_range_header() {
        assert_eq!(content_range(&(100..200), 1000), "bytes 100-199/1000");
        assert_eq!(unsatisfied_range(1000), "bytes */1000");
    }
}
