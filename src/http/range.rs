//! HTTP Range request parsing (RFC 9110 byte ranges, single range only)

/// Inclusive byte range resolved against a known representation length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub const fn len(self) -> usize {
        self.end - self.start + 1
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    /// Serve the given slice with 206
    Satisfiable(ByteRange),
    /// Respond 416
    NotSatisfiable,
    /// Header absent, multi-range, other unit or malformed: serve the full content
    Ignored,
}

/// Parse a `Range` header value
///
/// Supported forms: `bytes=start-end`, `bytes=start-`, `bytes=-suffix`.
///
/// # Examples
/// ```
/// use edge_dispatch::http::range::{parse_range_header, ByteRange, RangeParseResult};
///
/// let result = parse_range_header(Some("bytes=0-99"), 1000);
/// assert_eq!(result, RangeParseResult::Satisfiable(ByteRange { start: 0, end: 99 }));
///
/// assert_eq!(parse_range_header(None, 1000), RangeParseResult::Ignored);
/// ```
pub fn parse_range_header(range_header: Option<&str>, total: usize) -> RangeParseResult {
    let Some(spec) = range_header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeParseResult::Ignored;
    };

    if spec.contains(',') {
        return RangeParseResult::Ignored;
    }

    let Some((first, last)) = spec.split_once('-') else {
        return RangeParseResult::Ignored;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        resolve_suffix(last, total)
    } else {
        resolve_bounded(first, last, total)
    }
}

fn resolve_suffix(suffix: &str, total: usize) -> RangeParseResult {
    let Ok(suffix) = suffix.parse::<usize>() else {
        return RangeParseResult::Ignored;
    };

    if suffix == 0 || total == 0 {
        return RangeParseResult::NotSatisfiable;
    }

    RangeParseResult::Satisfiable(ByteRange {
        start: total.saturating_sub(suffix),
        end: total - 1,
    })
}

fn resolve_bounded(first: &str, last: &str, total: usize) -> RangeParseResult {
    let Ok(start) = first.parse::<usize>() else {
        return RangeParseResult::Ignored;
    };

    if start >= total {
        return RangeParseResult::NotSatisfiable;
    }

    let end = if last.is_empty() {
        total - 1
    } else {
        match last.parse::<usize>() {
            Ok(end) => end.min(total - 1),
            Err(_) => return RangeParseResult::Ignored,
        }
    };

    if start > end {
        return RangeParseResult::NotSatisfiable;
    }

    RangeParseResult::Satisfiable(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_range() {
        let result = parse_range_header(Some("bytes=0-9"), 100);
        assert_eq!(result, RangeParseResult::Satisfiable(ByteRange { start: 0, end: 9 }));
        if let RangeParseResult::Satisfiable(r) = result {
            assert_eq!(r.len(), 10);
        }
    }

    #[test]
    fn test_open_range_runs_to_end() {
        assert_eq!(
            parse_range_header(Some("bytes=50-"), 100),
            RangeParseResult::Satisfiable(ByteRange { start: 50, end: 99 })
        );
    }

    #[test]
    fn test_end_is_clamped() {
        assert_eq!(
            parse_range_header(Some("bytes=90-500"), 100),
            RangeParseResult::Satisfiable(ByteRange { start: 90, end: 99 })
        );
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(
            parse_range_header(Some("bytes=-20"), 100),
            RangeParseResult::Satisfiable(ByteRange { start: 80, end: 99 })
        );
        assert_eq!(
            parse_range_header(Some("bytes=-500"), 100),
            RangeParseResult::Satisfiable(ByteRange { start: 0, end: 99 })
        );
    }

    #[test]
    fn test_not_satisfiable() {
        assert_eq!(
            parse_range_header(Some("bytes=200-"), 100),
            RangeParseResult::NotSatisfiable
        );
        assert_eq!(
            parse_range_header(Some("bytes=20-10"), 100),
            RangeParseResult::NotSatisfiable
        );
        assert_eq!(
            parse_range_header(Some("bytes=-5"), 0),
            RangeParseResult::NotSatisfiable
        );
    }

    #[test]
    fn test_ignored_forms() {
        assert_eq!(parse_range_header(Some("bytes=a-b"), 100), RangeParseResult::Ignored);
        assert_eq!(
            parse_range_header(Some("bytes=0-9,20-29"), 100),
            RangeParseResult::Ignored
        );
        assert_eq!(parse_range_header(Some("items=0-9"), 100), RangeParseResult::Ignored);
    }
}
