//! `Range` header parsing on top of `http-range-header`.
//!
//! ```text
//! Range: bytes=0-499, 1000-, -200
//! ```
//!
//! With a known representation size the ranges are validated and resolved
//! to inclusive byte offsets; overlapping or out-of-bounds ranges are not
//! satisfiable. Without a size, open-ended and suffix ranges are returned
//! as written. Only the `bytes` unit is understood.

use http::StatusCode;
use http_range_header::{EndPosition, ParsedRanges, StartPosition, SyntacticallyCorrectRange};
use thiserror::Error;

/// One requested range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ByteRange {
    /// `first-last`, both inclusive.
    Bounded { first: u64, last: u64 },
    /// `first-`: from `first` to the end.
    From { first: u64 },
    /// `-len`: the final `len` bytes.
    Suffix { len: u64 },
}

impl From<SyntacticallyCorrectRange> for ByteRange {
    fn from(range: SyntacticallyCorrectRange) -> Self {
        match (range.start, range.end) {
            (StartPosition::Index(first), EndPosition::Index(last)) => Self::Bounded { first, last },
            (StartPosition::Index(first), EndPosition::LastByte) => Self::From { first },
            (StartPosition::FromLast(len), _) => Self::Suffix { len },
        }
    }
}

/// The ranges of a `bytes` `Range` header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ranges {
    pub ranges: Vec<ByteRange>,
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum RangeError {
    /// Well-formed, but nothing can be served.
    #[error("range not satisfiable")]
    Unsatisfiable,

    #[error("malformed range header")]
    Malformed,
}

impl RangeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unsatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::Malformed => StatusCode::BAD_REQUEST,
        }
    }
}

/// Parses a `Range` header value, resolving it against `size` when known.
pub fn parse(header: &str, size: Option<u64>) -> Result<Ranges, RangeError> {
    let parsed = http_range_header::parse_range_header(header).map_err(|_| RangeError::Malformed)?;

    let ranges = match size {
        Some(size) => resolve(&parsed, size)?,
        None => unresolved(parsed)?,
    };
    Ok(Ranges { ranges })
}

fn resolve(parsed: &ParsedRanges, size: u64) -> Result<Vec<ByteRange>, RangeError> {
    // An empty representation has no byte to point at.
    if size == 0 {
        return Err(RangeError::Unsatisfiable);
    }

    let resolved = parsed.validate(size).map_err(|_| RangeError::Unsatisfiable)?;
    Ok(resolved
        .into_iter()
        .map(|range| ByteRange::Bounded { first: *range.start(), last: *range.end() })
        .collect())
}

fn unresolved(parsed: ParsedRanges) -> Result<Vec<ByteRange>, RangeError> {
    let ranges: Vec<ByteRange> = parsed.ranges.into_iter().map(ByteRange::from).collect();
    let reversed = ranges
        .iter()
        .any(|range| matches!(range, ByteRange::Bounded { first, last } if first > last));

    if reversed { Err(RangeError::Unsatisfiable) } else { Ok(ranges) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounded(first: u64, last: u64) -> ByteRange {
        ByteRange::Bounded { first, last }
    }

    #[test]
    fn resolves_against_size() {
        let r = parse("bytes=0-99, 200-299, 900-", Some(1000)).unwrap();
        assert_eq!(r.ranges, [bounded(0, 99), bounded(200, 299), bounded(900, 999)]);

        let r = parse("bytes=-50", Some(1000)).unwrap();
        assert_eq!(r.ranges, [bounded(950, 999)]);
    }

    #[test]
    fn clamps_end_to_size() {
        let r = parse("bytes=500-5000", Some(1000)).unwrap();
        assert_eq!(r.ranges, [bounded(500, 999)]);
    }

    #[test]
    fn unresolved_without_size() {
        let r = parse("bytes=10-, -20, 1-2", None).unwrap();
        assert_eq!(
            r.ranges,
            [ByteRange::From { first: 10 }, ByteRange::Suffix { len: 20 }, bounded(1, 2)]
        );
    }

    #[test]
    fn unsatisfiable() {
        assert_eq!(parse("bytes=1000-", Some(1000)), Err(RangeError::Unsatisfiable));
        assert_eq!(parse("bytes=0-10, 5-15", Some(100)), Err(RangeError::Unsatisfiable));
        assert_eq!(parse("bytes=-500", Some(100)), Err(RangeError::Unsatisfiable));
        assert_eq!(parse("bytes=5-2", None), Err(RangeError::Unsatisfiable));
        assert_eq!(parse("bytes=0-0", Some(0)), Err(RangeError::Unsatisfiable));
        assert_eq!(RangeError::Unsatisfiable.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[test]
    fn malformed() {
        for header in ["bytes", "=0-1", "items=0-1", "bytes=abc", "bytes=-", "bytes=1-x", "bytes=0-1,,"] {
            assert_eq!(parse(header, Some(10)), Err(RangeError::Malformed), "{header}");
        }
        assert_eq!(RangeError::Malformed.status(), StatusCode::BAD_REQUEST);
    }
}
