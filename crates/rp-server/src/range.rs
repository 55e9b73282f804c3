//! `Range` header parsing and window resolution.
//!
//! Parsing is independent of the blob length: [`RangeRequest::parse`] only
//! classifies the header. [`RangeRequest::resolve`] then checks the request
//! against the actual length and produces the [`ByteWindow`] to serve.

/// A classified `Range` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No header: serve the whole blob.
    Full,
    /// `bytes=<start>-[<end>]`.
    Single { start: u64, end: Option<u64> },
    /// A comma-separated list of ranges.
    Multi,
    /// Anything else, including suffix ranges (`bytes=-N`).
    Malformed,
}

/// Why a range could not be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// Malformed or outside `[0, total)`.
    Unsatisfiable { total: u64 },
    /// More than one range was requested.
    MultiRange,
}

impl From<RangeError> for rp_core::Error {
    fn from(e: RangeError) -> Self {
        match e {
            RangeError::Unsatisfiable { total } => rp_core::Error::RangeNotSatisfiable { total },
            RangeError::MultiRange => {
                rp_core::Error::NotImplemented("multi-range requests are not served".into())
            }
        }
    }
}

/// An inclusive byte window `[start, end]` of a blob of `total` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    pub start: u64,
    pub end: u64,
    pub total: u64,
    /// Whether the window came from a `Range` header (206) or not (200).
    pub partial: bool,
}

impl ByteWindow {
    /// Window covering the whole blob.
    pub fn full(total: u64) -> Self {
        Self {
            start: 0,
            end: total.saturating_sub(1),
            total,
            partial: false,
        }
    }

    /// Number of bytes in the window.
    pub fn len(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Content-Range` value for a 206 response.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// `Content-Range` value for a 416 response.
pub fn unsatisfied_content_range(total: u64) -> String {
    format!("bytes */{total}")
}

impl RangeRequest {
    /// Classify an optional `Range` header value.
    pub fn parse(header: Option<&str>) -> Self {
        let Some(value) = header else {
            return Self::Full;
        };

        let Some(spec) = value.trim().strip_prefix("bytes=") else {
            return Self::Malformed;
        };

        if spec.contains(',') {
            return Self::Multi;
        }

        let Some((start_str, end_str)) = spec.split_once('-') else {
            return Self::Malformed;
        };
        let (start_str, end_str) = (start_str.trim(), end_str.trim());

        let Some(start) = parse_offset(start_str) else {
            return Self::Malformed;
        };

        if end_str.is_empty() {
            return Self::Single { start, end: None };
        }

        match parse_offset(end_str) {
            Some(end) => Self::Single {
                start,
                end: Some(end),
            },
            None => Self::Malformed,
        }
    }

    /// Resolve against a blob of `total` bytes.
    pub fn resolve(self, total: u64) -> Result<ByteWindow, RangeError> {
        match self {
            Self::Full => Ok(ByteWindow::full(total)),
            Self::Multi => Err(RangeError::MultiRange),
            Self::Malformed => Err(RangeError::Unsatisfiable { total }),
            Self::Single { start, end } => {
                if start >= total {
                    return Err(RangeError::Unsatisfiable { total });
                }
                let end = end.unwrap_or(total - 1);
                if end < start || end > total - 1 {
                    return Err(RangeError::Unsatisfiable { total });
                }
                Ok(ByteWindow {
                    start,
                    end,
                    total,
                    partial: true,
                })
            }
        }
    }
}

/// Digits only; rejects signs, whitespace inside the number, and overflow.
fn parse_offset(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
