//! Range header handling
//!
//! Clients may carry byte ranges in a header other than `Range` and with a
//! prefix other than `bytes`, since some CDNs strip or rewrite the standard
//! header. Requests are remapped to the standard form before parsing.
//!
//! Windows are always expressed in plaintext file coordinates.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Range header error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Range header missing")]
    Missing,

    #[error("Malformed range header: {0}")]
    Malformed(String),

    #[error("Range not satisfiable for length {0}")]
    Unsatisfiable(u64),
}

/// Configured name and prefix token of the range header
#[derive(Debug, Clone)]
pub struct RangeHeaderOptions {
    pub name: HeaderName,
    pub prefix: String,
}

impl RangeHeaderOptions {
    pub fn new(name: HeaderName, prefix: impl Into<String>) -> Self {
        Self {
            name,
            prefix: prefix.into(),
        }
    }

    fn is_standard(&self) -> bool {
        self.name == header::RANGE && self.prefix == "bytes"
    }

    /// Raw value of the configured header
    pub fn value<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get(&self.name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    /// Copy the configured header into `Range`, swapping the first
    /// occurrence of the prefix token for `bytes`.
    pub fn remap(&self, headers: &mut HeaderMap) {
        if self.is_standard() {
            return;
        }
        let Some(value) = self.value(headers) else {
            return;
        };
        let rewritten = value.replacen(&self.prefix, "bytes", 1);
        if let Ok(value) = HeaderValue::from_str(&rewritten) {
            headers.insert(header::RANGE, value);
        }
    }
}

/// Middleware applying [`RangeHeaderOptions::remap`] to every request
pub async fn remap_range_header(
    State(options): State<RangeHeaderOptions>,
    mut request: Request,
    next: Next,
) -> Response {
    options.remap(request.headers_mut());
    next.run(request).await
}

impl Default for RangeHeaderOptions {
    fn default() -> Self {
        Self::new(header::RANGE, "bytes")
    }
}

/// Half-open byte window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

impl Window {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// `Content-Range` value in inclusive HTTP form
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end.saturating_sub(1), total)
    }
}

/// Upload chunk range: `<prefix>=<start>-<end>` with `start < end`.
///
/// Only `start` positions the write; `end` is validated but the written
/// span is defined by the chunk body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRange {
    pub start: u64,
    pub end: u64,
}

/// Parse the range header of an upload chunk request
pub fn parse_upload_range(value: Option<&str>, prefix: &str) -> Result<UploadRange, RangeError> {
    let value = value.ok_or(RangeError::Missing)?;

    let range_set = value
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('='))
        .map(str::trim)
        .filter(|range_set| !range_set.is_empty())
        .ok_or_else(|| RangeError::Malformed(value.to_string()))?;

    let (start, end) = range_set
        .split_once('-')
        .filter(|(s, e)| !s.is_empty() && !e.is_empty())
        .ok_or_else(|| RangeError::Malformed(value.to_string()))?;

    let start: u64 = start
        .parse()
        .map_err(|_| RangeError::Malformed(value.to_string()))?;
    let end: u64 = end
        .parse()
        .map_err(|_| RangeError::Malformed(value.to_string()))?;

    if start >= end {
        return Err(RangeError::Malformed(value.to_string()));
    }

    Ok(UploadRange { start, end })
}

/// Parse a standard `Range: bytes=...` value against a file of `total`
/// bytes. Supports `a-b`, `a-` and `-n`; multiple ranges are refused.
pub fn parse_download_range(value: &str, total: u64) -> Result<Window, RangeError> {
    let range_set = value
        .strip_prefix("bytes=")
        .map(str::trim)
        .ok_or_else(|| RangeError::Malformed(value.to_string()))?;

    if range_set.contains(',') {
        return Err(RangeError::Malformed(value.to_string()));
    }

    let (start, end) = range_set
        .split_once('-')
        .ok_or_else(|| RangeError::Malformed(value.to_string()))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u64>()
            .map_err(|_| RangeError::Malformed(value.to_string()))
    };

    let window = match (start.trim().is_empty(), end.trim().is_empty()) {
        // -n: final n bytes
        (true, false) => {
            let suffix = parse(end)?;
            if suffix == 0 || total == 0 {
                return Err(RangeError::Unsatisfiable(total));
            }
            Window {
                start: total.saturating_sub(suffix),
                end: total,
            }
        }
        // a-: from a to the end
        (false, true) => {
            let start = parse(start)?;
            if start >= total {
                return Err(RangeError::Unsatisfiable(total));
            }
            Window { start, end: total }
        }
        (false, false) => {
            let start = parse(start)?;
            let last = parse(end)?;
            if last < start {
                return Err(RangeError::Malformed(value.to_string()));
            }
            if start >= total {
                return Err(RangeError::Unsatisfiable(total));
            }
            Window {
                start,
                end: last.saturating_add(1).min(total),
            }
        }
        (true, true) => return Err(RangeError::Malformed(value.to_string())),
    };

    Ok(window)
}
