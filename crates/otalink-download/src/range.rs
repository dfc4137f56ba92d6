// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! `Range` / `Content-Range` header codec
//!
//! Only the two forms servers actually send for single-part responses are
//! accepted: `bytes S-E/T` and `bytes S-E/*`. Anything else fails closed.

use crate::error::RangeParseError;
use std::fmt;

/// Inclusive byte range requested for one piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceRange {
    pub start: u64,
    pub end: u64,
}

impl PieceRange {
    /// Range of at most `piece_size` bytes beginning at `offset`.
    #[must_use]
    pub fn new(offset: u64, piece_size: u64) -> Self {
        Self {
            start: offset,
            end: offset.saturating_add(piece_size.max(1) - 1),
        }
    }

    /// Value for the `Range` request header.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Encode the `Range` header for a piece of `piece_size` bytes at `offset`.
#[must_use]
pub fn encode_range(offset: u64, piece_size: u64) -> String {
    PieceRange::new(offset, piece_size).header_value()
}

/// Resource size as declared by a `Content-Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalSize {
    Known(u64),
    /// The server sent `*`: the size is not known yet.
    Unknown,
}

impl fmt::Display for TotalSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(total) => write!(f, "{total}"),
            Self::Unknown => f.write_str("*"),
        }
    }
}

/// Decoded `Content-Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: TotalSize,
}

impl ContentRange {
    /// Number of bytes the range covers.
    pub(crate) fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Decode a `Content-Range` header value.
pub fn decode_content_range(value: &str) -> Result<ContentRange, RangeParseError> {
    let value = value.trim();
    let malformed = || RangeParseError::Malformed(value.to_owned());

    let spec = value
        .strip_prefix("bytes ")
        .ok_or_else(|| RangeParseError::MissingUnit(value.to_owned()))?;
    let (range, total) = spec.split_once('/').ok_or_else(malformed)?;
    let (start, end) = range.split_once('-').ok_or_else(malformed)?;

    let start = parse_position(start).ok_or_else(malformed)?;
    let end = parse_position(end).ok_or_else(malformed)?;
    let total = if total == "*" {
        TotalSize::Unknown
    } else {
        TotalSize::Known(parse_position(total).ok_or_else(malformed)?)
    };

    if start > end {
        return Err(RangeParseError::Inverted { start, end });
    }
    if let TotalSize::Known(total) = total
        && end >= total
    {
        return Err(RangeParseError::OutOfBounds { end, total });
    }

    Ok(ContentRange { start, end, total })
}

/// Decode the `bytes */T` form sent with `416 Range Not Satisfiable`,
/// returning the resource size `T`.
pub fn decode_unsatisfied_range(value: &str) -> Result<u64, RangeParseError> {
    let value = value.trim();
    let spec = value
        .strip_prefix("bytes ")
        .ok_or_else(|| RangeParseError::MissingUnit(value.to_owned()))?;
    spec.strip_prefix("*/")
        .and_then(parse_position)
        .ok_or_else(|| RangeParseError::Malformed(value.to_owned()))
}

/// Plain decimal digits only: no sign, no whitespace, no separators.
fn parse_position(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
