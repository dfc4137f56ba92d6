// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Error types for the download crate
//!
//! The taxonomy decides what the engine does next: [`NetworkError`] is retried,
//! [`ProtocolError`] and [`SinkError`] end the session immediately.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Rejected `Content-Range` header value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("content-range does not use the bytes unit: {0:?}")]
    MissingUnit(String),

    #[error("malformed content-range: {0:?}")]
    Malformed(String),

    #[error("inverted content-range {start}-{end}")]
    Inverted { start: u64, end: u64 },

    #[error("content-range end {end} lies outside total size {total}")]
    OutOfBounds { end: u64, total: u64 },
}

/// Transient failure of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("exchange deadline exceeded")]
    Timeout,

    #[error("connection closed before a response arrived")]
    ClosedEarly,
}

/// The server answered, but not in a way this client can accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("206 response without a Content-Range header")]
    MissingContentRange,

    #[error("invalid Content-Range: {0}")]
    ContentRange(#[from] RangeParseError),

    #[error("body of {actual} bytes exceeds piece size {limit}")]
    OversizedBody { actual: u64, limit: u64 },

    #[error("server answered a range starting at {actual}, requested {expected}")]
    OffsetMismatch { expected: u64, actual: u64 },

    #[error("response declares {declared} bytes but the body holds {actual}")]
    LengthMismatch { declared: u64, actual: u64 },

    #[error("resource size changed from {previous} to {current} bytes")]
    TotalChanged { previous: u64, current: u64 },

    #[error("server ignored the range request at offset {0}")]
    RangeIgnored(u64),

    #[error("invalid Content-Length header: {0:?}")]
    InvalidContentLength(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("short write: expected {expected} bytes, wrote {written}")]
    ShortWrite { expected: usize, written: usize },

    #[error("fsync failed: {0}")]
    Sync(#[source] io::Error),

    #[error("destination holds {actual} bytes but the session expects {expected}")]
    LengthMismatch { expected: u64, actual: u64 },
}

/// Why a session ended without completing.
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("gave up after {retries} retries: {last_error}")]
    RetriesExhausted {
        retries: u32,
        last_error: NetworkError,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("file sink error: {0}")]
    Io(#[from] SinkError),

    #[error("download cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid download settings: {0}")]
    Config(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub type Result<T> = std::result::Result<T, DownloadError>;
