// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! otalink download - resumable, range-limited HTTP transfers
//!
//! A [`DownloadSession`] is driven to completion by the [`RangeDownloadEngine`],
//! one bounded `Range` request per piece, appending every accepted piece to a
//! [`FileSink`]. The HTTP side is a seam ([`HttpTransport`]) so the engine can be
//! exercised without sockets; [`ReqwestTransport`] is the production transport.

pub mod engine;
pub mod error;
pub mod exchange;
pub mod http;
pub mod range;
pub mod session;
pub mod sink;
pub mod transport;

pub use engine::{EngineConfig, RangeDownloadEngine, TerminalResult};
pub use error::{
    DownloadError, FailureReason, NetworkError, ProtocolError, RangeParseError, SinkError,
};
pub use http::ReqwestTransport;
pub use range::{ContentRange, PieceRange, TotalSize, decode_content_range, encode_range};
pub use session::{DownloadSession, SessionState};
pub use sink::FileSink;
pub use transport::{HttpEvent, HttpResponse, HttpTransport, PieceRequest};
