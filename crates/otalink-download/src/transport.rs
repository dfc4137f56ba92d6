// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! HTTP transport seam
//!
//! A transport runs one outbound exchange at a time and reports its progress
//! as [`HttpEvent`]s. The engine never touches sockets directly.

use crate::error::NetworkError;
use crate::range::PieceRange;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// One ranged GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceRequest {
    pub url: String,
    pub range: PieceRange,
    /// Largest body the engine will accept; transports may stop reading one
    /// byte past it.
    pub body_limit: u64,
}

impl PieceRequest {
    #[must_use]
    pub fn range_header(&self) -> String {
        self.range.header_value()
    }
}

/// Status, headers and buffered body of one response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Builder-style header insertion; invalid names or values are skipped.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Header value as text, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Progress of the exchange currently owned by a transport.
#[derive(Debug, Clone)]
pub enum HttpEvent {
    /// The exchange exists; its deadline starts now.
    Opened,
    /// The server accepted the connection and answered.
    Connected,
    /// A complete response is available.
    MessageReceived(HttpResponse),
    Errored(NetworkError),
    /// The connection is gone; always the last event of an exchange.
    Closed,
    /// Nothing happened during one poll interval.
    PollTick,
}

#[async_trait]
pub trait HttpTransport: Send {
    /// Start an exchange for `request`, abandoning any previous one.
    fn open(&mut self, request: &PieceRequest);

    /// Wait for the next event of the current exchange. Returns
    /// [`HttpEvent::Closed`] when no exchange is active.
    async fn next_event(&mut self) -> HttpEvent;

    /// Force the current connection closed.
    fn close(&mut self);
}
