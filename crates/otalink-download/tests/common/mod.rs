// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! In-process range server used by the engine tests

use async_trait::async_trait;
use otalink_download::{HttpEvent, HttpResponse, HttpTransport, NetworkError, PieceRequest};
use std::collections::VecDeque;
use std::time::Duration;

/// How the server treats `Range` headers.
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// Honour ranges; `declare_total` picks `bytes S-E/T` over `bytes S-E/*`.
    Ranged { declare_total: bool },
    /// Answer every request with `200` and the whole resource.
    IgnoreRange { content_length: bool },
}

/// Fault injected into one exchange, consumed in order.
#[derive(Debug, Clone)]
pub enum Fault {
    Errored(NetworkError),
    /// Headers arrive, then the connection drops mid-body.
    DropAfterConnect,
    /// Nothing ever arrives.
    Hang,
    /// Answer with this response instead of the real one.
    Respond(HttpResponse),
}

#[derive(Debug)]
pub struct SyntheticServer {
    resource: Vec<u8>,
    mode: Mode,
    faults: VecDeque<Option<Fault>>,
    pending: VecDeque<HttpEvent>,
    hanging: bool,
    requests: Vec<PieceRequest>,
}

impl SyntheticServer {
    pub fn new(resource: Vec<u8>, mode: Mode) -> Self {
        Self {
            resource,
            mode,
            faults: VecDeque::new(),
            pending: VecDeque::new(),
            hanging: false,
            requests: Vec::new(),
        }
    }

    /// Faults for the next exchanges; `None` means a clean exchange.
    pub fn with_faults(mut self, faults: impl IntoIterator<Item = Option<Fault>>) -> Self {
        self.faults.extend(faults);
        self
    }

    pub fn requests(&self) -> &[PieceRequest] {
        &self.requests
    }

    fn respond(&self, request: &PieceRequest) -> HttpResponse {
        let len = self.resource.len() as u64;
        match self.mode {
            Mode::IgnoreRange { content_length } => {
                let response = HttpResponse::new(200, self.resource.clone());
                if content_length {
                    response.with_header("content-length", &len.to_string())
                } else {
                    response
                }
            }
            Mode::Ranged { declare_total } => {
                let start = request.range.start;
                if start >= len {
                    return HttpResponse::new(416, Vec::new())
                        .with_header("content-range", &format!("bytes */{len}"));
                }
                let end = request.range.end.min(len - 1);
                let body = self.resource[start as usize..=end as usize].to_vec();
                let total = if declare_total {
                    len.to_string()
                } else {
                    "*".to_owned()
                };
                HttpResponse::new(206, body)
                    .with_header("content-range", &format!("bytes {start}-{end}/{total}"))
            }
        }
    }
}

#[async_trait]
impl HttpTransport for SyntheticServer {
    fn open(&mut self, request: &PieceRequest) {
        self.requests.push(request.clone());
        self.pending.clear();
        self.hanging = false;
        self.pending.push_back(HttpEvent::Opened);

        match self.faults.pop_front().flatten() {
            None => {
                let response = self.respond(request);
                self.pending.push_back(HttpEvent::Connected);
                self.pending.push_back(HttpEvent::MessageReceived(response));
                self.pending.push_back(HttpEvent::Closed);
            }
            Some(Fault::Respond(response)) => {
                self.pending.push_back(HttpEvent::Connected);
                self.pending.push_back(HttpEvent::MessageReceived(response));
                self.pending.push_back(HttpEvent::Closed);
            }
            Some(Fault::Errored(error)) => {
                self.pending.push_back(HttpEvent::Errored(error));
                self.pending.push_back(HttpEvent::Closed);
            }
            Some(Fault::DropAfterConnect) => {
                self.pending.push_back(HttpEvent::Connected);
                self.pending.push_back(HttpEvent::Errored(NetworkError::Transfer(
                    "connection reset by peer".to_owned(),
                )));
                self.pending.push_back(HttpEvent::Closed);
            }
            Some(Fault::Hang) => self.hanging = true,
        }
    }

    async fn next_event(&mut self) -> HttpEvent {
        if let Some(event) = self.pending.pop_front() {
            return event;
        }
        if self.hanging {
            tokio::time::sleep(Duration::from_secs(1)).await;
            return HttpEvent::PollTick;
        }
        HttpEvent::Closed
    }

    fn close(&mut self) {
        self.hanging = false;
        self.pending.clear();
        self.pending.push_back(HttpEvent::Closed);
    }
}

/// Deterministic, non-repeating-looking test payload.
pub fn resource(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
