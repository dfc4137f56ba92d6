// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! reqwest-backed [`HttpTransport`]

use crate::engine::EngineConfig;
use crate::error::{DownloadError, NetworkError, Result};
use crate::transport::{HttpEvent, HttpResponse, HttpTransport, PieceRequest};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONNECTION, RANGE};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const USER_AGENT: &str = concat!("otalink/", env!("CARGO_PKG_VERSION"));

/// Runs each exchange on its own task and relays its progress as events.
///
/// Connections are never pooled: every piece gets a fresh connection that is
/// closed once its response has been read.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: Client,
    poll_interval: Duration,
    active: Option<ActiveExchange>,
}

#[derive(Debug)]
struct ActiveExchange {
    events: mpsc::UnboundedReceiver<HttpEvent>,
    task: JoinHandle<()>,
}

impl ReqwestTransport {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;

        Ok(Self {
            client,
            poll_interval: config.poll_interval,
            active: None,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    fn open(&mut self, request: &PieceRequest) {
        self.close();

        let (events, receiver) = mpsc::unbounded_channel();
        let _ = events.send(HttpEvent::Opened);
        let task = tokio::spawn(perform_exchange(
            self.client.clone(),
            request.clone(),
            events,
        ));
        self.active = Some(ActiveExchange {
            events: receiver,
            task,
        });
    }

    async fn next_event(&mut self) -> HttpEvent {
        let Some(active) = self.active.as_mut() else {
            return HttpEvent::Closed;
        };

        let received = tokio::select! {
            event = active.events.recv() => Some(event),
            () = tokio::time::sleep(self.poll_interval) => None,
        };

        match received {
            Some(Some(event)) => event,
            Some(None) => {
                self.active = None;
                HttpEvent::Closed
            }
            None => HttpEvent::PollTick,
        }
    }

    fn close(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

async fn perform_exchange(
    client: Client,
    request: PieceRequest,
    events: mpsc::UnboundedSender<HttpEvent>,
) {
    debug!("GET {} Range: {}", request.url, request.range_header());

    let response = client
        .get(&request.url)
        .header(CONNECTION, "close")
        .header(RANGE, request.range_header())
        .send()
        .await;
    let mut response = match response {
        Ok(response) => response,
        Err(e) => {
            let _ = events.send(HttpEvent::Errored(classify(&e)));
            return;
        }
    };
    let _ = events.send(HttpEvent::Connected);

    let status = response.status().as_u16();
    let headers = response.headers().clone();

    // Read one byte past the limit so an oversized body is still detectable.
    let cap = usize::try_from(request.body_limit.saturating_add(1)).unwrap_or(usize::MAX);
    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = cap - body.len();
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if body.len() >= cap {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = events.send(HttpEvent::Errored(NetworkError::Transfer(e.to_string())));
                return;
            }
        }
    }

    let _ = events.send(HttpEvent::MessageReceived(HttpResponse {
        status,
        headers,
        body,
    }));
}

fn classify(error: &reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout
    } else if error.is_connect() {
        NetworkError::Connect(error.to_string())
    } else {
        NetworkError::Transfer(error.to_string())
    }
}
