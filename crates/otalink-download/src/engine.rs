// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Range download engine
//!
//! Drives a [`DownloadSession`] to a [`TerminalResult`] one piece at a time:
//! request `[offset, offset + piece_size)`, validate the response, append the
//! body, advance the offset. Network failures retry the same piece; protocol
//! and file errors end the session.

use crate::error::{FailureReason, ProtocolError, SinkError};
use crate::exchange::{Exchange, ExchangeOutcome, Step};
use crate::range::{ContentRange, TotalSize, decode_content_range, decode_unsatisfied_range};
use crate::session::DownloadSession;
use crate::sink::FileSink;
use crate::transport::{HttpResponse, HttpTransport, PieceRequest};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const STATUS_OK: u16 = 200;
const STATUS_PARTIAL_CONTENT: u16 = 206;
const STATUS_RANGE_NOT_SATISFIABLE: u16 = 416;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Allowance for establishing the connection.
    pub connect_timeout: Duration,
    /// Allowance for receiving one piece once connected.
    pub transfer_timeout: Duration,
    /// Pause before re-requesting a piece after a network error.
    pub retry_delay: Duration,
    /// How often an idle transport reports [`crate::HttpEvent::PollTick`].
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            transfer_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Deadline budget of a single exchange.
    #[must_use]
    pub fn exchange_budget(&self) -> Duration {
        self.connect_timeout + self.transfer_timeout
    }
}

#[derive(Debug)]
pub enum TerminalResult {
    /// The destination holds the whole resource.
    Completed { bytes_written: u64 },
    Failed(FailureReason),
}

impl TerminalResult {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// A validated piece, ready to be appended.
#[derive(Debug)]
struct AcceptedPiece {
    body: Vec<u8>,
    total: Option<u64>,
    end_of_stream: bool,
    content_range: Option<ContentRange>,
}

#[derive(Debug, Clone)]
pub struct RangeDownloadEngine {
    config: EngineConfig,
    cancel: CancellationToken,
}

impl RangeDownloadEngine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Engine that stops with [`FailureReason::Cancelled`] once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(config: EngineConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `session` to completion over `transport`.
    pub async fn run<T>(&self, session: &mut DownloadSession, transport: &mut T) -> TerminalResult
    where
        T: HttpTransport + ?Sized,
    {
        info!(
            "Downloading {} -> {} from offset {}",
            session.source_url(),
            session.destination().display(),
            session.offset()
        );
        session.mark_running();

        match self.drive(session, transport).await {
            Ok(()) => {
                session.mark_completed();
                info!(
                    "Download completed: {} bytes in {}",
                    session.offset(),
                    session.destination().display()
                );
                TerminalResult::Completed {
                    bytes_written: session.offset(),
                }
            }
            Err(reason) => {
                session.mark_failed();
                error!("Download failed at offset {}: {reason}", session.offset());
                TerminalResult::Failed(reason)
            }
        }
    }

    async fn drive<T>(
        &self,
        session: &mut DownloadSession,
        transport: &mut T,
    ) -> Result<(), FailureReason>
    where
        T: HttpTransport + ?Sized,
    {
        let mut sink = open_sink(session)?;

        while !session.is_finished() {
            if self.cancel.is_cancelled() {
                return Err(FailureReason::Cancelled);
            }

            let request = session.next_request();
            debug!("Requesting range {}", request.range_header());

            match self.exchange(transport, &request).await? {
                ExchangeOutcome::Response(response) => {
                    let piece = accept_response(session, &request, response)?;
                    let written = sink.write(&piece.body)?;
                    session.advance(written as u64, piece.total, piece.end_of_stream);
                    log_progress(session, piece.content_range.as_ref());
                }
                ExchangeOutcome::Failed(error) => {
                    if !session.register_retry() {
                        return Err(FailureReason::RetriesExhausted {
                            retries: session.retry_count(),
                            last_error: error,
                        });
                    }
                    warn!(
                        "Piece {} failed: {error}; retrying ({}/{})",
                        request.range_header(),
                        session.retry_count(),
                        session.max_retries()
                    );
                    self.pause_before_retry().await?;
                }
            }
        }

        Ok(())
    }

    /// Run one exchange until the transport reports the connection closed.
    async fn exchange<T>(
        &self,
        transport: &mut T,
        request: &PieceRequest,
    ) -> Result<ExchangeOutcome, FailureReason>
    where
        T: HttpTransport + ?Sized,
    {
        let mut exchange = Exchange::start(self.config.exchange_budget(), Instant::now());
        transport.open(request);

        loop {
            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                event = transport.next_event() => Some(event),
            };
            let Some(event) = event else {
                transport.close();
                return Err(FailureReason::Cancelled);
            };

            match exchange.on_event(event, Instant::now()) {
                Step::Continue => {}
                Step::Close => transport.close(),
                Step::Finished(outcome) => return Ok(outcome),
            }
        }
    }

    async fn pause_before_retry(&self) -> Result<(), FailureReason> {
        if self.config.retry_delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            () = self.cancel.cancelled() => Err(FailureReason::Cancelled),
            () = tokio::time::sleep(self.config.retry_delay) => Ok(()),
        }
    }
}

/// A fresh session truncates the destination; a resumed one must find
/// exactly `offset` bytes already there.
fn open_sink(session: &DownloadSession) -> Result<FileSink, SinkError> {
    let sink = if session.offset() == 0 {
        FileSink::create(session.destination())?
    } else {
        FileSink::open(session.destination())?
    };

    if sink.size() != session.offset() {
        return Err(SinkError::LengthMismatch {
            expected: session.offset(),
            actual: sink.size(),
        });
    }
    Ok(sink)
}

fn accept_response(
    session: &DownloadSession,
    request: &PieceRequest,
    response: HttpResponse,
) -> Result<AcceptedPiece, ProtocolError> {
    match response.status {
        STATUS_PARTIAL_CONTENT => accept_partial(session, request, response),
        STATUS_OK => accept_full(request, response),
        STATUS_RANGE_NOT_SATISFIABLE => accept_unsatisfied(session, request, &response),
        status => Err(ProtocolError::UnexpectedStatus(status)),
    }
}

/// A 416 means the requested offset is at or past the end of the resource.
/// That ends the transfer when the previous full-sized piece stopped exactly
/// at end of file, or when `bytes */T` puts the end right at the offset.
fn accept_unsatisfied(
    session: &DownloadSession,
    request: &PieceRequest,
    response: &HttpResponse,
) -> Result<AcceptedPiece, ProtocolError> {
    let declared = response
        .header(CONTENT_RANGE)
        .and_then(|value| decode_unsatisfied_range(value).ok());

    let total = match declared {
        Some(total) => {
            session.check_total(total)?;
            if total != request.range.start {
                return Err(ProtocolError::UnexpectedStatus(STATUS_RANGE_NOT_SATISFIABLE));
            }
            Some(total)
        }
        None if session.total_size().is_none() && session.pieces_written() > 0 => None,
        None => return Err(ProtocolError::UnexpectedStatus(STATUS_RANGE_NOT_SATISFIABLE)),
    };

    debug!("Range past end of resource, transfer finished");
    Ok(AcceptedPiece {
        body: Vec::new(),
        total,
        end_of_stream: true,
        content_range: None,
    })
}

fn check_body_size(request: &PieceRequest, body: &[u8]) -> Result<(), ProtocolError> {
    let actual = body.len() as u64;
    if actual > request.body_limit {
        return Err(ProtocolError::OversizedBody {
            actual,
            limit: request.body_limit,
        });
    }
    Ok(())
}

fn accept_partial(
    session: &DownloadSession,
    request: &PieceRequest,
    response: HttpResponse,
) -> Result<AcceptedPiece, ProtocolError> {
    check_body_size(request, &response.body)?;

    let header = response
        .header(CONTENT_RANGE)
        .ok_or(ProtocolError::MissingContentRange)?;
    let range = decode_content_range(header)?;

    if range.start != request.range.start {
        return Err(ProtocolError::OffsetMismatch {
            expected: request.range.start,
            actual: range.start,
        });
    }
    let body_len = response.body.len() as u64;
    if range.len() != body_len {
        return Err(ProtocolError::LengthMismatch {
            declared: range.len(),
            actual: body_len,
        });
    }

    let (total, end_of_stream) = match range.total {
        TotalSize::Known(total) => {
            session.check_total(total)?;
            (Some(total), false)
        }
        TotalSize::Unknown => (None, body_len < session.piece_size()),
    };

    Ok(AcceptedPiece {
        body: response.body,
        total,
        end_of_stream,
        content_range: Some(range),
    })
}

fn accept_full(request: &PieceRequest, response: HttpResponse) -> Result<AcceptedPiece, ProtocolError> {
    // The full entity starts at byte 0; appending it after a resumed offset
    // would duplicate what is already on disk.
    if request.range.start > 0 {
        return Err(ProtocolError::RangeIgnored(request.range.start));
    }
    check_body_size(request, &response.body)?;

    let body_len = response.body.len() as u64;
    let total = match response.header(CONTENT_LENGTH) {
        Some(value) => {
            let declared = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ProtocolError::InvalidContentLength(value.to_owned()))?;
            if declared != body_len {
                return Err(ProtocolError::LengthMismatch {
                    declared,
                    actual: body_len,
                });
            }
            Some(declared)
        }
        None => None,
    };

    Ok(AcceptedPiece {
        body: response.body,
        total,
        end_of_stream: true,
        content_range: None,
    })
}

fn log_progress(session: &DownloadSession, range: Option<&ContentRange>) {
    if let Some(range) = range {
        debug!("Received {range}");
    }
    if let Some(percent) = session.progress_percent() {
        info!(
            "Progress: {}/{} bytes ({percent:.1}%)",
            session.offset(),
            session.total_size().unwrap_or_default()
        );
    } else {
        info!("Progress: {} bytes", session.offset());
    }
}
