// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Transfer state for one destination file

use crate::error::{DownloadError, ProtocolError, Result, SinkError};
use crate::range::PieceRange;
use crate::transport::PieceRequest;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// State of one download, owned by the caller and advanced only by the engine.
///
/// `offset` always equals the number of bytes durably written to the
/// destination. The total size stays `None` until a response declares it;
/// transfers whose total is never declared end on `end_of_stream` instead.
#[derive(Debug)]
pub struct DownloadSession {
    source_url: String,
    destination: PathBuf,
    piece_size: NonZeroU64,
    offset: u64,
    total_size: Option<u64>,
    end_of_stream: bool,
    retry_count: u32,
    max_retries: u32,
    pieces_written: u32,
    state: SessionState,
}

impl DownloadSession {
    /// Fresh session; the destination is truncated when the engine starts.
    pub fn new(
        source_url: impl Into<String>,
        destination: impl Into<PathBuf>,
        piece_size: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let source_url = source_url.into();
        if source_url.trim().is_empty() {
            return Err(DownloadError::Config("source URL is empty".to_owned()));
        }
        let piece_size = NonZeroU64::new(piece_size)
            .ok_or_else(|| DownloadError::Config("piece size must be positive".to_owned()))?;

        Ok(Self {
            source_url,
            destination: destination.into(),
            piece_size,
            offset: 0,
            total_size: None,
            end_of_stream: false,
            retry_count: 0,
            max_retries,
            pieces_written: 0,
            state: SessionState::Pending,
        })
    }

    /// Session continuing after whatever the destination already holds.
    pub fn resume(
        source_url: impl Into<String>,
        destination: impl Into<PathBuf>,
        piece_size: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let mut session = Self::new(source_url, destination, piece_size, max_retries)?;
        session.offset = match std::fs::metadata(&session.destination) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(DownloadError::Sink(SinkError::Open {
                    path: session.destination.clone(),
                    source: e,
                }));
            }
        };
        Ok(session)
    }

    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    #[must_use]
    pub fn piece_size(&self) -> u64 {
        self.piece_size.get()
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Pieces accepted and written during this session.
    #[must_use]
    pub fn pieces_written(&self) -> u32 {
        self.pieces_written
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether no further piece needs to be requested.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.end_of_stream || self.total_size.is_some_and(|total| self.offset >= total)
    }

    /// Request for the piece starting at the current offset.
    #[must_use]
    pub fn next_request(&self) -> PieceRequest {
        PieceRequest {
            url: self.source_url.clone(),
            range: PieceRange::new(self.offset, self.piece_size.get()),
            body_limit: self.piece_size.get(),
        }
    }

    /// Percentage of the known total written so far.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn progress_percent(&self) -> Option<f64> {
        match self.total_size {
            Some(0) => Some(100.0),
            Some(total) => Some(self.offset as f64 / total as f64 * 100.0),
            None => None,
        }
    }

    pub(crate) fn mark_running(&mut self) {
        self.state = SessionState::Running;
    }

    pub(crate) fn mark_completed(&mut self) {
        self.state = SessionState::Completed;
    }

    pub(crate) fn mark_failed(&mut self) {
        self.state = SessionState::Failed;
    }

    /// Check a declared total against the one seen on earlier pieces.
    pub(crate) fn check_total(&self, declared: u64) -> std::result::Result<(), ProtocolError> {
        match self.total_size {
            Some(previous) if previous != declared => Err(ProtocolError::TotalChanged {
                previous,
                current: declared,
            }),
            _ => Ok(()),
        }
    }

    /// Record `written` bytes as durably appended at the current offset.
    pub(crate) fn advance(&mut self, written: u64, total: Option<u64>, end_of_stream: bool) {
        self.offset += written;
        self.pieces_written += 1;
        if total.is_some() {
            self.total_size = total;
        }
        if end_of_stream {
            self.end_of_stream = true;
        }
    }

    /// Count one retry of the current piece; `false` once the budget is spent.
    pub(crate) fn register_retry(&mut self) -> bool {
        if self.retry_count >= self.max_retries {
            return false;
        }
        self.retry_count += 1;
        true
    }
}
