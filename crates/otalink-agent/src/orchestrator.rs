// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Update-check state machine
//!
//! ```text
//! Idle -> RequestSent -> AwaitingResponse -> NoUpdate -> Idle
//!                                         -> Downloading -> ReportingSuccess -> Idle
//!                                                        -> ReportingFailure -> Idle
//! ```
//!
//! The orchestrator never runs a download itself. It hands a
//! [`DownloadSession`] to its caller and is told the [`TerminalResult`] later,
//! so at most one session is in flight per device.

use crate::channel::ControlChannel;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::handler::UpdateHandler;
use crate::messages::{UpdateCheckRequest, UpdateCheckResponse};
use crate::topics::{Topics, client_id};
use otalink_download::{DownloadSession, TerminalResult};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    RequestSent,
    AwaitingResponse,
    NoUpdate,
    Downloading,
    ReportingSuccess,
    ReportingFailure,
}

/// Where and how accepted images are downloaded.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub destination: PathBuf,
    pub piece_size: u64,
    pub max_retries: u32,
}

/// How one update check ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    NoUpdate,
    /// The server answered with a non-200 code.
    Rejected { code: i64 },
    Updated { version: String, remote_url: String },
    UpdateFailed { remote_url: String },
}

/// What the caller must do with an inbound message.
#[derive(Debug)]
pub enum ResponseAction {
    /// Not ours, or not expected right now.
    Ignored,
    Finished(CycleOutcome),
    /// Run this session and pass its result to
    /// [`UpdateOrchestrator::on_download_finished`].
    Download(DownloadSession),
}

#[derive(Debug)]
struct PendingReport {
    topic: String,
    payload: Vec<u8>,
}

#[derive(Debug)]
pub struct UpdateOrchestrator<H> {
    request: UpdateCheckRequest,
    topics: Topics,
    plan: DownloadPlan,
    handler: H,
    state: OrchestratorState,
    active_url: Option<String>,
    pending_report: Option<PendingReport>,
}

impl<H: UpdateHandler> UpdateOrchestrator<H> {
    #[must_use]
    pub fn new(config: &AgentConfig, current_version: &str, handler: H) -> Self {
        let device = &config.device;
        let client_id = client_id(&device.name, &device.serial);
        Self {
            topics: Topics::new(&config.topic_prefix, &client_id),
            request: UpdateCheckRequest {
                client_id,
                device_serial: device.serial.clone(),
                device_name: device.name.clone(),
                current_version: current_version.to_owned(),
                account_id: device.account.clone(),
            },
            plan: DownloadPlan {
                destination: config.download_path.clone(),
                piece_size: config.piece_size,
                max_retries: config.max_retries,
            },
            handler,
            state: OrchestratorState::Idle,
            active_url: None,
            pending_report: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    #[must_use]
    pub fn current_version(&self) -> &str {
        &self.request.current_version
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.request.client_id
    }

    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    #[must_use]
    pub fn has_pending_report(&self) -> bool {
        self.pending_report.is_some()
    }

    /// Renew the subscription, flush an unsent report, then ask for updates
    /// unless a check is already under way.
    pub async fn on_connected<C>(&mut self, channel: &mut C) -> Result<()>
    where
        C: ControlChannel + ?Sized,
    {
        channel.subscribe(&self.topics.response).await?;
        self.flush_pending_report(channel).await?;

        if self.state != OrchestratorState::Idle {
            debug!("Connected while {:?}, not re-sending update check", self.state);
            return Ok(());
        }

        self.transition(OrchestratorState::RequestSent);
        let payload = self.request.encode()?;
        if let Err(e) = channel.publish(&self.topics.request, payload).await {
            self.transition(OrchestratorState::Idle);
            return Err(e);
        }
        info!(
            "Update check sent for {} at version {}",
            self.request.client_id, self.request.current_version
        );
        self.transition(OrchestratorState::AwaitingResponse);
        Ok(())
    }

    /// A lost connection abandons an unanswered check; the next connect sends
    /// it again. A running download is unaffected.
    pub fn on_disconnected(&mut self) {
        if matches!(
            self.state,
            OrchestratorState::RequestSent | OrchestratorState::AwaitingResponse
        ) {
            self.transition(OrchestratorState::Idle);
        }
    }

    /// Handle an inbound control message.
    ///
    /// A malformed response returns [`AgentError::Schema`] after moving back
    /// to `Idle`; nothing is reported upstream for it.
    pub async fn on_message<C>(
        &mut self,
        channel: &mut C,
        topic: &str,
        payload: &[u8],
    ) -> Result<ResponseAction>
    where
        C: ControlChannel + ?Sized,
    {
        if topic != self.topics.response {
            debug!("Ignoring message on {topic}");
            return Ok(ResponseAction::Ignored);
        }
        if self.state != OrchestratorState::AwaitingResponse {
            debug!("Ignoring update-check response while {:?}", self.state);
            return Ok(ResponseAction::Ignored);
        }

        // Correlate first: a broken response meant for another device must
        // not end this device's check.
        if let Some(id) = UpdateCheckResponse::addressee(payload)
            && id != self.request.client_id
        {
            warn!("Ignoring update-check response addressed to {id}");
            return Ok(ResponseAction::Ignored);
        }

        let response = match UpdateCheckResponse::decode(payload) {
            Ok(response) => response,
            Err(e) => {
                self.transition(OrchestratorState::Idle);
                return Err(e);
            }
        };

        if !response.is_ok() {
            warn!(
                "Update check rejected with code {}: {}",
                response.status_code,
                response.message.as_deref().unwrap_or("no message")
            );
            self.finish_without_update();
            return Ok(ResponseAction::Finished(CycleOutcome::Rejected {
                code: response.status_code,
            }));
        }

        if !response.has_update {
            self.transition(OrchestratorState::NoUpdate);
            info!("No update available, staying at {}", self.request.current_version);
            self.finish_without_update();
            return Ok(ResponseAction::Finished(CycleOutcome::NoUpdate));
        }

        let Some(remote_url) = response.remote_url else {
            self.transition(OrchestratorState::Idle);
            return Err(AgentError::Schema("update without remoteUrl".to_owned()));
        };

        info!("Update available at {remote_url}");
        self.transition(OrchestratorState::Downloading);
        self.active_url = Some(remote_url.clone());

        match DownloadSession::new(
            remote_url,
            self.plan.destination.clone(),
            self.plan.piece_size,
            self.plan.max_retries,
        ) {
            Ok(session) => Ok(ResponseAction::Download(session)),
            Err(e) => {
                error!("Cannot start download: {e}");
                let outcome = self.report_failure(channel).await?;
                Ok(ResponseAction::Finished(outcome))
            }
        }
    }

    /// Report a finished download and return to `Idle`.
    pub async fn on_download_finished<C>(
        &mut self,
        channel: &mut C,
        result: &TerminalResult,
    ) -> Result<CycleOutcome>
    where
        C: ControlChannel + ?Sized,
    {
        if self.state != OrchestratorState::Downloading {
            warn!("Download result arrived while {:?}", self.state);
        }

        match result {
            TerminalResult::Completed { bytes_written } => {
                info!("Image downloaded: {bytes_written} bytes");
                self.report_success(channel).await
            }
            TerminalResult::Failed(reason) => {
                warn!("Image download failed: {reason}");
                self.report_failure(channel).await
            }
        }
    }

    async fn report_success<C>(&mut self, channel: &mut C) -> Result<CycleOutcome>
    where
        C: ControlChannel + ?Sized,
    {
        self.transition(OrchestratorState::ReportingSuccess);
        let remote_url = self.active_url.take().unwrap_or_default();

        let version = self
            .handler
            .resolve_version(&self.plan.destination, &remote_url)
            .unwrap_or_else(|| {
                warn!("No version known for {remote_url}, reporting the current one");
                self.request.current_version.clone()
            });
        self.request = self.request.with_version(&version);

        let payload = self.request.encode()?;
        self.publish_report(channel, true, payload).await;
        self.handler.on_check_complete(true, Some(&remote_url));
        self.transition(OrchestratorState::Idle);

        info!("Updated to version {version}");
        Ok(CycleOutcome::Updated {
            version,
            remote_url,
        })
    }

    async fn report_failure<C>(&mut self, channel: &mut C) -> Result<CycleOutcome>
    where
        C: ControlChannel + ?Sized,
    {
        self.transition(OrchestratorState::ReportingFailure);
        let remote_url = self.active_url.take().unwrap_or_default();

        let payload = self.request.encode()?;
        self.publish_report(channel, false, payload).await;
        self.handler.on_check_complete(false, None);
        self.transition(OrchestratorState::Idle);

        Ok(CycleOutcome::UpdateFailed { remote_url })
    }

    /// An unpublished report replaces any older one and waits for the next
    /// connect.
    async fn publish_report<C>(&mut self, channel: &mut C, succeeded: bool, payload: Vec<u8>)
    where
        C: ControlChannel + ?Sized,
    {
        let topic = self.topics.report(succeeded).to_owned();
        if let Err(e) = channel.publish(&topic, payload.clone()).await {
            warn!("Report to {topic} not sent, keeping it for the next connect: {e}");
            self.pending_report = Some(PendingReport { topic, payload });
        }
    }

    async fn flush_pending_report<C>(&mut self, channel: &mut C) -> Result<()>
    where
        C: ControlChannel + ?Sized,
    {
        let Some(report) = self.pending_report.take() else {
            return Ok(());
        };
        if let Err(e) = channel.publish(&report.topic, report.payload.clone()).await {
            self.pending_report = Some(report);
            return Err(e);
        }
        info!("Delivered pending report to {}", report.topic);
        Ok(())
    }

    fn finish_without_update(&mut self) {
        self.handler.on_check_complete(false, None);
        self.transition(OrchestratorState::Idle);
    }

    fn transition(&mut self, next: OrchestratorState) {
        debug!("Update state {:?} -> {next:?}", self.state);
        self.state = next;
    }
}
