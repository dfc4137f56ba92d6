// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Agent event loop
//!
//! One task multiplexes control events, at most one in-flight download and a
//! shutdown token. The download future owns the session and the transport
//! while it runs and hands both back when it finishes.

use crate::channel::{ControlChannel, ControlEvent};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::handler::UpdateHandler;
use crate::orchestrator::{CycleOutcome, ResponseAction, UpdateOrchestrator};
use crate::state::{AgentState, save_state};
use chrono::Utc;
use otalink_download::{
    DownloadSession, FailureReason, HttpTransport, RangeDownloadEngine, TerminalResult,
};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

type DownloadOutput<T> = (T, DownloadSession, TerminalResult);
type DownloadTask<T> = Pin<Box<dyn Future<Output = DownloadOutput<T>> + Send>>;

enum Step<T> {
    Control(ControlEvent),
    Downloaded(DownloadOutput<T>),
    EventsClosed,
    Shutdown,
}

#[derive(Debug)]
pub struct UpdateAgent<C, T, H> {
    config: AgentConfig,
    channel: C,
    transport: Option<T>,
    engine: RangeDownloadEngine,
    orchestrator: UpdateOrchestrator<H>,
    state: AgentState,
    cancel: CancellationToken,
}

impl<C, T, H> UpdateAgent<C, T, H>
where
    C: ControlChannel,
    T: HttpTransport + 'static,
    H: UpdateHandler,
{
    /// The persisted version, when there is one, wins over the configured one.
    #[must_use]
    pub fn new(config: AgentConfig, state: AgentState, channel: C, transport: T, handler: H) -> Self {
        let current_version = state
            .current_version
            .clone()
            .unwrap_or_else(|| config.device.current_version.clone());
        let cancel = CancellationToken::new();
        let engine =
            RangeDownloadEngine::with_cancellation(config.engine_config(), cancel.child_token());
        let orchestrator = UpdateOrchestrator::new(&config, &current_version, handler);

        Self {
            config,
            channel,
            transport: Some(transport),
            engine,
            orchestrator,
            state,
            cancel,
        }
    }

    /// Cancelling stops the agent; a running download ends as
    /// [`FailureReason::Cancelled`] and is reported before the loop exits.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn state(&self) -> &AgentState {
        &self.state
    }

    #[must_use]
    pub fn orchestrator(&self) -> &UpdateOrchestrator<H> {
        &self.orchestrator
    }

    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Run until cancelled, or until `events` closes and no download is left.
    pub async fn run(&mut self, mut events: mpsc::Receiver<ControlEvent>) -> Result<()> {
        info!(
            "Update agent started for {} at version {}",
            self.orchestrator.client_id(),
            self.orchestrator.current_version()
        );
        self.channel
            .set_reconnect_interval(self.config.reconnect_interval());

        let mut download: Option<DownloadTask<T>> = None;
        let mut events_open = true;

        loop {
            if !events_open && download.is_none() {
                info!("Control channel closed, stopping update agent");
                break;
            }

            let step = tokio::select! {
                biased;
                () = self.cancel.cancelled(), if download.is_none() => Step::Shutdown,
                output = wait_for(&mut download) => Step::Downloaded(output),
                event = events.recv(), if events_open => match event {
                    Some(event) => Step::Control(event),
                    None => Step::EventsClosed,
                },
            };

            match step {
                Step::Control(event) => {
                    if let Some(task) = self.handle_event(event).await {
                        download = Some(task);
                    }
                }
                Step::Downloaded((transport, session, result)) => {
                    download = None;
                    self.transport = Some(transport);
                    info!(
                        "Download of {} stopped at {} bytes",
                        session.source_url(),
                        session.offset()
                    );
                    match self
                        .orchestrator
                        .on_download_finished(&mut self.channel, &result)
                        .await
                    {
                        Ok(outcome) => self.record(&outcome),
                        Err(e) => error!("Failed to report download result: {e}"),
                    }
                }
                Step::EventsClosed => events_open = false,
                Step::Shutdown => {
                    info!("Shutdown requested, stopping update agent");
                    break;
                }
            }
        }

        save_state(&self.config.state_path, &self.state)?;
        Ok(())
    }

    async fn handle_event(&mut self, event: ControlEvent) -> Option<DownloadTask<T>> {
        match event {
            ControlEvent::Connected => {
                info!("Control channel connected");
                if let Err(e) = self.orchestrator.on_connected(&mut self.channel).await {
                    warn!("Update check not sent: {e}");
                }
                None
            }
            ControlEvent::Disconnected => {
                warn!("Control channel disconnected");
                self.orchestrator.on_disconnected();
                None
            }
            ControlEvent::Message { topic, payload } => {
                let action = self
                    .orchestrator
                    .on_message(&mut self.channel, &topic, &payload)
                    .await;
                match action {
                    Ok(ResponseAction::Ignored) => None,
                    Ok(ResponseAction::Finished(outcome)) => {
                        self.state.record_check(Utc::now());
                        self.record(&outcome);
                        None
                    }
                    Ok(ResponseAction::Download(session)) => {
                        self.state.record_check(Utc::now());
                        self.start_download(session).await
                    }
                    Err(e) => {
                        warn!("Dropped update-check response: {e}");
                        None
                    }
                }
            }
        }
    }

    async fn start_download(&mut self, mut session: DownloadSession) -> Option<DownloadTask<T>> {
        let Some(mut transport) = self.transport.take() else {
            // The orchestrator admits one download at a time, so the
            // transport is always home when a new one starts.
            error!("HTTP transport busy, abandoning {}", session.source_url());
            let result = TerminalResult::Failed(FailureReason::Cancelled);
            match self
                .orchestrator
                .on_download_finished(&mut self.channel, &result)
                .await
            {
                Ok(outcome) => self.record(&outcome),
                Err(e) => error!("Failed to report download result: {e}"),
            }
            return None;
        };

        let engine = self.engine.clone();
        Some(Box::pin(async move {
            let result = engine.run(&mut session, &mut transport).await;
            (transport, session, result)
        }))
    }

    fn record(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::NoUpdate | CycleOutcome::Rejected { .. } => {}
            CycleOutcome::Updated { version, .. } => {
                self.state.record_update(version, Utc::now());
            }
            CycleOutcome::UpdateFailed { remote_url } => {
                self.state.record_failure(remote_url);
            }
        }

        if let Err(e) = save_state(&self.config.state_path, &self.state) {
            error!("Failed to persist agent state: {e}");
        }
    }
}

async fn wait_for<T>(download: &mut Option<DownloadTask<T>>) -> DownloadOutput<T> {
    match download.as_mut() {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}
