// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! otalink agent - firmware update checks over a publish/subscribe channel
//!
//! The agent asks the update server whether a newer image exists, downloads
//! it with the range engine from `otalink-download` when one does, and
//! reports the outcome back on the control channel.

pub mod agent;
pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod messages;
pub mod orchestrator;
pub mod state;
pub mod topics;
pub mod version;

pub use agent::UpdateAgent;
pub use channel::{ControlChannel, ControlEvent};
pub use config::{AgentConfig, DeviceConfig, load_config, save_config};
pub use error::{AgentError, Result};
pub use handler::UpdateHandler;
pub use messages::{UpdateCheckRequest, UpdateCheckResponse};
pub use orchestrator::{
    CycleOutcome, DownloadPlan, OrchestratorState, ResponseAction, UpdateOrchestrator,
};
pub use state::{AgentState, load_state, save_state};
pub use topics::{Topics, client_id};
pub use version::{parse_version, version_in_url};
