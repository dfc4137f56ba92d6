// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Error types for the update agent

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("config error: {0}")]
    Config(String),

    #[error("state persistence error: {0}")]
    State(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("control channel error: {0}")]
    Channel(String),

    #[error("malformed control message: {0}")]
    Schema(String),

    #[error("version parse error: {0}")]
    VersionParse(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
