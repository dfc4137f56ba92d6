// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Persisted agent state

use crate::error::{AgentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AgentState {
    /// Firmware version the device runs after the last successful update
    pub current_version: Option<String>,

    /// Last time the server answered an update check
    pub last_check_at: Option<DateTime<Utc>>,

    /// Last successful update timestamp
    pub last_update_at: Option<DateTime<Utc>>,

    /// Number of consecutive failed downloads
    #[serde(default)]
    pub consecutive_failures: u32,

    /// Image URL of the most recent failed download
    pub last_failed_url: Option<String>,
}

impl AgentState {
    pub fn record_check(&mut self, at: DateTime<Utc>) {
        self.last_check_at = Some(at);
    }

    pub fn record_update(&mut self, version: &str, at: DateTime<Utc>) {
        self.current_version = Some(version.to_owned());
        self.last_update_at = Some(at);
        self.consecutive_failures = 0;
        self.last_failed_url = None;
    }

    pub fn record_failure(&mut self, remote_url: &str) {
        self.consecutive_failures += 1;
        self.last_failed_url = Some(remote_url.to_owned());
    }
}

/// Load the state at `path`, creating a default one when it is missing.
pub fn load_state(path: &Path) -> Result<AgentState> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            AgentError::State(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to parse state: {e}"),
            ))
        })
    } else {
        let state = AgentState::default();
        save_state(path, &state)?;
        Ok(state)
    }
}

pub fn save_state(path: &Path, state: &AgentState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    let content = serde_json::to_string_pretty(state)?;

    // Atomic write
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_state() {
        let state = AgentState::default();
        assert!(state.current_version.is_none());
        assert!(state.last_check_at.is_none());
        assert!(state.last_update_at.is_none());
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_failed_url.is_none());
    }

    #[test]
    fn test_update_clears_failures() {
        let mut state = AgentState::default();
        state.record_failure("http://h/f-1.1.0.bin");
        state.record_failure("http://h/f-1.1.0.bin");
        assert_eq!(state.consecutive_failures, 2);

        state.record_update("1.1.0", Utc::now());
        assert_eq!(state.current_version.as_deref(), Some("1.1.0"));
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_failed_url.is_none());
        assert!(state.last_update_at.is_some());
    }

    #[test]
    fn test_state_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("agent_state.json");
        let state = AgentState {
            current_version: Some("1.2.3".to_string()),
            last_check_at: Some(Utc::now()),
            last_update_at: None,
            consecutive_failures: 1,
            last_failed_url: Some("http://h/f.bin".to_string()),
        };

        save_state(&path, &state).unwrap();
        let loaded = load_state(&path).unwrap();

        assert_eq!(loaded, state);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_missing_state_creates_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent_state.json");

        let state = load_state(&path).unwrap();
        assert_eq!(state, AgentState::default());
        assert!(path.exists());
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent_state.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(load_state(&path), Err(AgentError::State(_))));
    }
}
