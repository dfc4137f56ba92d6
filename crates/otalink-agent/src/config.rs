// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Agent configuration

use crate::error::{AgentError, Result};
use otalink_download::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_topic_prefix() -> String {
    "earphone_f1".to_owned()
}

fn default_version() -> String {
    "0.0.0".to_owned()
}

fn default_3000() -> u64 {
    3000
}

fn default_10000() -> u64 {
    10_000
}

fn default_30000() -> u64 {
    30_000
}

fn default_1000() -> u64 {
    1000
}

fn default_piece_size() -> u64 {
    1024 * 1024
}

fn default_3() -> u32 {
    3
}

fn default_download_path() -> PathBuf {
    PathBuf::from("/data/ota/firmware.bin")
}

fn default_state_path() -> PathBuf {
    PathBuf::from("/data/ota/agent_state.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device serial number
    #[serde(default)]
    pub serial: String,

    /// Device model name
    #[serde(default)]
    pub name: String,

    /// Firmware version the device shipped with; persisted state overrides it
    #[serde(default = "default_version")]
    pub current_version: String,

    /// Account the device is registered to
    #[serde(default)]
    pub account: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: String::new(),
            name: String::new(),
            current_version: default_version(),
            account: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    /// First segment of every control topic
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Delay between control channel reconnect attempts (milliseconds)
    #[serde(default = "default_3000")]
    pub reconnect_interval_ms: u64,

    /// Where downloaded images are written
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,

    /// Bytes requested per HTTP range request
    #[serde(default = "default_piece_size")]
    pub piece_size: u64,

    #[serde(default = "default_10000")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_30000")]
    pub transfer_timeout_ms: u64,

    /// Network failures tolerated per download
    #[serde(default = "default_3")]
    pub max_retries: u32,

    #[serde(default = "default_1000")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            topic_prefix: default_topic_prefix(),
            reconnect_interval_ms: 3000,
            download_path: default_download_path(),
            piece_size: default_piece_size(),
            connect_timeout_ms: 10_000,
            transfer_timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 1000,
            state_path: default_state_path(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.device.serial.trim().is_empty() {
            return Err(AgentError::Config("device.serial is not set".to_owned()));
        }
        if self.device.name.trim().is_empty() {
            return Err(AgentError::Config("device.name is not set".to_owned()));
        }
        if self.piece_size == 0 {
            return Err(AgentError::Config("piece_size must be positive".to_owned()));
        }
        if self.topic_prefix.trim().is_empty() {
            return Err(AgentError::Config("topic_prefix is empty".to_owned()));
        }
        Ok(())
    }

    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            transfer_timeout: Duration::from_millis(self.transfer_timeout_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            ..EngineConfig::default()
        }
    }
}

/// Load and validate the config at `path`, writing defaults when it is missing.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| AgentError::Config(format!("Failed to parse config: {e}")))?
    } else {
        // Create with defaults so the device identity can be filled in
        let config = AgentConfig::default();
        save_config(path, &config)?;
        config
    };
    config.validate()?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &AgentConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    let content = serde_json::to_string_pretty(config)?;

    // Atomic write
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn device_config() -> AgentConfig {
        AgentConfig {
            device: DeviceConfig {
                serial: "SN1".to_string(),
                name: "buds".to_string(),
                current_version: "1.0.0".to_string(),
                account: "acct".to_string(),
            },
            ..AgentConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.topic_prefix, "earphone_f1");
        assert_eq!(config.reconnect_interval_ms, 3000);
        assert_eq!(config.piece_size, 1_048_576);
        assert_eq!(config.connect_timeout_ms, 10_000);
        assert_eq!(config.transfer_timeout_ms, 30_000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.device.current_version, "0.0.0");
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"device":{"serial":"SN1","name":"buds"},"max_retries":5}"#)
                .unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.piece_size, 1_048_576);
        assert_eq!(config.device.current_version, "0.0.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_conversion() {
        let config = AgentConfig {
            connect_timeout_ms: 2000,
            transfer_timeout_ms: 5000,
            retry_delay_ms: 0,
            ..device_config()
        };
        let engine = config.engine_config();
        assert_eq!(engine.exchange_budget(), Duration::from_secs(7));
        assert!(engine.retry_delay.is_zero());
    }

    #[test]
    fn test_validate_requires_identity() {
        assert!(matches!(
            AgentConfig::default().validate(),
            Err(AgentError::Config(_))
        ));
        let config = AgentConfig {
            piece_size: 0,
            ..device_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_config_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.json");

        assert!(matches!(load_config(&path), Err(AgentError::Config(_))));
        assert!(path.exists());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.json");
        let config = AgentConfig {
            topic_prefix: "fleet".to_string(),
            piece_size: 4096,
            ..device_config()
        };

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.device.serial, "SN1");
        assert_eq!(loaded.topic_prefix, "fleet");
        assert_eq!(loaded.piece_size, 4096);
        assert!(!path.with_extension("tmp").exists());
    }
}
