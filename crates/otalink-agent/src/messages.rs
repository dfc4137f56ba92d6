// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Update-check messages exchanged over the control channel
//!
//! Requests and outcome reports share one JSON shape:
//!
//! ```json
//! { "messageType": "OTA", "clientId": "buds~SN1", "messageId": null,
//!   "properties": { "deviceSN": "SN1", "deviceName": "buds",
//!                   "otaVersion": "1.0.0", "userName": "acct" } }
//! ```
//!
//! Responses are decoded into typed structs and rejected when a required
//! field is missing or has the wrong type.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};

const MESSAGE_TYPE: &str = "OTA";
const CODE_OK: i64 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckRequest {
    pub client_id: String,
    pub device_serial: String,
    pub device_name: String,
    pub current_version: String,
    pub account_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    message_type: &'static str,
    client_id: &'a str,
    message_id: Option<&'a str>,
    properties: WireRequestProperties<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequestProperties<'a> {
    #[serde(rename = "deviceSN")]
    device_sn: &'a str,
    device_name: &'a str,
    ota_version: &'a str,
    user_name: &'a str,
}

impl UpdateCheckRequest {
    /// The same message carrying another version, used for outcome reports.
    #[must_use]
    pub fn with_version(&self, version: &str) -> Self {
        Self {
            current_version: version.to_owned(),
            ..self.clone()
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let wire = WireRequest {
            message_type: MESSAGE_TYPE,
            client_id: &self.client_id,
            message_id: None,
            properties: WireRequestProperties {
                device_sn: &self.device_serial,
                device_name: &self.device_name,
                ota_version: &self.current_version,
                user_name: &self.account_id,
            },
        };
        Ok(serde_json::to_vec(&wire)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckResponse {
    pub status_code: i64,
    pub has_update: bool,
    /// Always present and non-empty when `has_update` is set.
    pub remote_url: Option<String>,
    pub message: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    code: i64,
    message: Option<String>,
    client_id: Option<String>,
    properties: Option<WireResponseProperties>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponseProperties {
    has_new: bool,
    remote_url: Option<String>,
}

/// Only the addressing part of a response, readable even when the rest of
/// the payload is not.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    client_id: Option<String>,
}

impl UpdateCheckResponse {
    /// The `clientId` a payload is addressed to, if it names one.
    #[must_use]
    pub fn addressee(payload: &[u8]) -> Option<String> {
        serde_json::from_slice::<Envelope>(payload)
            .ok()
            .and_then(|envelope| envelope.client_id)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        let wire: WireResponse = serde_json::from_slice(payload)
            .map_err(|e| AgentError::Schema(format!("invalid update-check response: {e}")))?;

        if wire.code != CODE_OK {
            return Ok(Self {
                status_code: wire.code,
                has_update: false,
                remote_url: None,
                message: wire.message,
                client_id: wire.client_id,
            });
        }

        let properties = wire
            .properties
            .ok_or_else(|| AgentError::Schema("response has no properties".to_owned()))?;

        let remote_url = properties
            .remote_url
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty());
        if properties.has_new && remote_url.is_none() {
            return Err(AgentError::Schema(
                "hasNew is set but remoteUrl is missing".to_owned(),
            ));
        }

        Ok(Self {
            status_code: wire.code,
            has_update: properties.has_new,
            remote_url: if properties.has_new { remote_url } else { None },
            message: wire.message,
            client_id: wire.client_id,
        })
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status_code == CODE_OK
    }
}
