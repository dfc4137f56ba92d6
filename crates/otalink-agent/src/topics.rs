// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Control channel topic names

/// Client id announced on the control channel: `<name>~<serial>`.
#[must_use]
pub fn client_id(device_name: &str, device_serial: &str) -> String {
    format!("{device_name}~{device_serial}")
}

/// The four topics of one device, all under `<prefix>/<clientId>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Update-check requests are published here.
    pub request: String,
    /// Subscribed; the server answers here.
    pub response: String,
    pub success: String,
    pub failure: String,
}

impl Topics {
    #[must_use]
    pub fn new(prefix: &str, client_id: &str) -> Self {
        let base = format!("{}/{client_id}", prefix.trim_end_matches('/'));
        Self {
            request: format!("{base}/ota"),
            response: format!("{base}/serverResultMsg"),
            success: format!("{base}/otaSucceed"),
            failure: format!("{base}/otaFail"),
        }
    }

    /// Report topic for an update outcome.
    #[must_use]
    pub fn report(&self, succeeded: bool) -> &str {
        if succeeded {
            &self.success
        } else {
            &self.failure
        }
    }
}
