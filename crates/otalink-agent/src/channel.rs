// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Publish/subscribe control channel seam
//!
//! The agent does not speak MQTT itself. A [`ControlChannel`] publishes and
//! subscribes on its behalf, and connection changes plus inbound messages
//! reach the agent as [`ControlEvent`]s over a tokio channel.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// The broker session is up; subscriptions must be renewed.
    Connected,
    Message { topic: String, payload: Vec<u8> },
    Disconnected,
}

#[async_trait]
pub trait ControlChannel: Send {
    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// How long the channel waits between reconnect attempts.
    fn set_reconnect_interval(&mut self, interval: Duration);
}
