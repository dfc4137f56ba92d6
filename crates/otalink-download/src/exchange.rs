// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Per-exchange state machine
//!
//! Folds the [`HttpEvent`]s of one request into a single outcome and enforces
//! the exchange deadline on [`HttpEvent::PollTick`].

use crate::error::NetworkError;
use crate::transport::{HttpEvent, HttpResponse};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub enum ExchangeOutcome {
    Response(HttpResponse),
    Failed(NetworkError),
}

/// What the driver must do after feeding an event.
#[derive(Debug)]
pub enum Step {
    Continue,
    /// Close the connection and keep polling until [`HttpEvent::Closed`].
    Close,
    Finished(ExchangeOutcome),
}

#[derive(Debug)]
pub struct Exchange {
    budget: Duration,
    deadline: Instant,
    connected: bool,
    outcome: Option<ExchangeOutcome>,
}

impl Exchange {
    /// `budget` is the whole connect + transfer allowance.
    #[must_use]
    pub fn start(budget: Duration, now: Instant) -> Self {
        Self {
            budget,
            deadline: now + budget,
            connected: false,
            outcome: None,
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn on_event(&mut self, event: HttpEvent, now: Instant) -> Step {
        match event {
            HttpEvent::Opened => {
                self.deadline = now + self.budget;
                Step::Continue
            }
            HttpEvent::Connected => {
                self.connected = true;
                Step::Continue
            }
            HttpEvent::MessageReceived(response) => {
                self.settle(ExchangeOutcome::Response(response));
                Step::Close
            }
            HttpEvent::Errored(error) => {
                self.settle(ExchangeOutcome::Failed(error));
                Step::Close
            }
            HttpEvent::PollTick => {
                if self.outcome.is_none() && now > self.deadline {
                    self.settle(ExchangeOutcome::Failed(NetworkError::Timeout));
                    Step::Close
                } else {
                    Step::Continue
                }
            }
            HttpEvent::Closed => Step::Finished(
                self.outcome
                    .take()
                    .unwrap_or(ExchangeOutcome::Failed(NetworkError::ClosedEarly)),
            ),
        }
    }

    // First outcome wins; an error after a complete response changes nothing.
    fn settle(&mut self, outcome: ExchangeOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: Duration = Duration::from_secs(40);

    #[test]
    fn test_response_then_close() {
        let now = Instant::now();
        let mut exchange = Exchange::start(BUDGET, now);

        assert!(matches!(exchange.on_event(HttpEvent::Opened, now), Step::Continue));
        assert!(matches!(
            exchange.on_event(HttpEvent::Connected, now),
            Step::Continue
        ));
        assert!(exchange.is_connected());
        assert!(matches!(
            exchange.on_event(HttpEvent::MessageReceived(HttpResponse::new(206, "x")), now),
            Step::Close
        ));
        match exchange.on_event(HttpEvent::Closed, now) {
            Step::Finished(ExchangeOutcome::Response(response)) => assert_eq!(response.status, 206),
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_close_without_response_is_network_error() {
        let now = Instant::now();
        let mut exchange = Exchange::start(BUDGET, now);
        exchange.on_event(HttpEvent::Opened, now);
        assert!(matches!(
            exchange.on_event(HttpEvent::Closed, now),
            Step::Finished(ExchangeOutcome::Failed(NetworkError::ClosedEarly))
        ));
    }

    #[test]
    fn test_error_is_reported_after_close() {
        let now = Instant::now();
        let mut exchange = Exchange::start(BUDGET, now);
        let error = NetworkError::Connect("refused".to_owned());
        assert!(matches!(
            exchange.on_event(HttpEvent::Errored(error.clone()), now),
            Step::Close
        ));
        match exchange.on_event(HttpEvent::Closed, now) {
            Step::Finished(ExchangeOutcome::Failed(e)) => assert_eq!(e, error),
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_poll_tick_past_deadline_times_out() {
        let start = Instant::now();
        let mut exchange = Exchange::start(BUDGET, start);
        exchange.on_event(HttpEvent::Opened, start);

        assert!(matches!(
            exchange.on_event(HttpEvent::PollTick, start + BUDGET),
            Step::Continue
        ));
        assert!(matches!(
            exchange.on_event(HttpEvent::PollTick, start + BUDGET + Duration::from_millis(1)),
            Step::Close
        ));
        assert!(matches!(
            exchange.on_event(HttpEvent::Closed, start + BUDGET),
            Step::Finished(ExchangeOutcome::Failed(NetworkError::Timeout))
        ));
    }

    #[test]
    fn test_opened_restarts_deadline() {
        let start = Instant::now();
        let mut exchange = Exchange::start(BUDGET, start);
        let later = start + Duration::from_secs(5);
        exchange.on_event(HttpEvent::Opened, later);
        assert_eq!(exchange.deadline(), later + BUDGET);
    }

    #[test]
    fn test_error_after_response_keeps_response() {
        let now = Instant::now();
        let mut exchange = Exchange::start(BUDGET, now);
        exchange.on_event(HttpEvent::MessageReceived(HttpResponse::new(200, "ok")), now);
        exchange.on_event(HttpEvent::Errored(NetworkError::Transfer("reset".to_owned())), now);
        assert!(matches!(
            exchange.on_event(HttpEvent::Closed, now),
            Step::Finished(ExchangeOutcome::Response(_))
        ));
    }
}
