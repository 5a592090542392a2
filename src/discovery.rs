//! # Discovery Controller
//!
//! Client-side view of the controller's discovery process:
//!
//! ```text
//! idle ──start/refresh──▶ running ──▶ done | error ──start/refresh──▶ running
//! ```
//!
//! Transitions are never inferred locally. The controller only moves when a
//! poll says so, and each poll replaces the previous snapshot entirely.
//!
//! Start and refresh commands are gated: while the last observed status is
//! busy (anything but `idle`, `done` or `error`), or a command is still on
//! the wire, further commands are rejected without contacting the
//! controller. Rejected commands are dropped, not queued.
//!
//! The controller exposes two ways to drive it. The split-phase methods
//! ([`DiscoveryController::try_begin`], [`DiscoveryController::finish_command`],
//! [`DiscoveryController::observe`]) let the sync scheduler keep ownership
//! while requests run elsewhere; the async methods ([`DiscoveryController::start`],
//! [`DiscoveryController::refresh`], [`DiscoveryController::poll`]) do the I/O
//! inline for one-shot callers such as the CLI.

use log::{debug, info, warn};
use serde_json::{json, Value};
use std::fmt;

use crate::api::ControllerApi;
use crate::error::{ApiError, CommandRejected, DiscoveryError};
use crate::model::{DiscoveryState, DiscoveryStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryCommand {
    /// Begin a new run from scratch.
    Start,
    /// Re-probe starting from the controller's current network.
    Refresh,
}

impl DiscoveryCommand {
    pub fn request_body(self) -> Value {
        match self {
            DiscoveryCommand::Start => json!({}),
            DiscoveryCommand::Refresh => json!({ "mode": "refresh" }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiscoveryCommand::Start => "start",
            DiscoveryCommand::Refresh => "refresh",
        }
    }
}

impl fmt::Display for DiscoveryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct DiscoveryController {
    latest: Option<DiscoveryStatus>,
    last_error: Option<String>,
    in_flight: Option<DiscoveryCommand>,
}

impl DiscoveryController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last successfully polled snapshot.
    pub fn latest(&self) -> Option<&DiscoveryStatus> {
        self.latest.as_ref()
    }

    /// Observed state; `idle` until the first poll lands.
    pub fn state(&self) -> DiscoveryState {
        self.latest
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(DiscoveryState::Idle)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn in_flight(&self) -> Option<DiscoveryCommand> {
        self.in_flight
    }

    /// Whether start/refresh controls should be disabled.
    pub fn is_busy(&self) -> bool {
        self.state().is_busy() || self.in_flight.is_some()
    }

    /// Replace the snapshot with a fresh poll result. Returns the state
    /// transition when the status field changed.
    pub fn observe(&mut self, status: DiscoveryStatus) -> Option<(DiscoveryState, DiscoveryState)> {
        let before = self.state();
        let first = self.latest.is_none();
        let after = status.status;
        self.latest = Some(status);
        self.last_error = None;
        if first || before != after {
            Some((before, after))
        } else {
            None
        }
    }

    /// Record a failed poll. The previous snapshot stays in place.
    pub fn observe_failure(&mut self, err: &ApiError) {
        self.last_error = Some(err.to_string());
    }

    /// Claim the command slot, or explain why the command must not be sent.
    pub fn try_begin(&mut self, command: DiscoveryCommand) -> Result<(), CommandRejected> {
        if let Some(pending) = self.in_flight {
            return Err(CommandRejected::InFlight(pending));
        }
        let state = self.state();
        if state.is_busy() {
            return Err(CommandRejected::Busy(state));
        }
        self.in_flight = Some(command);
        Ok(())
    }

    /// Release the command slot once the controller has answered.
    pub fn finish_command(&mut self, command: DiscoveryCommand, result: &Result<(), ApiError>) {
        if self.in_flight == Some(command) {
            self.in_flight = None;
        }
        match result {
            Ok(()) => info!("discovery {} command accepted", command),
            Err(e) => {
                warn!("discovery {} command failed: {}", command, e);
                self.last_error = Some(e.to_string());
            }
        }
    }

    /// Fetch and apply the current status snapshot.
    pub async fn poll<A: ControllerApi>(&mut self, api: &A) -> Result<DiscoveryStatus, ApiError> {
        match api.discovery_status().await {
            Ok(status) => {
                if let Some((from, to)) = self.observe(status.clone()) {
                    debug!("discovery status {} -> {}", from, to);
                }
                Ok(status)
            }
            Err(e) => {
                self.observe_failure(&e);
                Err(e)
            }
        }
    }

    pub async fn start<A: ControllerApi>(&mut self, api: &A) -> Result<(), DiscoveryError> {
        self.issue(api, DiscoveryCommand::Start).await
    }

    pub async fn refresh<A: ControllerApi>(&mut self, api: &A) -> Result<(), DiscoveryError> {
        self.issue(api, DiscoveryCommand::Refresh).await
    }

    async fn issue<A: ControllerApi>(
        &mut self,
        api: &A,
        command: DiscoveryCommand,
    ) -> Result<(), DiscoveryError> {
        self.try_begin(command)?;
        let result = api.send_discovery_command(command).await;
        self.finish_command(command, &result);
        result.map_err(DiscoveryError::from)
    }
}
