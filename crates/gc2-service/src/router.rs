//! Single-writer dispatch of validated shots to exactly one destination.

use std::sync::Arc;

use openrange_physics::{Conditions, PhysicsEngine, Surface};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};

use gc2_protocol::StatusFrame;

use crate::events::CoreEvent;
use crate::shot::{ShotData, ValidatedShot};
use crate::simulator::{SimCommand, SimHandle, SimulatorError};

/// Where validated shots go. Exactly one destination is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterMode {
    /// Forward to the simulator over TCP.
    #[serde(alias = "gspro")]
    Remote,
    /// Simulate locally with the flight engine.
    #[serde(alias = "open_range")]
    Local,
}

/// Configuration of the local (in-process) sink.
#[derive(Debug, Clone, Copy)]
pub struct LocalSink {
    pub conditions: Conditions,
    pub surface: Surface,
}

impl Default for LocalSink {
    fn default() -> Self {
        Self {
            conditions: Conditions::default(),
            surface: Surface::Fairway,
        }
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no simulator connection attached")]
    RemoteUnavailable,
    #[error(transparent)]
    Simulator(#[from] SimulatorError),
    #[error("local simulation task failed")]
    SimulationFailed,
}

/// Routes each validated shot to the active sink and assigns the
/// process-wide shot number.
///
/// Owned behind a single async mutex by the composition root, which makes
/// mode changes atomic with respect to in-flight dispatch: a `route` holds
/// the router for the duration of the sink call.
pub struct ShotRouter {
    mode: RouterMode,
    remote: Option<SimHandle>,
    local: LocalSink,
    next_shot_number: u64,
    events: broadcast::Sender<CoreEvent>,
}

impl ShotRouter {
    pub fn new(mode: RouterMode, local: LocalSink, events: broadcast::Sender<CoreEvent>) -> Self {
        Self {
            mode,
            remote: None,
            local,
            next_shot_number: 1,
            events,
        }
    }

    pub fn mode(&self) -> RouterMode {
        self.mode
    }

    /// Attach (or detach) the remote sink. The underlying transport is owned
    /// by the client task; the router only holds the send half.
    pub fn set_remote(&mut self, remote: Option<SimHandle>) {
        self.remote = remote;
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Reconfigure the local sink (conditions or surface changed).
    pub fn set_local(&mut self, local: LocalSink) {
        self.local = local;
    }

    /// Switch destinations. Idempotent; transports are left untouched so
    /// switching back is instant.
    pub fn set_mode(&mut self, mode: RouterMode) {
        if mode == self.mode {
            return;
        }
        tracing::info!(?mode, "router mode changed");
        self.mode = mode;
        let _ = self.events.send(CoreEvent::ModeChanged(mode));
    }

    /// Dispatch one shot to the active sink. Assigns the next shot number,
    /// publishes `ShotValidated`, and calls the sink exactly once. Sink
    /// errors propagate to the caller; the router never retries.
    pub async fn route(&mut self, data: ShotData) -> Result<(), RouteError> {
        let shot = ValidatedShot {
            shot_number: self.next_shot_number,
            data,
        };
        self.next_shot_number += 1;

        let _ = self.events.send(CoreEvent::ShotValidated(shot.clone()));

        match self.mode {
            RouterMode::Remote => self.route_remote(shot).await,
            RouterMode::Local => self.route_local(shot).await,
        }
    }

    /// Forward a device status frame to the remote sink when it is the
    /// active destination. Best-effort; status traffic is advisory.
    pub fn forward_status(&self, status: &StatusFrame) {
        if self.mode != RouterMode::Remote {
            return;
        }
        let Some(remote) = &self.remote else {
            return;
        };
        let command = SimCommand::SendStatus {
            ready: status.is_ready(),
            ball_detected: status.ball_detected(),
        };
        if let Err(error) = remote.try_send(command) {
            tracing::debug!(%error, "status not forwarded");
        }
    }

    async fn route_remote(&mut self, shot: ValidatedShot) -> Result<(), RouteError> {
        let remote = self.remote.as_ref().ok_or(RouteError::RemoteUnavailable)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        remote
            .send(SimCommand::SendShot {
                shot: Box::new(shot.data),
                reply: reply_tx,
            })
            .await
            .map_err(|_| RouteError::RemoteUnavailable)?;

        match reply_rx.await {
            Ok(Ok(response)) => {
                tracing::debug!(code = response.code, "shot accepted by simulator");
                Ok(())
            }
            Ok(Err(error)) => Err(error.into()),
            Err(_) => Err(RouteError::RemoteUnavailable),
        }
    }

    async fn route_local(&mut self, shot: ValidatedShot) -> Result<(), RouteError> {
        let engine = PhysicsEngine::new(self.local.conditions, self.local.surface);
        let launch = shot.data.launch_data();

        // CPU-bound; keep it off the I/O tasks.
        let result = tokio::task::spawn_blocking(move || engine.simulate(launch))
            .await
            .map_err(|_| RouteError::SimulationFailed)?;

        tracing::info!(
            shot_number = shot.shot_number,
            carry_yd = format!("{:.1}", result.summary.carry_distance),
            total_yd = format!("{:.1}", result.summary.total_distance),
            "shot simulated locally"
        );
        let _ = self.events.send(CoreEvent::ShotSimulated(Arc::new(result)));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
