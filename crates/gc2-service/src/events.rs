//! The typed event stream external collaborators subscribe to.

use std::sync::Arc;

use gc2_protocol::{ShotFrame, StatusFrame};
use openrange_physics::ShotResult;

use crate::reconnect::ReconnectStatus;
use crate::router::RouterMode;
use crate::shot::ValidatedShot;

/// Which transport an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Device,
    Simulator,
}

/// Transport connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Events published on the core broadcast channel.
///
/// Subscribers that fall behind lose old events rather than blocking the
/// pipeline; anything that must not be missed (settings, history) is owned by
/// the composition root instead.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// A shot frame arrived from the device (any phase, pre-validation).
    FrameReceived(ShotFrame),
    /// Device readiness / ball detection changed.
    StatusChanged(StatusFrame),
    /// A shot cleared validation and was routed.
    ShotValidated(ValidatedShot),
    /// The local flight simulation finished a shot.
    ShotSimulated(Arc<ShotResult>),
    TransportStateChanged {
        transport: TransportKind,
        state: ConnectionState,
    },
    ReconnectStatus {
        transport: TransportKind,
        status: ReconnectStatus,
    },
    /// The router switched destinations.
    ModeChanged(RouterMode),
}

/// Capacity of the broadcast channel. Large enough that a UI repainting at
/// human speed never lags during a burst of status frames.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
