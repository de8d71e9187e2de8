//! GC2 Connect service: the real-time pipeline between a Foresight GC2
//! launch monitor and a golf simulator.
//!
//! Shots flow USB -> frame reassembly -> parsing -> the shot state machine
//! ([`pipeline`]) -> the router ([`router`]), which dispatches each validated
//! shot to exactly one destination: the remote simulator over TCP
//! ([`simulator`]) or the in-process flight simulation (`openrange-physics`).
//! Transport failures are handled by the reconnect supervisor
//! ([`reconnect`]). External collaborators (UI, CLI, export) consume the
//! typed event stream ([`events`]) and drive the composition root
//! ([`app::Gc2Connect`]).

pub mod app;
pub mod device;
pub mod events;
pub mod history;
pub mod pipeline;
pub mod reconnect;
pub mod router;
pub mod settings;
pub mod shot;
pub mod simulator;

pub use app::Gc2Connect;
pub use events::{ConnectionState, CoreEvent, TransportKind};
pub use history::ShotHistory;
pub use pipeline::{PipelineConfig, PipelineEvent, RejectReason, ShotPipeline};
pub use reconnect::{ReconnectError, ReconnectStatus, ReconnectSupervisor};
pub use router::{RouterMode, ShotRouter};
pub use settings::{Settings, SettingsError};
pub use shot::{ShotData, ValidatedShot};
pub use simulator::{SimClient, SimResponse, SimulatorError};
