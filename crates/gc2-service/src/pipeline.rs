//! Per-shot accumulation, completion policy, and validation.
//!
//! The GC2 transmits each shot up to twice: an early preliminary frame
//! (`MSEC_SINCE_CONTACT` under 500 ms) with rough numbers, then a refined
//! frame that supersedes it. The refined frame may never arrive, so a
//! spin-wait timer salvages whatever is on hand after 1.5 s.
//!
//! The pipeline is clock-injected: callers pass `Instant`s into
//! [`ShotPipeline::ingest`] and drive [`ShotPipeline::poll`] from a timer, so
//! every path is testable without sleeping.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant, SystemTime};

use gc2_protocol::ShotFrame;
use thiserror::Error;

use crate::shot::ShotData;

/// `MSEC_SINCE_CONTACT` at or above this marks a frame as refined. The
/// device's two transmissions straddle this comfortably (typical values are
/// ~150 ms and ~1000 ms); the threshold itself is a heuristic.
pub const REFINED_THRESHOLD_MS: u32 = 500;

/// How long to wait for a refined frame before salvaging.
pub const SPIN_WAIT: Duration = Duration::from_millis(1500);

/// Vertical launch angle assumed for salvaged shots that never reported one.
pub const SALVAGE_VLA_DEG: f64 = 20.0;

/// Back-spin value the device emits when its spin read failed.
const SPIN_ERROR_SENTINEL: f64 = 2222.0;

/// Highest credible ball speed, mph.
const MAX_BALL_SPEED_MPH: f64 = 250.0;

/// Why a shot was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("zero spin (misread)")]
    ZeroSpin,
    #[error("back spin error sentinel")]
    SpinSentinel,
    #[error("ball speed out of range")]
    SpeedOutOfRange,
    #[error("timed out without usable data")]
    MissingFields,
}

/// Output of [`ShotPipeline::ingest`] / [`ShotPipeline::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// The shot cleared completion policy and validation.
    Completed(ShotData),
    /// The shot concluded without emission. Diagnostic only; once a shot ID
    /// concludes (either way) no further events are produced for it.
    Rejected {
        shot_id: u32,
        reason: RejectReason,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Reject shots whose back and side spin are both zero (device misread).
    /// Salvaged shots are exempt; their spins are legitimately unknown.
    pub reject_zero_spin: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reject_zero_spin: true,
        }
    }
}

/// Accumulation state for one `shot_id`.
#[derive(Debug)]
struct Accumulator {
    frame: ShotFrame,
    first_seen: Instant,
}

/// The per-shot state machine. One instance per device session.
#[derive(Debug)]
pub struct ShotPipeline {
    config: PipelineConfig,
    pending: HashMap<u32, Accumulator>,
    /// Shot IDs that have concluded (emitted or rejected). Nothing is ever
    /// emitted for these again.
    concluded: HashSet<u32>,
}

impl ShotPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            concluded: HashSet::new(),
        }
    }

    /// Number of shots currently accumulating.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Ingest a fully-assembled shot frame.
    pub fn ingest(&mut self, frame: ShotFrame, now: Instant) -> Vec<PipelineEvent> {
        let Some(shot_id) = frame.shot_id else {
            tracing::debug!("shot frame without SHOT_ID dropped");
            return Vec::new();
        };

        if self.concluded.contains(&shot_id) {
            tracing::debug!(shot_id, "frame for concluded shot dropped");
            return Vec::new();
        }

        let refined = frame
            .msec_since_contact
            .map_or(true, |msec| msec >= REFINED_THRESHOLD_MS);

        let frame = self.absorb(shot_id, frame, now);

        if refined && is_complete(&frame) {
            self.pending.remove(&shot_id);
            return vec![self.conclude(shot_id, frame, false)];
        }

        // Preliminary frames are never emitted; incomplete refined frames
        // wait for more data or the spin-wait timeout.
        Vec::new()
    }

    /// Ingest a partially-assembled shot that was preempted by a status
    /// message. Its fields seed the accumulator; emission waits for a
    /// complete frame or the spin-wait timeout.
    pub fn ingest_salvage(&mut self, frame: ShotFrame, now: Instant) {
        let Some(shot_id) = frame.shot_id else {
            tracing::debug!("salvage candidate without SHOT_ID dropped");
            return;
        };
        if self.concluded.contains(&shot_id) {
            return;
        }
        self.absorb(shot_id, frame, now);
    }

    /// Fire spin-wait timeouts. Call from a timer at a coarser interval than
    /// the timeout itself needs; precision here only delays salvage slightly.
    pub fn poll(&mut self, now: Instant) -> Vec<PipelineEvent> {
        let expired: Vec<u32> = self
            .pending
            .iter()
            .filter(|(_, acc)| now.duration_since(acc.first_seen) >= SPIN_WAIT)
            .map(|(&id, _)| id)
            .collect();

        let mut events = Vec::with_capacity(expired.len());
        for shot_id in expired {
            let acc = self.pending.remove(&shot_id).expect("expired id pending");
            events.push(self.salvage(shot_id, acc.frame));
        }
        events
    }

    /// Merge `frame` into the accumulator for `shot_id`, returning the merged
    /// frame. A later frame supersedes the earlier one; earlier fields
    /// survive only where the new frame has gaps.
    fn absorb(&mut self, shot_id: u32, mut frame: ShotFrame, now: Instant) -> ShotFrame {
        match self.pending.entry(shot_id) {
            Entry::Occupied(mut entry) => {
                let acc = entry.get_mut();
                frame.fill_missing_from(&acc.frame);
                acc.frame = frame.clone();
            }
            Entry::Vacant(entry) => {
                entry.insert(Accumulator {
                    frame: frame.clone(),
                    first_seen: now,
                });
            }
        }
        frame
    }

    /// Validate and conclude a completed frame.
    fn conclude(&mut self, shot_id: u32, frame: ShotFrame, incomplete: bool) -> PipelineEvent {
        self.concluded.insert(shot_id);

        let data = resolve(shot_id, &frame, incomplete);

        if let Err(reason) = self.validate(&data) {
            tracing::warn!(shot_id, %reason, "shot rejected");
            return PipelineEvent::Rejected { shot_id, reason };
        }

        tracing::info!(
            shot_id,
            ball_speed_mph = data.ball_speed_mph,
            back_spin_rpm = data.back_spin_rpm,
            side_spin_rpm = data.side_spin_rpm,
            incomplete = data.incomplete,
            "shot validated"
        );
        PipelineEvent::Completed(data)
    }

    /// Spin-wait expiry: emit with defaults if the essentials are there.
    fn salvage(&mut self, shot_id: u32, frame: ShotFrame) -> PipelineEvent {
        if frame.ball_speed_mph.is_none() {
            self.concluded.insert(shot_id);
            tracing::warn!(shot_id, "spin wait expired without ball speed");
            return PipelineEvent::Rejected {
                shot_id,
                reason: RejectReason::MissingFields,
            };
        }
        self.conclude(shot_id, frame, true)
    }

    fn validate(&self, data: &ShotData) -> Result<(), RejectReason> {
        if data.ball_speed_mph <= 0.0 || data.ball_speed_mph > MAX_BALL_SPEED_MPH {
            return Err(RejectReason::SpeedOutOfRange);
        }
        if data.back_spin_rpm == SPIN_ERROR_SENTINEL {
            return Err(RejectReason::SpinSentinel);
        }
        // Salvaged shots legitimately carry zero spin.
        if self.config.reject_zero_spin
            && !data.incomplete
            && data.back_spin_rpm == 0.0
            && data.side_spin_rpm == 0.0
        {
            return Err(RejectReason::ZeroSpin);
        }
        Ok(())
    }
}

impl Default for ShotPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

/// Completion policy: shot ID, ball speed, and at least one spin component.
fn is_complete(frame: &ShotFrame) -> bool {
    frame.shot_id.is_some()
        && frame.ball_speed_mph.is_some()
        && (frame.back_spin_rpm.is_some() || frame.side_spin_rpm.is_some())
}

/// Resolve a frame's optional fields into concrete shot data. Salvage
/// defaults: a 20-degree launch straight at the target with unknown spin.
fn resolve(shot_id: u32, frame: &ShotFrame, incomplete: bool) -> ShotData {
    let back_spin_rpm = frame.back_spin_rpm.unwrap_or(0.0);
    let side_spin_rpm = frame.side_spin_rpm.unwrap_or(0.0);
    let total_spin_rpm = frame
        .total_spin_rpm
        .unwrap_or_else(|| (back_spin_rpm * back_spin_rpm + side_spin_rpm * side_spin_rpm).sqrt());

    ShotData {
        shot_id,
        ball_speed_mph: frame.ball_speed_mph.unwrap_or(0.0),
        vla_deg: frame.vla_deg.unwrap_or(SALVAGE_VLA_DEG),
        hla_deg: frame.hla_deg.unwrap_or(0.0),
        total_spin_rpm,
        back_spin_rpm,
        side_spin_rpm,
        club: frame.has_club_data().then(|| frame.club.clone()),
        has_hmt: frame.has_hmt,
        incomplete,
        accepted_at: SystemTime::now(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
