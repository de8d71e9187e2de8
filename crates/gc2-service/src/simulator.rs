//! TCP client for the simulator's Open Connect protocol.
//!
//! Framing is peculiar: every outbound message is one JSON object written in
//! a single write with no trailing newline, and inbound data may concatenate
//! several objects. Only `Shot` messages get a response; `Heartbeat` and
//! `Status` are fire-and-forget. Before each shot the client drains whatever
//! the simulator pushed unsolicited, then reads exactly one object.

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout, Instant};

use crate::shot::ShotData;

/// Open Connect default port.
pub const DEFAULT_PORT: u16 = 921;
/// Deadline for a single connect, write, or response read.
pub const OP_DEADLINE: Duration = Duration::from_secs(5);
/// Idle heartbeat cadence.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
/// Device name announced to the simulator.
pub const DEVICE_ID: &str = "GC2 Connect";
/// Protocol version announced to the simulator.
pub const API_VERSION: &str = "1";

// ─── Wire messages ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SimMessage {
    #[serde(rename = "DeviceID")]
    pub device_id: String,
    #[serde(rename = "Units")]
    pub units: String,
    #[serde(rename = "ShotNumber")]
    pub shot_number: u32,
    #[serde(rename = "APIversion")]
    pub api_version: String,
    #[serde(rename = "BallData")]
    pub ball_data: BallData,
    #[serde(rename = "ClubData", skip_serializing_if = "Option::is_none")]
    pub club_data: Option<ClubData>,
    #[serde(rename = "ShotDataOptions")]
    pub shot_data_options: ShotDataOptions,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BallData {
    pub speed: f64,
    pub spin_axis: f64,
    pub total_spin: f64,
    pub back_spin: f64,
    pub side_spin: f64,
    #[serde(rename = "HLA")]
    pub hla: f64,
    #[serde(rename = "VLA")]
    pub vla: f64,
    pub carry_distance: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClubData {
    pub speed: f64,
    pub angle_of_attack: f64,
    pub face_to_target: f64,
    pub lie: f64,
    pub loft: f64,
    pub path: f64,
    pub speed_at_impact: f64,
    pub vertical_face_impact: f64,
    pub horizontal_face_impact: f64,
    pub closure_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShotDataOptions {
    pub contains_ball_data: bool,
    pub contains_club_data: bool,
    pub launch_monitor_is_ready: bool,
    pub launch_monitor_ball_detected: bool,
    pub is_heart_beat: bool,
}

/// Response to a `Shot` message. `Code` 200/201 are success; 201 carries
/// player information.
#[derive(Debug, Clone, Deserialize)]
pub struct SimResponse {
    #[serde(rename = "Code")]
    pub code: u16,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Player", default)]
    pub player: Option<Value>,
}

impl SimResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SimulatorError {
    /// Transport-level failure; the connection is gone and the supervisor
    /// takes over.
    #[error("simulator I/O error: {0}")]
    Io(#[from] io::Error),

    /// The per-operation deadline expired. The connection is kept.
    #[error("simulator operation timed out")]
    Timeout,

    /// The simulator sent bytes we could not decode. The response is
    /// dropped; the connection is kept.
    #[error("malformed simulator response: {0}")]
    Protocol(String),

    /// The simulator answered with a non-2xx code. Surfaced to the caller;
    /// the connection is kept.
    #[error("simulator rejected shot: code {code} ({message})")]
    Rejected { code: u16, message: String },
}

impl SimulatorError {
    /// Whether this error means the connection is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimulatorError::Io(_))
    }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// A connected Open Connect client.
///
/// Owns the socket and the client-side `ShotNumber` counter (monotonically
/// increasing from 1, independent of the router's numbering).
pub struct SimClient {
    stream: TcpStream,
    read_buf: Vec<u8>,
    shot_number: u32,
    player: Option<Value>,
    op_deadline: Duration,
}

impl SimClient {
    /// Connect and register with an initial heartbeat.
    pub async fn connect(host: &str, port: u16) -> Result<Self, SimulatorError> {
        let stream = timeout(OP_DEADLINE, TcpStream::connect((host, port)))
            .await
            .map_err(|_| SimulatorError::Timeout)??;
        // Shot messages are small and latency matters more than throughput.
        stream.set_nodelay(true)?;

        let mut client = Self {
            stream,
            read_buf: Vec::with_capacity(4096),
            shot_number: 0,
            player: None,
            op_deadline: OP_DEADLINE,
        };

        client.send_heartbeat().await?;
        tracing::info!(host, port, "connected to simulator");
        Ok(client)
    }

    /// Last `ShotNumber` assigned (0 before the first shot).
    pub fn shot_number(&self) -> u32 {
        self.shot_number
    }

    /// Player info from the most recent `201` response.
    pub fn player(&self) -> Option<&Value> {
        self.player.as_ref()
    }

    /// Override the per-operation deadline (tests shrink it).
    pub fn set_op_deadline(&mut self, deadline: Duration) {
        self.op_deadline = deadline;
    }

    /// Send a shot and wait for the simulator's verdict.
    pub async fn send_shot(&mut self, shot: &ShotData) -> Result<SimResponse, SimulatorError> {
        self.drain_buffered()?;

        self.shot_number += 1;
        let message = shot_message(shot, self.shot_number);
        self.write_message(&message).await?;

        let response = self.read_response().await?;
        tracing::debug!(
            code = response.code,
            message = %response.message,
            "simulator response"
        );

        if response.code == 201 {
            if let Some(player) = &response.player {
                tracing::info!(?player, "player info updated");
                self.player = Some(player.clone());
            }
        }

        if !response.is_success() {
            return Err(SimulatorError::Rejected {
                code: response.code,
                message: response.message,
            });
        }

        Ok(response)
    }

    /// Fire-and-forget heartbeat. No response is expected.
    pub async fn send_heartbeat(&mut self) -> Result<(), SimulatorError> {
        let message = heartbeat_message(self.shot_number);
        self.write_message(&message).await
    }

    /// Fire-and-forget launch monitor status. No response is expected.
    pub async fn send_status(
        &mut self,
        ready: bool,
        ball_detected: bool,
    ) -> Result<(), SimulatorError> {
        let message = status_message(self.shot_number, ready, ball_detected);
        self.write_message(&message).await
    }

    async fn write_message(&mut self, message: &SimMessage) -> Result<(), SimulatorError> {
        let payload =
            serde_json::to_vec(message).map_err(|e| SimulatorError::Protocol(e.to_string()))?;
        // One object, one write, no trailing newline.
        timeout(self.op_deadline, self.stream.write_all(&payload))
            .await
            .map_err(|_| SimulatorError::Timeout)??;
        Ok(())
    }

    /// Discard anything the simulator sent since the last exchange, without
    /// blocking. Responses are matched positionally, so stale bytes would
    /// otherwise be attributed to the next shot.
    fn drain_buffered(&mut self) -> Result<(), SimulatorError> {
        self.read_buf.clear();

        let mut scratch = [0u8; 4096];
        loop {
            match self.stream.try_read(&mut scratch) {
                Ok(0) => {
                    return Err(SimulatorError::Io(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "simulator closed the connection",
                    )));
                }
                Ok(n) => {
                    tracing::debug!(bytes = n, "drained unsolicited simulator data");
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Read exactly one JSON object, leaving any following bytes buffered.
    async fn read_response(&mut self) -> Result<SimResponse, SimulatorError> {
        let deadline = Instant::now() + self.op_deadline;

        loop {
            if !self.read_buf.is_empty() {
                let mut objects =
                    serde_json::Deserializer::from_slice(&self.read_buf).into_iter::<SimResponse>();
                match objects.next() {
                    Some(Ok(response)) => {
                        let consumed = objects.byte_offset();
                        self.read_buf.drain(..consumed);
                        return Ok(response);
                    }
                    Some(Err(e)) if e.is_eof() => {
                        // Partial object; keep reading.
                    }
                    Some(Err(e)) => {
                        self.read_buf.clear();
                        return Err(SimulatorError::Protocol(e.to_string()));
                    }
                    None => {}
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SimulatorError::Timeout);
            }

            let mut chunk = [0u8; 4096];
            let n = timeout(remaining, self.stream.read(&mut chunk))
                .await
                .map_err(|_| SimulatorError::Timeout)??;
            if n == 0 {
                return Err(SimulatorError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "simulator closed the connection mid-response",
                )));
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
    }
}

// ─── Message builders ────────────────────────────────────────────────────────

fn base_message(shot_number: u32, options: ShotDataOptions) -> SimMessage {
    SimMessage {
        device_id: DEVICE_ID.to_string(),
        units: "Yards".to_string(),
        shot_number,
        api_version: API_VERSION.to_string(),
        ball_data: BallData::default(),
        club_data: None,
        shot_data_options: options,
    }
}

fn shot_message(shot: &ShotData, shot_number: u32) -> SimMessage {
    let club_data = shot.club.as_ref().map(|club| ClubData {
        speed: club.speed_mph.unwrap_or(0.0),
        angle_of_attack: club.path_v_deg.unwrap_or(0.0),
        face_to_target: club.face_to_target_deg.unwrap_or(0.0),
        lie: club.lie_deg.unwrap_or(0.0),
        loft: club.loft_deg.unwrap_or(0.0),
        path: club.path_h_deg.unwrap_or(0.0),
        speed_at_impact: club.speed_mph.unwrap_or(0.0),
        vertical_face_impact: club.impact_v_mm.unwrap_or(0.0),
        horizontal_face_impact: club.impact_h_mm.unwrap_or(0.0),
        closure_rate: club.closure_rate_deg_s.unwrap_or(0.0),
    });

    let mut message = base_message(
        shot_number,
        ShotDataOptions {
            contains_ball_data: true,
            contains_club_data: club_data.is_some(),
            launch_monitor_is_ready: true,
            launch_monitor_ball_detected: true,
            is_heart_beat: false,
        },
    );
    message.ball_data = BallData {
        speed: shot.ball_speed_mph,
        spin_axis: shot.spin_axis_deg(),
        total_spin: shot.total_spin_rpm,
        back_spin: shot.back_spin_rpm,
        side_spin: shot.side_spin_rpm,
        hla: shot.hla_deg,
        vla: shot.vla_deg,
        carry_distance: 0.0,
    };
    message.club_data = club_data;
    message
}

fn heartbeat_message(shot_number: u32) -> SimMessage {
    base_message(
        shot_number,
        ShotDataOptions {
            contains_ball_data: false,
            contains_club_data: false,
            launch_monitor_is_ready: true,
            launch_monitor_ball_detected: true,
            is_heart_beat: true,
        },
    )
}

fn status_message(shot_number: u32, ready: bool, ball_detected: bool) -> SimMessage {
    base_message(
        shot_number,
        ShotDataOptions {
            contains_ball_data: false,
            contains_club_data: false,
            launch_monitor_is_ready: ready,
            launch_monitor_ball_detected: ball_detected,
            is_heart_beat: false,
        },
    )
}

// ─── Command task ────────────────────────────────────────────────────────────

/// Commands the rest of the service sends to the client task.
#[derive(Debug)]
pub enum SimCommand {
    SendShot {
        shot: Box<ShotData>,
        reply: oneshot::Sender<Result<SimResponse, SimulatorError>>,
    },
    SendStatus {
        ready: bool,
        ball_detected: bool,
    },
}

/// Send-half handle to a running client task.
pub type SimHandle = mpsc::Sender<SimCommand>;

/// Drive a connected client: process commands FIFO and heartbeat when idle.
///
/// Returns `Err` only when the transport is unusable; non-fatal errors are
/// delivered to the command issuer and the loop continues.
pub async fn run_client(
    mut client: SimClient,
    commands: &mut mpsc::Receiver<SimCommand>,
    cancel: &mut watch::Receiver<bool>,
) -> Result<(), SimulatorError> {
    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    );

    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    tracing::info!("simulator client cancelled");
                    return Ok(());
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    // All handles dropped; nothing left to do.
                    return Ok(());
                };
                match command {
                    SimCommand::SendShot { shot, reply } => {
                        let result = client.send_shot(&shot).await;
                        let fatal = result
                            .as_ref()
                            .err()
                            .is_some_and(SimulatorError::is_fatal);
                        let _ = reply.send(result);
                        if fatal {
                            return Err(SimulatorError::Io(io::Error::new(
                                io::ErrorKind::BrokenPipe,
                                "simulator connection lost during shot send",
                            )));
                        }
                    }
                    SimCommand::SendStatus { ready, ball_detected } => {
                        if let Err(error) = client.send_status(ready, ball_detected).await {
                            if error.is_fatal() {
                                return Err(error);
                            }
                            tracing::warn!(%error, "status send failed");
                        }
                    }
                }
                heartbeat.reset();
            }
            _ = heartbeat.tick() => {
                if let Err(error) = client.send_heartbeat().await {
                    // A failed heartbeat means the link is dead either way.
                    tracing::warn!(%error, "heartbeat failed; dropping connection");
                    return Err(error);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shot::test_shot;

    #[test]
    fn shot_message_wire_keys_are_exact() {
        let message = shot_message(&test_shot(1), 7);
        let value = serde_json::to_value(&message).unwrap();

        for key in [
            "DeviceID",
            "Units",
            "ShotNumber",
            "APIversion",
            "BallData",
            "ShotDataOptions",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["DeviceID"], DEVICE_ID);
        assert_eq!(value["Units"], "Yards");
        assert_eq!(value["APIversion"], "1");
        assert_eq!(value["ShotNumber"], 7);

        let ball = &value["BallData"];
        for key in [
            "Speed",
            "SpinAxis",
            "TotalSpin",
            "BackSpin",
            "SideSpin",
            "HLA",
            "VLA",
            "CarryDistance",
        ] {
            assert!(ball.get(key).is_some(), "missing BallData key {key}");
        }
        assert_eq!(ball["Speed"], 150.0);

        let options = &value["ShotDataOptions"];
        assert_eq!(options["ContainsBallData"], true);
        assert_eq!(options["ContainsClubData"], false);
        assert_eq!(options["IsHeartBeat"], false);
        assert_eq!(options["LaunchMonitorIsReady"], true);
        assert_eq!(options["LaunchMonitorBallDetected"], true);
    }

    #[test]
    fn shot_without_club_omits_club_data() {
        let message = shot_message(&test_shot(1), 1);
        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("ClubData").is_none());
    }

    #[test]
    fn shot_with_club_includes_club_data() {
        let mut shot = test_shot(1);
        shot.club = Some(gc2_protocol::ClubFrame {
            speed_mph: Some(105.2),
            path_h_deg: Some(3.1),
            path_v_deg: Some(-4.2),
            face_to_target_deg: Some(1.5),
            ..Default::default()
        });

        let message = shot_message(&shot, 1);
        let value = serde_json::to_value(&message).unwrap();
        let club = &value["ClubData"];
        assert_eq!(club["Speed"], 105.2);
        assert_eq!(club["Path"], 3.1);
        assert_eq!(club["AngleOfAttack"], -4.2);
        assert_eq!(club["FaceToTarget"], 1.5);
        assert_eq!(value["ShotDataOptions"]["ContainsClubData"], true);
    }

    #[test]
    fn heartbeat_message_shape() {
        let message = heartbeat_message(3);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["ShotDataOptions"]["IsHeartBeat"], true);
        assert_eq!(value["ShotDataOptions"]["ContainsBallData"], false);
        assert_eq!(value["ShotNumber"], 3);
    }

    #[test]
    fn status_message_carries_flags() {
        let message = status_message(0, true, false);
        let value = serde_json::to_value(&message).unwrap();
        let options = &value["ShotDataOptions"];
        assert_eq!(options["IsHeartBeat"], false);
        assert_eq!(options["ContainsBallData"], false);
        assert_eq!(options["LaunchMonitorIsReady"], true);
        assert_eq!(options["LaunchMonitorBallDetected"], false);
    }

    #[test]
    fn response_codes() {
        let ok: SimResponse = serde_json::from_str(r#"{"Code":200,"Message":"OK"}"#).unwrap();
        assert!(ok.is_success());

        let player: SimResponse =
            serde_json::from_str(r#"{"Code":201,"Message":"Player","Player":{"Handed":"RH"}}"#)
                .unwrap();
        assert!(player.is_success());
        assert!(player.player.is_some());

        let error: SimResponse = serde_json::from_str(r#"{"Code":501,"Message":"bad"}"#).unwrap();
        assert!(!error.is_success());
    }
}
