//! GC2 USB session: device access behind a [`PacketSource`] seam, and the
//! read loop that pumps chunks through framing, parsing, and the shot
//! pipeline.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gc2_protocol::{
    parse_message, AssemblerEvent, Gc2Frame, MessageAssembler, ParseError, ShotFrame, StatusFrame,
    GC2_PRODUCT_ID, GC2_VENDOR_ID,
};
use rusb::{DeviceHandle, GlobalContext, TransferType, UsbContext};
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};

use crate::events::CoreEvent;
use crate::pipeline::{PipelineConfig, PipelineEvent, ShotPipeline};
use crate::router::ShotRouter;

/// Per-read timeout. Spurious timeouts are normal; they just bound latency
/// for cancellation and pipeline polling.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Consecutive read errors before the session is declared dead.
const ERROR_STREAK_LIMIT: u32 = 3;

/// Zero-byte reads for this long mean the device is gone even though the
/// transfer still "succeeds".
const EMPTY_READ_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("GC2 not found (VID {GC2_VENDOR_ID:#06X}, PID {GC2_PRODUCT_ID:#06X})")]
    NotFound,

    /// Fatal for the session; the user must fix device permissions. The
    /// supervisor does not retry this.
    #[error("USB permission denied opening the GC2")]
    PermissionDenied,

    #[error("GC2 disconnected")]
    Disconnected,

    #[error("no IN endpoint on the GC2 interface")]
    NoEndpoint,

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),
}

/// Source of raw USB chunks. The real device and the mock both implement
/// this, so the session loop and everything behind it never touch hardware
/// in tests.
#[async_trait]
pub trait PacketSource: Send {
    /// Read one chunk. `Ok(None)` is a timeout (no data, not an error);
    /// `Ok(Some(vec![]))` is a zero-byte read, which counts toward
    /// disconnection detection.
    async fn read_packet(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, DeviceError>;

    /// Release the underlying device resources.
    fn close(&mut self);
}

#[async_trait]
impl PacketSource for Box<dyn PacketSource> {
    async fn read_packet(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, DeviceError> {
        (**self).read_packet(timeout).await
    }

    fn close(&mut self) {
        (**self).close()
    }
}

// ─── Real device ─────────────────────────────────────────────────────────────

/// rusb-backed packet source for the physical GC2.
pub struct UsbPacketSource {
    handle: Arc<DeviceHandle<GlobalContext>>,
    endpoint: u8,
    transfer: TransferType,
    max_packet: usize,
}

impl UsbPacketSource {
    /// Find and open the GC2, claim interface 0, and locate the IN endpoint.
    pub fn open() -> Result<Self, DeviceError> {
        let devices = rusb::GlobalContext::default().devices()?;
        let device = devices
            .iter()
            .find(|device| {
                device
                    .device_descriptor()
                    .map(|desc| {
                        desc.vendor_id() == GC2_VENDOR_ID && desc.product_id() == GC2_PRODUCT_ID
                    })
                    .unwrap_or(false)
            })
            .ok_or(DeviceError::NotFound)?;

        let handle = device.open().map_err(|error| match error {
            rusb::Error::Access => DeviceError::PermissionDenied,
            other => DeviceError::Usb(other),
        })?;

        // Not supported on all platforms; claiming will fail loudly if a
        // kernel driver really is in the way.
        let _ = handle.set_auto_detach_kernel_driver(true);
        handle.claim_interface(0)?;

        let config = device.active_config_descriptor()?;
        let endpoint = config
            .interfaces()
            .flat_map(|interface| interface.descriptors())
            .flat_map(|descriptor| {
                descriptor
                    .endpoint_descriptors()
                    .filter(|endpoint| endpoint.direction() == rusb::Direction::In)
                    .map(|endpoint| {
                        (
                            endpoint.address(),
                            endpoint.transfer_type(),
                            endpoint.max_packet_size() as usize,
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .next()
            .ok_or(DeviceError::NoEndpoint)?;

        tracing::info!(
            endpoint = format!("{:#04X}", endpoint.0),
            transfer = ?endpoint.1,
            "GC2 opened"
        );

        Ok(Self {
            handle: Arc::new(handle),
            endpoint: endpoint.0,
            transfer: endpoint.1,
            max_packet: endpoint.2,
        })
    }
}

#[async_trait]
impl PacketSource for UsbPacketSource {
    async fn read_packet(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, DeviceError> {
        let handle = self.handle.clone();
        let endpoint = self.endpoint;
        let transfer = self.transfer;
        let capacity = self.max_packet.max(64);

        // libusb reads block; keep them off the async threads.
        tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; capacity];
            let result = match transfer {
                TransferType::Interrupt => handle.read_interrupt(endpoint, &mut buf, timeout),
                _ => handle.read_bulk(endpoint, &mut buf, timeout),
            };
            match result {
                Ok(len) => {
                    buf.truncate(len);
                    Ok(Some(buf))
                }
                Err(rusb::Error::Timeout) => Ok(None),
                Err(rusb::Error::NoDevice | rusb::Error::Pipe | rusb::Error::Io) => {
                    Err(DeviceError::Disconnected)
                }
                Err(rusb::Error::Access) => Err(DeviceError::PermissionDenied),
                Err(error) => Err(DeviceError::Usb(error)),
            }
        })
        .await
        .unwrap_or(Err(DeviceError::Disconnected))
    }

    fn close(&mut self) {
        let _ = self.handle.release_interface(0);
    }
}

// ─── Mock device ─────────────────────────────────────────────────────────────

/// Scripted step for the mock source.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Deliver these bytes as one chunk.
    Data(Vec<u8>),
    /// Device silence for this long.
    Delay(Duration),
    /// The device goes away.
    Disconnect,
}

/// Scripted packet source for tests and the `use_mock` device setting.
#[derive(Debug, Default)]
pub struct MockPacketSource {
    script: VecDeque<MockStep>,
    closed: bool,
}

impl MockPacketSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, text: &str) {
        self.script.push_back(MockStep::Data(text.as_bytes().to_vec()));
    }

    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        self.script.push_back(MockStep::Data(chunk));
    }

    pub fn push_delay(&mut self, delay: Duration) {
        self.script.push_back(MockStep::Delay(delay));
    }

    pub fn push_disconnect(&mut self) {
        self.script.push_back(MockStep::Disconnect);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl PacketSource for MockPacketSource {
    async fn read_packet(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, DeviceError> {
        loop {
            match self.script.pop_front() {
                Some(MockStep::Data(chunk)) => return Ok(Some(chunk)),
                Some(MockStep::Delay(delay)) => tokio::time::sleep(delay).await,
                Some(MockStep::Disconnect) => return Err(DeviceError::Disconnected),
                None => {
                    tokio::time::sleep(timeout).await;
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

// ─── Session loop ────────────────────────────────────────────────────────────

enum Tick {
    Cancel,
    Packet(Result<Option<Vec<u8>>, DeviceError>),
}

/// One device connection's read loop: bytes in, routed shots out.
///
/// Returns `Ok(())` on cancellation and `Err` on a terminal condition (the
/// supervisor decides whether to reopen).
pub struct DeviceSession<S: PacketSource> {
    source: S,
    assembler: MessageAssembler,
    pipeline: ShotPipeline,
    router: Arc<Mutex<ShotRouter>>,
    events: broadcast::Sender<CoreEvent>,
}

impl<S: PacketSource> DeviceSession<S> {
    pub fn new(
        source: S,
        config: PipelineConfig,
        router: Arc<Mutex<ShotRouter>>,
        events: broadcast::Sender<CoreEvent>,
    ) -> Self {
        Self {
            source,
            assembler: MessageAssembler::default(),
            pipeline: ShotPipeline::new(config),
            router,
            events,
        }
    }

    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) -> Result<(), DeviceError> {
        let mut error_streak = 0u32;
        let mut empty_since: Option<Instant> = None;

        loop {
            let tick = tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        Tick::Cancel
                    } else {
                        continue;
                    }
                }
                result = self.source.read_packet(READ_TIMEOUT) => Tick::Packet(result),
            };

            match tick {
                Tick::Cancel => {
                    tracing::info!("device session cancelled");
                    self.source.close();
                    return Ok(());
                }
                Tick::Packet(Ok(Some(chunk))) if chunk.is_empty() => {
                    let now = Instant::now();
                    let start = *empty_since.get_or_insert(now);
                    if now.duration_since(start) >= EMPTY_READ_WINDOW {
                        tracing::warn!("device returning empty reads; treating as disconnect");
                        self.source.close();
                        return Err(DeviceError::Disconnected);
                    }
                }
                Tick::Packet(Ok(Some(chunk))) => {
                    empty_since = None;
                    error_streak = 0;
                    self.ingest_chunk(&chunk).await;
                }
                Tick::Packet(Ok(None)) => {
                    // Read timeout: normal idle, not a disconnection signal.
                }
                Tick::Packet(Err(error @ DeviceError::PermissionDenied))
                | Tick::Packet(Err(error @ DeviceError::Disconnected)) => {
                    self.source.close();
                    return Err(error);
                }
                Tick::Packet(Err(error)) => {
                    error_streak += 1;
                    tracing::warn!(%error, streak = error_streak, "USB read error");
                    if error_streak >= ERROR_STREAK_LIMIT {
                        self.source.close();
                        return Err(error);
                    }
                }
            }

            self.flush_pipeline(Instant::now()).await;
        }
    }

    async fn ingest_chunk(&mut self, chunk: &[u8]) {
        let now = Instant::now();
        match self.assembler.feed(chunk) {
            Ok(events) => {
                for event in events {
                    self.handle_assembler_event(event, now).await;
                }
            }
            Err(error) => {
                // The assembler resets itself; the stream resynchronizes at
                // the next message boundary.
                tracing::warn!(%error, "framing error");
            }
        }
    }

    async fn handle_assembler_event(&mut self, event: AssemblerEvent, now: Instant) {
        match event {
            AssemblerEvent::Message(lines) => match parse_message(&lines) {
                Ok(Gc2Frame::Shot(frame)) => self.handle_shot_frame(frame, now).await,
                Ok(Gc2Frame::Status(status)) => self.handle_status_frame(status).await,
                Err(ParseError::UnknownTag { tag }) => {
                    tracing::debug!(tag, "unhandled message tag");
                }
                Err(error) => {
                    tracing::debug!(%error, "message dropped");
                }
            },
            AssemblerEvent::SalvageCandidate(lines) => {
                if let Ok(Gc2Frame::Shot(frame)) = parse_message(&lines) {
                    tracing::debug!(shot_id = ?frame.shot_id, "salvage candidate retained");
                    self.pipeline.ingest_salvage(frame, now);
                }
            }
        }
    }

    async fn handle_shot_frame(&mut self, frame: ShotFrame, now: Instant) {
        let _ = self.events.send(CoreEvent::FrameReceived(frame.clone()));
        let events = self.pipeline.ingest(frame, now);
        self.dispatch(events).await;
    }

    async fn handle_status_frame(&mut self, status: StatusFrame) {
        let _ = self.events.send(CoreEvent::StatusChanged(status));
        self.router.lock().await.forward_status(&status);
    }

    async fn flush_pipeline(&mut self, now: Instant) {
        let events = self.pipeline.poll(now);
        self.dispatch(events).await;
    }

    async fn dispatch(&mut self, events: Vec<PipelineEvent>) {
        for event in events {
            match event {
                PipelineEvent::Completed(data) => {
                    let result = self.router.lock().await.route(data).await;
                    if let Err(error) = result {
                        tracing::warn!(%error, "shot routing failed");
                    }
                }
                PipelineEvent::Rejected { .. } => {
                    // Already logged with its reason by the pipeline.
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
