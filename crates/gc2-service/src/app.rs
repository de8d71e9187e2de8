//! Composition root: owns settings, the router, the transports, and the
//! event stream that UIs and other collaborators consume.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::device::{
    DeviceError, DeviceSession, MockPacketSource, PacketSource, UsbPacketSource,
};
use crate::events::{ConnectionState, CoreEvent, TransportKind, EVENT_CHANNEL_CAPACITY};
use crate::history::ShotHistory;
use crate::pipeline::PipelineConfig;
use crate::reconnect::ReconnectSupervisor;
use crate::router::{LocalSink, RouterMode, ShotRouter};
use crate::settings::{OpenRangeSettings, Settings};
use crate::shot::ValidatedShot;
use crate::simulator::{self, SimClient, SimCommand};

/// Creates fresh device sessions for the reconnect supervisor.
type SourceFactory = Box<dyn FnMut() -> Result<Box<dyn PacketSource>, DeviceError> + Send>;

/// A spawned transport task and its cancellation handle.
struct TransportTask {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TransportTask {
    async fn stop(self) {
        let _ = self.cancel.send(true);
        let _ = self.task.await;
    }
}

/// The service core. One instance per process.
pub struct Gc2Connect {
    settings: Settings,
    settings_path: Option<PathBuf>,
    events: broadcast::Sender<CoreEvent>,
    router: Arc<Mutex<ShotRouter>>,
    history: Arc<std::sync::Mutex<ShotHistory>>,
    device: Option<TransportTask>,
    remote: Option<TransportTask>,
    supervisor: ReconnectSupervisor,
}

impl Gc2Connect {
    pub fn new(settings: Settings, settings_path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let local = LocalSink {
            conditions: settings.open_range.conditions,
            surface: settings.open_range.surface,
        };
        let router = Arc::new(Mutex::new(ShotRouter::new(
            settings.mode,
            local,
            events.clone(),
        )));

        let history = Arc::new(std::sync::Mutex::new(ShotHistory::default()));
        spawn_history_recorder(events.subscribe(), history.clone());

        Self {
            settings,
            settings_path,
            events,
            router,
            history,
            device: None,
            remote: None,
            supervisor: ReconnectSupervisor::default(),
        }
    }

    /// Load settings from the platform path and build the service.
    pub fn load() -> anyhow::Result<Self> {
        let path = Settings::default_path().context("resolving settings path")?;
        let settings = match Settings::load(&path) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(%error, "settings unreadable; running with defaults");
                Settings::default()
            }
        };
        Ok(Self::new(settings, Some(path)))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Subscribe to the core event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Snapshot of recent shots, newest first.
    pub fn shot_history(&self) -> Vec<ValidatedShot> {
        self.history.lock().expect("history lock").iter().cloned().collect()
    }

    pub fn mode(&self) -> RouterMode {
        self.settings.mode
    }

    /// Switch the shot destination. Idempotent; persists the choice.
    pub async fn set_mode(&mut self, mode: RouterMode) {
        self.router.lock().await.set_mode(mode);
        if self.settings.mode != mode {
            self.settings.mode = mode;
            self.persist_settings();
        }
    }

    /// Update the driving-range environment and persist it.
    pub async fn apply_open_range(&mut self, open_range: OpenRangeSettings) {
        self.router.lock().await.set_local(LocalSink {
            conditions: open_range.conditions,
            surface: open_range.surface,
        });
        self.settings.open_range = open_range;
        self.persist_settings();
    }

    /// Open the launch monitor (real or mock per settings) and start the
    /// read loop.
    pub async fn connect_device(&mut self) -> anyhow::Result<()> {
        if self.device.is_some() {
            return Ok(());
        }

        self.emit_transport(TransportKind::Device, ConnectionState::Connecting);

        let use_mock = self.settings.device.use_mock;
        let open_result = if use_mock {
            tracing::info!("using mock launch monitor");
            Ok(Box::new(MockPacketSource::new()) as Box<dyn PacketSource>)
        } else {
            tokio::task::spawn_blocking(open_usb_source)
                .await
                .map_err(|_| DeviceError::Disconnected)?
        };

        let source = match open_result {
            Ok(source) => source,
            Err(error) => {
                self.emit_transport(TransportKind::Device, ConnectionState::Disconnected);
                return Err(error).context("opening the GC2");
            }
        };

        let factory: SourceFactory = if use_mock {
            Box::new(|| Ok(Box::new(MockPacketSource::new()) as Box<dyn PacketSource>))
        } else {
            Box::new(open_usb_source)
        };

        self.spawn_device_task(source, factory);
        Ok(())
    }

    /// Start the device loop on a caller-provided source (tests, scripted
    /// replays). Reconnection after an error is not available for injected
    /// sources.
    pub fn connect_device_with(&mut self, source: impl PacketSource + 'static) {
        if self.device.is_some() {
            return;
        }
        self.emit_transport(TransportKind::Device, ConnectionState::Connecting);
        let factory: SourceFactory = Box::new(|| Err(DeviceError::NotFound));
        self.spawn_device_task(Box::new(source), factory);
    }

    fn spawn_device_task(&mut self, source: Box<dyn PacketSource>, factory: SourceFactory) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let config = PipelineConfig {
            reject_zero_spin: self.settings.device.reject_zero_spin,
        };

        let task = tokio::spawn(run_device_transport(
            source,
            factory,
            config,
            self.router.clone(),
            self.events.clone(),
            self.supervisor,
            cancel_rx,
        ));

        self.device = Some(TransportTask {
            cancel: cancel_tx,
            task,
        });
    }

    /// Stop the device loop and release the device.
    pub async fn disconnect_device(&mut self) {
        if let Some(task) = self.device.take() {
            task.stop().await;
            self.emit_transport(TransportKind::Device, ConnectionState::Disconnected);
        }
    }

    /// Connect to the simulator and attach it as the remote sink.
    pub async fn connect_remote(&mut self, host: &str, port: u16) -> anyhow::Result<()> {
        if let Some(task) = self.remote.take() {
            task.stop().await;
        }

        self.emit_transport(TransportKind::Simulator, ConnectionState::Connecting);

        let client = match SimClient::connect(host, port).await {
            Ok(client) => client,
            Err(error) => {
                self.emit_transport(TransportKind::Simulator, ConnectionState::Disconnected);
                return Err(error).context("connecting to simulator");
            }
        };

        let (command_tx, command_rx) = mpsc::channel(16);
        self.router.lock().await.set_remote(Some(command_tx));

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_remote_transport(
            client,
            host.to_string(),
            port,
            command_rx,
            self.router.clone(),
            self.events.clone(),
            self.supervisor,
            cancel_rx,
        ));

        self.remote = Some(TransportTask {
            cancel: cancel_tx,
            task,
        });
        Ok(())
    }

    /// Drop the simulator connection and detach the remote sink.
    pub async fn disconnect_remote(&mut self) {
        if let Some(task) = self.remote.take() {
            task.stop().await;
        }
        self.router.lock().await.set_remote(None);
        self.emit_transport(TransportKind::Simulator, ConnectionState::Disconnected);
    }

    /// Stop everything. Called on process shutdown.
    pub async fn shutdown(&mut self) {
        self.disconnect_device().await;
        self.disconnect_remote().await;
    }

    fn emit_transport(&self, transport: TransportKind, state: ConnectionState) {
        let _ = self.events.send(CoreEvent::TransportStateChanged { transport, state });
    }

    fn persist_settings(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(error) = self.settings.save(path) {
            tracing::warn!(%error, "settings not saved");
        }
    }
}

fn open_usb_source() -> Result<Box<dyn PacketSource>, DeviceError> {
    UsbPacketSource::open().map(|source| Box::new(source) as Box<dyn PacketSource>)
}

fn spawn_history_recorder(
    mut events: broadcast::Receiver<CoreEvent>,
    history: Arc<std::sync::Mutex<ShotHistory>>,
) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(CoreEvent::ShotValidated(shot)) => {
                    history.lock().expect("history lock").push(shot);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "history recorder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Device transport lifecycle: run the session, and on recoverable failure
/// hand reopening to the supervisor.
async fn run_device_transport(
    mut source: Box<dyn PacketSource>,
    mut factory: SourceFactory,
    config: PipelineConfig,
    router: Arc<Mutex<ShotRouter>>,
    events: broadcast::Sender<CoreEvent>,
    supervisor: ReconnectSupervisor,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let _ = events.send(CoreEvent::TransportStateChanged {
            transport: TransportKind::Device,
            state: ConnectionState::Connected,
        });

        let session = DeviceSession::new(source, config, router.clone(), events.clone());
        let result = session.run(cancel.clone()).await;

        let _ = events.send(CoreEvent::TransportStateChanged {
            transport: TransportKind::Device,
            state: ConnectionState::Disconnected,
        });

        match result {
            Ok(()) => return, // cancelled
            Err(DeviceError::PermissionDenied) => {
                tracing::error!("device permission denied; not retrying");
                return;
            }
            Err(error) => {
                tracing::warn!(%error, "device session ended");
            }
        }

        let status_events = events.clone();
        let reopened = supervisor
            .run(
                || {
                    let attempt = factory();
                    async move { attempt }
                },
                |status| {
                    let _ = status_events.send(CoreEvent::ReconnectStatus {
                        transport: TransportKind::Device,
                        status,
                    });
                },
                &mut cancel,
            )
            .await;

        match reopened {
            Ok(next) => source = next,
            Err(error) => {
                tracing::warn!(%error, "device reconnection over");
                return;
            }
        }
    }
}

/// Simulator transport lifecycle: drive the client, and on transport failure
/// hand reconnection to the supervisor. Detaches the remote sink on exit.
#[allow(clippy::too_many_arguments)]
async fn run_remote_transport(
    mut client: SimClient,
    host: String,
    port: u16,
    mut commands: mpsc::Receiver<SimCommand>,
    router: Arc<Mutex<ShotRouter>>,
    events: broadcast::Sender<CoreEvent>,
    supervisor: ReconnectSupervisor,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let _ = events.send(CoreEvent::TransportStateChanged {
            transport: TransportKind::Simulator,
            state: ConnectionState::Connected,
        });

        let result = simulator::run_client(client, &mut commands, &mut cancel).await;

        let _ = events.send(CoreEvent::TransportStateChanged {
            transport: TransportKind::Simulator,
            state: ConnectionState::Disconnected,
        });

        match result {
            Ok(()) => break, // cancelled or all handles dropped
            Err(error) => {
                tracing::warn!(%error, "simulator connection lost");
            }
        }

        let status_events = events.clone();
        let reconnected = supervisor
            .run(
                || {
                    let host = host.clone();
                    async move { SimClient::connect(&host, port).await }
                },
                |status| {
                    let _ = status_events.send(CoreEvent::ReconnectStatus {
                        transport: TransportKind::Simulator,
                        status,
                    });
                },
                &mut cancel,
            )
            .await;

        match reconnected {
            Ok(next) => client = next,
            Err(error) => {
                tracing::warn!(%error, "simulator reconnection over");
                break;
            }
        }
    }

    router.lock().await.set_remote(None);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app(mode: RouterMode) -> Gc2Connect {
        let settings = Settings {
            mode,
            ..Default::default()
        };
        Gc2Connect::new(settings, None)
    }

    #[tokio::test]
    async fn set_mode_updates_router_and_settings() {
        let mut app = test_app(RouterMode::Remote);
        let mut events = app.subscribe();

        app.set_mode(RouterMode::Local).await;
        assert_eq!(app.mode(), RouterMode::Local);
        assert_eq!(app.router.lock().await.mode(), RouterMode::Local);

        let mut saw_change = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, CoreEvent::ModeChanged(RouterMode::Local)) {
                saw_change = true;
            }
        }
        assert!(saw_change);
    }

    #[tokio::test(start_paused = true)]
    async fn device_lifecycle_with_mock_source() {
        let mut app = test_app(RouterMode::Local);
        let mut events = app.subscribe();

        let mut source = MockPacketSource::new();
        source.push_text(
            "0H\nSHOT_ID=1\nSPEED_MPH=150.0\nELEVATION_DEG=12.0\nAZIMUTH_DEG=0.0\n\
             BACK_RPM=2700\nSIDE_RPM=-150\nMSEC_SINCE_CONTACT=1000\n\t",
        );
        app.connect_device_with(source);

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        app.disconnect_device().await;
        // Let the history recorder drain the broadcast queue.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let mut validated = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, CoreEvent::ShotValidated(_)) {
                validated += 1;
            }
        }
        assert_eq!(validated, 1);
        assert_eq!(app.shot_history().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_device_without_connection_is_a_no_op() {
        let mut app = test_app(RouterMode::Local);
        app.disconnect_device().await;
        app.disconnect_remote().await;
    }
}
