//! GC2 Connect daemon (gc2-connectd)

use gc2_service::{CoreEvent, Gc2Connect, RouterMode};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gc2_service=debug,info")),
        )
        .init();

    info!("starting GC2 Connect v{}", env!("CARGO_PKG_VERSION"));

    let mut app = Gc2Connect::load()?;

    // Narrate the event stream; a UI would subscribe the same way.
    let mut events = app.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => narrate(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event narration lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if app.settings().device.auto_connect {
        if let Err(error) = app.connect_device().await {
            warn!(%error, "device auto-connect failed");
        }
    }

    if app.settings().remote.auto_connect && app.mode() == RouterMode::Remote {
        let host = app.settings().remote.host.clone();
        let port = app.settings().remote.port;
        if let Err(error) = app.connect_remote(&host, port).await {
            warn!(%error, "simulator auto-connect failed");
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    app.shutdown().await;
    Ok(())
}

fn narrate(event: &CoreEvent) {
    match event {
        CoreEvent::ShotValidated(shot) => {
            info!(
                shot_number = shot.shot_number,
                shot_id = shot.data.shot_id,
                ball_speed_mph = shot.data.ball_speed_mph,
                incomplete = shot.data.incomplete,
                "shot"
            );
        }
        CoreEvent::ShotSimulated(result) => {
            info!(
                carry_yd = format!("{:.1}", result.summary.carry_distance),
                total_yd = format!("{:.1}", result.summary.total_distance),
                offline_yd = format!("{:+.1}", result.summary.offline_distance),
                apex_ft = format!("{:.1}", result.summary.max_height),
                "simulated"
            );
        }
        CoreEvent::StatusChanged(status) => {
            info!(
                ready = status.is_ready(),
                ball_detected = status.ball_detected(),
                "device status"
            );
        }
        CoreEvent::TransportStateChanged { transport, state } => {
            info!(?transport, ?state, "transport");
        }
        CoreEvent::ReconnectStatus { transport, status } => {
            info!(?transport, ?status, "reconnect");
        }
        CoreEvent::ModeChanged(mode) => {
            info!(?mode, "mode");
        }
        CoreEvent::FrameReceived(_) => {}
    }
}
