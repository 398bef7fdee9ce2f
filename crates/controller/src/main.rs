use std::time::Instant;

use anyhow::Context;
use dotenvy::dotenv;
use picogo_core::{Controller, Outbound, SimBoard};
use picogo_link::{LinkConfig, LinkError, SerialLink};
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let app = AppConfig::from_env();
    let link_cfg = LinkConfig::from_env();
    info!(
        mode = %link_cfg.mode,
        addr = %link_cfg.addr,
        telemetry_ms = app.controller.telemetry.interval.as_millis() as u64,
        "starting controller"
    );
    let mut link = SerialLink::open(link_cfg).await.context("failed to open serial link")?;

    // No board driver on a host build; the simulator stands in for the pins
    let board = SimBoard::new(app.sim_battery_raw, app.sim_temp_raw);
    let mut controller = Controller::new(
        app.controller.clone(),
        board.peripherals(),
        Box::new(board.sensors()),
        Instant::now(),
    );
    emit(&link, controller.start()).await;

    let mut ticker = interval(app.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            frame = link.recv(), if input_open => match frame {
                Some(frame) => {
                    let out = controller.tick(Instant::now(), Some(&frame));
                    emit(&link, out).await;
                    // Drain whatever else already arrived before the next poll
                    while let Some(frame) = link.try_recv() {
                        let out = controller.handle_frame(Instant::now(), Some(&frame));
                        emit(&link, out).await;
                    }
                }
                None => {
                    info!("link input closed; telemetry continues");
                    input_open = false;
                }
            },
            _ = ticker.tick() => {
                let out = controller.poll(Instant::now());
                emit(&link, out).await;
            }
        }
    }

    controller.shutdown();
    Ok(())
}

async fn emit(link: &SerialLink, out: Vec<Outbound>) {
    for msg in out {
        let json = msg.to_json();
        match link.send(&json).await {
            Ok(()) => debug!(%json, "sent"),
            Err(LinkError::NotConnected) => debug!(?msg, "no peer; message dropped"),
            Err(err) => warn!(?err, "failed to write message"),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout may be the serial link itself
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(?err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                warn!(?err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
