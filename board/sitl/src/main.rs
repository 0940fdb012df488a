use std::sync::{mpsc, Arc, Mutex};

use anyhow::Context;
use autopilot::{Brain, BrainType, ControlLoop, DisconnectCallback};
use config::SitlConfig;
use flight_axis::FlightAxisConnector;

mod config;
mod flight_axis;
mod util;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SitlConfig::from_env().context("Failed to load configuration")?;
    log::info!("Starting with {:?}", config);

    let brain = Brain::new(config.brain);
    match config.brain {
        BrainType::Autopilot => {
            brain.set_target_pitch(config.target_pitch);
            brain.set_target_yaw(config.target_yaw);
            brain.set_target_roll(config.target_roll);
            brain.set_target_throttle(config.target_throttle);
        }
        BrainType::Tracking => {
            log::warn!("No tracker attached, the Tracking brain will hold its outputs");
        }
        BrainType::Manual => {}
    }

    let mut control_loop = ControlLoop::new(Arc::new(brain));
    let mut connector = FlightAxisConnector::new(config.flight_axis_port);

    let (disconnect_tx, disconnect_rx) = mpsc::channel();
    let disconnect_tx = Mutex::new(disconnect_tx);
    let on_disconnect: DisconnectCallback = Arc::new(move |disconnected| {
        if disconnected {
            if let Ok(tx) = disconnect_tx.lock() {
                let _ = tx.send(());
            }
        }
    });

    control_loop
        .connect(
            &mut connector,
            &config.host,
            config.fdm_port,
            config.ctrls_port,
            on_disconnect,
        )
        .context("Failed to connect to FlightAxis")?;
    control_loop.start().context("Failed to start control loop")?;

    let _ = disconnect_rx.recv();
    log::warn!("Simulator disconnected, shutting down");

    control_loop.stop().context("Failed to stop control loop")?;
    Ok(())
}
