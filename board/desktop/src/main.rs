use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use log::{info, warn};
use telemetry::SteeringPipeline;

mod config;
mod observer;
mod simulated;

use config::{default_config_path, load_config, save_config};
use observer::LoggingObserver;
use simulated::SimulatedSensors;

const READOUT_PERIOD: Duration = Duration::from_secs(1);

enum State {
    Settling,
    Running,
    Stopping,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => default_config_path()?,
    };
    let mut app_config = load_config(&config_path)?;
    let session = app_config.telemetry_config();

    let observer = Arc::new(LoggingObserver::default());
    let sensors = SimulatedSensors::new(app_config.simulation.clone());
    let mut pipeline = SteeringPipeline::new(sensors, observer.clone());
    pipeline
        .start(session.clone())
        .with_context(|| format!("starting telemetry to {}", session.address))?;

    let run_for = Duration::from_secs(app_config.duration_secs);
    let started = Instant::now();
    let mut state = State::Settling;
    loop {
        match state {
            State::Settling => {
                thread::sleep(Duration::from_millis(app_config.settle_ms));
                pipeline.reset_straight();
                info!("Straight-ahead reference captured");
                state = State::Running;
            }
            State::Running => {
                thread::sleep(READOUT_PERIOD);
                if let Some(update) = observer.latest() {
                    info!(
                        "Steering angle {:+.1}° (unfiltered {:+.1}°)",
                        update.degrees(),
                        pipeline.azimuth().to_degrees()
                    );
                }
                if !pipeline.is_transmitting() {
                    let reason = observer.status().map(|s| s.text()).unwrap_or_default();
                    warn!("Transmission ended on its own: {}", reason);
                    state = State::Stopping;
                } else if !run_for.is_zero() && started.elapsed() >= run_for {
                    state = State::Stopping;
                }
            }
            State::Stopping => {
                if let Some(summary) = pipeline.stop() {
                    info!(
                        "Sent {} packets ({} failed, {} reconnects)",
                        summary.sent, summary.send_failures, summary.reconnects
                    );
                }
                break;
            }
        }
    }

    app_config.remember_session(&session);
    save_config(&config_path, &app_config)?;
    Ok(())
}
