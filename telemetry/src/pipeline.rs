use std::sync::Arc;

use hal::SensorSource;
use log::{error, info};
use orientation::OrientationState;

use crate::config::TelemetryConfig;
use crate::error::{TelemetryError, TelemetryResult};
use crate::fusion::{FusionConsumer, FusionPhase, SensorMode};
use crate::link::{Connector, UdpConnector};
use crate::status::{ButtonLabel, LinkStatus, StatusUpdate, TelemetryObserver};
use crate::transmitter::{SessionSummary, Transmitter};

/// Sensor fusion and transmission, started and stopped as a unit.
///
/// The orientation state outlives sessions, so the straight-ahead reference
/// survives a restart.
pub struct SteeringPipeline<S: SensorSource, C: Connector = UdpConnector> {
    orientation: Arc<OrientationState>,
    observer: Arc<dyn TelemetryObserver>,
    fusion: FusionConsumer<S>,
    transmitter: Transmitter<C>,
    config: Option<TelemetryConfig>,
}

impl<S: SensorSource> SteeringPipeline<S, UdpConnector> {
    pub fn new(source: S, observer: Arc<dyn TelemetryObserver>) -> Self {
        Self::with_connector(source, UdpConnector::default(), observer)
    }
}

impl<S: SensorSource, C: Connector> SteeringPipeline<S, C> {
    pub fn with_connector(source: S, connector: C, observer: Arc<dyn TelemetryObserver>) -> Self {
        let orientation = Arc::new(OrientationState::default());
        Self {
            fusion: FusionConsumer::new(source, orientation.clone(), observer.clone()),
            transmitter: Transmitter::with_connector(connector),
            orientation,
            observer,
            config: None,
        }
    }

    /// Start a session, stopping any running one first.
    ///
    /// Nothing is left running if any part fails to start. Every failure is
    /// also reported to the observer.
    pub fn start(&mut self, config: TelemetryConfig) -> TelemetryResult<()> {
        self.stop();

        // config errors are reported through the transmitter's status channel
        if config.validate().is_ok() {
            self.orientation.set_invert_rotation(config.invert_rotation);
            self.fusion.set_cutoff_hz(config.cutoff_hz);
            self.fusion.set_queue_capacity(config.queue_capacity);
            if let Err(e) = self.fusion.start(config.sensor_mode()) {
                return Err(self.sensor_failure(e));
            }
        }

        if let Err(e) = self
            .transmitter
            .start(&config, self.orientation.clone(), self.observer.clone())
        {
            self.fusion.stop();
            return Err(e);
        }

        info!("Steering pipeline started");
        self.config = Some(config);
        Ok(())
    }

    /// Stop transmission and sensor fusion. Idempotent.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        let summary = self.transmitter.stop();
        self.fusion.stop();
        if self.config.take().is_some() {
            info!("Steering pipeline stopped");
        }
        summary
    }

    /// Change sensor registrations of the running session.
    ///
    /// The straight-ahead reference is kept; the payload format stays as
    /// configured at start. If the new registrations cannot feed the steering
    /// angle the whole session stops rather than streaming a frozen angle.
    pub fn reconfigure_sensors(&mut self, mode: SensorMode) -> TelemetryResult<()> {
        if self.config.is_none() {
            return Ok(());
        }
        if let Err(e) = self.fusion.reconfigure(mode) {
            self.stop();
            return Err(self.sensor_failure(e));
        }
        Ok(())
    }

    /// Report a fusion start failure to the observer
    fn sensor_failure(&self, err: TelemetryError) -> TelemetryError {
        error!("Could not start sensor fusion: {}", err);
        if matches!(err, TelemetryError::NoSensors) {
            self.observer
                .on_status(&StatusUpdate::new(LinkStatus::NoSensors, ButtonLabel::Connect));
        }
        err
    }

    /// Make the current heading the straight-ahead reference
    pub fn reset_straight(&self) {
        self.orientation.reset_straight();
    }

    /// Current unfiltered steering angle in radians
    pub fn azimuth(&self) -> f64 {
        self.orientation.azimuth(false)
    }

    pub fn fusion_phase(&self) -> FusionPhase {
        self.fusion.phase()
    }

    /// Whether the send loop is running; false after a fatal send error
    pub fn is_transmitting(&self) -> bool {
        self.transmitter.is_active()
    }
}

impl<S: SensorSource, C: Connector> Drop for SteeringPipeline<S, C> {
    fn drop(&mut self) {
        self.stop();
    }
}
