use std::sync::Arc;
use std::thread::{self, JoinHandle};

use hal::{SensorEvent, SensorKind, SensorSource};
use log::{debug, error, info, warn};
use orientation::{LowPassFilter, OrientationState};

use crate::config::DEFAULT_QUEUE_CAPACITY;
use crate::error::{TelemetryError, TelemetryResult};
use crate::queue::SampleQueue;
use crate::status::{AzimuthUpdate, TelemetryObserver};

/// Which sensors feed the orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorMode {
    /// Rotation vector is the primary source; otherwise accelerometer+magnetometer
    pub use_gyroscope: bool,

    /// Also maintain the accelerometer/magnetometer angle for comparison
    pub debug_transmit: bool,
}

impl SensorMode {
    /// Sensor kinds to register, in registration order
    pub fn kinds(&self) -> Vec<SensorKind> {
        let mut kinds = Vec::with_capacity(3);
        if !self.use_gyroscope || self.debug_transmit {
            kinds.push(SensorKind::Accelerometer);
            kinds.push(SensorKind::MagneticField);
        }
        if self.use_gyroscope {
            kinds.push(SensorKind::RotationVector);
        }
        kinds
    }

    /// Kinds without which the primary azimuth cannot be computed
    fn primary_kinds(&self) -> &'static [SensorKind] {
        if self.use_gyroscope {
            &[SensorKind::RotationVector]
        } else {
            &[SensorKind::Accelerometer, SensorKind::MagneticField]
        }
    }
}

/// Lifecycle of the fusion consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionPhase {
    /// No sensors registered
    Idle,
    /// Draining readings with the given sensor registrations
    Active(SensorMode),
}

/// Processing applied to every drained reading
pub struct Fusion {
    orientation: Arc<OrientationState>,
    filter: LowPassFilter,
    observer: Arc<dyn TelemetryObserver>,
}

impl Fusion {
    pub fn new(
        orientation: Arc<OrientationState>,
        cutoff_hz: f64,
        observer: Arc<dyn TelemetryObserver>,
    ) -> Self {
        let filter = LowPassFilter::new(cutoff_hz);
        if filter.is_enabled() {
            debug!("Low-pass filter at {} Hz", filter.cutoff_hz());
        } else {
            debug!("Low-pass filter disabled");
        }
        Self {
            orientation,
            filter,
            observer,
        }
    }

    /// Update the orientation from one reading, filter the primary azimuth,
    /// store the filtered value for the transmitter and publish it.
    ///
    /// Invalid readings are logged and dropped without publishing.
    pub fn process(&mut self, event: &SensorEvent) -> Option<AzimuthUpdate> {
        if let Err(e) = self.orientation.update(event.kind, &event.values) {
            warn!("Dropping sensor reading: {}", e);
            return None;
        }

        // filter the absolute heading so a straight-ahead reset does not disturb it
        let primary = self.orientation.snapshot().current.x;
        self.orientation
            .set_filtered(self.filter.step(primary, event.timestamp));

        let (azimuth, azimuth_without_gyro) = self.orientation.steering_azimuths();
        let update = AzimuthUpdate {
            timestamp: event.timestamp,
            azimuth,
            azimuth_without_gyro,
        };
        self.observer.on_azimuth(&update);
        Some(update)
    }
}

/// Drains sensor readings on a worker thread into the shared orientation.
///
/// The sensor callback only pushes into a bounded drop-oldest queue, so it
/// never waits on the worker.
pub struct FusionConsumer<S: SensorSource> {
    source: S,
    orientation: Arc<OrientationState>,
    observer: Arc<dyn TelemetryObserver>,
    cutoff_hz: f64,
    queue_capacity: usize,
    phase: FusionPhase,
    queue: Option<SampleQueue<SensorEvent>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: SensorSource> FusionConsumer<S> {
    pub fn new(
        source: S,
        orientation: Arc<OrientationState>,
        observer: Arc<dyn TelemetryObserver>,
    ) -> Self {
        Self {
            source,
            orientation,
            observer,
            cutoff_hz: 0.0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            phase: FusionPhase::Idle,
            queue: None,
            worker: None,
        }
    }

    /// Low-pass cutoff used from the next start on
    pub fn set_cutoff_hz(&mut self, cutoff_hz: f64) {
        self.cutoff_hz = cutoff_hz;
    }

    /// Queue capacity used from the next start on
    pub fn set_queue_capacity(&mut self, capacity: usize) {
        self.queue_capacity = capacity;
    }

    pub fn phase(&self) -> FusionPhase {
        self.phase
    }

    /// Register sensors for `mode` and start draining readings.
    ///
    /// An active consumer is stopped first. Fails with
    /// [`TelemetryError::NoSensors`] if a sensor the primary azimuth needs is
    /// unavailable; comparison-only sensors are optional.
    pub fn start(&mut self, mode: SensorMode) -> TelemetryResult<()> {
        self.stop();
        self.orientation.set_use_gyroscope(mode.use_gyroscope);
        self.orientation.clear_filtered();

        let queue = SampleQueue::new(self.queue_capacity);
        let producer = queue.clone();
        self.source.on_sample(Box::new(move |event| {
            producer.push(event);
        }));

        let mut registered = Vec::new();
        for kind in mode.kinds() {
            if self.source.register_interest(kind) {
                registered.push(kind);
            } else {
                warn!("No {} sensor available", kind);
            }
        }
        if !mode.primary_kinds().iter().all(|k| registered.contains(k)) {
            self.source.unregister_all();
            queue.close();
            return Err(TelemetryError::NoSensors);
        }

        let consumer = queue.clone();
        let mut fusion = Fusion::new(
            self.orientation.clone(),
            self.cutoff_hz,
            self.observer.clone(),
        );
        self.worker = Some(thread::spawn(move || {
            while let Some(event) = consumer.pop() {
                fusion.process(&event);
            }
            debug!("Fusion worker drained, exiting");
        }));
        self.queue = Some(queue);
        self.phase = FusionPhase::Active(mode);
        info!("Fusion active with sensors {:?}", registered);
        Ok(())
    }

    /// Switch sensor registrations without losing the straight-ahead reference.
    ///
    /// The low-pass filter starts over under the new mode.
    pub fn reconfigure(&mut self, mode: SensorMode) -> TelemetryResult<()> {
        if self.phase == FusionPhase::Active(mode) {
            return Ok(());
        }
        self.start(mode)
    }

    /// Unregister every sensor and wait for the worker to drain. Idempotent.
    pub fn stop(&mut self) {
        let Some(queue) = self.queue.take() else {
            return;
        };
        self.source.unregister_all();
        queue.close();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Fusion worker panicked");
            }
        }
        let evicted = queue.evicted();
        if evicted > 0 {
            debug!(
                "Fusion stopped after dropping {} stale readings (capacity {}, {} left queued)",
                evicted,
                queue.capacity(),
                queue.len()
            );
        }
        self.phase = FusionPhase::Idle;
        info!("Fusion idle");
    }
}

impl<S: SensorSource> Drop for FusionConsumer<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
