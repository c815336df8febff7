use std::f64::consts::TAU;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hal::{SampleListener, SensorEvent, SensorKind, SensorSource, Vector3d};
use log::{debug, info};
use orientation::angle::normalize_radians;
use orientation::rotation::{flat_rotation_vector, STANDARD_GRAVITY};

use crate::config::SimulationConfig;

/// Horizontal and vertical geomagnetic field components in μT
const FIELD_HORIZONTAL: f64 = 20.0;
const FIELD_VERTICAL: f64 = -45.0;

enum SimulatorCommand {
    Stop,
}

#[derive(Default)]
struct Shared {
    registered: Mutex<Vec<SensorKind>>,
    listener: Mutex<Option<SampleListener>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Compass heading of a phone lying flat on the handlebar `t` seconds into the ride
pub fn steering_profile(settings: &SimulationConfig, t: f64) -> f64 {
    let heading = settings.heading_deg.to_radians();
    let amplitude = settings.amplitude_deg.to_radians();
    let phase = if settings.period_secs > 0.0 {
        TAU * t / settings.period_secs
    } else {
        0.0
    };
    normalize_radians(heading + amplitude * phase.sin())
}

/// Reading a flat phone facing `azimuth` would report for `kind`
pub fn reading(kind: SensorKind, azimuth: f64) -> Vector3d {
    let values = match kind {
        SensorKind::RotationVector => flat_rotation_vector(azimuth),
        SensorKind::Accelerometer => nalgebra::Vector3::new(0.0, 0.0, STANDARD_GRAVITY),
        SensorKind::MagneticField => nalgebra::Vector3::new(
            -FIELD_HORIZONTAL * azimuth.sin(),
            FIELD_HORIZONTAL * azimuth.cos(),
            FIELD_VERTICAL,
        ),
    };
    values.cast::<f32>()
}

/// Sensor source replaying a sinusoidal steering profile on its own thread.
///
/// The thread runs while at least one sensor is registered and delivers one
/// reading per registered kind every tick.
pub struct SimulatedSensors {
    settings: SimulationConfig,
    shared: Arc<Shared>,
    to_worker_tx: Option<mpsc::Sender<SimulatorCommand>>,
    worker_thread: Option<JoinHandle<()>>,
}

impl SimulatedSensors {
    pub fn new(settings: SimulationConfig) -> Self {
        Self {
            settings,
            shared: Arc::new(Shared::default()),
            to_worker_tx: None,
            worker_thread: None,
        }
    }

    pub fn is_available(&self, kind: SensorKind) -> bool {
        kind != SensorKind::RotationVector || self.settings.has_gyroscope
    }

    fn ensure_running(&mut self) {
        if self.worker_thread.is_some() {
            return;
        }
        let (to_worker_tx, to_worker_rx) = mpsc::channel();
        let shared = self.shared.clone();
        let settings = self.settings.clone();
        self.worker_thread = Some(thread::spawn(move || run(shared, settings, to_worker_rx)));
        self.to_worker_tx = Some(to_worker_tx);
        info!("Sensor simulation started at {} Hz", self.settings.rate_hz);
    }

    fn halt(&mut self) {
        if let Some(tx) = self.to_worker_tx.take() {
            let _ = tx.send(SimulatorCommand::Stop);
        }
        if let Some(handle) = self.worker_thread.take() {
            let _ = handle.join();
            info!("Sensor simulation stopped");
        }
    }
}

fn run(shared: Arc<Shared>, settings: SimulationConfig, to_worker_rx: mpsc::Receiver<SimulatorCommand>) {
    let tick = Duration::from_secs_f64(1.0 / settings.rate_hz.max(1.0));
    let started = Instant::now();
    let mut ticks: u64 = 0;

    loop {
        let now = Instant::now();
        let azimuth = steering_profile(&settings, now.duration_since(started).as_secs_f64());
        let kinds = lock(&shared.registered).clone();
        if let Some(listener) = lock(&shared.listener).as_mut() {
            for kind in kinds {
                listener(SensorEvent::new(kind, reading(kind, azimuth), now));
            }
        }
        ticks += 1;

        match to_worker_rx.recv_timeout(tick) {
            Ok(SimulatorCommand::Stop) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
    }
    debug!("Simulation thread exiting after {} ticks", ticks);
}

impl SensorSource for SimulatedSensors {
    fn register_interest(&mut self, kind: SensorKind) -> bool {
        if !self.is_available(kind) {
            return false;
        }
        {
            let mut registered = lock(&self.shared.registered);
            if !registered.contains(&kind) {
                registered.push(kind);
            }
        }
        self.ensure_running();
        true
    }

    fn unregister_all(&mut self) {
        lock(&self.shared.registered).clear();
        self.halt();
    }

    fn on_sample(&mut self, listener: SampleListener) {
        *lock(&self.shared.listener) = Some(listener);
    }
}

impl Drop for SimulatedSensors {
    fn drop(&mut self) {
        self.halt();
    }
}
