use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};
use orientation::OrientationState;

use crate::config::{TargetAddress, TelemetryConfig};
use crate::error::{SendError, TelemetryResult};
use crate::link::{Connector, DatagramLink, UdpConnector};
use crate::status::{ButtonLabel, LinkStatus, StatusUpdate, TelemetryObserver};

enum TransmitterCommand {
    Stop,
}

/// Why a session's send loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// `stop()` was requested
    Stopped,
    /// An unclassified send error ended the session
    Failed(String),
}

/// Counters of one transmission session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub sent: u64,
    pub send_failures: u64,
    pub reconnects: u64,
    pub end: SessionEnd,
}

/// Wire payload: one ASCII line of radians with five decimals.
///
/// `"%.5f\n"` for the steering angle alone, `"%.5f,%.5f\n"` when the
/// accelerometer/magnetometer-only angle is attached.
pub fn format_payload(azimuth: f64, without_gyro: Option<f64>) -> String {
    match without_gyro {
        Some(raw) => format!("{:.5},{:.5}\n", azimuth, raw),
        None => format!("{:.5}\n", azimuth),
    }
}

/// Time left to sleep in the current period; zero once the period has overrun
pub fn pacing_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

struct TransmitterWorker<L: DatagramLink> {
    link: L,
    orientation: Arc<OrientationState>,
    observer: Arc<dyn TelemetryObserver>,
    interval: Duration,
    debug_transmit: bool,
    sent: u64,
    send_failures: u64,
    reconnects: u64,
}

impl<L: DatagramLink> TransmitterWorker<L> {
    fn report(&self, status: LinkStatus, button: ButtonLabel) {
        self.observer.on_status(&StatusUpdate::new(status, button));
    }

    /// Filtered steering angle, plus the raw accelerometer/magnetometer angle in debug mode
    fn payload(&self) -> String {
        if self.debug_transmit {
            let (azimuth, without_gyro) = self.orientation.steering_azimuths();
            format_payload(azimuth, Some(without_gyro))
        } else {
            format_payload(self.orientation.steering_azimuth(), None)
        }
    }

    fn run(mut self, to_worker_rx: mpsc::Receiver<TransmitterCommand>) -> SessionSummary {
        self.report(LinkStatus::Sending, ButtonLabel::StopSending);

        let end = loop {
            match to_worker_rx.try_recv() {
                Ok(TransmitterCommand::Stop) | Err(mpsc::TryRecvError::Disconnected) => {
                    break SessionEnd::Stopped;
                }
                Err(mpsc::TryRecvError::Empty) => {}
            }

            let period_start = Instant::now();
            let payload = self.payload();
            match self.link.send(payload.as_bytes()) {
                Ok(()) => self.sent += 1,
                Err(e) => {
                    self.send_failures += 1;
                    if let Some(end) = self.handle_send_error(e) {
                        break end;
                    }
                }
            }

            let delay = pacing_delay(self.interval, period_start.elapsed());
            if !delay.is_zero() {
                match to_worker_rx.recv_timeout(delay) {
                    Ok(TransmitterCommand::Stop) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                        break SessionEnd::Stopped;
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }
            }
        };

        self.link.close();
        self.report(LinkStatus::NotConnected, ButtonLabel::Connect);
        SessionSummary {
            sent: self.sent,
            send_failures: self.send_failures,
            reconnects: self.reconnects,
            end,
        }
    }

    /// Report a failed send and decide whether the session survives it
    fn handle_send_error(&mut self, err: SendError) -> Option<SessionEnd> {
        self.report(LinkStatus::from(&err), ButtonLabel::StopSending);
        if !err.is_recoverable() {
            error!("{}, ending session", err);
            return Some(SessionEnd::Failed(err.to_string()));
        }
        match err {
            SendError::Transient(_) => {
                warn!("{}, reconnecting", err);
                self.reconnects += 1;
                match self.link.reconnect() {
                    Ok(()) => self.report(LinkStatus::Sending, ButtonLabel::StopSending),
                    // keep the send error on display, it explains more than this one
                    Err(e) => warn!("Reconnect failed: {}", e),
                }
                None
            }
            _ => {
                warn!("{}", err);
                None
            }
        }
    }
}

/// Sends the current steering angle to the remote listener at a fixed cadence.
///
/// At most one session runs at a time; starting again stops the previous
/// session first.
pub struct Transmitter<C: Connector = UdpConnector> {
    connector: C,
    target: Option<TargetAddress>,
    to_worker_tx: Option<mpsc::Sender<TransmitterCommand>>,
    worker_thread: Option<JoinHandle<SessionSummary>>,
}

impl Transmitter<UdpConnector> {
    pub fn new() -> Self {
        Self::with_connector(UdpConnector::default())
    }
}

impl Default for Transmitter<UdpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> Transmitter<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            target: None,
            to_worker_tx: None,
            worker_thread: None,
        }
    }

    /// Open a connection to `config.address` and start the send loop.
    ///
    /// Configuration and connection failures are reported to the observer
    /// and returned; the send loop is not entered.
    pub fn start(
        &mut self,
        config: &TelemetryConfig,
        orientation: Arc<OrientationState>,
        observer: Arc<dyn TelemetryObserver>,
    ) -> TelemetryResult<()> {
        self.stop();

        let target = config.validate().inspect_err(|e| {
            error!("Refusing to start transmission: {}", e);
            observer.on_status(&StatusUpdate::new(e.into(), ButtonLabel::Connect));
        })?;
        let link = self.connector.connect(&target).inspect_err(|e| {
            error!("Could not open link to {}: {}", target, e);
            observer.on_status(&StatusUpdate::new(e.into(), ButtonLabel::Connect));
        })?;

        let worker = TransmitterWorker {
            link,
            orientation,
            observer,
            interval: config.interval,
            debug_transmit: config.debug_transmit,
            sent: 0,
            send_failures: 0,
            reconnects: 0,
        };
        let (to_worker_tx, to_worker_rx) = mpsc::channel();
        self.worker_thread = Some(thread::spawn(move || worker.run(to_worker_rx)));
        self.to_worker_tx = Some(to_worker_tx);
        info!(
            "Transmitting to {} every {} ms",
            target,
            config.interval.as_millis()
        );
        self.target = Some(target);
        Ok(())
    }

    /// Stop the send loop and close the connection. Idempotent.
    ///
    /// Returns the session counters if a session was running.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        if let Some(tx) = self.to_worker_tx.take() {
            let _ = tx.send(TransmitterCommand::Stop);
        }
        let handle = self.worker_thread.take()?;
        let target = self.target.take();
        match handle.join() {
            Ok(summary) => {
                info!(
                    "Transmission to {} ended ({:?}): {} sent, {} failed, {} reconnects",
                    target.map(|t| t.to_string()).unwrap_or_default(),
                    summary.end,
                    summary.sent,
                    summary.send_failures,
                    summary.reconnects
                );
                Some(summary)
            }
            Err(_) => {
                error!("Transmitter worker panicked");
                None
            }
        }
    }

    /// Whether a send loop is currently running
    pub fn is_active(&self) -> bool {
        self.worker_thread
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<C: Connector> Drop for Transmitter<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TelemetryError, TransportError};
    use hal::SensorKind;
    use orientation::rotation::flat_rotation_vector;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy)]
    enum Outcome {
        Ok,
        Slow(Duration),
        Transient,
        Security,
        Unreachable,
        Unexpected,
    }

    #[derive(Default)]
    struct LinkLog {
        script: VecDeque<Outcome>,
        sends: Vec<(Instant, String)>,
        connects: usize,
        reconnects: usize,
        closed: usize,
    }

    #[derive(Clone, Default)]
    struct ScriptedConnector {
        log: Arc<Mutex<LinkLog>>,
    }

    impl ScriptedConnector {
        fn with_script(script: &[Outcome]) -> Self {
            let connector = Self::default();
            connector.log.lock().unwrap().script = script.iter().copied().collect();
            connector
        }

        fn sends(&self) -> usize {
            self.log.lock().unwrap().sends.len()
        }
    }

    struct ScriptedLink {
        log: Arc<Mutex<LinkLog>>,
    }

    impl DatagramLink for ScriptedLink {
        fn send(&mut self, payload: &[u8]) -> Result<(), SendError> {
            let outcome = {
                let mut log = self.log.lock().unwrap();
                log.sends
                    .push((Instant::now(), String::from_utf8_lossy(payload).into_owned()));
                log.script.pop_front().unwrap_or(Outcome::Ok)
            };
            match outcome {
                Outcome::Ok => Ok(()),
                Outcome::Slow(d) => {
                    thread::sleep(d);
                    Ok(())
                }
                Outcome::Transient => Err(SendError::classify(io::ErrorKind::BrokenPipe.into())),
                Outcome::Security => {
                    Err(SendError::classify(io::ErrorKind::PermissionDenied.into()))
                }
                Outcome::Unreachable => {
                    Err(SendError::classify(io::ErrorKind::ConnectionRefused.into()))
                }
                Outcome::Unexpected => Err(SendError::Unexpected("scripted".to_string())),
            }
        }

        fn reconnect(&mut self) -> Result<(), TransportError> {
            self.log.lock().unwrap().reconnects += 1;
            Ok(())
        }

        fn close(&mut self) {
            self.log.lock().unwrap().closed += 1;
        }
    }

    impl Connector for ScriptedConnector {
        type Link = ScriptedLink;

        fn connect(&self, _target: &TargetAddress) -> Result<ScriptedLink, TransportError> {
            self.log.lock().unwrap().connects += 1;
            Ok(ScriptedLink {
                log: self.log.clone(),
            })
        }
    }

    #[derive(Default)]
    struct StatusLog {
        updates: Mutex<Vec<StatusUpdate>>,
    }

    impl StatusLog {
        fn statuses(&self) -> Vec<LinkStatus> {
            self.updates
                .lock()
                .unwrap()
                .iter()
                .map(|u| u.status.clone())
                .collect()
        }
    }

    impl TelemetryObserver for StatusLog {
        fn on_status(&self, update: &StatusUpdate) {
            self.updates.lock().unwrap().push(update.clone());
        }
    }

    fn config(interval_ms: u64) -> TelemetryConfig {
        TelemetryConfig {
            address: "127.0.0.1:15007".to_string(),
            interval: Duration::from_millis(interval_ms),
            ..Default::default()
        }
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_format_payload() {
        assert_eq!(format_payload(0.12345, Some(-0.5)), "0.12345,-0.50000\n");
        assert_eq!(format_payload(0.1, None), "0.10000\n");
        assert_eq!(format_payload(-3.14159265, None), "-3.14159\n");
    }

    #[test]
    fn test_pacing_delay_never_negative() {
        let interval = Duration::from_millis(50);
        assert_eq!(
            pacing_delay(interval, Duration::from_millis(10)),
            Duration::from_millis(40)
        );
        assert_eq!(pacing_delay(interval, Duration::from_millis(70)), Duration::ZERO);
    }

    #[test]
    fn test_sends_current_azimuth() {
        let connector = ScriptedConnector::default();
        let orientation = Arc::new(OrientationState::default());
        orientation
            .update(
                SensorKind::RotationVector,
                &flat_rotation_vector(0.25).cast::<f32>(),
            )
            .unwrap();

        let mut transmitter = Transmitter::with_connector(connector.clone());
        transmitter
            .start(&config(5), orientation, Arc::new(StatusLog::default()))
            .unwrap();
        wait_until(|| connector.sends() >= 2);
        transmitter.stop();

        let log = connector.log.lock().unwrap();
        assert_eq!(log.sends[0].1, "0.25000\n");
        assert_eq!(log.closed, 1);
    }

    #[test]
    fn test_debug_payload_carries_both_azimuths() {
        let connector = ScriptedConnector::default();
        let orientation = Arc::new(OrientationState::new(true, false));
        let mut transmitter = Transmitter::with_connector(connector.clone());
        let config = TelemetryConfig {
            debug_transmit: true,
            ..config(5)
        };
        transmitter
            .start(&config, orientation, Arc::new(StatusLog::default()))
            .unwrap();
        wait_until(|| connector.sends() >= 1);
        transmitter.stop();
        assert_eq!(connector.log.lock().unwrap().sends[0].1, "0.00000,0.00000\n");
    }

    #[test]
    fn test_slow_send_skips_sleep() {
        let slow = Outcome::Slow(Duration::from_millis(70));
        let connector = ScriptedConnector::with_script(&[slow, slow, slow]);
        let mut transmitter = Transmitter::with_connector(connector.clone());
        transmitter
            .start(
                &config(50),
                Arc::new(OrientationState::default()),
                Arc::new(StatusLog::default()),
            )
            .unwrap();
        wait_until(|| connector.sends() >= 3);
        transmitter.stop();

        let log = connector.log.lock().unwrap();
        for pair in log.sends.windows(2).take(2) {
            let gap = pair[1].0 - pair[0].0;
            assert!(
                gap >= Duration::from_millis(70) && gap < Duration::from_millis(110),
                "expected the next send right after a 70 ms send, got {gap:?}"
            );
        }
    }

    #[test]
    fn test_transient_failures_reconnect_and_continue() {
        let connector = ScriptedConnector::with_script(&[
            Outcome::Transient,
            Outcome::Transient,
            Outcome::Transient,
        ]);
        let observer = Arc::new(StatusLog::default());
        let mut transmitter = Transmitter::with_connector(connector.clone());
        transmitter
            .start(&config(5), Arc::new(OrientationState::default()), observer.clone())
            .unwrap();
        wait_until(|| connector.sends() >= 5);
        assert!(transmitter.is_active());

        let summary = transmitter.stop().expect("session was running");
        assert_eq!(summary.end, SessionEnd::Stopped);
        assert_eq!(summary.send_failures, 3);
        assert_eq!(summary.reconnects, 3);
        assert!(summary.sent >= 2);

        let log = connector.log.lock().unwrap();
        assert_eq!(log.reconnects, 3);
        assert_eq!(log.connects, 1);
        assert_eq!(log.closed, 1);
        drop(log);

        let statuses = observer.statuses();
        assert!(statuses
            .iter()
            .any(|s| matches!(s, LinkStatus::SendIoError(_))));
        assert_eq!(statuses.last(), Some(&LinkStatus::NotConnected));
        assert!(!transmitter.is_active());
    }

    #[test]
    fn test_security_and_unreachable_do_not_reconnect() {
        let connector =
            ScriptedConnector::with_script(&[Outcome::Security, Outcome::Unreachable]);
        let observer = Arc::new(StatusLog::default());
        let mut transmitter = Transmitter::with_connector(connector.clone());
        transmitter
            .start(&config(5), Arc::new(OrientationState::default()), observer.clone())
            .unwrap();
        wait_until(|| connector.sends() >= 4);
        let summary = transmitter.stop().unwrap();

        assert_eq!(summary.send_failures, 2);
        assert_eq!(summary.reconnects, 0);
        assert_eq!(connector.log.lock().unwrap().reconnects, 0);
        let statuses = observer.statuses();
        assert!(statuses
            .iter()
            .any(|s| matches!(s, LinkStatus::SendSecurityError(_))));
        assert!(statuses.contains(&LinkStatus::PortUnreachable));
    }

    #[test]
    fn test_unexpected_error_ends_session() {
        let connector = ScriptedConnector::with_script(&[Outcome::Ok, Outcome::Unexpected]);
        let observer = Arc::new(StatusLog::default());
        let mut transmitter = Transmitter::with_connector(connector.clone());
        transmitter
            .start(&config(5), Arc::new(OrientationState::default()), observer.clone())
            .unwrap();
        wait_until(|| !transmitter.is_active());

        let summary = transmitter.stop().unwrap();
        assert!(matches!(summary.end, SessionEnd::Failed(_)));
        assert_eq!(summary.sent, 1);
        assert_eq!(connector.sends(), 2);
        assert_eq!(connector.log.lock().unwrap().closed, 1);

        let statuses = observer.statuses();
        assert!(statuses.iter().any(|s| matches!(s, LinkStatus::Unexpected(_))));
        assert_eq!(statuses.last(), Some(&LinkStatus::NotConnected));
    }

    #[test]
    fn test_invalid_address_is_not_sent_to() {
        let connector = ScriptedConnector::default();
        let observer = Arc::new(StatusLog::default());
        let mut transmitter = Transmitter::with_connector(connector.clone());
        let config = TelemetryConfig {
            address: "no-port-here".to_string(),
            ..config(5)
        };
        let result = transmitter.start(
            &config,
            Arc::new(OrientationState::default()),
            observer.clone(),
        );

        assert!(matches!(result, Err(TelemetryError::Config(_))));
        assert!(!transmitter.is_active());
        assert_eq!(connector.log.lock().unwrap().connects, 0);
        assert_eq!(observer.statuses(), vec![LinkStatus::InvalidAddress]);
    }

    #[test]
    fn test_restart_stops_previous_session() {
        let connector = ScriptedConnector::default();
        let mut transmitter = Transmitter::with_connector(connector.clone());
        let orientation = Arc::new(OrientationState::default());
        let observer: Arc<dyn TelemetryObserver> = Arc::new(StatusLog::default());

        transmitter
            .start(&config(5), orientation.clone(), observer.clone())
            .unwrap();
        transmitter.start(&config(5), orientation, observer).unwrap();
        {
            let log = connector.log.lock().unwrap();
            assert_eq!(log.connects, 2);
            assert_eq!(log.closed, 1, "first session must close before the second opens");
        }
        transmitter.stop();
        assert_eq!(connector.log.lock().unwrap().closed, 2);
    }

    #[test]
    fn test_stop_is_prompt_and_idempotent() {
        let connector = ScriptedConnector::default();
        let mut transmitter = Transmitter::with_connector(connector.clone());
        transmitter
            .start(
                &config(10_000),
                Arc::new(OrientationState::default()),
                Arc::new(StatusLog::default()),
            )
            .unwrap();
        wait_until(|| connector.sends() >= 1);

        let started = Instant::now();
        assert!(transmitter.stop().is_some());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(transmitter.stop().is_none());
    }
}
