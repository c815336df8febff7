use std::sync::Mutex;

use log::{debug, info, warn};
use telemetry::{AzimuthUpdate, StatusUpdate, TelemetryObserver};

/// Console stand-in for the phone UI: logs status changes and keeps the
/// latest readout.
#[derive(Default)]
pub struct LoggingObserver {
    status: Mutex<Option<StatusUpdate>>,
    latest: Mutex<Option<AzimuthUpdate>>,
}

impl LoggingObserver {
    pub fn status(&self) -> Option<StatusUpdate> {
        self.status.lock().ok()?.clone()
    }

    pub fn latest(&self) -> Option<AzimuthUpdate> {
        *self.latest.lock().ok()?
    }
}

impl TelemetryObserver for LoggingObserver {
    fn on_status(&self, update: &StatusUpdate) {
        if update.status.is_error() {
            warn!("{} [{}]", update.text(), update.button_label());
        } else {
            info!("{} [{}]", update.text(), update.button_label());
        }
        if let Ok(mut status) = self.status.lock() {
            *status = Some(update.clone());
        }
    }

    fn on_azimuth(&self, update: &AzimuthUpdate) {
        debug!(
            "Steering {:+.1}° (compass only {:+.1}°)",
            update.degrees(),
            update.azimuth_without_gyro.to_degrees()
        );
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(*update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use telemetry::{ButtonLabel, LinkStatus};

    #[test]
    fn test_keeps_latest_updates() {
        let observer = LoggingObserver::default();
        assert!(observer.status().is_none());

        observer.on_status(&StatusUpdate::new(LinkStatus::Sending, ButtonLabel::StopSending));
        observer.on_status(&StatusUpdate::new(LinkStatus::PortUnreachable, ButtonLabel::StopSending));
        assert_eq!(observer.status().unwrap().status, LinkStatus::PortUnreachable);

        observer.on_azimuth(&AzimuthUpdate {
            timestamp: Instant::now(),
            azimuth: 0.25,
            azimuth_without_gyro: 0.0,
        });
        assert_eq!(observer.latest().unwrap().azimuth, 0.25);
    }
}
