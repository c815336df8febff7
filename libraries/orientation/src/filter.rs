use std::time::Instant;

use crate::angle::{low_pass_step, normalize_radians, CUTOFF_DISABLED_HZ};

/// Output and time of the previous low-pass step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterState {
    /// Previous filtered angle in radians
    pub previous_output: f64,

    /// When the previous step ran
    pub previous_step: Instant,
}

/// First-order low-pass filter over an angle in radians.
///
/// `dt` is taken from the timestamps passed to [`LowPassFilter::step`], so a
/// stall between steps weights the new angle more heavily.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    cutoff_hz: f64,
    state: Option<FilterState>,
}

impl LowPassFilter {
    pub fn new(cutoff_hz: f64) -> Self {
        Self {
            cutoff_hz,
            state: None,
        }
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    pub fn is_enabled(&self) -> bool {
        self.cutoff_hz > CUTOFF_DISABLED_HZ
    }

    /// Filter `raw` observed at `now`. The first step passes the angle through.
    pub fn step(&mut self, raw: f64, now: Instant) -> f64 {
        let output = match self.state {
            Some(previous) => {
                let dt = now.saturating_duration_since(previous.previous_step).as_secs_f64();
                low_pass_step(raw, previous.previous_output, dt, self.cutoff_hz)
            }
            None => normalize_radians(raw),
        };
        self.state = Some(FilterState {
            previous_output: output,
            previous_step: now,
        });
        output
    }
}
