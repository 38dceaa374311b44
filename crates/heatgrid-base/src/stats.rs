//! Run statistics

use std::time::Duration;

/// Communication latency of a report in seconds, never negative
///
/// `now - detection_start - propagation`, with skewed clocks (or NaN)
/// clamped to 0.
pub fn report_latency(now: f64, detection_start: f64, propagation: Duration) -> f64 {
    let raw = now - detection_start - propagation.as_secs_f64();
    if raw > 0.0 {
        raw
    } else {
        0.0
    }
}

/// Accumulated over every accepted report
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunStatistics {
    pub shortest: Option<f64>,
    pub longest: f64,
    pub total: f64,
    pub reports: u64,
    pub true_alerts: u64,
    pub false_alerts: u64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, latency: f64, matched: bool) {
        self.shortest = Some(self.shortest.map_or(latency, |s| s.min(latency)));
        self.longest = self.longest.max(latency);
        self.total += latency;
        self.reports += 1;
        if matched {
            self.true_alerts += 1;
        } else {
            self.false_alerts += 1;
        }
    }

    /// Mean latency, `None` when no report was received
    pub fn average(&self) -> Option<f64> {
        (self.reports > 0).then(|| self.total / self.reports as f64)
    }
}
