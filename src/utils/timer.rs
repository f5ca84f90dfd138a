//! Timer utilities
//!
//! Provides timing and measurement helpers.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Monotonic timer that also remembers its wall-clock start
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    started_at: DateTime<Utc>,
    label: String,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            started_at: Utc::now(),
            label: label.into(),
        }
    }

    /// Wall-clock time the timer was started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::debug!("{}: {}ms", self.label, elapsed.as_millis());
        elapsed
    }
}

/// Stopwatch with lap timing, used for run phases
#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
    laps: Vec<(String, Duration)>,
}

impl Stopwatch {
    /// Create a new stopwatch
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            laps: Vec::new(),
        }
    }

    /// Record a lap
    pub fn lap(&mut self, label: impl Into<String>) {
        let elapsed = self.start.elapsed();
        self.laps.push((label.into(), elapsed));
    }

    /// Get total elapsed time
    pub fn total(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get lap times (duration of each lap, not cumulative)
    pub fn lap_times(&self) -> Vec<(String, Duration)> {
        let mut prev = Duration::ZERO;
        self.laps
            .iter()
            .map(|(label, cumulative)| {
                let lap_time = *cumulative - prev;
                prev = *cumulative;
                (label.clone(), lap_time)
            })
            .collect()
    }

    /// Format laps on one line, e.g. `launch=3ms wait=812ms total=815ms`
    pub fn format(&self) -> String {
        let mut parts: Vec<String> = self
            .lap_times()
            .into_iter()
            .map(|(label, duration)| format!("{}={}ms", label, duration.as_millis()))
            .collect();
        parts.push(format!("total={}ms", self.total().as_millis()));
        parts.join(" ")
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
