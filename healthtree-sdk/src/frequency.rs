//! Event frequency monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use healthtree_types::{Level, StatusReport};
use parking_lot::Mutex;

use crate::task::{add_value, summary, StatusTask};

/// Acceptable frequency band for a [`FrequencyStatus`].
///
/// The measured frequency is accepted between `min_freq * (1 - tolerance)`
/// and `max_freq * (1 + tolerance)`. Without a maximum there is no upper
/// bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyParams {
    pub min_freq: f64,
    pub max_freq: Option<f64>,
    pub tolerance: f64,
    /// Number of updates the measurement window spans.
    pub window_size: usize,
}

impl FrequencyParams {
    pub fn new(min_freq: f64, max_freq: f64) -> Self {
        Self {
            min_freq,
            max_freq: Some(max_freq),
            ..Self::default()
        }
    }

    /// Accept anything at or above `min_freq`.
    pub fn at_least(min_freq: f64) -> Self {
        Self {
            min_freq,
            ..Self::default()
        }
    }

    /// Target a single frequency.
    pub fn exactly(freq: f64) -> Self {
        Self::new(freq, freq)
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    fn min_acceptable(&self) -> f64 {
        self.min_freq * (1.0 - self.tolerance)
    }

    fn max_acceptable(&self) -> Option<f64> {
        self.max_freq.map(|max| max * (1.0 + self.tolerance))
    }
}

impl Default for FrequencyParams {
    fn default() -> Self {
        Self {
            min_freq: 0.0,
            max_freq: None,
            tolerance: 0.1,
            window_size: 5,
        }
    }
}

/// Ring of (instant, event count) samples, one per update.
#[derive(Debug)]
struct History {
    times: Vec<Instant>,
    counts: Vec<u64>,
    index: usize,
}

impl History {
    fn new(window_size: usize, now: Instant) -> Self {
        let slots = window_size.max(1);
        Self {
            times: vec![now; slots],
            counts: vec![0; slots],
            index: 0,
        }
    }
}

/// Monitors how often [`tick`](FrequencyStatus::tick) is called.
///
/// Reports an error when no event happened during the window and a warning
/// when the frequency leaves the accepted band. The window covers the last
/// `window_size` updates.
///
/// # Example
///
/// ```rust
/// use healthtree_sdk::{FrequencyParams, FrequencyStatus, StatusTask};
/// use healthtree_types::{Level, StatusReport};
///
/// let status = FrequencyStatus::new("Scan rate", FrequencyParams::at_least(10.0));
/// let mut report = StatusReport::new(status.name(), Level::Ok, "");
/// status.run(&mut report);
///
/// assert_eq!(report.level, Level::Error);
/// assert_eq!(report.message, "No events recorded.");
/// ```
#[derive(Debug)]
pub struct FrequencyStatus {
    name: String,
    params: FrequencyParams,
    count: AtomicU64,
    history: Mutex<History>,
}

impl FrequencyStatus {
    pub fn new(name: impl Into<String>, params: FrequencyParams) -> Self {
        Self::new_at(name, params, Instant::now())
    }

    fn new_at(name: impl Into<String>, params: FrequencyParams, now: Instant) -> Self {
        Self {
            name: name.into(),
            params,
            count: AtomicU64::new(0),
            history: Mutex::new(History::new(params.window_size, now)),
        }
    }

    /// Record one event.
    pub fn tick(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Events recorded since creation or the last [`clear`](Self::clear).
    pub fn events(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Forget all events and restart the window now.
    pub fn clear(&self) {
        let mut history = self.history.lock();
        self.count.store(0, Ordering::Relaxed);
        *history = History::new(self.params.window_size, Instant::now());
    }

    fn run_at(&self, now: Instant, report: &mut StatusReport) {
        let total = self.events();
        let (events, window) = {
            let mut history = self.history.lock();
            let i = history.index;
            let events = total.saturating_sub(history.counts[i]);
            let window = now.saturating_duration_since(history.times[i]).as_secs_f64();
            history.counts[i] = total;
            history.times[i] = now;
            history.index = (i + 1) % history.times.len();
            (events, window)
        };
        let freq = events as f64 / window;

        let params = &self.params;
        if events == 0 {
            summary(report, Level::Error, "No events recorded.");
        } else if freq < params.min_acceptable() {
            summary(report, Level::Warn, "Frequency too low.");
        } else if params.max_acceptable().is_some_and(|max| freq > max) {
            summary(report, Level::Warn, "Frequency too high.");
        } else {
            summary(report, Level::Ok, "Desired frequency met");
        }

        add_value(report, "Events in window", events.to_string());
        add_value(report, "Events since startup", total.to_string());
        add_value(report, "Duration of window (s)", format!("{:.6}", window));
        add_value(report, "Actual frequency (Hz)", format!("{:.6}", freq));
        if params.max_freq == Some(params.min_freq) {
            add_value(report, "Target frequency (Hz)", format!("{:.6}", params.min_freq));
        }
        if params.min_freq > 0.0 {
            add_value(
                report,
                "Minimum acceptable frequency (Hz)",
                format!("{:.6}", params.min_acceptable()),
            );
        }
        if let Some(max) = params.max_acceptable() {
            add_value(report, "Maximum acceptable frequency (Hz)", format!("{:.6}", max));
        }
    }
}

impl StatusTask for FrequencyStatus {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, report: &mut StatusReport) {
        self.run_at(Instant::now(), report);
    }
}
