//! Monitoring of how far event timestamps lag behind the local clock.

use std::time::{SystemTime, UNIX_EPOCH};

use healthtree_types::{Level, StatusReport};
use parking_lot::Mutex;

use crate::task::{add_value, summary, StatusTask};

/// Accepted delay range, in seconds, between an event's timestamp and the
/// moment it is ticked. Negative delays are timestamps from the future.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStampParams {
    pub min_acceptable: f64,
    pub max_acceptable: f64,
}

impl Default for TimeStampParams {
    fn default() -> Self {
        Self {
            min_acceptable: -1.0,
            max_acceptable: 5.0,
        }
    }
}

#[derive(Debug, Default)]
struct DelayState {
    early_count: u64,
    late_count: u64,
    zero_count: u64,
    zero_seen: bool,
    min_delta: f64,
    max_delta: f64,
    deltas_valid: bool,
}

/// Checks the timestamps of events against the local clock.
///
/// Delays seen since the previous update are judged on each update and then
/// forgotten, so a problem is reported once unless it persists. Running
/// totals of early, late and zero timestamps are kept as values.
#[derive(Debug)]
pub struct TimeStampStatus {
    name: String,
    params: TimeStampParams,
    state: Mutex<DelayState>,
}

impl TimeStampStatus {
    pub fn new(params: TimeStampParams) -> Self {
        Self::named("Timestamp Status", params)
    }

    pub fn named(name: impl Into<String>, params: TimeStampParams) -> Self {
        Self {
            name: name.into(),
            params,
            state: Mutex::new(DelayState::default()),
        }
    }

    /// Record an event stamped at `stamp`. The Unix epoch counts as unset.
    pub fn tick(&self, stamp: SystemTime) {
        self.tick_at(stamp, SystemTime::now());
    }

    /// Record an event stamped with a millisecond Unix timestamp.
    pub fn tick_ms(&self, stamp_ms: u64) {
        self.tick(UNIX_EPOCH + std::time::Duration::from_millis(stamp_ms));
    }

    fn tick_at(&self, stamp: SystemTime, now: SystemTime) {
        let mut state = self.state.lock();
        if stamp == UNIX_EPOCH {
            state.zero_seen = true;
            return;
        }

        let delta = match now.duration_since(stamp) {
            Ok(behind) => behind.as_secs_f64(),
            Err(ahead) => -ahead.duration().as_secs_f64(),
        };
        if !state.deltas_valid || delta > state.max_delta {
            state.max_delta = delta;
        }
        if !state.deltas_valid || delta < state.min_delta {
            state.min_delta = delta;
        }
        state.deltas_valid = true;
    }
}

impl Default for TimeStampStatus {
    fn default() -> Self {
        Self::new(TimeStampParams::default())
    }
}

impl StatusTask for TimeStampStatus {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, report: &mut StatusReport) {
        let mut state = self.state.lock();

        // Later checks win: zero over late over early.
        summary(report, Level::Ok, "Timestamps are reasonable.");
        if !state.deltas_valid {
            summary(report, Level::Warn, "No data since last update.");
        } else {
            if state.min_delta < self.params.min_acceptable {
                summary(report, Level::Error, "Timestamps too far in future seen.");
                state.early_count += 1;
            }
            if state.max_delta > self.params.max_acceptable {
                summary(report, Level::Error, "Timestamps too far in past seen.");
                state.late_count += 1;
            }
            if state.zero_seen {
                summary(report, Level::Error, "Zero timestamp seen.");
                state.zero_count += 1;
            }
        }

        add_value(report, "Earliest timestamp delay:", format!("{:.6}", state.min_delta));
        add_value(report, "Latest timestamp delay:", format!("{:.6}", state.max_delta));
        add_value(
            report,
            "Earliest acceptable timestamp delay:",
            format!("{:.6}", self.params.min_acceptable),
        );
        add_value(
            report,
            "Latest acceptable timestamp delay:",
            format!("{:.6}", self.params.max_acceptable),
        );
        add_value(report, "Late diagnostic update count:", state.late_count.to_string());
        add_value(report, "Early diagnostic update count:", state.early_count.to_string());
        add_value(report, "Zero seen diagnostic update count:", state.zero_count.to_string());

        state.deltas_valid = false;
        state.min_delta = 0.0;
        state.max_delta = 0.0;
        state.zero_seen = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run(status: &TimeStampStatus) -> StatusReport {
        let mut report = StatusReport::new(status.name(), Level::Ok, "");
        status.run(&mut report);
        report
    }

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn nothing_ticked_is_a_warning() {
        let report = run(&TimeStampStatus::default());
        assert_eq!(report.name, "Timestamp Status");
        assert_eq!(report.level, Level::Warn);
        assert_eq!(report.message, "No data since last update.");
    }

    #[test]
    fn small_delays_are_reasonable() {
        let status = TimeStampStatus::default();
        status.tick_at(now() - Duration::from_millis(500), now());
        status.tick_at(now() + Duration::from_millis(250), now());

        let report = run(&status);
        assert_eq!(report.level, Level::Ok);
        assert_eq!(report.message, "Timestamps are reasonable.");
        assert_eq!(report.value("Earliest timestamp delay:"), Some("-0.250000"));
        assert_eq!(report.value("Latest timestamp delay:"), Some("0.500000"));
    }

    #[test]
    fn future_timestamps_are_errors() {
        let status = TimeStampStatus::default();
        status.tick_at(now() + Duration::from_secs(2), now());

        let report = run(&status);
        assert_eq!(report.level, Level::Error);
        assert_eq!(report.message, "Timestamps too far in future seen.");
        assert_eq!(report.value("Early diagnostic update count:"), Some("1"));
    }

    #[test]
    fn late_timestamps_win_over_early_ones() {
        let status = TimeStampStatus::default();
        status.tick_at(now() + Duration::from_secs(2), now());
        status.tick_at(now() - Duration::from_secs(10), now());

        let report = run(&status);
        assert_eq!(report.message, "Timestamps too far in past seen.");
        assert_eq!(report.value("Early diagnostic update count:"), Some("1"));
        assert_eq!(report.value("Late diagnostic update count:"), Some("1"));
    }

    #[test]
    fn zero_timestamp_is_reported_with_valid_deltas() {
        let status = TimeStampStatus::default();
        status.tick_ms(0);
        status.tick_at(now(), now());

        let report = run(&status);
        assert_eq!(report.level, Level::Error);
        assert_eq!(report.message, "Zero timestamp seen.");
        assert_eq!(report.value("Zero seen diagnostic update count:"), Some("1"));
    }

    #[test]
    fn each_update_starts_fresh_but_keeps_tallies() {
        let status = TimeStampStatus::default();
        status.tick_at(now() - Duration::from_secs(10), now());
        assert_eq!(run(&status).message, "Timestamps too far in past seen.");

        let report = run(&status);
        assert_eq!(report.message, "No data since last update.");
        assert_eq!(report.value("Latest timestamp delay:"), Some("0.000000"));
        assert_eq!(report.value("Late diagnostic update count:"), Some("1"));
    }
}
