//! Last-known state of one named report source.

use std::time::{Duration, Instant};

use healthtree_types::{KeyValue, Level, StatusReport};

/// Message carried by a node that has gone stale.
pub const STALE_MESSAGE: &str = "Stale";

/// Message carried by an expected item that has never reported.
pub const MISSING_MESSAGE: &str = "Missing";

/// The last report received for one source name.
///
/// Items are overwritten in place on every report; no history is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusItem {
    name: String,
    output_name: Option<String>,
    level: Level,
    message: String,
    hardware_id: String,
    values: Vec<KeyValue>,
    last_update: Instant,
}

impl StatusItem {
    /// Build an item from an inbound report received at `now`.
    pub fn new(report: &StatusReport, now: Instant) -> Self {
        Self {
            name: report.name.clone(),
            output_name: None,
            level: report.level,
            message: report.message.clone(),
            hardware_id: report.hardware_id.clone(),
            values: report.values.clone(),
            last_update: now,
        }
    }

    /// Placeholder for an expected source that has not reported yet.
    pub fn missing(name: impl Into<String>, now: Instant) -> Self {
        Self {
            name: name.into(),
            output_name: None,
            level: Level::Stale,
            message: MISSING_MESSAGE.to_string(),
            hardware_id: String::new(),
            values: Vec::new(),
            last_update: now,
        }
    }

    /// Overwrite the stored report and reset the freshness clock.
    pub fn update(&mut self, level: Level, message: String, values: Vec<KeyValue>, now: Instant) {
        self.level = level;
        self.message = message;
        self.values = values;
        self.last_update = now;
    }

    /// Overwrite everything from another item for the same source.
    pub fn update_from(&mut self, other: &StatusItem) {
        self.update(
            other.level,
            other.message.clone(),
            other.values.clone(),
            other.last_update,
        );
        self.hardware_id.clone_from(&other.hardware_id);
        self.output_name.clone_from(&other.output_name);
    }

    /// Name the node is published under, relative to its analyzer path.
    pub fn set_output_name(&mut self, output_name: impl Into<String>) {
        self.output_name = Some(output_name.into());
    }

    /// True if more than `timeout` has passed since the last update.
    ///
    /// Evaluated against the caller's `now`; never cached.
    pub fn is_stale(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_update) > timeout
    }

    /// Render the item as an output node under `prefix`.
    ///
    /// A stale node reports [`Level::Stale`] with [`STALE_MESSAGE`] but keeps
    /// its attributes.
    pub fn to_report_node(&self, prefix: &str, stale: bool) -> StatusReport {
        let (level, message) = if stale {
            (Level::Stale, STALE_MESSAGE.to_string())
        } else {
            (self.level, self.message.clone())
        };

        StatusReport {
            name: format!("{}/{}", prefix, self.output_name()),
            level,
            message,
            hardware_id: self.hardware_id.clone(),
            values: self.values.clone(),
        }
    }

    /// Original report name; the key within its analyzer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used in output nodes.
    pub fn output_name(&self) -> &str {
        self.output_name.as_deref().unwrap_or(&self.name)
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn values(&self) -> &[KeyValue] {
        &self.values
    }

    pub fn last_update(&self) -> Instant {
        self.last_update
    }
}
