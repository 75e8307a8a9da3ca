//! The status task seam and the simplest task.

use std::fmt;

use healthtree_types::{KeyValue, Level, StatusReport};

/// Something that can describe its own health on demand.
///
/// The [`Updater`](crate::Updater) calls [`run`](StatusTask::run) once per
/// interval with a report named after the task, already at [`Level::Ok`]
/// with an empty message. The task sets the summary and appends values.
pub trait StatusTask: Send + Sync + fmt::Debug {
    /// Report name, before any updater prefix.
    fn name(&self) -> &str;

    fn run(&self, report: &mut StatusReport);
}

/// Set the level and message of a report in one go.
pub(crate) fn summary(report: &mut StatusReport, level: Level, message: impl Into<String>) {
    report.level = level;
    report.message = message.into();
}

pub(crate) fn add_value(report: &mut StatusReport, key: &str, value: impl Into<String>) {
    report.values.push(KeyValue::new(key, value));
}

/// Always OK with the message "Alive".
///
/// Useful to let the aggregator mark a producer stale once it stops sending.
#[derive(Debug, Clone, Default)]
pub struct Heartbeat {
    name: String,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::named("Heartbeat")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl StatusTask for Heartbeat {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, report: &mut StatusReport) {
        summary(report, Level::Ok, "Alive");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_is_alive() {
        let heartbeat = Heartbeat::new();
        let mut report = StatusReport::new(heartbeat.name(), Level::Stale, "");
        heartbeat.run(&mut report);

        assert_eq!(report.name, "Heartbeat");
        assert_eq!(report.level, Level::Ok);
        assert_eq!(report.message, "Alive");
        assert!(report.values.is_empty());
    }

    #[test]
    fn heartbeat_can_be_renamed() {
        assert_eq!(Heartbeat::named("Driver alive").name(), "Driver alive");
    }
}
