//! Batches - what producers send and what the aggregator publishes.

use alloc::string::String;
use alloc::vec::Vec;

use crate::{Level, SchemaVersion, StatusReport};

/// A batch of status reports from one producer.
///
/// The batch carries a single timestamp for all of its reports. A timestamp
/// of `0` means the producer did not set one; the aggregator still accepts
/// such batches but warns about them.
///
/// # Example
///
/// ```rust
/// use healthtree_types::{Level, ReportBatch};
///
/// let batch = ReportBatch::builder()
///     .timestamp_ms(1703160000000)
///     .report("motor_1", Level::Ok, "Spinning")
///     .report_with("battery", Level::Warn, "Low", |r| r.with_value("charge", "12%"))
///     .build();
///
/// assert_eq!(batch.len(), 2);
/// assert!(batch.has_timestamp());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct ReportBatch {
    /// Schema version for forward compatibility.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(0))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds, `0` when unset.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: u64,

    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(2))]
    pub reports: Vec<StatusReport>,
}

impl ReportBatch {
    /// Create an empty batch with the given timestamp.
    pub fn with_timestamp(timestamp_ms: u64) -> Self {
        Self {
            version: SchemaVersion::current(),
            timestamp_ms,
            reports: Vec::new(),
        }
    }

    /// Create a builder for constructing batches.
    pub fn builder() -> ReportBatchBuilder {
        ReportBatchBuilder::new()
    }

    /// True when the producer set a timestamp.
    pub fn has_timestamp(&self) -> bool {
        self.timestamp_ms != 0
    }

    /// Check if the batch carries no reports.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Number of reports in the batch.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Iterate over the reports.
    pub fn iter(&self) -> impl Iterator<Item = &StatusReport> {
        self.reports.iter()
    }
}

/// Builder for constructing `ReportBatch` instances.
#[derive(Debug, Default)]
pub struct ReportBatchBuilder {
    timestamp_ms: Option<u64>,
    reports: Vec<StatusReport>,
}

impl ReportBatchBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a specific timestamp (milliseconds since Unix epoch).
    pub fn timestamp_ms(mut self, ts: u64) -> Self {
        self.timestamp_ms = Some(ts);
        self
    }

    /// Add a report without attributes.
    pub fn report(mut self, name: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        self.reports.push(StatusReport::new(name, level, message));
        self
    }

    /// Add a report and decorate it with a closure.
    pub fn report_with<F>(
        mut self,
        name: impl Into<String>,
        level: Level,
        message: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: FnOnce(StatusReport) -> StatusReport,
    {
        self.reports.push(f(StatusReport::new(name, level, message)));
        self
    }

    /// Add a pre-built report.
    pub fn status(mut self, report: StatusReport) -> Self {
        self.reports.push(report);
        self
    }

    /// Build the batch, stamping it with the current time if no timestamp was set.
    #[cfg(feature = "std")]
    pub fn build(self) -> ReportBatch {
        ReportBatch {
            version: SchemaVersion::current(),
            timestamp_ms: self.timestamp_ms.unwrap_or_else(current_timestamp_ms),
            reports: self.reports,
        }
    }

    /// Build the batch (for no_std, an unset timestamp stays `0`).
    #[cfg(not(feature = "std"))]
    pub fn build(self) -> ReportBatch {
        ReportBatch {
            version: SchemaVersion::current(),
            timestamp_ms: self.timestamp_ms.unwrap_or(0),
            reports: self.reports,
        }
    }
}

/// The aggregated tree published once per tick.
///
/// `statuses` holds every node of the tree in output order: each group or
/// analyzer header is followed by its subtree.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct AggregatedBatch {
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(0))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds when the tree was computed.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: u64,

    #[cfg_attr(feature = "minicbor", n(2))]
    pub statuses: Vec<StatusReport>,
}

impl AggregatedBatch {
    /// Create a batch from already computed nodes.
    pub fn new(timestamp_ms: u64, statuses: Vec<StatusReport>) -> Self {
        Self {
            version: SchemaVersion::current(),
            timestamp_ms,
            statuses,
        }
    }

    /// Find a node by its full path.
    pub fn get(&self, name: &str) -> Option<&StatusReport> {
        self.statuses.iter().find(|s| s.name == name)
    }

    /// Names of all nodes, in output order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.statuses.iter().map(|s| s.name.as_str())
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// Check if the batch holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
#[cfg(feature = "std")]
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
