//! Status reports - one named health observation.

use alloc::string::String;
use alloc::vec::Vec;

use crate::Level;

/// A key/value attribute attached to a status report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct KeyValue {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub key: String,

    #[cfg_attr(feature = "minicbor", n(1))]
    pub value: String,
}

impl KeyValue {
    /// Create a new attribute.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A single named health observation.
///
/// Producers send these inside a [`ReportBatch`](crate::ReportBatch); the
/// aggregator emits the same shape for every node of its output tree.
///
/// # Example
///
/// ```rust
/// use healthtree_types::{Level, StatusReport};
///
/// let report = StatusReport::new("motor_1", Level::Warn, "Running hot")
///     .with_value("temperature", "81.5")
///     .with_hardware_id("drive-0");
///
/// assert_eq!(report.value("temperature"), Some("81.5"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct StatusReport {
    /// Report name. Inbound: the producer's source name. Outbound: the full
    /// tree path of the node.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub name: String,

    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(1))]
    pub level: Level,

    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(2))]
    pub message: String,

    /// Identifier of the hardware this report is about, if any.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "String::is_empty")
    )]
    #[cfg_attr(feature = "minicbor", n(3))]
    pub hardware_id: String,

    /// Free-form attributes, in producer order.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    #[cfg_attr(feature = "minicbor", n(4))]
    pub values: Vec<KeyValue>,
}

impl StatusReport {
    /// Create a report with no attributes.
    pub fn new(name: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level,
            message: message.into(),
            hardware_id: String::new(),
            values: Vec::new(),
        }
    }

    /// Append an attribute.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.push(KeyValue::new(key, value));
        self
    }

    /// Set the hardware id.
    pub fn with_hardware_id(mut self, hardware_id: impl Into<String>) -> Self {
        self.hardware_id = hardware_id.into();
        self
    }

    /// Look up the first attribute with the given key.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }
}
