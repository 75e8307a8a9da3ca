//! Rule-set configuration.
//!
//! The static configuration is a TOML file (plus `HEALTHTREE_*` environment
//! overrides) loaded with the `config` crate. Dynamic registrations carry the
//! same [`AnalyzerConfig`] shape as JSON.
//!
//! ```toml
//! base_path = "Robot"
//! pub_rate = 1.0
//! other_as_errors = false
//!
//! [[analyzers]]
//! type = "generic"
//! path = "Motors"
//! startswith = "motor_"
//! timeout = 5.0
//! num_items = 2
//!
//! [[analyzers]]
//! type = "group"
//! path = "Sensors"
//!
//!   [[analyzers.analyzers]]
//!   type = "generic"
//!   path = "Lidar"
//!   find_and_remove_prefix = "lidar:"
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

/// Environment variable prefix for overrides (`HEALTHTREE_PUB_RATE=2`).
pub const ENV_PREFIX: &str = "HEALTHTREE";

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Namespace root of the whole tree ("Robot" → "/Robot").
    #[serde(default)]
    pub base_path: String,

    /// Publish rate in Hz.
    #[serde(default = "default_pub_rate")]
    pub pub_rate: f64,

    /// Path segment of the catch-all analyzer.
    #[serde(default = "default_other_path")]
    pub other_path: String,

    /// Seconds after which unclaimed items are shown as stale.
    #[serde(default = "default_other_timeout")]
    pub other_timeout: f64,

    /// Raise the catch-all header to error whenever it holds items.
    #[serde(default)]
    pub other_as_errors: bool,

    /// Analyzers of the root group, in routing order.
    #[serde(default)]
    pub analyzers: Vec<AnalyzerConfig>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            pub_rate: default_pub_rate(),
            other_path: default_other_path(),
            other_timeout: default_other_timeout(),
            other_as_errors: false,
            analyzers: Vec::new(),
        }
    }
}

impl AggregatorConfig {
    /// Load from a configuration file, then apply environment overrides.
    ///
    /// The file format is inferred from the extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Self::finish(config)
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let parsed: Self = config.try_deserialize()?;
        parsed.publish_interval()?;
        Ok(parsed)
    }

    /// Interval between publications, derived from `pub_rate`.
    pub fn publish_interval(&self) -> Result<Duration, ConfigError> {
        if !(self.pub_rate > 0.0) {
            return Err(ConfigError::InvalidRate(self.pub_rate));
        }
        Duration::try_from_secs_f64(1.0 / self.pub_rate)
            .map_err(|_| ConfigError::InvalidRate(self.pub_rate))
    }
}

/// One analyzer definition, selected by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalyzerConfig {
    /// Rule-driven analyzer that aggregates the items it claims.
    Generic(GenericConfig),
    /// Claims items with the same rules and drops them silently.
    Discard(GenericConfig),
    /// Nested group of analyzers.
    Group(GroupConfig),
}

impl AnalyzerConfig {
    /// The configured path segment.
    pub fn path(&self) -> &str {
        match self {
            AnalyzerConfig::Generic(c) | AnalyzerConfig::Discard(c) => &c.path,
            AnalyzerConfig::Group(c) => &c.path,
        }
    }
}

/// Settings of a rule-driven analyzer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenericConfig {
    /// Path segment, also used as the display name.
    pub path: String,

    /// Seconds without an update before an item is stale; `<= 0` never.
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Exact number of items expected; negative disables the check.
    #[serde(default = "default_num_items")]
    pub num_items: i32,

    /// Forget items once they go stale.
    #[serde(default)]
    pub discard_stale: bool,

    #[serde(default, deserialize_with = "one_or_many")]
    pub name: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub startswith: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub contains: Vec<String>,

    /// Exact names that are shown as "Missing" until they first report.
    #[serde(default, deserialize_with = "one_or_many")]
    pub expected: Vec<String>,

    /// Whole-name regular expressions.
    #[serde(default, deserialize_with = "one_or_many")]
    pub regex: Vec<String>,

    /// Claims by prefix and strips the prefix from output names.
    #[serde(default, deserialize_with = "one_or_many")]
    pub find_and_remove_prefix: Vec<String>,

    /// Strips the prefix from output names without claiming anything.
    #[serde(default, deserialize_with = "one_or_many")]
    pub remove_prefix: Vec<String>,
}

impl GenericConfig {
    /// Config with only a path; add rules with struct update syntax.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            timeout: default_timeout(),
            num_items: default_num_items(),
            ..Default::default()
        }
    }
}

/// Settings of a nested group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub path: String,

    #[serde(default)]
    pub analyzers: Vec<AnalyzerConfig>,
}

fn default_pub_rate() -> f64 {
    1.0
}

fn default_other_path() -> String {
    "Other".to_string()
}

fn default_other_timeout() -> f64 {
    5.0
}

fn default_timeout() -> f64 {
    5.0
}

fn default_num_items() -> i32 {
    -1
}

/// Accept either a single string or a list of strings.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}
