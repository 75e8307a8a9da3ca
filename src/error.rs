//! Error types for analyzer construction, registration and configuration.

use thiserror::Error;

/// Errors raised while building or initializing an analyzer.
///
/// These are configuration errors: they abort startup, or fail a dynamic
/// registration request without touching the running tree.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// `init` was called on an analyzer that is already initialized.
    #[error("Analyzer already initialized: {0}")]
    AlreadyInitialized(String),

    /// The analyzer has no path segment.
    #[error("Analyzer path must not be empty")]
    MissingPath,

    /// A generic analyzer has no rule that could ever claim a report.
    #[error("Analyzer {0} has no matching rules (name, startswith, contains, expected, regex or find_and_remove_prefix)")]
    NoMatchRules(String),

    /// A regular expression rule failed to compile.
    #[error("Invalid regex {pattern:?} in analyzer {path}: {source}")]
    InvalidRegex {
        path: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A group was configured without any analyzers.
    #[error("Analyzer group {0} has no analyzers")]
    EmptyGroup(String),
}

/// Errors returned by dynamic registration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The registration namespace is empty.
    #[error("Registration namespace must not be empty")]
    EmptyNamespace,

    /// Another live registration already uses this namespace.
    #[error("Namespace already registered: {0}")]
    DuplicateNamespace(String),

    /// The supplied rule set is malformed.
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    /// The aggregator has been shut down.
    #[error("Aggregator is shut down")]
    ShutDown,
}

/// Errors raised while loading the static configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration source could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The publish rate must be a positive number of Hz.
    #[error("Publish rate must be positive, got {0}")]
    InvalidRate(f64),

    /// The initial rule set is malformed.
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}
