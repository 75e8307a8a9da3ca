//! The analyzer tree.
//!
//! Every node of the tree implements [`Analyzer`]. Leaves are rule-driven
//! ([`GenericAnalyzer`], [`DiscardAnalyzer`]) or the catch-all
//! [`OtherAnalyzer`]; inner nodes are [`AnalyzerGroup`]s that route each item
//! to their first matching child and summarize their children's headers.
//!
//! Analyzers are built from configuration in an uninitialized state and get
//! their full path from [`Analyzer::init`] once their parent is known.

mod base;
mod discard;
mod generic;
mod group;
mod item;
mod other;
mod rules;

use std::fmt;
use std::time::Instant;

use healthtree_types::StatusReport;

use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;

pub use base::AnalyzerCore;
pub use discard::DiscardAnalyzer;
pub use generic::GenericAnalyzer;
pub use group::{AnalyzerGroup, ChildId, NO_ANALYZERS_MESSAGE};
pub use item::{StatusItem, MISSING_MESSAGE, STALE_MESSAGE};
pub use other::OtherAnalyzer;
pub use rules::MatchRules;

/// One node of the analyzer tree.
pub trait Analyzer: Send + fmt::Debug {
    /// Resolve the configured path segment under `parent_path` and finish
    /// setup. Fails if called twice or if the configuration is invalid.
    fn init(&mut self, parent_path: &str) -> Result<(), AnalyzerError>;

    /// True if this analyzer claims items with the given report name.
    fn matches(&self, name: &str) -> bool;

    /// Take ownership of an item's latest state.
    ///
    /// Returns false if the item was not stored, for example because the
    /// analyzer was never initialized.
    fn analyze(&mut self, item: &StatusItem) -> bool;

    /// Output nodes at `now`: the header first, then the subtree.
    ///
    /// An empty result means the analyzer has nothing to show.
    fn report(&mut self, now: Instant) -> Vec<StatusReport>;

    /// Full path of the header node.
    fn path(&self) -> &str;

    /// Display name used in the parent's header values.
    fn name(&self) -> &str;
}

/// Build an uninitialized analyzer from its configuration.
pub fn build(config: &AnalyzerConfig) -> Result<Box<dyn Analyzer>, AnalyzerError> {
    Ok(match config {
        AnalyzerConfig::Generic(c) => Box::new(GenericAnalyzer::new(c.clone())),
        AnalyzerConfig::Discard(c) => Box::new(DiscardAnalyzer::new(c.clone())),
        AnalyzerConfig::Group(c) => Box::new(AnalyzerGroup::from_config(c)?),
    })
}

/// Path of the root group for a base path: `""` → `"/"`, `"Robot"` → `"/Robot"`.
pub fn root_path(base_path: &str) -> String {
    format!("/{}", base_path.trim_matches('/'))
}

/// Join a child segment onto a parent path without doubling slashes.
pub fn join_path(parent: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        parent.trim_end_matches('/'),
        segment.trim_matches('/')
    )
}
