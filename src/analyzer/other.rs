//! Catch-all for items no configured analyzer claims.

use std::time::Instant;

use healthtree_types::{Level, StatusReport};

use super::{join_path, Analyzer, AnalyzerCore, StatusItem};
use crate::error::AnalyzerError;

/// Claims every name. Queried only after the root group declined an item.
///
/// The catch-all never discards items and has no expected count. It shows
/// nothing until the first unclaimed item arrives.
#[derive(Debug)]
pub struct OtherAnalyzer {
    segment: String,
    timeout: f64,
    as_errors: bool,
    core: AnalyzerCore,
}

impl OtherAnalyzer {
    /// `timeout` in seconds; `as_errors` raises the header to at least error
    /// whenever the catch-all holds items.
    pub fn new(segment: impl Into<String>, timeout: f64, as_errors: bool) -> Self {
        Self {
            segment: segment.into(),
            timeout,
            as_errors,
            core: AnalyzerCore::new(),
        }
    }

    /// Number of unclaimed items held.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.core.contains(name)
    }
}

impl Analyzer for OtherAnalyzer {
    fn init(&mut self, parent_path: &str) -> Result<(), AnalyzerError> {
        let segment = self.segment.trim_matches('/');
        if segment.is_empty() {
            return Err(AnalyzerError::MissingPath);
        }
        self.core.init(
            join_path(parent_path, segment),
            segment,
            self.timeout,
            -1,
            false,
        )
    }

    fn matches(&self, _name: &str) -> bool {
        true
    }

    fn analyze(&mut self, item: &StatusItem) -> bool {
        self.core.analyze(item)
    }

    fn report(&mut self, now: Instant) -> Vec<StatusReport> {
        if self.core.is_empty() {
            return Vec::new();
        }

        let mut nodes = self.core.report(now);
        if self.as_errors {
            if let Some(header) = nodes.first_mut() {
                header.level = header.level.max(Level::Error);
                header.message = format!("Unanalyzed items found in \"{}\"", self.core.name());
            }
        }
        nodes
    }

    fn path(&self) -> &str {
        self.core.path()
    }

    fn name(&self) -> &str {
        self.core.name()
    }
}
