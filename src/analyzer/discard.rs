//! Analyzer that swallows the items it matches.

use std::time::Instant;

use healthtree_types::StatusReport;

use super::{join_path, Analyzer, MatchRules, StatusItem};
use crate::config::GenericConfig;
use crate::error::AnalyzerError;

/// Claims items with the generic rules and drops them.
///
/// Keeps known-noisy sources out of the catch-all without showing them
/// anywhere in the tree.
#[derive(Debug)]
pub struct DiscardAnalyzer {
    config: GenericConfig,
    rules: Option<MatchRules>,
    path: String,
    name: String,
}

impl DiscardAnalyzer {
    pub fn new(config: GenericConfig) -> Self {
        Self {
            config,
            rules: None,
            path: String::new(),
            name: String::new(),
        }
    }
}

impl Analyzer for DiscardAnalyzer {
    fn init(&mut self, parent_path: &str) -> Result<(), AnalyzerError> {
        let segment = self.config.path.trim_matches('/');
        if segment.is_empty() {
            return Err(AnalyzerError::MissingPath);
        }
        let path = join_path(parent_path, segment);
        if self.rules.is_some() {
            return Err(AnalyzerError::AlreadyInitialized(path));
        }

        self.rules = Some(MatchRules::compile(&path, &self.config)?);
        self.name = segment.to_string();
        self.path = path;
        Ok(())
    }

    fn matches(&self, name: &str) -> bool {
        self.rules.as_ref().is_some_and(|r| r.matches(name))
    }

    fn analyze(&mut self, _item: &StatusItem) -> bool {
        self.rules.is_some()
    }

    fn report(&mut self, _now: Instant) -> Vec<StatusReport> {
        Vec::new()
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthtree_types::Level;

    #[test]
    fn claims_but_reports_nothing() {
        let mut noise = DiscardAnalyzer::new(GenericConfig {
            contains: vec!["debug".into()],
            ..GenericConfig::new("Noise")
        });
        noise.init("/Robot").unwrap();
        let now = Instant::now();

        assert_eq!(noise.path(), "/Robot/Noise");
        assert!(noise.matches("cam debug"));
        assert!(!noise.matches("cam"));
        let item = StatusItem::new(&StatusReport::new("cam debug", Level::Error, "x"), now);
        assert!(noise.analyze(&item));
        assert!(noise.report(now).is_empty());
    }

    #[test]
    fn init_twice_fails() {
        let mut noise = DiscardAnalyzer::new(GenericConfig {
            name: vec!["x".into()],
            ..GenericConfig::new("Noise")
        });
        noise.init("/").unwrap();
        assert!(matches!(
            noise.init("/"),
            Err(AnalyzerError::AlreadyInitialized(_))
        ));
    }
}
