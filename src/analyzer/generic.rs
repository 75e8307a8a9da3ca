//! Rule-driven analyzer.

use std::time::Instant;

use healthtree_types::StatusReport;

use super::{join_path, Analyzer, AnalyzerCore, MatchRules, StatusItem};
use crate::config::GenericConfig;
use crate::error::AnalyzerError;

/// Aggregates every item claimed by its [`MatchRules`].
///
/// ```
/// use std::time::Instant;
/// use healthtree::analyzer::{Analyzer, GenericAnalyzer, StatusItem};
/// use healthtree::config::GenericConfig;
/// use healthtree_types::{Level, StatusReport};
///
/// let mut motors = GenericAnalyzer::new(GenericConfig {
///     startswith: vec!["motor_".into()],
///     ..GenericConfig::new("Motors")
/// });
/// motors.init("/Robot").unwrap();
///
/// let now = Instant::now();
/// let report = StatusReport::new("motor_1", Level::Warn, "Hot");
/// assert!(motors.matches("motor_1"));
/// motors.analyze(&StatusItem::new(&report, now));
///
/// let nodes = motors.report(now);
/// assert_eq!(nodes[0].name, "/Robot/Motors");
/// assert_eq!(nodes[0].level, Level::Warn);
/// assert_eq!(nodes[1].name, "/Robot/Motors/motor_1");
/// ```
#[derive(Debug)]
pub struct GenericAnalyzer {
    config: GenericConfig,
    rules: Option<MatchRules>,
    core: AnalyzerCore,
}

impl GenericAnalyzer {
    pub fn new(config: GenericConfig) -> Self {
        Self {
            config,
            rules: None,
            core: AnalyzerCore::new(),
        }
    }

    /// Number of items currently held.
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

impl Analyzer for GenericAnalyzer {
    fn init(&mut self, parent_path: &str) -> Result<(), AnalyzerError> {
        let segment = self.config.path.trim_matches('/');
        if segment.is_empty() {
            return Err(AnalyzerError::MissingPath);
        }
        let path = join_path(parent_path, segment);
        if self.core.is_initialized() {
            return Err(AnalyzerError::AlreadyInitialized(path));
        }

        let rules = MatchRules::compile(&path, &self.config)?;
        self.core.init(
            path,
            segment,
            self.config.timeout,
            self.config.num_items,
            self.config.discard_stale,
        )?;

        let now = Instant::now();
        for name in rules.expected() {
            let mut item = StatusItem::missing(name.clone(), now);
            item.set_output_name(rules.output_name(name));
            self.core.add_item(item);
        }
        self.rules = Some(rules);
        Ok(())
    }

    fn matches(&self, name: &str) -> bool {
        self.rules.as_ref().is_some_and(|r| r.matches(name))
    }

    fn analyze(&mut self, item: &StatusItem) -> bool {
        match &self.rules {
            Some(rules) => {
                let output_name = rules.output_name(item.name()).to_string();
                let mut item = item.clone();
                item.set_output_name(output_name);
                self.core.analyze(&item)
            }
            None => self.core.analyze(item),
        }
    }

    fn report(&mut self, now: Instant) -> Vec<StatusReport> {
        self.core.report(now)
    }

    fn path(&self) -> &str {
        self.core.path()
    }

    fn name(&self) -> &str {
        self.core.name()
    }
}
