//! Composite analyzer.

use std::time::Instant;

use healthtree_types::{KeyValue, Level, StatusReport};
use tracing::error;

use super::{build, join_path, root_path, Analyzer, StatusItem};
use crate::config::GroupConfig;
use crate::error::AnalyzerError;

/// Header message of a group none of whose children has anything to show.
pub const NO_ANALYZERS_MESSAGE: &str = "No analyzers";

/// Identity of a child within its group, stable across other removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildId(u64);

/// Ordered children with first-match routing.
#[derive(Debug)]
pub struct AnalyzerGroup {
    segment: String,
    path: String,
    name: String,
    initialized: bool,
    warned_uninitialized: bool,
    next_id: u64,
    children: Vec<(ChildId, Box<dyn Analyzer>)>,
}

impl AnalyzerGroup {
    /// Empty, uninitialized group with the given path segment.
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            path: String::new(),
            name: String::new(),
            initialized: false,
            warned_uninitialized: false,
            next_id: 0,
            children: Vec::new(),
        }
    }

    /// The initialized root of a tree.
    pub fn root(base_path: &str) -> Self {
        let path = root_path(base_path);
        let name = base_path.trim_matches('/');
        Self {
            name: if name.is_empty() { path.clone() } else { name.to_string() },
            path,
            initialized: true,
            ..Self::new(base_path)
        }
    }

    /// Build a nested group and its children, all uninitialized.
    pub fn from_config(config: &GroupConfig) -> Result<Self, AnalyzerError> {
        if config.analyzers.is_empty() {
            return Err(AnalyzerError::EmptyGroup(config.path.clone()));
        }

        let mut group = Self::new(config.path.clone());
        for child in &config.analyzers {
            group.add_child(build(child)?);
        }
        Ok(group)
    }

    /// Append a child. Children added after [`init`](Analyzer::init) must
    /// already be initialized.
    pub fn add_child(&mut self, child: Box<dyn Analyzer>) -> ChildId {
        let id = ChildId(self.next_id);
        self.next_id += 1;
        self.children.push((id, child));
        id
    }

    /// Detach a child by identity. Unknown ids are ignored.
    pub fn remove_child(&mut self, id: ChildId) -> Option<Box<dyn Analyzer>> {
        let index = self.children.iter().position(|(child, _)| *child == id)?;
        Some(self.children.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Analyzer for AnalyzerGroup {
    fn init(&mut self, parent_path: &str) -> Result<(), AnalyzerError> {
        let segment = self.segment.trim_matches('/');
        if segment.is_empty() {
            return Err(AnalyzerError::MissingPath);
        }
        let path = join_path(parent_path, segment);
        if self.initialized {
            return Err(AnalyzerError::AlreadyInitialized(path));
        }

        for (_, child) in &mut self.children {
            child.init(&path)?;
        }
        self.name = segment.to_string();
        self.path = path;
        self.initialized = true;
        Ok(())
    }

    fn matches(&self, name: &str) -> bool {
        self.children.iter().any(|(_, child)| child.matches(name))
    }

    fn analyze(&mut self, item: &StatusItem) -> bool {
        self.children
            .iter_mut()
            .find(|(_, child)| child.matches(item.name()))
            .is_some_and(|(_, child)| child.analyze(item))
    }

    /// The header summarizes child headers only, never their leaves.
    fn report(&mut self, now: Instant) -> Vec<StatusReport> {
        if !self.initialized {
            if !self.warned_uninitialized {
                self.warned_uninitialized = true;
                error!(group = %self.segment, "Analyzer group reported before init()");
            }
            return Vec::new();
        }

        let mut header = StatusReport::new(self.path.clone(), Level::Ok, "");
        let mut nodes = vec![];
        let mut reporting = 0;
        let mut all_stale = true;

        for (_, child) in &mut self.children {
            let out = child.report(now);
            let Some(child_header) = out.first() else {
                continue;
            };

            reporting += 1;
            header.level = header.level.max(child_header.level);
            all_stale = all_stale && child_header.level == Level::Stale;
            header.values.push(KeyValue::new(
                child.name().to_string(),
                child_header.message.clone(),
            ));
            nodes.extend(out);
        }

        if reporting == 0 {
            header.message = NO_ANALYZERS_MESSAGE.to_string();
        } else {
            if !all_stale && header.level == Level::Stale {
                header.level = Level::Error;
            }
            header.message = header.level.summary().to_string();
        }

        nodes.insert(0, header);
        nodes
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }
}
