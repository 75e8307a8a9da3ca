//! The aggregator: one analyzer tree shared by ingestion, publication and
//! dynamic registration.
//!
//! All three paths lock the whole tree for the duration of one traversal
//! and release it before any I/O happens.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use healthtree_types::{current_timestamp_ms, AggregatedBatch, Level, ReportBatch, StatusReport};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyzer::{self, Analyzer, AnalyzerGroup, ChildId, OtherAnalyzer, StatusItem};
use crate::config::{AggregatorConfig, AnalyzerConfig, GroupConfig};
use crate::error::{ConfigError, RegistrationError};
use crate::session::SessionWatch;

/// Request to add a group of analyzers at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Registration key; also the group path segment unless `path` is set.
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub analyzers: Vec<AnalyzerConfig>,
}

impl RegistrationRequest {
    pub fn new(namespace: impl Into<String>, analyzers: Vec<AnalyzerConfig>) -> Self {
        Self {
            namespace: namespace.into(),
            path: None,
            analyzers,
        }
    }

    /// Publish the group under a path segment other than the namespace.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Outcome of a registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub success: bool,
    pub message: String,
}

impl RegistrationResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Everything published on one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Root group tree followed by the catch-all tree.
    pub batch: AggregatedBatch,
    /// One-node summary of the whole system, named by the root path.
    pub toplevel: StatusReport,
}

/// Distinct warning texts remembered for deduplication.
const MAX_WARNINGS: usize = 256;

/// Report names quoted in the missing-timestamp warning.
const MAX_WARNING_NAMES: usize = 8;

#[derive(Debug)]
struct AnalyzerTree {
    root: AnalyzerGroup,
    other: OtherAnalyzer,
    registrations: HashMap<String, ChildId>,
    warnings: BTreeSet<String>,
}

impl AnalyzerTree {
    /// Log a warning the first time its exact text is seen.
    ///
    /// Once `MAX_WARNINGS` texts are remembered, new ones only go to debug.
    fn warn_once(&mut self, message: String) {
        if self.warnings.contains(&message) {
            return;
        }
        if self.warnings.len() >= MAX_WARNINGS {
            debug!("{}", message);
            return;
        }
        warn!("{}", message);
        self.warnings.insert(message);
    }

    /// Deliver an item to exactly one analyzer.
    fn route(&mut self, item: &StatusItem) -> bool {
        if self.root.matches(item.name()) && self.root.analyze(item) {
            return true;
        }
        self.other.analyze(item)
    }
}

/// Owns the analyzer tree and every operation on it.
///
/// # Example
///
/// ```rust
/// use healthtree::{Aggregator, AggregatorConfig};
/// use healthtree_types::{Level, ReportBatch};
///
/// let config = AggregatorConfig::from_toml(r#"
///     base_path = "Robot"
///
///     [[analyzers]]
///     type = "generic"
///     path = "Motors"
///     startswith = "motor_"
/// "#).unwrap();
/// let aggregator = Aggregator::new(config).unwrap();
///
/// aggregator.ingest(&ReportBatch::builder()
///     .report("motor_1", Level::Warn, "Hot")
///     .report("arm_3", Level::Ok, "Idle")
///     .build());
///
/// let publication = aggregator.publish_tick();
/// assert_eq!(publication.toplevel.name, "/Robot");
/// assert_eq!(publication.toplevel.level, Level::Warn);
/// assert!(publication.batch.get("/Robot/Motors/motor_1").is_some());
/// assert!(publication.batch.get("/Robot/Other/arm_3").is_some());
/// ```
#[derive(Debug)]
pub struct Aggregator {
    tree: Mutex<AnalyzerTree>,
    root_path: String,
    publish_interval: Duration,
    running: AtomicBool,
}

impl Aggregator {
    /// Build the static tree. Any invalid analyzer aborts construction.
    pub fn new(config: AggregatorConfig) -> Result<Self, ConfigError> {
        let publish_interval = config.publish_interval()?;

        let mut root = AnalyzerGroup::root(&config.base_path);
        for analyzer_config in &config.analyzers {
            let mut child = analyzer::build(analyzer_config)?;
            child.init(root.path())?;
            root.add_child(child);
        }

        let mut other = OtherAnalyzer::new(
            config.other_path.clone(),
            config.other_timeout,
            config.other_as_errors,
        );
        other.init(root.path())?;

        let root_path = root.path().to_string();
        info!(
            root = %root_path,
            analyzers = config.analyzers.len(),
            catch_all = %other.path(),
            "Analyzer tree built"
        );

        Ok(Self {
            tree: Mutex::new(AnalyzerTree {
                root,
                other,
                registrations: HashMap::new(),
                warnings: BTreeSet::new(),
            }),
            root_path,
            publish_interval,
            running: AtomicBool::new(true),
        })
    }

    /// Route every report of a batch, stamped with the current instant.
    pub fn ingest(&self, batch: &ReportBatch) {
        self.ingest_at(batch, Instant::now());
    }

    /// Route every report of a batch as if it arrived at `now`.
    ///
    /// A missing batch timestamp and empty report names produce
    /// deduplicated warnings; the remaining reports are still routed.
    pub fn ingest_at(&self, batch: &ReportBatch, now: Instant) {
        if !self.is_running() {
            debug!(reports = batch.len(), "Ignoring batch after shutdown");
            return;
        }

        let mut tree = self.tree.lock();
        if !batch.has_timestamp() {
            tree.warn_once(format!(
                "No timestamp set for status batch. Report names: {}",
                quoted_names(batch)
            ));
        }

        for report in batch.iter() {
            if report.name.is_empty() {
                tree.warn_once("Dropping status report with an empty name".to_string());
                continue;
            }
            tree.route(&StatusItem::new(report, now));
        }
    }

    /// Log `message` unless the same text was already logged.
    pub fn warn_once(&self, message: impl Into<String>) {
        self.tree.lock().warn_once(message.into());
    }

    /// Add a registration's group under the root, without a liveness session.
    ///
    /// The tree is left untouched on any error.
    pub fn add_analyzers(&self, request: &RegistrationRequest) -> Result<ChildId, RegistrationError> {
        if !self.is_running() {
            return Err(RegistrationError::ShutDown);
        }
        let namespace = request.namespace.trim();
        if namespace.is_empty() {
            return Err(RegistrationError::EmptyNamespace);
        }

        let mut group = AnalyzerGroup::from_config(&GroupConfig {
            path: request.path.clone().unwrap_or_else(|| namespace.to_string()),
            analyzers: request.analyzers.clone(),
        })?;
        group.init(&self.root_path)?;

        let mut tree = self.tree.lock();
        if tree.registrations.contains_key(namespace) {
            return Err(RegistrationError::DuplicateNamespace(namespace.to_string()));
        }
        let path = group.path().to_string();
        let id = tree.root.add_child(Box::new(group));
        tree.registrations.insert(namespace.to_string(), id);
        drop(tree);

        info!(namespace, path = %path, "Registered analyzers");
        Ok(id)
    }

    /// Add a registration that lives as long as its liveness session.
    ///
    /// Spawns a task on the current tokio runtime that removes the group once
    /// `watch` resolves.
    pub fn register(self: &Arc<Self>, request: RegistrationRequest, watch: SessionWatch) -> RegistrationResponse {
        let id = match self.add_analyzers(&request) {
            Ok(id) => id,
            Err(e) => {
                warn!(namespace = %request.namespace, error = %e, "Registration failed");
                return RegistrationResponse::failed(e.to_string());
            }
        };

        let namespace = request.namespace.trim().to_string();
        let aggregator = Arc::downgrade(self);
        let task_namespace = namespace.clone();
        tokio::spawn(async move {
            watch.ended().await;
            if let Some(aggregator) = aggregator.upgrade() {
                aggregator.remove_registration(&task_namespace, id);
            }
        });

        RegistrationResponse::ok(format!("Added analyzers under namespace {}", namespace))
    }

    /// Detach a registration's group and every item it held.
    ///
    /// Returns false if nothing is registered under `namespace`.
    pub fn remove_analyzers(&self, namespace: &str) -> bool {
        let mut tree = self.tree.lock();
        let Some(id) = tree.registrations.remove(namespace) else {
            return false;
        };
        tree.root.remove_child(id);
        drop(tree);

        info!(namespace, "Removed analyzers");
        true
    }

    /// Remove only if `namespace` still maps to the group `id`.
    fn remove_registration(&self, namespace: &str, id: ChildId) -> bool {
        let mut tree = self.tree.lock();
        if tree.registrations.get(namespace) != Some(&id) {
            debug!(namespace, "Session ended for a registration that is already gone");
            return false;
        }
        tree.registrations.remove(namespace);
        tree.root.remove_child(id);
        drop(tree);

        info!(namespace, "Session ended, removed analyzers");
        true
    }

    /// Compute the publication for the current instant.
    pub fn publish_tick(&self) -> Publication {
        self.publish_at(Instant::now())
    }

    /// Compute the publication as seen at `now`.
    pub fn publish_at(&self, now: Instant) -> Publication {
        let mut tree = self.tree.lock();
        let mut statuses = tree.root.report(now);
        let other = tree.other.report(now);
        drop(tree);

        let toplevel = summarize(&self.root_path, statuses.first(), other.first());
        statuses.extend(other);

        Publication {
            batch: AggregatedBatch::new(current_timestamp_ms(), statuses),
            toplevel,
        }
    }

    /// Stop accepting batches and registrations. The publisher exits on its
    /// next tick.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!(root = %self.root_path, "Aggregator shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Distinct warning texts emitted so far, sorted.
    pub fn warnings(&self) -> Vec<String> {
        self.tree.lock().warnings.iter().cloned().collect()
    }

    /// Namespaces with a live registration, sorted.
    pub fn registrations(&self) -> Vec<String> {
        let mut namespaces: Vec<_> = self.tree.lock().registrations.keys().cloned().collect();
        namespaces.sort();
        namespaces
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn publish_interval(&self) -> Duration {
        self.publish_interval
    }
}

/// First few report names of a batch, with a count of the rest.
fn quoted_names(batch: &ReportBatch) -> String {
    let mut names = batch
        .iter()
        .take(MAX_WARNING_NAMES)
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if batch.len() > MAX_WARNING_NAMES {
        names.push_str(&format!(" and {} more", batch.len() - MAX_WARNING_NAMES));
    }
    names
}

/// Top-level node over the root and catch-all headers.
fn summarize(name: &str, root: Option<&StatusReport>, other: Option<&StatusReport>) -> StatusReport {
    let headers: Vec<&StatusReport> = root.into_iter().chain(other).collect();

    let mut level = headers.iter().map(|h| h.level).max().unwrap_or_default();
    let all_stale = headers.iter().all(|h| h.level == Level::Stale);
    if level == Level::Stale && !all_stale {
        level = Level::Error;
    }

    StatusReport::new(name, level, level.summary())
}
