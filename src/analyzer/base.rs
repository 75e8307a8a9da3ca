//! Item store and report algorithm shared by rule-driven analyzers.
//!
//! [`AnalyzerCore`] holds the state of one analyzer node: its resolved path,
//! stale timeout, expected item count and the map of items it owns. Both
//! [`GenericAnalyzer`](super::GenericAnalyzer) and
//! [`OtherAnalyzer`](super::OtherAnalyzer) delegate to it and only differ in
//! which names they claim.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use healthtree_types::{KeyValue, Level, StatusReport};
use tracing::{error, warn};

use super::StatusItem;
use crate::error::AnalyzerError;

/// State of one analyzer node.
#[derive(Debug, Default)]
pub struct AnalyzerCore {
    path: String,
    name: String,
    timeout: Option<Duration>,
    expected: Option<usize>,
    discard_stale: bool,
    initialized: bool,
    warned_uninitialized: bool,
    items: BTreeMap<String, StatusItem>,
}

impl AnalyzerCore {
    /// Create an uninitialized core. It refuses items until [`init`](Self::init).
    pub fn new() -> Self {
        Self::default()
    }

    /// One-time setup.
    ///
    /// `timeout <= 0` disables staleness, `expected < 0` disables the item
    /// count check. Discarding stale items needs a timeout; without one it
    /// is turned off with a warning.
    pub fn init(
        &mut self,
        path: impl Into<String>,
        name: impl Into<String>,
        timeout: f64,
        expected: i32,
        discard_stale: bool,
    ) -> Result<(), AnalyzerError> {
        let path = path.into();
        if self.initialized {
            return Err(AnalyzerError::AlreadyInitialized(path));
        }

        self.timeout = if timeout > 0.0 {
            Duration::try_from_secs_f64(timeout).ok()
        } else {
            None
        };
        self.expected = usize::try_from(expected).ok();
        self.discard_stale = discard_stale;
        if discard_stale && self.timeout.is_none() {
            warn!(
                analyzer = %path,
                "Cannot discard stale items if no timeout specified. No items will be discarded"
            );
            self.discard_stale = false;
        }

        self.path = path;
        self.name = name.into();
        self.initialized = true;
        Ok(())
    }

    /// Store an item, overwriting any previous one with the same name.
    ///
    /// Returns false, without storing, if the core was never initialized.
    pub fn analyze(&mut self, item: &StatusItem) -> bool {
        if !self.initialized {
            self.warn_uninitialized("analyze");
            return false;
        }

        match self.items.get_mut(item.name()) {
            Some(existing) => existing.update_from(item),
            None => {
                self.items.insert(item.name().to_string(), item.clone());
            }
        }
        true
    }

    /// Seed an item that was never reported (expected names).
    pub fn add_item(&mut self, item: StatusItem) {
        self.items.insert(item.name().to_string(), item);
    }

    /// Produce the header node followed by one node per owned item.
    ///
    /// Stale items are dropped for good when `discard_stale` is set. The
    /// header is stale only if every remaining item is; partial staleness
    /// reports as an error instead.
    pub fn report(&mut self, now: Instant) -> Vec<StatusReport> {
        if !self.initialized {
            self.warn_uninitialized("report");
            return Vec::new();
        }

        let timeout = self.timeout;
        let discard_stale = self.discard_stale;
        let is_stale = |item: &StatusItem| timeout.is_some_and(|t| item.is_stale(t, now));
        if discard_stale {
            self.items.retain(|_, item| !is_stale(item));
        }

        let mut header = StatusReport::new(self.path.clone(), Level::Ok, Level::Ok.summary());
        let mut nodes = Vec::with_capacity(self.items.len() + 1);
        let mut all_stale = !self.items.is_empty();

        for (name, item) in &self.items {
            let stale = is_stale(item);
            let level = item.level();

            header.level = header.level.max(level);
            if stale {
                header.level = Level::Stale;
            }
            header
                .values
                .push(KeyValue::new(name.clone(), item.message().to_string()));
            all_stale = all_stale && (stale || level == Level::Stale);

            nodes.push(item.to_report_node(&self.path, stale));
        }

        if all_stale {
            header.level = Level::Stale;
        } else if header.level == Level::Stale {
            header.level = Level::Error;
        }
        header.message = header.level.summary().to_string();

        let found = self.items.len();
        match self.expected {
            Some(0) if found == 0 => {
                header.level = Level::Ok;
                header.message = Level::Ok.summary().to_string();
            }
            Some(expected) if expected > 0 && found != expected => {
                header.level = header.level.max(Level::Error);
                header.message = if found == 0 {
                    format!("No items found, expected {}", expected)
                } else {
                    format!("Expected {}, found {}", expected, found)
                };
            }
            _ => {}
        }

        nodes.insert(0, header);
        nodes
    }

    fn warn_uninitialized(&mut self, operation: &str) {
        if !self.warned_uninitialized {
            self.warned_uninitialized = true;
            error!(
                operation,
                "Analyzer used without being initialized; init() must be called first"
            );
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True if the one-time "not initialized" diagnostic has been emitted.
    pub fn has_warned(&self) -> bool {
        self.warned_uninitialized
    }

    /// Effective discard policy after init.
    pub fn discard_stale(&self) -> bool {
        self.discard_stale
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, level: Level, at: Instant) -> StatusItem {
        StatusItem::new(&StatusReport::new(name, level, level.summary()), at)
    }

    fn core(timeout: f64, expected: i32, discard: bool) -> AnalyzerCore {
        let mut core = AnalyzerCore::new();
        core.init("/Robot/Motors", "Motors", timeout, expected, discard)
            .unwrap();
        core
    }

    #[test]
    fn init_twice_fails() {
        let mut core = core(5.0, -1, false);
        let err = core.init("/x", "x", 5.0, -1, false).unwrap_err();
        assert!(matches!(err, AnalyzerError::AlreadyInitialized(_)));
        assert_eq!(core.path(), "/Robot/Motors");
    }

    #[test]
    fn discard_without_timeout_is_disabled() {
        let core = core(0.0, -1, true);
        assert!(!core.discard_stale());
        assert!(core.timeout().is_none());
    }

    #[test]
    fn uninitialized_refuses_items_and_reports_nothing() {
        let mut core = AnalyzerCore::new();
        let now = Instant::now();

        assert!(!core.analyze(&item("a", Level::Ok, now)));
        assert!(core.has_warned());
        assert!(core.report(now).is_empty());
        assert!(core.is_empty());
    }

    #[test]
    fn header_is_max_of_items_without_timeout() {
        let mut core = core(0.0, -1, false);
        let now = Instant::now();
        core.analyze(&item("a", Level::Ok, now));
        core.analyze(&item("b", Level::Warn, now));
        core.analyze(&item("c", Level::Ok, now));

        let out = core.report(now + Duration::from_secs(3600));
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].name, "/Robot/Motors");
        assert_eq!(out[0].level, Level::Warn);
        assert_eq!(out[0].message, "Warning");
        assert_eq!(out[1].name, "/Robot/Motors/a");
    }

    #[test]
    fn header_lists_item_messages() {
        let mut core = core(0.0, -1, false);
        let now = Instant::now();
        core.analyze(&item("a", Level::Error, now));

        let out = core.report(now);
        assert_eq!(out[0].value("a"), Some("Error"));
    }

    #[test]
    fn same_name_overwrites() {
        let mut core = core(0.0, -1, false);
        let now = Instant::now();
        core.analyze(&item("a", Level::Error, now));
        core.analyze(&item("a", Level::Ok, now));

        assert_eq!(core.len(), 1);
        assert_eq!(core.report(now)[0].level, Level::Ok);
    }

    #[test]
    fn partial_staleness_reports_error() {
        let mut core = core(5.0, -1, false);
        let t = Instant::now();
        core.analyze(&item("fresh", Level::Error, t + Duration::from_secs(9)));
        core.analyze(&item("old", Level::Ok, t));

        let out = core.report(t + Duration::from_secs(10));
        assert_eq!(out[0].level, Level::Error);
        let old = out.iter().find(|n| n.name.ends_with("/old")).unwrap();
        assert_eq!(old.level, Level::Stale);
    }

    #[test]
    fn total_staleness_reports_stale() {
        let mut core = core(5.0, -1, false);
        let t = Instant::now();
        core.analyze(&item("a", Level::Ok, t));
        core.analyze(&item("b", Level::Warn, t));

        let out = core.report(t + Duration::from_secs(6));
        assert_eq!(out[0].level, Level::Stale);
        assert_eq!(out[0].message, "Stale");
    }

    #[test]
    fn reported_stale_level_counts_as_stale() {
        let mut core = core(0.0, -1, false);
        let now = Instant::now();
        core.analyze(&item("a", Level::Stale, now));

        assert_eq!(core.report(now)[0].level, Level::Stale);
    }

    #[test]
    fn staleness_boundary_in_report() {
        let mut core = core(5.0, -1, false);
        let t = Instant::now();
        core.analyze(&item("a", Level::Ok, t));

        assert_eq!(core.report(t + Duration::from_millis(4900))[0].level, Level::Ok);
        assert_eq!(core.report(t + Duration::from_millis(5100))[0].level, Level::Stale);
    }

    #[test]
    fn discard_stale_removes_items_permanently() {
        let mut core = core(5.0, -1, true);
        let t = Instant::now();
        core.analyze(&item("old", Level::Ok, t));
        core.analyze(&item("fresh", Level::Ok, t + Duration::from_secs(8)));

        let out = core.report(t + Duration::from_secs(10));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].level, Level::Ok);
        assert!(!core.contains("old"));

        let again = core.report(t + Duration::from_secs(10));
        assert_eq!(out, again);
    }

    #[test]
    fn report_is_idempotent_without_new_data() {
        let mut core = core(5.0, -1, false);
        let t = Instant::now();
        core.analyze(&item("a", Level::Warn, t));
        core.analyze(&item("b", Level::Ok, t));

        let now = t + Duration::from_secs(1);
        assert_eq!(core.report(now), core.report(now));
    }

    #[test]
    fn empty_core_without_expectation_is_ok() {
        let mut core = core(5.0, -1, false);
        let out = core.report(Instant::now());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].level, Level::Ok);
        assert_eq!(out[0].message, "OK");
    }

    #[test]
    fn no_items_with_expectation() {
        let mut core = core(0.0, 2, false);
        let out = core.report(Instant::now());

        assert_eq!(out[0].level, Level::Error);
        assert_eq!(out[0].message, "No items found, expected 2");
    }

    #[test]
    fn count_mismatch_with_items() {
        let mut core = core(0.0, 2, false);
        let now = Instant::now();
        core.analyze(&item("a", Level::Ok, now));

        let out = core.report(now);
        assert_eq!(out[0].level, Level::Error);
        assert_eq!(out[0].message, "Expected 2, found 1");

        core.analyze(&item("b", Level::Ok, now));
        let out = core.report(now);
        assert_eq!(out[0].level, Level::Ok);
        assert_eq!(out[0].message, "OK");
    }

    #[test]
    fn count_mismatch_never_lowers_stale_header() {
        let mut core = core(5.0, 3, false);
        let t = Instant::now();
        core.analyze(&item("a", Level::Ok, t));

        let out = core.report(t + Duration::from_secs(6));
        assert_eq!(out[0].level, Level::Stale);
        assert_eq!(out[0].message, "Expected 3, found 1");
    }

    #[test]
    fn zero_expected_and_zero_found_is_ok() {
        let mut core = core(0.0, 0, false);
        let out = core.report(Instant::now());
        assert_eq!(out[0].level, Level::Ok);
        assert_eq!(out[0].message, "OK");
    }

    #[test]
    fn count_uses_items_left_after_discard() {
        let mut core = core(5.0, 1, true);
        let t = Instant::now();
        core.analyze(&item("a", Level::Ok, t));

        let out = core.report(t + Duration::from_secs(6));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].message, "No items found, expected 1");
    }
}
