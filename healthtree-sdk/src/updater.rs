//! The Updater: runs status tasks and emits their reports as batches.

use std::sync::Arc;
use std::time::Duration;

use healthtree_types::{Level, ReportBatch, StatusReport};
use parking_lot::RwLock;

use crate::output::Output;
use crate::task::StatusTask;

type TaskList = Arc<RwLock<Vec<Arc<dyn StatusTask>>>>;

/// Collects reports from registered tasks and periodically emits them.
///
/// # Example
///
/// ```rust,no_run
/// use healthtree_sdk::{Heartbeat, Output, Updater};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let updater = Updater::builder()
///         .name_prefix("lidar")
///         .output(Output::tcp("127.0.0.1:7373"))
///         .interval(Duration::from_secs(1))
///         .build();
///
///     updater.add(Heartbeat::new());
///
///     // Start background emission
///     let handle = updater.start();
///
///     tokio::time::sleep(Duration::from_secs(5)).await;
///     handle.stop();
/// }
/// ```
#[derive(Debug)]
pub struct Updater {
    tasks: TaskList,
    prefix: Option<String>,
    hardware_id: String,
    outputs: Arc<Vec<Output>>,
    interval: Duration,
}

impl Updater {
    /// Create an updater with no outputs and a 1 second interval.
    pub fn new() -> Self {
        UpdaterBuilder::new().build()
    }

    pub fn builder() -> UpdaterBuilder {
        UpdaterBuilder::new()
    }

    /// Add a task and get a shared handle to it.
    ///
    /// Keep the handle to feed the task, e.g. to call
    /// [`FrequencyStatus::tick`](crate::FrequencyStatus::tick).
    pub fn add<T: StatusTask + 'static>(&self, task: T) -> Arc<T> {
        let task = Arc::new(task);
        self.tasks.write().push(task.clone());
        task
    }

    /// Remove every task with this name.
    ///
    /// Returns `true` if at least one task was removed.
    pub fn remove(&self, name: &str) -> bool {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|t| t.name() != name);
        tasks.len() != before
    }

    /// Names of the registered tasks, in insertion order.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.read().iter().map(|t| t.name().to_string()).collect()
    }

    /// Run every task once and build a stamped batch.
    pub fn collect(&self) -> ReportBatch {
        collect(&self.tasks, self.prefix.as_deref(), &self.hardware_id)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start background emission of batches.
    ///
    /// This spawns a tokio task that runs all tasks on every interval and
    /// emits the batch to all configured outputs.
    #[cfg(feature = "tokio")]
    pub fn start(&self) -> EmissionHandle {
        use tokio::sync::watch;

        let (stop_tx, stop_rx) = watch::channel(false);
        let tasks = self.tasks.clone();
        let prefix = self.prefix.clone();
        let hardware_id = self.hardware_id.clone();
        let outputs = self.outputs.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            let mut stop_rx = stop_rx;

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let batch = collect(&tasks, prefix.as_deref(), &hardware_id);
                        for output in outputs.iter() {
                            let _ = output.emit(&batch).await;
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        EmissionHandle { stop_tx, task }
    }

    /// Collect and emit a batch to all outputs immediately.
    #[cfg(feature = "tokio")]
    pub async fn emit_now(&self) -> ReportBatch {
        let batch = self.collect();
        for output in self.outputs.iter() {
            let _ = output.emit(&batch).await;
        }
        batch
    }
}

impl Default for Updater {
    fn default() -> Self {
        Self::new()
    }
}

fn collect(tasks: &TaskList, prefix: Option<&str>, hardware_id: &str) -> ReportBatch {
    // Tasks run outside the list lock so they may take their time.
    let tasks: Vec<_> = tasks.read().clone();

    let mut builder = ReportBatch::builder();
    for task in tasks {
        let name = match prefix {
            Some(prefix) => format!("{}: {}", prefix, task.name()),
            None => task.name().to_string(),
        };
        let mut report = StatusReport::new(name, Level::Ok, "").with_hardware_id(hardware_id);
        task.run(&mut report);
        builder = builder.status(report);
    }
    builder.build()
}

/// Builder for configuring an [`Updater`].
#[derive(Debug, Default)]
pub struct UpdaterBuilder {
    outputs: Vec<Output>,
    interval: Option<Duration>,
    prefix: Option<String>,
    hardware_id: String,
}

impl UpdaterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output destination. Every output receives every batch.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the emission interval. Defaults to 1 second.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Name reports `"<prefix>: <task name>"`, usually with the process name.
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Hardware id stamped on every report.
    pub fn hardware_id(mut self, hardware_id: impl Into<String>) -> Self {
        self.hardware_id = hardware_id.into();
        self
    }

    pub fn build(self) -> Updater {
        Updater {
            tasks: Arc::new(RwLock::new(Vec::new())),
            prefix: self.prefix,
            hardware_id: self.hardware_id,
            outputs: Arc::new(self.outputs),
            interval: self.interval.unwrap_or(Duration::from_secs(1)),
        }
    }
}

/// Handle for controlling background emission.
///
/// Drop this handle to stop emission, or call `stop()` explicitly.
#[cfg(feature = "tokio")]
#[derive(Debug)]
pub struct EmissionHandle {
    stop_tx: tokio::sync::watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "tokio")]
impl EmissionHandle {
    /// Stop background emission.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop background emission and wait for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FrequencyParams, FrequencyStatus, Heartbeat};

    #[test]
    fn collect_runs_tasks_in_order() {
        let updater = Updater::builder()
            .name_prefix("camera")
            .hardware_id("cam-0")
            .build();
        updater.add(Heartbeat::new());
        updater.add(FrequencyStatus::new("Frame rate", FrequencyParams::exactly(30.0)));

        let batch = updater.collect();
        assert!(batch.has_timestamp());
        let names: Vec<_> = batch.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["camera: Heartbeat", "camera: Frame rate"]);
        assert!(batch.iter().all(|r| r.hardware_id == "cam-0"));
        assert_eq!(batch.reports[0].message, "Alive");
        assert_eq!(batch.reports[1].message, "No events recorded.");
    }

    #[test]
    fn handles_feed_registered_tasks() {
        let updater = Updater::new();
        let frames = updater.add(FrequencyStatus::new("Frame rate", FrequencyParams::default()));
        frames.tick();
        frames.tick();

        let batch = updater.collect();
        assert_eq!(batch.reports[0].name, "Frame rate");
        assert_eq!(batch.reports[0].value("Events since startup"), Some("2"));
    }

    #[test]
    fn remove_by_name() {
        let updater = Updater::new();
        updater.add(Heartbeat::new());
        updater.add(Heartbeat::named("Other"));

        assert!(updater.remove("Heartbeat"));
        assert!(!updater.remove("Heartbeat"));
        assert_eq!(updater.task_names(), ["Other"]);
    }

    #[test]
    fn builder_defaults() {
        let updater = Updater::new();
        assert_eq!(updater.interval(), Duration::from_secs(1));
        assert!(updater.outputs.is_empty());
        assert!(updater.collect().is_empty());

        let updater = Updater::builder()
            .output(Output::file("status.json"))
            .output(Output::tcp("localhost:7373"))
            .interval(Duration::from_millis(250))
            .build();
        assert_eq!(updater.interval(), Duration::from_millis(250));
        assert_eq!(updater.outputs.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_every_interval_until_stopped() {
        let (output, mut rx) = Output::channel(8);
        let updater = Updater::builder()
            .output(output)
            .interval(Duration::from_secs(1))
            .build();
        updater.add(Heartbeat::new());

        let handle = updater.start();
        for _ in 0..3 {
            let batch = rx.recv().await.unwrap();
            assert_eq!(batch.reports[0].message, "Alive");
        }

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn emit_now_returns_the_batch() {
        let (output, mut rx) = Output::channel(1);
        let updater = Updater::builder().output(output).build();
        updater.add(Heartbeat::new());

        let batch = updater.emit_now().await;
        assert_eq!(rx.recv().await.unwrap(), batch);
    }
}
