//! Periodic publication of the aggregated tree.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aggregator::{Aggregator, Publication};
use crate::output::Output;

/// Computes a publication on every tick and emits it to all outputs.
///
/// The tree lock is only held while computing; outputs run afterwards.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use healthtree::{Aggregator, AggregatorConfig, Output, Publisher};
///
/// #[tokio::main]
/// async fn main() {
///     let aggregator = Arc::new(Aggregator::new(AggregatorConfig::default()).unwrap());
///     let publisher = Publisher::builder(aggregator)
///         .output(Output::file("health.json"))
///         .interval(Duration::from_millis(500))
///         .build();
///
///     let handle = publisher.start();
///     tokio::time::sleep(Duration::from_secs(5)).await;
///     handle.stop();
/// }
/// ```
#[derive(Debug)]
pub struct Publisher {
    aggregator: Arc<Aggregator>,
    outputs: Arc<Vec<Output>>,
    interval: Duration,
}

impl Publisher {
    /// Builder with the aggregator's configured interval and no outputs.
    pub fn builder(aggregator: Arc<Aggregator>) -> PublisherBuilder {
        PublisherBuilder::new(aggregator)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the publication loop.
    ///
    /// The loop ends when the handle is stopped or dropped, or when the
    /// aggregator shuts down.
    pub fn start(&self) -> EmissionHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let aggregator = self.aggregator.clone();
        let outputs = self.outputs.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            info!(interval = ?interval, outputs = outputs.len(), "Publisher started");

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        if !aggregator.is_running() {
                            break;
                        }
                        let publication = aggregator.publish_tick();
                        emit_all(&outputs, &publication).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Publisher stopped");
        });

        EmissionHandle { stop_tx, task }
    }

    /// Compute and emit one publication immediately.
    pub async fn emit_now(&self) -> Publication {
        let publication = self.aggregator.publish_tick();
        emit_all(&self.outputs, &publication).await;
        publication
    }
}

async fn emit_all(outputs: &[Output], publication: &Publication) {
    for output in outputs {
        if let Err(e) = output.emit(publication).await {
            match output {
                Output::Tcp(addr) => debug!(addr = %addr, error = %e, "TCP output unavailable"),
                _ => warn!(output = ?output, error = %e, "Failed to emit publication"),
            }
        }
    }
}

/// Builder for configuring a [`Publisher`].
#[derive(Debug)]
pub struct PublisherBuilder {
    aggregator: Arc<Aggregator>,
    outputs: Vec<Output>,
    interval: Option<Duration>,
}

impl PublisherBuilder {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self {
            aggregator,
            outputs: Vec::new(),
            interval: None,
        }
    }

    /// Add an output destination. Every output receives every publication.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Override the aggregator's publish interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn build(self) -> Publisher {
        let interval = self
            .interval
            .unwrap_or_else(|| self.aggregator.publish_interval());
        Publisher {
            aggregator: self.aggregator,
            outputs: Arc::new(self.outputs),
            interval,
        }
    }
}

/// Handle for the background publication loop.
///
/// Dropping the handle stops the loop as well.
#[derive(Debug)]
pub struct EmissionHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl EmissionHandle {
    /// Ask the loop to stop without waiting for it.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop the loop and wait until it has exited.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }

    /// True once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
