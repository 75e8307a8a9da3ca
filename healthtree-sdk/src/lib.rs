//! # healthtree-sdk
//!
//! Producer-side helpers for healthtree.
//!
//! A process registers [`StatusTask`]s with an [`Updater`]. On every
//! interval the updater runs each task, collects the resulting
//! [`StatusReport`]s into one [`ReportBatch`] and sends it to its outputs,
//! typically the aggregator's TCP listener.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use healthtree_sdk::{FrequencyParams, FrequencyStatus, Heartbeat, Output, Updater};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let updater = Updater::builder()
//!         .name_prefix("driver")
//!         .output(Output::tcp("127.0.0.1:7373"))
//!         .interval(Duration::from_secs(1))
//!         .build();
//!
//!     updater.add(Heartbeat::new());
//!     let commands = updater.add(FrequencyStatus::new(
//!         "Command rate",
//!         FrequencyParams::new(45.0, 55.0),
//!     ));
//!
//!     // Start background emission (non-blocking)
//!     let _handle = updater.start();
//!
//!     // ... on every command received:
//!     commands.tick();
//! }
//! ```
//!
//! ## Tasks
//!
//! - [`Heartbeat`]: always OK, "Alive"
//! - [`FrequencyStatus`]: event rate against a min/max band
//! - [`TimeStampStatus`]: delay of event timestamps against the local clock
//! - [`CpuTask`]: per-CPU load against a warning threshold

mod cpu;
mod frequency;
mod output;
mod task;
mod timestamp;
mod updater;

pub use cpu::{CpuTask, LoadSource, ProcStat};
pub use frequency::{FrequencyParams, FrequencyStatus};
pub use output::Output;
pub use task::{Heartbeat, StatusTask};
pub use timestamp::{TimeStampParams, TimeStampStatus};
pub use updater::{Updater, UpdaterBuilder};

#[cfg(feature = "tokio")]
pub use updater::EmissionHandle;

// Re-export types for convenience
pub use healthtree_types::{Level, ReportBatch, StatusReport};
