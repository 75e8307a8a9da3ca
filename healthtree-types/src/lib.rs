//! # healthtree-types
//!
//! Wire types for hierarchical health status aggregation. Producers emit
//! [`ReportBatch`]es of named [`StatusReport`]s; the aggregator classifies
//! them into a tree and publishes an [`AggregatedBatch`] plus a single
//! top-level [`StatusReport`] per tick.
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON/MessagePack/etc. serialization via serde
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use healthtree_types::{Level, ReportBatch};
//!
//! let batch = ReportBatch::builder()
//!     .report("motor_left", Level::Ok, "Spinning")
//!     .report_with("motor_right", Level::Error, "Stalled", |r| {
//!         r.with_value("current", "12.4A").with_hardware_id("drive-1")
//!     })
//!     .build();
//!
//! assert_eq!(batch.len(), 2);
//! ```
//!
//! ## Levels on the wire
//!
//! A [`Level`] is serialized as its ordinal: `0` OK, `1` warning, `2` error,
//! `3` stale. Any other number reads back as error.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod batch;
mod level;
mod report;
mod version;

pub use batch::*;
pub use level::*;
pub use report::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the batch format.
pub const SCHEMA_VERSION: u32 = 1;
