//! # healthtree
//!
//! A hierarchical health-status aggregator.
//!
//! Producers send flat batches of named status reports. The aggregator routes
//! every report into a tree of analyzers defined by configuration, and once
//! per tick publishes the whole tree with a summary severity at every level.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           Aggregator                           │
//! │  ┌────────┐   ┌──────────────────────────────┐   ┌───────────┐ │
//! │  │ server │──▶│ root AnalyzerGroup            │──▶│ publisher │─┼─▶ Output
//! │  │ (TCP)  │   │  ├─ GenericAnalyzer "Motors"  │   │ (interval)│ │
//! │  └───┬────┘   │  ├─ AnalyzerGroup "Sensors"   │   └───────────┘ │
//! │      │        │  └─ registered groups ◀───────┼── LivenessSession
//! │      │        ├──────────────────────────────┤                 │
//! │      └───────▶│ OtherAnalyzer (catch-all)     │                 │
//! │               └──────────────────────────────┘                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`analyzer`]**: the [`Analyzer`] trait and its variants
//! - **[`aggregator`]**: the shared tree behind one lock; ingestion,
//!   registration and publication
//! - **[`session`]**: liveness sessions that keep registrations alive
//! - **[`config`]**: TOML/env configuration via the `config` crate
//! - **[`publisher`]** and **[`output`]**: periodic emission to files, TCP,
//!   stdout or channels
//! - **[`server`]**: newline-delimited JSON ingestion over TCP
//!
//! ## Usage
//!
//! ### Static tree
//!
//! ```
//! use healthtree::{Aggregator, AggregatorConfig};
//! use healthtree_types::{Level, ReportBatch};
//!
//! let config = AggregatorConfig::from_toml(r#"
//!     base_path = "Robot"
//!
//!     [[analyzers]]
//!     type = "generic"
//!     path = "Motors"
//!     startswith = "motor_"
//!     num_items = 2
//! "#).unwrap();
//! let aggregator = Aggregator::new(config).unwrap();
//!
//! aggregator.ingest(&ReportBatch::builder()
//!     .report("motor_1", Level::Ok, "Spinning")
//!     .build());
//!
//! let publication = aggregator.publish_tick();
//! let motors = publication.batch.get("/Robot/Motors").unwrap();
//! assert_eq!(motors.level, Level::Error);
//! assert_eq!(motors.message, "Expected 2, found 1");
//! ```
//!
//! ### Dynamic registration
//!
//! ```
//! use std::sync::Arc;
//! use healthtree::{Aggregator, AggregatorConfig, LivenessSession, RegistrationRequest};
//! use healthtree::config::{AnalyzerConfig, GenericConfig};
//!
//! # tokio_test::block_on(async {
//! let aggregator = Arc::new(Aggregator::new(AggregatorConfig::default()).unwrap());
//! let (session, watch) = LivenessSession::new("arm");
//!
//! let request = RegistrationRequest::new("arm", vec![AnalyzerConfig::Generic(GenericConfig {
//!     startswith: vec!["arm_".into()],
//!     ..GenericConfig::new("Joints")
//! })]);
//! assert!(aggregator.register(request, watch).success);
//! assert_eq!(aggregator.registrations(), ["arm"]);
//!
//! // Ending the session removes the group again.
//! session.end();
//! # });
//! ```

pub mod aggregator;
pub mod analyzer;
pub mod config;
pub mod duration;
pub mod error;
pub mod output;
pub mod publisher;
pub mod server;
pub mod session;

// Re-export main types for convenience
pub use aggregator::{Aggregator, Publication, RegistrationRequest, RegistrationResponse};
pub use analyzer::{Analyzer, AnalyzerGroup, GenericAnalyzer, OtherAnalyzer, StatusItem};
pub use config::{AggregatorConfig, AnalyzerConfig};
pub use error::{AnalyzerError, ConfigError, RegistrationError};
pub use output::Output;
pub use publisher::{EmissionHandle, Publisher};
pub use session::{LivenessSession, SessionWatch};
