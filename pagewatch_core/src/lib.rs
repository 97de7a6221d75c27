//! # pagewatch_core
//!
//! Change Detection and Versioning Engine for competitor web page monitoring.
//!
//! Given a competitor's URL, this crate renders the page (via a pluggable
//! [`RendererGateway`]), normalizes away render-nondeterministic noise,
//! diffs the normalized text against the last known version, classifies the
//! result by severity and type, stores the outcome under a full-plus-diff
//! versioning scheme with retention, and emits an [`Alert`] when the change
//! is significant. Everything runs behind a per-competitor capture lock so
//! concurrent callers never race on the same competitor's version history.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pagewatch_core::{Orchestrator, CaptureOptions, PageWatchConfig, Telemetry};
//! use pagewatch_core::{InMemoryStore, SimulateRendererGateway};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryStore::new());
//!     let renderer = Arc::new(SimulateRendererGateway::new());
//!     let orchestrator = Orchestrator::new(
//!         store.clone(),
//!         store,
//!         renderer,
//!         PageWatchConfig::new().merge_env(),
//!         Arc::new(Telemetry::new()),
//!     );
//!
//!     let result = orchestrator
//!         .capture("competitor-1", CaptureOptions { is_initial_capture: true, ..Default::default() })
//!         .await?;
//!     println!("changed={} version={}", result.changes_detected, result.version_number);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `sqlite` - durable [`SqliteStore`] backend on top of the in-memory default

#![warn(missing_docs)]

pub mod alert;
pub mod compress;
pub mod config;
pub mod differ;
pub mod error;
pub mod lock;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod renderer;
pub mod sections;
pub mod store;
pub mod version_engine;

// Re-exports
pub use config::{PageWatchConfig, Telemetry, TelemetrySnapshot};
pub use differ::DiffResult;
pub use error::{PageWatchError, PageWatchResult};
pub use lock::{CaptureLockGuard, CaptureLockRegistry};
pub use model::{
    AffectedSection, Alert, AlertStatus, AlertType, ChangeType, Competitor, Hunk, HunkTag,
    Priority, Severity, Snapshot, SnapshotDiff, Timestamp,
};
pub use orchestrator::{CaptureOptions, CaptureResult, Orchestrator};
pub use renderer::{FetchOptions, FetchResponse, HttpRendererGateway, RendererGateway, SimulateRendererGateway};
pub use store::{CompetitorRepository, InMemoryStore, ListOrder, NewSnapshot, SnapshotRepository, SnapshotUpdate};

#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
