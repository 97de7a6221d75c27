//! Snapshot and competitor persistence.
//!
//! Two repository traits (`CompetitorRepository`, `SnapshotRepository`)
//! describe the contract the Version Engine and Orchestrator depend on.
//! `InMemoryStore` is the default, test-friendly implementation; the
//! `sqlite` feature adds a durable `SqliteStore`.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::error::PageWatchResult;
use crate::model::{Alert, Competitor, Snapshot, SnapshotDiff};
use async_trait::async_trait;

/// Ordering for [`SnapshotRepository::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    /// Oldest version first.
    Ascending,
    /// Newest version first.
    Descending,
}

/// Fields accepted by [`SnapshotRepository::create_snapshot`].
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    /// Owning competitor.
    pub competitor_id: String,
    /// Monotonic per-competitor version number.
    pub version_number: i64,
    /// Whether this snapshot stores a complete baseline.
    pub is_full_version: bool,
    /// Complete rendered HTML, present iff `is_full_version`.
    pub full_html: Option<String>,
    /// Number of significant hunks relative to the previous version.
    pub change_count: u32,
    /// Change magnitude as a 0-100 percentage.
    pub change_percentage: f32,
    /// Severity classification.
    pub severity: crate::model::Severity,
    /// Change type classification.
    pub change_type: crate::model::ChangeType,
    /// Short human-readable summary.
    pub change_summary: String,
}

/// Partial update accepted by [`SnapshotRepository::update`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotUpdate {
    /// New `full_html` value, if changing.
    pub full_html: Option<Option<String>>,
    /// New `is_full_version` value, if changing.
    pub is_full_version: Option<bool>,
    /// New `is_current` value, if changing.
    pub is_current: Option<bool>,
}

/// Repository of competitors.
#[async_trait]
pub trait CompetitorRepository: Send + Sync {
    /// Fetch a competitor by id.
    async fn get(&self, id: &str) -> PageWatchResult<Option<Competitor>>;

    /// Persist an updated competitor record.
    async fn save(&self, competitor: &Competitor) -> PageWatchResult<()>;

    /// List every competitor with monitoring enabled.
    async fn list_monitored(&self) -> PageWatchResult<Vec<Competitor>>;
}

/// Repository of snapshots, diffs, and alerts.
///
/// `mark_not_current` and `create_snapshot` must be composed by the caller
/// inside a single transaction when writing a new current version; the
/// in-memory implementation uses an internal lock to the same effect.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Current snapshot for a competitor, if any exist yet.
    async fn get_current(&self, competitor_id: &str) -> PageWatchResult<Option<Snapshot>>;

    /// Snapshot at a specific version number.
    async fn get_by_version(
        &self,
        competitor_id: &str,
        version_number: i64,
    ) -> PageWatchResult<Option<Snapshot>>;

    /// All snapshots for a competitor, ordered as requested.
    async fn list(&self, competitor_id: &str, order: ListOrder) -> PageWatchResult<Vec<Snapshot>>;

    /// The most recent full snapshot at or before `version_number`.
    async fn find_last_full_at_or_before(
        &self,
        competitor_id: &str,
        version_number: i64,
    ) -> PageWatchResult<Option<Snapshot>>;

    /// Diffs spanning `(from_version, to_version]`, in order.
    async fn diffs_between(
        &self,
        competitor_id: &str,
        from_version: i64,
        to_version: i64,
    ) -> PageWatchResult<Vec<SnapshotDiff>>;

    /// Mark every snapshot for `competitor_id` other than `except_id` as not current.
    async fn mark_not_current(&self, competitor_id: &str, except_id: &str) -> PageWatchResult<()>;

    /// Insert a new snapshot, failing with `VersionConflict` on a duplicate version.
    async fn create_snapshot(&self, attrs: NewSnapshot) -> PageWatchResult<Snapshot>;

    /// Insert the diff record owned by the destination snapshot.
    async fn create_diff(&self, diff: SnapshotDiff) -> PageWatchResult<()>;

    /// Apply a partial update to a snapshot.
    async fn update(&self, snapshot_id: &str, update: SnapshotUpdate) -> PageWatchResult<()>;

    /// Delete a snapshot, cascading to its owned incoming diff.
    async fn delete(&self, snapshot_id: &str) -> PageWatchResult<()>;

    /// Persist a newly emitted alert.
    async fn create_alert(&self, alert: Alert) -> PageWatchResult<()>;

    /// List alerts for a competitor, newest first.
    async fn list_alerts(&self, competitor_id: &str) -> PageWatchResult<Vec<Alert>>;
}
