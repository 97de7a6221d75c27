//! Core data model: competitors, snapshots, diffs, and alerts.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic-enough wall clock timestamp, seconds since the epoch.
///
/// The engine only needs ordering and display, not calendar arithmetic, so a
/// plain integer avoids pulling in a date/time crate for this alone.
pub type Timestamp = i64;

/// Current time as a [`Timestamp`].
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Priority a competitor is tracked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Checked at the configured interval, lowest scheduling preference.
    Low,
    /// Default priority.
    Medium,
    /// Checked ahead of lower-priority competitors when resources are scarce.
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// A tracked competitor page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competitor {
    /// Opaque identifier.
    pub id: String,
    /// Owning user, opaque to the core; alerts are filed under this id.
    pub owner_user_id: String,
    /// Absolute URL, always carrying an http(s) scheme.
    pub url: String,
    /// Whether the scheduler should capture this competitor.
    pub monitoring_enabled: bool,
    /// Minimum seconds between scheduled checks.
    pub check_interval_secs: u64,
    /// Scheduling priority.
    pub priority: Priority,
    /// Count of snapshots recorded so far.
    pub total_versions: u32,
    /// Timestamp of the most recent capture attempt, if any.
    pub last_checked_at: Option<Timestamp>,
    /// Timestamp of the most recent recorded change, if any.
    pub last_change_at: Option<Timestamp>,
}

impl Competitor {
    /// Create a new competitor with the given id and URL, otherwise defaulted.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_user_id: String::new(),
            url: url.into(),
            monitoring_enabled: true,
            check_interval_secs: 300,
            priority: Priority::Medium,
            total_versions: 0,
            last_checked_at: None,
            last_change_at: None,
        }
    }

    /// Attach the owning user id (used when filing alerts).
    pub fn with_owner_user_id(mut self, owner_user_id: impl Into<String>) -> Self {
        self.owner_user_id = owner_user_id.into();
        self
    }
}

/// Severity of a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No meaningful change, or below every threshold.
    Low,
    /// Moderate change.
    Medium,
    /// Large change.
    High,
    /// Change large enough to force a full-baseline snapshot.
    Critical,
}

/// Classification of what kind of change was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Price-related content changed.
    Pricing,
    /// A feature list or capability description changed.
    Feature,
    /// Layout, styling, or visual structure changed.
    Design,
    /// General textual content changed.
    Content,
    /// Didn't match any of the above categories.
    Other,
}

/// One recorded version of a competitor's page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Opaque identifier.
    pub id: String,
    /// Owning competitor.
    pub competitor_id: String,
    /// Monotonic per-competitor version number, starting at 1.
    pub version_number: i64,
    /// When this snapshot was captured.
    pub captured_at: Timestamp,
    /// Whether this snapshot stores a complete baseline.
    pub is_full_version: bool,
    /// Whether this is the most recent snapshot for the competitor.
    pub is_current: bool,
    /// Complete rendered HTML, present iff `is_full_version`.
    pub full_html: Option<String>,
    /// Number of significant hunks relative to the previous version.
    pub change_count: u32,
    /// Change magnitude as a 0-100 percentage of normalized lines.
    pub change_percentage: f32,
    /// Severity classification of the change.
    pub severity: Severity,
    /// Change type classification.
    pub change_type: ChangeType,
    /// Short human-readable summary of the change.
    pub change_summary: String,
}

impl Snapshot {
    /// Build the initial, always-full snapshot for a competitor.
    pub fn initial(competitor_id: impl Into<String>, html: String) -> Self {
        Self {
            id: format!("snap-{}", uuid_like()),
            competitor_id: competitor_id.into(),
            version_number: 1,
            captured_at: now(),
            is_full_version: true,
            is_current: true,
            full_html: Some(html),
            change_count: 0,
            change_percentage: 0.0,
            severity: Severity::Low,
            change_type: ChangeType::Other,
            change_summary: "initial capture".to_string(),
        }
    }
}

/// One hunk of a line-level diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkTag {
    /// Lines only present in the newer version.
    Added,
    /// Lines only present in the older version.
    Removed,
    /// Lines present, unchanged, in both versions.
    Unchanged,
}

/// A contiguous run of same-tagged lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hunk {
    /// Added, removed, or unchanged.
    pub tag: HunkTag,
    /// Verbatim text of the hunk (newline-joined).
    pub text: String,
    /// Number of lines the hunk spans.
    pub line_count: u32,
}

/// The diff payload between two consecutive snapshots of one competitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Opaque identifier.
    pub id: String,
    /// Earlier snapshot id.
    pub from_snapshot_id: String,
    /// Later snapshot id (`from.version_number + 1`).
    pub to_snapshot_id: String,
    /// Ordered hunks, including unchanged runs for reconstruction.
    pub diff_data: Vec<Hunk>,
    /// Short human-readable summary of the change.
    pub change_summary: String,
    /// Number of significant (added/removed, large enough) hunks.
    pub change_count: u32,
    /// Change magnitude as a 0-100 percentage of normalized lines.
    pub change_percentage: f32,
}

/// Status of an alert as seen by the outer system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Not yet seen.
    Unread,
    /// Seen.
    Read,
    /// Explicitly archived.
    Archived,
}

/// Type of alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// General content change.
    ContentChange,
    /// A price-related change.
    PriceChange,
    /// A previously-unseen page was captured for the first time.
    NewPage,
    /// The page could no longer be reached.
    PageRemoved,
    /// The capture failed with an unrecoverable error.
    Error,
}

/// A section of the page implicated by a hunk, with a confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedSection {
    /// CSS selector (or selector-like description) identifying the element.
    pub selector: String,
    /// Classified section type (e.g. "pricing", "hero").
    pub section_type: String,
    /// Confidence in [0.0, 1.0].
    pub confidence: f32,
    /// Truncated before/after snippets for display.
    pub changes: Vec<String>,
}

/// One reported change, owned by a user of the outer system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Opaque identifier.
    pub id: String,
    /// Owning user, opaque to the core.
    pub user_id: String,
    /// Competitor this alert concerns.
    pub competitor_id: String,
    /// Snapshot that triggered the alert.
    pub snapshot_id: String,
    /// Alert category.
    pub alert_type: AlertType,
    /// Severity, copied from the triggering snapshot.
    pub severity: Severity,
    /// Status as mutated by the outer system.
    pub status: AlertStatus,
    /// Short title.
    pub title: String,
    /// Longer message body.
    pub message: String,
    /// Number of significant hunks.
    pub change_count: u32,
    /// Change magnitude as a 0-100 percentage.
    pub change_percentage: f32,
    /// Version number of the triggering snapshot.
    pub version_number: i64,
    /// Short human-readable summary of the change.
    pub change_summary: String,
    /// Page sections implicated by the change.
    pub affected_sections: Vec<AffectedSection>,
}

/// A process-unique, dependency-free identifier.
///
/// Not a cryptographically strong UUID; good enough for in-memory and
/// sqlite-backed identity within a single engine instance.
pub fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now(), n)
}
