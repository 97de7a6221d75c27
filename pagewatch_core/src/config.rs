//! Configuration types for pagewatch_core.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Engine-wide versioning and capture configuration.
///
/// Defaults mirror the reference values tracked in the engine's design notes;
/// override individual fields with the `with_*` builders.
#[derive(Debug, Clone)]
pub struct PageWatchConfig {
    /// Every Nth version is written as a full baseline rather than a diff.
    pub full_version_interval: u32,
    /// Retention ceiling per competitor.
    pub max_versions_per_competitor: usize,
    /// Minimum normalized-line change percentage (0.0-1.0) to treat a capture as significant.
    pub change_threshold: f32,
    /// Minimum trimmed hunk length, in characters, kept by the differ.
    pub significant_change_threshold: usize,
    /// Gzip-encode stored full HTML payloads.
    pub compression_enabled: bool,
    /// Timeout for a single renderer request.
    pub renderer_timeout: Duration,
    /// Timeout for the whole capture procedure.
    pub capture_timeout: Duration,
    /// Base URL of the renderer service.
    pub renderer_base_url: String,
    /// Bearer token sent to the renderer service, if any.
    pub renderer_bearer_token: Option<String>,
    /// How often the retention sweep runs across all competitors.
    pub retention_sweep_interval: Duration,
}

impl Default for PageWatchConfig {
    fn default() -> Self {
        Self {
            full_version_interval: 10,
            max_versions_per_competitor: 30,
            change_threshold: 0.05,
            significant_change_threshold: 100,
            compression_enabled: true,
            renderer_timeout: Duration::from_millis(30_000),
            capture_timeout: Duration::from_millis(60_000),
            renderer_base_url: "http://localhost:4000".to_string(),
            renderer_bearer_token: None,
            retention_sweep_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl PageWatchConfig {
    /// Create a config with compiled-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer `PAGEWATCH_*` environment variables on top of the current values.
    ///
    /// Unset or unparsable variables leave the existing value untouched.
    pub fn merge_env(mut self) -> Self {
        if let Ok(v) = std::env::var("PAGEWATCH_FULL_VERSION_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.full_version_interval = n;
            }
        }
        if let Ok(v) = std::env::var("PAGEWATCH_MAX_VERSIONS_PER_COMPETITOR") {
            if let Ok(n) = v.parse() {
                self.max_versions_per_competitor = n;
            }
        }
        if let Ok(v) = std::env::var("PAGEWATCH_CHANGE_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.change_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("PAGEWATCH_SIGNIFICANT_CHANGE_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.significant_change_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("PAGEWATCH_COMPRESSION_ENABLED") {
            if let Ok(n) = v.parse() {
                self.compression_enabled = n;
            }
        }
        if let Ok(v) = std::env::var("PAGEWATCH_RENDERER_BASE_URL") {
            self.renderer_base_url = v;
        }
        if let Ok(v) = std::env::var("PAGEWATCH_RENDERER_BEARER_TOKEN") {
            self.renderer_bearer_token = Some(v);
        }
        self
    }

    /// Set the full-version interval.
    pub fn with_full_version_interval(mut self, n: u32) -> Self {
        self.full_version_interval = n;
        self
    }

    /// Set the retention ceiling.
    pub fn with_max_versions_per_competitor(mut self, n: usize) -> Self {
        self.max_versions_per_competitor = n;
        self
    }

    /// Set the significance percentage threshold (fraction, e.g. 0.05 for 5%).
    pub fn with_change_threshold(mut self, threshold: f32) -> Self {
        self.change_threshold = threshold;
        self
    }

    /// Set the per-hunk significance threshold in characters.
    pub fn with_significant_change_threshold(mut self, chars: usize) -> Self {
        self.significant_change_threshold = chars;
        self
    }

    /// Enable or disable compression of stored full HTML.
    pub fn with_compression_enabled(mut self, enabled: bool) -> Self {
        self.compression_enabled = enabled;
        self
    }

    /// Set the renderer request timeout.
    pub fn with_renderer_timeout(mut self, timeout: Duration) -> Self {
        self.renderer_timeout = timeout;
        self
    }

    /// Set the outer capture timeout.
    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    /// Set the renderer service base URL.
    pub fn with_renderer_base_url(mut self, url: impl Into<String>) -> Self {
        self.renderer_base_url = url.into();
        self
    }

    /// Set the renderer bearer token.
    pub fn with_renderer_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.renderer_bearer_token = Some(token.into());
        self
    }
}

/// Per-process telemetry counters.
///
/// Uses atomic counters for lock-free concurrent updates from many
/// simultaneous captures, the way usage stats are tracked elsewhere in this
/// crate family.
#[derive(Debug, Default)]
pub struct Telemetry {
    /// Captures attempted (lock acquired, renderer invoked).
    pub captures_attempted: AtomicU64,
    /// Captures that recorded a new snapshot.
    pub captures_changed: AtomicU64,
    /// Captures that found no significant change.
    pub captures_unchanged: AtomicU64,
    /// Captures that failed with an error.
    pub captures_failed: AtomicU64,
    /// Alerts emitted.
    pub alerts_emitted: AtomicU64,
    /// Retention sweeps executed.
    pub retention_runs: AtomicU64,
    /// Snapshots deleted by retention, keyed by competitor id.
    pub retention_deletions: DashMap<String, AtomicU64>,
}

impl Telemetry {
    /// Create a fresh, zeroed telemetry block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempted capture.
    pub fn record_attempt(&self) {
        self.captures_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a capture that produced a new snapshot.
    pub fn record_changed(&self) {
        self.captures_changed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a capture that found no significant change.
    pub fn record_unchanged(&self) {
        self.captures_unchanged.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed capture.
    pub fn record_failed(&self) {
        self.captures_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an emitted alert.
    pub fn record_alert(&self) {
        self.alerts_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed retention sweep and the snapshots it deleted.
    pub fn record_retention(&self, competitor_id: &str, deleted: u64) {
        self.retention_runs.fetch_add(1, Ordering::Relaxed);
        if deleted > 0 {
            self.retention_deletions
                .entry(competitor_id.to_string())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(deleted, Ordering::Relaxed);
        }
    }

    /// Snapshot the counters into a serializable, plain-data view.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            captures_attempted: self.captures_attempted.load(Ordering::Relaxed),
            captures_changed: self.captures_changed.load(Ordering::Relaxed),
            captures_unchanged: self.captures_unchanged.load(Ordering::Relaxed),
            captures_failed: self.captures_failed.load(Ordering::Relaxed),
            alerts_emitted: self.alerts_emitted.load(Ordering::Relaxed),
            retention_runs: self.retention_runs.load(Ordering::Relaxed),
        }
    }
}

/// Plain-data snapshot of [`Telemetry`] for reporting (CLI `stats`, logs).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Captures attempted.
    pub captures_attempted: u64,
    /// Captures that recorded a new snapshot.
    pub captures_changed: u64,
    /// Captures that found no significant change.
    pub captures_unchanged: u64,
    /// Captures that failed with an error.
    pub captures_failed: u64,
    /// Alerts emitted.
    pub alerts_emitted: u64,
    /// Retention sweeps executed.
    pub retention_runs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_overrides_defaults() {
        let config = PageWatchConfig::new()
            .with_full_version_interval(5)
            .with_max_versions_per_competitor(10)
            .with_change_threshold(0.1)
            .with_significant_change_threshold(50)
            .with_compression_enabled(false);

        assert_eq!(config.full_version_interval, 5);
        assert_eq!(config.max_versions_per_competitor, 10);
        assert_eq!(config.change_threshold, 0.1);
        assert_eq!(config.significant_change_threshold, 50);
        assert!(!config.compression_enabled);
    }

    #[test]
    fn telemetry_tracks_counts() {
        let telemetry = Telemetry::new();
        telemetry.record_attempt();
        telemetry.record_attempt();
        telemetry.record_changed();
        telemetry.record_unchanged();
        telemetry.record_alert();
        telemetry.record_retention("comp-1", 3);

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.captures_attempted, 2);
        assert_eq!(snapshot.captures_changed, 1);
        assert_eq!(snapshot.captures_unchanged, 1);
        assert_eq!(snapshot.alerts_emitted, 1);
        assert_eq!(snapshot.retention_runs, 1);

        let deleted = telemetry
            .retention_deletions
            .get("comp-1")
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0);
        assert_eq!(deleted, 3);
    }

    #[test]
    fn default_config_matches_reference_values() {
        let config = PageWatchConfig::default();
        assert_eq!(config.full_version_interval, 10);
        assert_eq!(config.max_versions_per_competitor, 30);
        assert_eq!(config.significant_change_threshold, 100);
        assert!(config.compression_enabled);
    }
}
