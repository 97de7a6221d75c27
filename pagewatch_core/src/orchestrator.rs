//! Capture Orchestrator: the single entry point that turns "check this
//! competitor now" into a fetch, a diff, a version write, and an alert.
//!
//! Grounded on the request-lifecycle shape this crate family uses for its own
//! top-level driver (acquire a guard, do the work, always release, log at the
//! seams) rather than any single source file — this is new wiring the other
//! modules did not need, composed the way the rest of the crate is composed.

use crate::alert::{self};
use crate::config::{PageWatchConfig, Telemetry};
use crate::differ;
use crate::error::{PageWatchError, PageWatchResult};
use crate::lock::CaptureLockRegistry;
use crate::model::{now, ChangeType, Competitor, Severity, Snapshot};
use crate::normalize;
use crate::renderer::{FetchOptions, FetchResponse, RendererGateway};
use crate::sections;
use crate::store::{CompetitorRepository, NewSnapshot, SnapshotRepository};
use crate::version_engine;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Caller-supplied knobs for a single capture attempt.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Milliseconds to wait for the page to settle; `None` uses the gateway default.
    pub wait_ms: Option<u64>,
    /// Viewport width in pixels; `None` uses the gateway default.
    pub viewport_width: Option<u32>,
    /// Viewport height in pixels; `None` uses the gateway default.
    pub viewport_height: Option<u32>,
    /// Per-request renderer timeout in milliseconds; `None` falls back to
    /// [`PageWatchConfig::renderer_timeout`].
    pub timeout_ms: Option<u64>,
    /// Skip the remote renderer and use this HTML instead, e.g. the CLI's
    /// `--simulate-file` flag.
    pub simulate: Option<bool>,
    /// This is the competitor's first-ever capture; on a renderer outage a
    /// placeholder document is substituted so a version 1 is always created.
    pub is_initial_capture: bool,
    /// Bypass the `monitoring_enabled` gate, e.g. a user-initiated recheck.
    pub is_manual_check: bool,
}

/// Outcome of a single capture attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureResult {
    /// Competitor captured.
    pub competitor_id: String,
    /// Whether this capture produced a change significant enough to record.
    pub changes_detected: bool,
    /// Whether an alert was persisted for this capture.
    pub alert_created: bool,
    /// Id of the snapshot that is current after this capture.
    pub snapshot_id: String,
    /// Version number recorded, or the prior current version if unchanged.
    pub version_number: i64,
    /// Number of changed lines, 0 when nothing changed.
    pub change_count: u32,
    /// Fraction of the page that changed, 0.0 when nothing changed.
    pub change_percentage: f64,
    /// Severity of the change, `Low` when nothing changed.
    pub severity: Severity,
    /// Classification of the change.
    pub change_type: ChangeType,
    /// Human-readable summary of what changed.
    pub change_summary: String,
}

/// Wires the renderer, normalizer, differ, section extractor, version
/// engine, and alert emitter into the end-to-end capture procedure.
pub struct Orchestrator {
    competitors: Arc<dyn CompetitorRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
    renderer: Arc<dyn RendererGateway>,
    locks: CaptureLockRegistry,
    config: PageWatchConfig,
    telemetry: Arc<Telemetry>,
}

impl Orchestrator {
    /// Assemble an orchestrator from its collaborators.
    pub fn new(
        competitors: Arc<dyn CompetitorRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        renderer: Arc<dyn RendererGateway>,
        config: PageWatchConfig,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            competitors,
            snapshots,
            renderer,
            locks: CaptureLockRegistry::new(),
            config,
            telemetry,
        }
    }

    /// Access the shared telemetry block (for a CLI `stats` command, etc).
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Capture `competitor_id` now.
    ///
    /// 1. Acquire the per-competitor lock, non-blocking.
    /// 2. Load the competitor; bail if unknown or (absent `manual`) disabled.
    /// 3. Fetch rendered HTML, bounded by the outer capture timeout.
    /// 4. On the very first capture, write an unconditional full baseline.
    /// 5. Otherwise reconstruct the current version, normalize both sides,
    ///    diff, and gate on significance.
    /// 6. If significant: extract affected sections (best-effort), write the
    ///    next version, emit and persist an alert, then run retention.
    /// 7. Update the competitor's bookkeeping fields and release the lock.
    pub async fn capture(&self, competitor_id: &str, options: CaptureOptions) -> PageWatchResult<CaptureResult> {
        let guard = self
            .locks
            .try_acquire(competitor_id)
            .ok_or(PageWatchError::CaptureInProgress)?;

        let outcome = tokio::time::timeout(
            self.config.capture_timeout,
            self.capture_locked(competitor_id, &options),
        )
        .await;

        drop(guard);

        match outcome {
            Ok(result) => result,
            Err(_) => {
                self.telemetry.record_failed();
                warn!("capture timed out for competitor {}", competitor_id);
                Err(PageWatchError::RendererTimeout)
            }
        }
    }

    async fn capture_locked(&self, competitor_id: &str, options: &CaptureOptions) -> PageWatchResult<CaptureResult> {
        let mut competitor = self
            .competitors
            .get(competitor_id)
            .await?
            .ok_or_else(|| PageWatchError::CompetitorNotFound(competitor_id.to_string()))?;

        if !options.is_manual_check && !competitor.monitoring_enabled {
            return Err(PageWatchError::MonitoringDisabled);
        }

        self.telemetry.record_attempt();

        let current = self.snapshots.get_current(competitor_id).await?;

        let fetch_options = FetchOptions {
            wait_ms: options.wait_ms.unwrap_or(FetchOptions::default().wait_ms),
            viewport_width: options.viewport_width.unwrap_or(FetchOptions::default().viewport_width),
            viewport_height: options.viewport_height.unwrap_or(FetchOptions::default().viewport_height),
            timeout_ms: options
                .timeout_ms
                .unwrap_or(self.config.renderer_timeout.as_millis() as u64),
            simulate: options.simulate.unwrap_or(false),
            ..FetchOptions::default()
        };

        let fetch_result = self.renderer.fetch(&competitor.url, &fetch_options).await;

        let fetched = match fetch_result {
            Ok(response) => response,
            Err(PageWatchError::RendererUnavailable(_) | PageWatchError::RendererTimeout)
                if options.is_initial_capture && current.is_none() =>
            {
                warn!(
                    "renderer unreachable during initial capture for {}, substituting placeholder",
                    competitor_id
                );
                FetchResponse {
                    html: "<html><body>Page unavailable at first capture.</body></html>".to_string(),
                    title: None,
                    rendered_url: competitor.url.clone(),
                    was_timeout: false,
                }
            }
            Err(err) => {
                self.telemetry.record_failed();
                let alert = alert::emit_error_alert(&competitor.owner_user_id, competitor_id, &err.to_string());
                if let Err(store_err) = self.snapshots.create_alert(alert.clone()).await {
                    warn!("failed to persist capture-failure alert for {}: {}", competitor_id, store_err);
                } else {
                    self.telemetry.record_alert();
                }
                competitor.last_checked_at = Some(now());
                let _ = self.competitors.save(&competitor).await;
                return Err(err);
            }
        };

        let result = match current.as_ref() {
            None => self.record_initial_capture(&competitor, &fetched.html).await?,
            Some(current) => {
                self.record_subsequent_capture(&competitor, current, &fetched.html).await?
            }
        };

        competitor.total_versions = result.version_number.max(competitor.total_versions as i64) as u32;
        competitor.last_checked_at = Some(now());
        if result.changes_detected {
            competitor.last_change_at = Some(now());
        }
        self.competitors.save(&competitor).await?;

        info!(
            "capture complete for competitor {} via {}: version={} changed={}",
            competitor_id,
            self.renderer.gateway_name(),
            result.version_number,
            result.changes_detected
        );

        Ok(result)
    }

    async fn record_initial_capture(&self, competitor: &Competitor, html: &str) -> PageWatchResult<CaptureResult> {
        let snapshot = self
            .snapshots
            .create_snapshot(NewSnapshot {
                competitor_id: competitor.id.clone(),
                version_number: 1,
                is_full_version: true,
                full_html: Some(html.to_string()),
                change_count: 0,
                change_percentage: 0.0,
                severity: Severity::Low,
                change_type: ChangeType::Other,
                change_summary: "initial capture".to_string(),
            })
            .await?;

        self.telemetry.record_unchanged();

        Ok(CaptureResult {
            competitor_id: competitor.id.clone(),
            changes_detected: false,
            alert_created: false,
            snapshot_id: snapshot.id.clone(),
            version_number: snapshot.version_number,
            change_count: 0,
            change_percentage: 0.0,
            severity: Severity::Low,
            change_type: ChangeType::Other,
            change_summary: snapshot.change_summary.clone(),
        })
    }

    async fn record_subsequent_capture(
        &self,
        competitor: &Competitor,
        current: &Snapshot,
        new_html: &str,
    ) -> PageWatchResult<CaptureResult> {
        let previous_html = if current.is_full_version {
            current
                .full_html
                .clone()
                .ok_or_else(|| PageWatchError::ReconstructionFailed(format!("current snapshot {} has no full_html", current.id)))?
        } else {
            version_engine::reconstruct(&self.snapshots, &competitor.id, current.version_number).await?
        };

        let old_normalized = normalize::normalize(&previous_html);
        let new_normalized = normalize::normalize(new_html);

        let diff = differ::diff(&old_normalized, &new_normalized, self.config.significant_change_threshold);

        if !diff.is_significant(self.config.change_threshold) {
            self.telemetry.record_unchanged();
            return Ok(CaptureResult {
                competitor_id: competitor.id.clone(),
                changes_detected: false,
                alert_created: false,
                snapshot_id: current.id.clone(),
                version_number: current.version_number,
                change_count: diff.change_count,
                change_percentage: diff.change_percentage as f64,
                severity: Severity::Low,
                change_type: ChangeType::Other,
                change_summary: "no significant change".to_string(),
            });
        }

        let affected_sections = sections::extract_sections(new_html, &diff.hunks);

        let write_result =
            version_engine::write_next_version(&self.snapshots, &self.config, &competitor.id, Some(current), new_html, &diff)
                .await;

        let (snapshot, _diff_record) = match write_result {
            Ok(written) => written,
            Err(PageWatchError::VersionConflict { .. }) => {
                warn!(
                    "version conflict writing next version for {}, retrying once against current state",
                    competitor.id
                );
                let refreshed = self
                    .snapshots
                    .get_current(&competitor.id)
                    .await?
                    .unwrap_or_else(|| current.clone());
                version_engine::write_next_version(
                    &self.snapshots,
                    &self.config,
                    &competitor.id,
                    Some(&refreshed),
                    new_html,
                    &diff,
                )
                .await?
            }
            Err(err) => return Err(err),
        };

        let alert = alert::emit_change_alert(&competitor.owner_user_id, &competitor.id, &snapshot, &diff, &affected_sections);
        self.snapshots.create_alert(alert.clone()).await?;
        self.telemetry.record_changed();
        self.telemetry.record_alert();

        let deleted = version_engine::run_retention(&self.snapshots, &self.config, &competitor.id).await?;
        self.telemetry.record_retention(&competitor.id, deleted as u64);

        Ok(CaptureResult {
            competitor_id: competitor.id.clone(),
            changes_detected: true,
            alert_created: true,
            snapshot_id: snapshot.id.clone(),
            version_number: snapshot.version_number,
            change_count: diff.change_count,
            change_percentage: diff.change_percentage as f64,
            severity: snapshot.severity,
            change_type: snapshot.change_type,
            change_summary: snapshot.change_summary.clone(),
        })
    }

    /// Run retention across every monitored competitor.
    ///
    /// Intended to be driven by a periodic scheduler at
    /// [`PageWatchConfig::retention_sweep_interval`]; independent of the
    /// per-capture retention call, which only prunes the competitor just written.
    pub async fn run_global_retention_sweep(&self) -> PageWatchResult<u32> {
        let mut total_deleted = 0u32;
        for competitor in self.competitors.list_monitored().await? {
            let deleted = version_engine::run_retention(&self.snapshots, &self.config, &competitor.id).await?;
            self.telemetry.record_retention(&competitor.id, deleted as u64);
            total_deleted += deleted;
        }
        Ok(total_deleted)
    }
}
