//! Write policy, reconstruction, and retention — the versioning half of the
//! engine. The Differ decides *whether* a change matters; this module decides
//! *how it is stored* and *how it comes back*.

use crate::config::PageWatchConfig;
use crate::differ::DiffResult;
use crate::error::{PageWatchError, PageWatchResult};
use crate::model::{uuid_like, Hunk, HunkTag, Severity, Snapshot, SnapshotDiff};
use crate::store::{ListOrder, NewSnapshot, SnapshotRepository, SnapshotUpdate};
use std::sync::Arc;

/// Decide whether the next version should be a full baseline.
///
/// `current_version` is the version number of the snapshot being
/// superseded (0 if this is the very first capture).
pub fn should_be_full(config: &PageWatchConfig, current_version: i64, severity: Severity) -> bool {
    current_version == 0
        || severity == Severity::Critical
        || (current_version + 1) % config.full_version_interval as i64 == 0
}

/// Write the next version for a competitor given a significant diff result.
///
/// Composes `mark_not_current` and `create_snapshot`; atomicity across the
/// pair is provided by the store implementation (a real transaction for
/// `SqliteStore`) together with the orchestrator's per-competitor lock,
/// which guarantees no other writer is touching this competitor meanwhile.
pub async fn write_next_version(
    store: &Arc<dyn SnapshotRepository>,
    config: &PageWatchConfig,
    competitor_id: &str,
    current: Option<&Snapshot>,
    new_html: &str,
    diff: &DiffResult,
) -> PageWatchResult<(Snapshot, Option<SnapshotDiff>)> {
    let current_version = current.map(|s| s.version_number).unwrap_or(0);
    let next_version = current_version + 1;
    let full = should_be_full(config, current_version, diff.severity);

    if let Some(current) = current {
        store.mark_not_current(competitor_id, &current.id).await?;
    }

    let snapshot = store
        .create_snapshot(NewSnapshot {
            competitor_id: competitor_id.to_string(),
            version_number: next_version,
            is_full_version: full,
            full_html: if full { Some(new_html.to_string()) } else { None },
            change_count: diff.change_count,
            change_percentage: diff.change_percentage,
            severity: diff.severity,
            change_type: diff.change_type,
            change_summary: diff.change_summary.clone(),
        })
        .await?;

    let snapshot_diff = if let Some(current) = current {
        let snapshot_diff = SnapshotDiff {
            id: format!("diff-{}", uuid_like()),
            from_snapshot_id: current.id.clone(),
            to_snapshot_id: snapshot.id.clone(),
            diff_data: diff.hunks.clone(),
            change_summary: diff.change_summary.clone(),
            change_count: diff.change_count,
            change_percentage: diff.change_percentage,
        };
        store.create_diff(snapshot_diff.clone()).await?;
        Some(snapshot_diff)
    } else {
        None
    };

    Ok((snapshot, snapshot_diff))
}

/// Reconstruct the full HTML of `version_number` for a competitor.
pub async fn reconstruct(
    store: &Arc<dyn SnapshotRepository>,
    competitor_id: &str,
    version_number: i64,
) -> PageWatchResult<String> {
    let target = store
        .get_by_version(competitor_id, version_number)
        .await?
        .ok_or_else(|| PageWatchError::SnapshotNotFound {
            competitor_id: competitor_id.to_string(),
            version_number,
        })?;

    if target.is_full_version {
        return target.full_html.ok_or_else(|| {
            PageWatchError::ReconstructionFailed(format!(
                "snapshot {} marked full but has no full_html",
                target.id
            ))
        });
    }

    let baseline = store
        .find_last_full_at_or_before(competitor_id, version_number)
        .await?
        .ok_or_else(|| {
            PageWatchError::ReconstructionFailed(format!(
                "no reachable baseline for competitor {} at or before version {}",
                competitor_id, version_number
            ))
        })?;

    let diffs = store
        .diffs_between(competitor_id, baseline.version_number, version_number)
        .await?;

    let expected = version_number - baseline.version_number;
    if diffs.len() as i64 != expected {
        return Err(PageWatchError::ReconstructionFailed(format!(
            "diff chain gap for competitor {}: expected {} diffs between version {} and {}, found {}",
            competitor_id,
            expected,
            baseline.version_number,
            version_number,
            diffs.len()
        )));
    }

    let mut html = baseline.full_html.ok_or_else(|| {
        PageWatchError::ReconstructionFailed(format!("baseline snapshot {} has no full_html", baseline.id))
    })?;

    for diff in diffs {
        html = apply_diff(&html, &diff.diff_data)?;
    }

    Ok(html)
}

fn apply_diff(base: &str, hunks: &[Hunk]) -> PageWatchResult<String> {
    let mut current = base.to_string();

    for hunk in hunks {
        match hunk.tag {
            HunkTag::Unchanged => {}
            HunkTag::Added => current.push_str(&hunk.text),
            HunkTag::Removed => {
                if let Some(pos) = current.find(hunk.text.as_str()) {
                    current.replace_range(pos..pos + hunk.text.len(), "");
                } else {
                    return Err(PageWatchError::ReconstructionFailed(
                        "removed hunk not found in base text during reconstruction".to_string(),
                    ));
                }
            }
        }
    }

    Ok(current)
}

/// Run the retention policy for one competitor, pruning until the version
/// count is at or below the configured ceiling.
///
/// Returns the number of snapshots deleted. Aborts (without rolling back
/// deletions already made) on a reconstruction failure, surfacing
/// `ReconstructionFailed`; the caller should treat this as a `RetentionBlocked`
/// condition that does not affect the capture that triggered the sweep.
pub async fn run_retention(
    store: &Arc<dyn SnapshotRepository>,
    config: &PageWatchConfig,
    competitor_id: &str,
) -> PageWatchResult<u32> {
    let mut deleted = 0u32;

    loop {
        let snapshots = store.list(competitor_id, ListOrder::Ascending).await?;
        if snapshots.len() <= config.max_versions_per_competitor {
            break;
        }

        let oldest = snapshots.first().expect("checked len above").clone();

        if !oldest.is_full_version {
            store.delete(&oldest.id).await?;
            deleted += 1;
            continue;
        }

        let next = snapshots
            .iter()
            .find(|s| s.version_number > oldest.version_number)
            .cloned();

        let Some(next) = next else {
            // Oldest full version is the only snapshot left; nothing safe to prune.
            break;
        };

        let reconstructed = reconstruct(store, competitor_id, next.version_number).await?;

        store
            .update(
                &next.id,
                SnapshotUpdate {
                    full_html: Some(Some(reconstructed)),
                    is_full_version: Some(true),
                    is_current: None,
                },
            )
            .await?;
        store.delete(&oldest.id).await?;
        deleted += 1;
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeType;
    use crate::store::InMemoryStore;

    fn config() -> PageWatchConfig {
        PageWatchConfig::new()
            .with_full_version_interval(3)
            .with_max_versions_per_competitor(3)
    }

    fn diff_result(severity: Severity) -> DiffResult {
        DiffResult {
            hunks: vec![Hunk {
                tag: HunkTag::Added,
                text: "x".repeat(150),
                line_count: 1,
            }],
            change_count: 1,
            change_percentage: 10.0,
            severity,
            change_type: ChangeType::Content,
            change_summary: "change".to_string(),
        }
    }

    #[tokio::test]
    async fn should_be_full_on_initial_capture() {
        let cfg = config();
        assert!(should_be_full(&cfg, 0, Severity::Low));
    }

    #[tokio::test]
    async fn should_be_full_on_critical_severity() {
        let cfg = config();
        assert!(should_be_full(&cfg, 1, Severity::Critical));
    }

    #[tokio::test]
    async fn should_be_full_on_interval_boundary() {
        let cfg = config();
        assert!(should_be_full(&cfg, 2, Severity::Low));
        assert!(!should_be_full(&cfg, 1, Severity::Low));
    }

    #[tokio::test]
    async fn write_next_version_creates_full_initial_snapshot() {
        let store: Arc<dyn SnapshotRepository> = Arc::new(InMemoryStore::new());
        let cfg = config();
        let (snap, diff) = write_next_version(&store, &cfg, "c1", None, "<html>v1</html>", &diff_result(Severity::Low))
            .await
            .unwrap();
        assert_eq!(snap.version_number, 1);
        assert!(snap.is_full_version);
        assert!(diff.is_none());
    }

    #[tokio::test]
    async fn reconstruction_round_trips_through_a_diff_chain() {
        let store: Arc<dyn SnapshotRepository> = Arc::new(InMemoryStore::new());
        let cfg = config();

        let (v1, _) = write_next_version(&store, &cfg, "c1", None, "line one\nline two\n", &diff_result(Severity::Low))
            .await
            .unwrap();

        let added = "x".repeat(150);
        let v2_html = format!("line one\nline two\n{}\n", added);
        let mut d = diff_result(Severity::Low);
        d.hunks = vec![
            Hunk {
                tag: HunkTag::Unchanged,
                text: "line one\nline two\n".to_string(),
                line_count: 2,
            },
            Hunk {
                tag: HunkTag::Added,
                text: format!("{}\n", added),
                line_count: 1,
            },
        ];
        let (v2, diff) = write_next_version(&store, &cfg, "c1", Some(&v1), &v2_html, &d)
            .await
            .unwrap();
        assert!(!v2.is_full_version);
        assert!(diff.is_some());

        let reconstructed = reconstruct(&store, "c1", 2).await.unwrap();
        assert_eq!(reconstructed, v2_html);
    }

    #[tokio::test]
    async fn retention_prunes_oldest_non_full_snapshot_directly() {
        let store: Arc<dyn SnapshotRepository> = Arc::new(InMemoryStore::new());
        let cfg = config();

        let mut prev: Option<Snapshot> = None;
        for v in 1..=5i64 {
            let html = format!("version {}\n", v);
            let d = if v == 1 {
                diff_result(Severity::Low)
            } else {
                let mut d = diff_result(Severity::Low);
                d.hunks = vec![Hunk {
                    tag: HunkTag::Added,
                    text: "x".repeat(150),
                    line_count: 1,
                }];
                d
            };
            let (snap, _) = write_next_version(&store, &cfg, "c1", prev.as_ref(), &html, &d)
                .await
                .unwrap();
            prev = Some(snap);
        }

        let deleted = run_retention(&store, &cfg, "c1").await.unwrap();
        assert!(deleted > 0);
        let remaining = store.list("c1", ListOrder::Ascending).await.unwrap();
        assert!(remaining.len() <= cfg.max_versions_per_competitor);
    }
}
