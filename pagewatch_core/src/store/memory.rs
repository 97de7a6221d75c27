use super::{CompetitorRepository, ListOrder, NewSnapshot, SnapshotRepository, SnapshotUpdate};
use crate::error::{PageWatchError, PageWatchResult};
use crate::model::{Alert, Competitor, Snapshot, SnapshotDiff};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory snapshot and competitor store, guarded by a single lock per
/// table. Good enough for the CLI and the default test configuration; the
/// caller's per-competitor capture lock (see the orchestrator) is what
/// actually keeps `mark_not_current` + `create_snapshot` atomic, the same
/// way the rest of this crate family favors explicit locking at the call
/// site over hidden cross-table transactions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    competitors: Arc<RwLock<HashMap<String, Competitor>>>,
    snapshots: Arc<RwLock<HashMap<String, Snapshot>>>,
    diffs: Arc<RwLock<HashMap<String, SnapshotDiff>>>,
    alerts: Arc<RwLock<HashMap<String, Vec<Alert>>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a competitor (test/CLI convenience).
    pub async fn insert_competitor(&self, competitor: Competitor) {
        self.competitors
            .write()
            .await
            .insert(competitor.id.clone(), competitor);
    }

    /// Test-only helper: simulate a concurrent writer that already took
    /// `version_number` as current, to exercise the orchestrator's
    /// `VersionConflict` retry path.
    #[cfg(test)]
    pub async fn insert_conflicting_snapshot(&self, competitor_id: &str, version_number: i64) {
        let mut snapshots = self.snapshots.write().await;
        for snap in snapshots.values_mut() {
            if snap.competitor_id == competitor_id {
                snap.is_current = false;
            }
        }
        let snapshot = Snapshot {
            id: format!("snap-{}", crate::model::uuid_like()),
            competitor_id: competitor_id.to_string(),
            version_number,
            captured_at: crate::model::now(),
            is_full_version: false,
            is_current: true,
            full_html: None,
            change_count: 1,
            change_percentage: 10.0,
            severity: crate::model::Severity::Low,
            change_type: crate::model::ChangeType::Other,
            change_summary: "concurrent writer".to_string(),
        };
        snapshots.insert(snapshot.id.clone(), snapshot);
    }

    async fn snapshots_for(&self, competitor_id: &str) -> Vec<Snapshot> {
        self.snapshots
            .read()
            .await
            .values()
            .filter(|s| s.competitor_id == competitor_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CompetitorRepository for InMemoryStore {
    async fn get(&self, id: &str) -> PageWatchResult<Option<Competitor>> {
        Ok(self.competitors.read().await.get(id).cloned())
    }

    async fn save(&self, competitor: &Competitor) -> PageWatchResult<()> {
        self.competitors
            .write()
            .await
            .insert(competitor.id.clone(), competitor.clone());
        Ok(())
    }

    async fn list_monitored(&self) -> PageWatchResult<Vec<Competitor>> {
        Ok(self
            .competitors
            .read()
            .await
            .values()
            .filter(|c| c.monitoring_enabled)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryStore {
    async fn get_current(&self, competitor_id: &str) -> PageWatchResult<Option<Snapshot>> {
        Ok(self
            .snapshots_for(competitor_id)
            .await
            .into_iter()
            .find(|s| s.is_current))
    }

    async fn get_by_version(
        &self,
        competitor_id: &str,
        version_number: i64,
    ) -> PageWatchResult<Option<Snapshot>> {
        Ok(self
            .snapshots_for(competitor_id)
            .await
            .into_iter()
            .find(|s| s.version_number == version_number))
    }

    async fn list(&self, competitor_id: &str, order: ListOrder) -> PageWatchResult<Vec<Snapshot>> {
        let mut snaps = self.snapshots_for(competitor_id).await;
        snaps.sort_by_key(|s| s.version_number);
        if order == ListOrder::Descending {
            snaps.reverse();
        }
        Ok(snaps)
    }

    async fn find_last_full_at_or_before(
        &self,
        competitor_id: &str,
        version_number: i64,
    ) -> PageWatchResult<Option<Snapshot>> {
        let mut snaps: Vec<Snapshot> = self
            .snapshots_for(competitor_id)
            .await
            .into_iter()
            .filter(|s| s.is_full_version && s.version_number <= version_number)
            .collect();
        snaps.sort_by_key(|s| s.version_number);
        Ok(snaps.pop())
    }

    async fn diffs_between(
        &self,
        competitor_id: &str,
        from_version: i64,
        to_version: i64,
    ) -> PageWatchResult<Vec<SnapshotDiff>> {
        let snaps = self.snapshots_for(competitor_id).await;
        let version_of_snapshot_id = |id: &str| snaps.iter().find(|s| s.id == id).map(|s| s.version_number);

        let mut diffs: Vec<SnapshotDiff> = self
            .diffs
            .read()
            .await
            .values()
            .filter(|d| {
                let to_v = version_of_snapshot_id(&d.to_snapshot_id);
                matches!(to_v, Some(v) if v > from_version && v <= to_version)
            })
            .cloned()
            .collect();

        diffs.sort_by_key(|d| version_of_snapshot_id(&d.to_snapshot_id).unwrap_or(0));
        Ok(diffs)
    }

    async fn mark_not_current(&self, competitor_id: &str, except_id: &str) -> PageWatchResult<()> {
        let mut snapshots = self.snapshots.write().await;
        for snap in snapshots.values_mut() {
            if snap.competitor_id == competitor_id && snap.id != except_id {
                snap.is_current = false;
            }
        }
        Ok(())
    }

    async fn create_snapshot(&self, attrs: NewSnapshot) -> PageWatchResult<Snapshot> {
        let mut snapshots = self.snapshots.write().await;
        let conflict = snapshots.values().any(|s| {
            s.competitor_id == attrs.competitor_id && s.version_number == attrs.version_number
        });
        if conflict {
            return Err(PageWatchError::VersionConflict {
                competitor_id: attrs.competitor_id,
                version_number: attrs.version_number,
            });
        }

        let snapshot = Snapshot {
            id: format!("snap-{}", crate::model::uuid_like()),
            competitor_id: attrs.competitor_id,
            version_number: attrs.version_number,
            captured_at: crate::model::now(),
            is_full_version: attrs.is_full_version,
            is_current: true,
            full_html: attrs.full_html,
            change_count: attrs.change_count,
            change_percentage: attrs.change_percentage,
            severity: attrs.severity,
            change_type: attrs.change_type,
            change_summary: attrs.change_summary,
        };
        snapshots.insert(snapshot.id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn create_diff(&self, diff: SnapshotDiff) -> PageWatchResult<()> {
        self.diffs.write().await.insert(diff.id.clone(), diff);
        Ok(())
    }

    async fn update(&self, snapshot_id: &str, update: SnapshotUpdate) -> PageWatchResult<()> {
        let mut snapshots = self.snapshots.write().await;
        let snap = snapshots
            .get_mut(snapshot_id)
            .ok_or_else(|| PageWatchError::StoreUnavailable(format!("unknown snapshot {}", snapshot_id)))?;
        if let Some(full_html) = update.full_html {
            snap.full_html = full_html;
        }
        if let Some(is_full_version) = update.is_full_version {
            snap.is_full_version = is_full_version;
        }
        if let Some(is_current) = update.is_current {
            snap.is_current = is_current;
        }
        Ok(())
    }

    async fn delete(&self, snapshot_id: &str) -> PageWatchResult<()> {
        let mut snapshots = self.snapshots.write().await;
        if let Some(removed) = snapshots.remove(snapshot_id) {
            let mut diffs = self.diffs.write().await;
            diffs.retain(|_, d| d.to_snapshot_id != removed.id);
        }
        Ok(())
    }

    async fn create_alert(&self, alert: Alert) -> PageWatchResult<()> {
        self.alerts
            .write()
            .await
            .entry(alert.competitor_id.clone())
            .or_default()
            .push(alert);
        Ok(())
    }

    async fn list_alerts(&self, competitor_id: &str) -> PageWatchResult<Vec<Alert>> {
        let mut alerts = self
            .alerts
            .read()
            .await
            .get(competitor_id)
            .cloned()
            .unwrap_or_default();
        alerts.sort_by_key(|a| std::cmp::Reverse(a.version_number));
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeType, Severity};

    #[tokio::test]
    async fn create_snapshot_rejects_duplicate_version() {
        let store = InMemoryStore::new();
        let attrs = NewSnapshot {
            competitor_id: "c1".into(),
            version_number: 1,
            is_full_version: true,
            full_html: Some("<html></html>".into()),
            change_count: 0,
            change_percentage: 0.0,
            severity: Severity::Low,
            change_type: ChangeType::Other,
            change_summary: "initial".into(),
        };
        store.create_snapshot(attrs.clone()).await.unwrap();
        let err = store.create_snapshot(attrs).await.unwrap_err();
        assert!(matches!(err, PageWatchError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn mark_not_current_only_touches_the_named_competitor() {
        let store = InMemoryStore::new();
        let s1 = store
            .create_snapshot(NewSnapshot {
                competitor_id: "c1".into(),
                version_number: 1,
                is_full_version: true,
                full_html: Some("a".into()),
                change_count: 0,
                change_percentage: 0.0,
                severity: Severity::Low,
                change_type: ChangeType::Other,
                change_summary: "initial".into(),
            })
            .await
            .unwrap();
        let other = store
            .create_snapshot(NewSnapshot {
                competitor_id: "c2".into(),
                version_number: 1,
                is_full_version: true,
                full_html: Some("b".into()),
                change_count: 0,
                change_percentage: 0.0,
                severity: Severity::Low,
                change_type: ChangeType::Other,
                change_summary: "initial".into(),
            })
            .await
            .unwrap();

        store.mark_not_current("c1", "nonexistent").await.unwrap();

        let s1_after = store.get_by_version("c1", 1).await.unwrap().unwrap();
        assert!(!s1_after.is_current);
        let other_after = store.get_by_version("c2", 1).await.unwrap().unwrap();
        assert!(other_after.is_current);
        assert_eq!(s1.competitor_id, "c1");
        assert_eq!(other.competitor_id, "c2");
    }

    #[tokio::test]
    async fn find_last_full_at_or_before_picks_the_nearest_baseline() {
        let store = InMemoryStore::new();
        for v in 1..=3i64 {
            store
                .create_snapshot(NewSnapshot {
                    competitor_id: "c1".into(),
                    version_number: v,
                    is_full_version: v == 1,
                    full_html: if v == 1 { Some("full".into()) } else { None },
                    change_count: 1,
                    change_percentage: 10.0,
                    severity: Severity::Low,
                    change_type: ChangeType::Other,
                    change_summary: "change".into(),
                })
                .await
                .unwrap();
        }

        let baseline = store
            .find_last_full_at_or_before("c1", 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(baseline.version_number, 1);
    }

    #[tokio::test]
    async fn delete_cascades_incoming_diff() {
        let store = InMemoryStore::new();
        let snap = store
            .create_snapshot(NewSnapshot {
                competitor_id: "c1".into(),
                version_number: 2,
                is_full_version: false,
                full_html: None,
                change_count: 1,
                change_percentage: 10.0,
                severity: Severity::Low,
                change_type: ChangeType::Other,
                change_summary: "change".into(),
            })
            .await
            .unwrap();
        store
            .create_diff(SnapshotDiff {
                id: "diff-1".into(),
                from_snapshot_id: "snap-1".into(),
                to_snapshot_id: snap.id.clone(),
                diff_data: vec![],
                change_summary: "change".into(),
                change_count: 1,
                change_percentage: 10.0,
            })
            .await
            .unwrap();

        store.delete(&snap.id).await.unwrap();

        let remaining = store.diffs.read().await;
        assert!(remaining.is_empty());
    }
}
