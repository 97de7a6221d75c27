use super::{CompetitorRepository, ListOrder, NewSnapshot, SnapshotRepository, SnapshotUpdate};
use crate::compress;
use crate::error::{PageWatchError, PageWatchResult};
use crate::model::{
    Alert, AlertStatus, AlertType, ChangeType, Competitor, Hunk, Priority, Severity, Snapshot,
    SnapshotDiff,
};
use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

/// SQLite-backed store, durable across process restarts.
///
/// Grounded on the same parameterized-query, `FromRow`-free manual mapping
/// style used elsewhere in this crate family for sqlite-backed persistence.
/// `mark_not_current` and the following `create_snapshot` run inside one
/// `sqlx` transaction via [`SqliteStore::write_new_version`], giving the
/// "exactly one current" invariant real atomicity independent of the
/// orchestrator's per-competitor lock.
///
/// `full_html` is framed with [`compress`] on the way in and inverted on the
/// way out when `compression_enabled` is set; every other column is stored
/// as plain text.
pub struct SqliteStore {
    pool: SqlitePool,
    compression_enabled: bool,
}

impl SqliteStore {
    /// Connect to (and migrate) a sqlite database at `path`, with storage
    /// compression enabled (the configured default).
    pub async fn connect(path: &str) -> PageWatchResult<Self> {
        Self::connect_with(path, true).await
    }

    /// Connect to (and migrate) a sqlite database at `path`, explicitly
    /// choosing whether stored `full_html` payloads are gzip-framed.
    pub async fn connect_with(path: &str, compression_enabled: bool) -> PageWatchResult<Self> {
        let url = format!("sqlite://{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new().max_connections(5).connect(&url).await?;
        let store = Self {
            pool,
            compression_enabled,
        };
        store.migrate().await?;
        Ok(store)
    }

    fn frame_full_html(&self, html: Option<String>) -> Option<String> {
        if self.compression_enabled {
            html.as_deref().map(compress::encode)
        } else {
            html
        }
    }

    fn unframe_full_html(&self, framed: Option<String>) -> PageWatchResult<Option<String>> {
        match framed {
            None => Ok(None),
            Some(raw) if self.compression_enabled => compress::decode(&raw)
                .map(Some)
                .map_err(PageWatchError::ReconstructionFailed),
            Some(raw) => Ok(Some(raw)),
        }
    }

    async fn migrate(&self) -> PageWatchResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS competitors (
                id TEXT PRIMARY KEY,
                owner_user_id TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL,
                monitoring_enabled INTEGER NOT NULL,
                check_interval_secs INTEGER NOT NULL,
                priority TEXT NOT NULL,
                total_versions INTEGER NOT NULL,
                last_checked_at INTEGER,
                last_change_at INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                competitor_id TEXT NOT NULL,
                version_number INTEGER NOT NULL,
                captured_at INTEGER NOT NULL,
                is_full_version INTEGER NOT NULL,
                is_current INTEGER NOT NULL,
                full_html TEXT,
                change_count INTEGER NOT NULL,
                change_percentage REAL NOT NULL,
                severity TEXT NOT NULL,
                change_type TEXT NOT NULL,
                change_summary TEXT NOT NULL,
                UNIQUE(competitor_id, version_number)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_snapshots_competitor_current
                ON snapshots(competitor_id, is_current)
                WHERE is_current = 1;
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_snapshots_competitor_captured_at
                ON snapshots(competitor_id, captured_at DESC);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot_diffs (
                id TEXT PRIMARY KEY,
                from_snapshot_id TEXT NOT NULL,
                to_snapshot_id TEXT NOT NULL,
                diff_data TEXT NOT NULL,
                change_summary TEXT NOT NULL,
                change_count INTEGER NOT NULL,
                change_percentage REAL NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_snapshot_diffs_to_snapshot
                ON snapshot_diffs(to_snapshot_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                competitor_id TEXT NOT NULL,
                snapshot_id TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                status TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                change_count INTEGER NOT NULL,
                change_percentage REAL NOT NULL,
                version_number INTEGER NOT NULL,
                change_summary TEXT NOT NULL,
                affected_sections TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomically mark the current snapshot stale and insert the new one.
    pub async fn write_new_version(&self, attrs: NewSnapshot) -> PageWatchResult<Snapshot> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE snapshots SET is_current = 0 WHERE competitor_id = ?")
            .bind(&attrs.competitor_id)
            .execute(&mut *tx)
            .await?;

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

        let framed_html = self.frame_full_html(snapshot.full_html.clone());

        sqlx::query(
            r#"INSERT INTO snapshots
               (id, competitor_id, version_number, captured_at, is_full_version, is_current,
                full_html, change_count, change_percentage, severity, change_type, change_summary)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.competitor_id)
        .bind(snapshot.version_number)
        .bind(snapshot.captured_at)
        .bind(snapshot.is_full_version)
        .bind(snapshot.is_current)
        .bind(framed_html)
        .bind(snapshot.change_count)
        .bind(snapshot.change_percentage)
        .bind(severity_to_str(snapshot.severity))
        .bind(change_type_to_str(snapshot.change_type))
        .bind(&snapshot.change_summary)
        .execute(&mut *tx)
        .await
        .map_err(|e| version_conflict_or(e, &snapshot.competitor_id, snapshot.version_number))?;

        tx.commit().await?;
        Ok(snapshot)
    }
}

/// Maps the `UNIQUE(competitor_id, version_number)` constraint violation onto
/// [`PageWatchError::VersionConflict`]; any other database error passes through.
fn version_conflict_or(err: sqlx::Error, competitor_id: &str, version_number: i64) -> PageWatchError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return PageWatchError::VersionConflict {
                competitor_id: competitor_id.to_string(),
                version_number,
            };
        }
    }
    PageWatchError::Database(err)
}

fn severity_to_str(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn severity_from_str(s: &str) -> Severity {
    match s {
        "medium" => Severity::Medium,
        "high" => Severity::High,
        "critical" => Severity::Critical,
        _ => Severity::Low,
    }
}

fn change_type_to_str(t: ChangeType) -> &'static str {
    match t {
        ChangeType::Pricing => "pricing",
        ChangeType::Feature => "feature",
        ChangeType::Design => "design",
        ChangeType::Content => "content",
        ChangeType::Other => "other",
    }
}

fn change_type_from_str(s: &str) -> ChangeType {
    match s {
        "pricing" => ChangeType::Pricing,
        "feature" => ChangeType::Feature,
        "design" => ChangeType::Design,
        "content" => ChangeType::Content,
        _ => ChangeType::Other,
    }
}

impl SqliteStore {
    fn row_to_snapshot(&self, row: &sqlx::sqlite::SqliteRow) -> PageWatchResult<Snapshot> {
        Ok(Snapshot {
            id: row.get("id"),
            competitor_id: row.get("competitor_id"),
            version_number: row.get("version_number"),
            captured_at: row.get("captured_at"),
            is_full_version: row.get("is_full_version"),
            is_current: row.get("is_current"),
            full_html: self.unframe_full_html(row.get("full_html"))?,
            change_count: row.get::<i64, _>("change_count") as u32,
            change_percentage: row.get("change_percentage"),
            severity: severity_from_str(row.get("severity")),
            change_type: change_type_from_str(row.get("change_type")),
            change_summary: row.get("change_summary"),
        })
    }
}

#[async_trait]
impl CompetitorRepository for SqliteStore {
    async fn get(&self, id: &str) -> PageWatchResult<Option<Competitor>> {
        let row = sqlx::query("SELECT * FROM competitors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Competitor {
            id: r.get("id"),
            owner_user_id: r.get("owner_user_id"),
            url: r.get("url"),
            monitoring_enabled: r.get("monitoring_enabled"),
            check_interval_secs: r.get::<i64, _>("check_interval_secs") as u64,
            priority: match r.get::<String, _>("priority").as_str() {
                "low" => Priority::Low,
                "high" => Priority::High,
                _ => Priority::Medium,
            },
            total_versions: r.get::<i64, _>("total_versions") as u32,
            last_checked_at: r.get("last_checked_at"),
            last_change_at: r.get("last_change_at"),
        }))
    }

    async fn save(&self, competitor: &Competitor) -> PageWatchResult<()> {
        let priority = match competitor.priority {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        sqlx::query(
            r#"INSERT INTO competitors
               (id, owner_user_id, url, monitoring_enabled, check_interval_secs, priority, total_versions, last_checked_at, last_change_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 owner_user_id = excluded.owner_user_id,
                 url = excluded.url,
                 monitoring_enabled = excluded.monitoring_enabled,
                 check_interval_secs = excluded.check_interval_secs,
                 priority = excluded.priority,
                 total_versions = excluded.total_versions,
                 last_checked_at = excluded.last_checked_at,
                 last_change_at = excluded.last_change_at"#,
        )
        .bind(&competitor.id)
        .bind(&competitor.owner_user_id)
        .bind(&competitor.url)
        .bind(competitor.monitoring_enabled)
        .bind(competitor.check_interval_secs as i64)
        .bind(priority)
        .bind(competitor.total_versions as i64)
        .bind(competitor.last_checked_at)
        .bind(competitor.last_change_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_monitored(&self) -> PageWatchResult<Vec<Competitor>> {
        let rows = sqlx::query("SELECT id FROM competitors WHERE monitoring_enabled = 1")
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::new();
        for row in rows {
            let id: String = row.get("id");
            if let Some(c) = self.get(&id).await? {
                out.push(c);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl SnapshotRepository for SqliteStore {
    async fn get_current(&self, competitor_id: &str) -> PageWatchResult<Option<Snapshot>> {
        let row = sqlx::query("SELECT * FROM snapshots WHERE competitor_id = ? AND is_current = 1")
            .bind(competitor_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| self.row_to_snapshot(&r)).transpose()
    }

    async fn get_by_version(
        &self,
        competitor_id: &str,
        version_number: i64,
    ) -> PageWatchResult<Option<Snapshot>> {
        let row = sqlx::query("SELECT * FROM snapshots WHERE competitor_id = ? AND version_number = ?")
            .bind(competitor_id)
            .bind(version_number)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| self.row_to_snapshot(&r)).transpose()
    }

    async fn list(&self, competitor_id: &str, order: ListOrder) -> PageWatchResult<Vec<Snapshot>> {
        let direction = match order {
            ListOrder::Ascending => "ASC",
            ListOrder::Descending => "DESC",
        };
        let query = format!(
            "SELECT * FROM snapshots WHERE competitor_id = ? ORDER BY version_number {}",
            direction
        );
        let rows = sqlx::query(&query)
            .bind(competitor_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| self.row_to_snapshot(r)).collect()
    }

    async fn find_last_full_at_or_before(
        &self,
        competitor_id: &str,
        version_number: i64,
    ) -> PageWatchResult<Option<Snapshot>> {
        let row = sqlx::query(
            r#"SELECT * FROM snapshots
               WHERE competitor_id = ? AND is_full_version = 1 AND version_number <= ?
               ORDER BY version_number DESC LIMIT 1"#,
        )
        .bind(competitor_id)
        .bind(version_number)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| self.row_to_snapshot(&r)).transpose()
    }

    async fn diffs_between(
        &self,
        competitor_id: &str,
        from_version: i64,
        to_version: i64,
    ) -> PageWatchResult<Vec<SnapshotDiff>> {
        let rows = sqlx::query(
            r#"SELECT d.* FROM snapshot_diffs d
               JOIN snapshots s ON s.id = d.to_snapshot_id
               WHERE s.competitor_id = ? AND s.version_number > ? AND s.version_number <= ?
               ORDER BY s.version_number ASC"#,
        )
        .bind(competitor_id)
        .bind(from_version)
        .bind(to_version)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let diff_data: Vec<Hunk> =
                    serde_json::from_str(r.get::<String, _>("diff_data").as_str()).unwrap_or_default();
                SnapshotDiff {
                    id: r.get("id"),
                    from_snapshot_id: r.get("from_snapshot_id"),
                    to_snapshot_id: r.get("to_snapshot_id"),
                    diff_data,
                    change_summary: r.get("change_summary"),
                    change_count: r.get::<i64, _>("change_count") as u32,
                    change_percentage: r.get("change_percentage"),
                }
            })
            .collect())
    }

    async fn mark_not_current(&self, competitor_id: &str, except_id: &str) -> PageWatchResult<()> {
        sqlx::query("UPDATE snapshots SET is_current = 0 WHERE competitor_id = ? AND id != ?")
            .bind(competitor_id)
            .bind(except_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_snapshot(&self, attrs: NewSnapshot) -> PageWatchResult<Snapshot> {
        self.write_new_version(attrs).await
    }

    async fn create_diff(&self, diff: SnapshotDiff) -> PageWatchResult<()> {
        let diff_data = serde_json::to_string(&diff.diff_data)?;
        sqlx::query(
            r#"INSERT INTO snapshot_diffs
               (id, from_snapshot_id, to_snapshot_id, diff_data, change_summary, change_count, change_percentage)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&diff.id)
        .bind(&diff.from_snapshot_id)
        .bind(&diff.to_snapshot_id)
        .bind(diff_data)
        .bind(&diff.change_summary)
        .bind(diff.change_count)
        .bind(diff.change_percentage)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, snapshot_id: &str, update: SnapshotUpdate) -> PageWatchResult<()> {
        if let Some(full_html) = update.full_html {
            let framed = self.frame_full_html(full_html);
            sqlx::query("UPDATE snapshots SET full_html = ? WHERE id = ?")
                .bind(framed)
                .bind(snapshot_id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(is_full_version) = update.is_full_version {
            sqlx::query("UPDATE snapshots SET is_full_version = ? WHERE id = ?")
                .bind(is_full_version)
                .bind(snapshot_id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(is_current) = update.is_current {
            sqlx::query("UPDATE snapshots SET is_current = ? WHERE id = ?")
                .bind(is_current)
                .bind(snapshot_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn delete(&self, snapshot_id: &str) -> PageWatchResult<()> {
        sqlx::query("DELETE FROM snapshot_diffs WHERE to_snapshot_id = ?")
            .bind(snapshot_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM snapshots WHERE id = ?")
            .bind(snapshot_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_alert(&self, alert: Alert) -> PageWatchResult<()> {
        let affected_sections = serde_json::to_string(&alert.affected_sections)?;
        let alert_type = match alert.alert_type {
            AlertType::ContentChange => "content_change",
            AlertType::PriceChange => "price_change",
            AlertType::NewPage => "new_page",
            AlertType::PageRemoved => "page_removed",
            AlertType::Error => "error",
        };
        let status = match alert.status {
            AlertStatus::Unread => "unread",
            AlertStatus::Read => "read",
            AlertStatus::Archived => "archived",
        };
        sqlx::query(
            r#"INSERT INTO alerts
               (id, user_id, competitor_id, snapshot_id, alert_type, severity, status, title, message,
                change_count, change_percentage, version_number, change_summary, affected_sections)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&alert.id)
        .bind(&alert.user_id)
        .bind(&alert.competitor_id)
        .bind(&alert.snapshot_id)
        .bind(alert_type)
        .bind(severity_to_str(alert.severity))
        .bind(status)
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.change_count)
        .bind(alert.change_percentage)
        .bind(alert.version_number)
        .bind(&alert.change_summary)
        .bind(affected_sections)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_alerts(&self, competitor_id: &str) -> PageWatchResult<Vec<Alert>> {
        let rows = sqlx::query(
            "SELECT * FROM alerts WHERE competitor_id = ? ORDER BY version_number DESC",
        )
        .bind(competitor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Alert {
                id: r.get("id"),
                user_id: r.get("user_id"),
                competitor_id: r.get("competitor_id"),
                snapshot_id: r.get("snapshot_id"),
                alert_type: match r.get::<String, _>("alert_type").as_str() {
                    "price_change" => AlertType::PriceChange,
                    "new_page" => AlertType::NewPage,
                    "page_removed" => AlertType::PageRemoved,
                    "error" => AlertType::Error,
                    _ => AlertType::ContentChange,
                },
                severity: severity_from_str(r.get("severity")),
                status: match r.get::<String, _>("status").as_str() {
                    "read" => AlertStatus::Read,
                    "archived" => AlertStatus::Archived,
                    _ => AlertStatus::Unread,
                },
                title: r.get("title"),
                message: r.get("message"),
                change_count: r.get::<i64, _>("change_count") as u32,
                change_percentage: r.get("change_percentage"),
                version_number: r.get("version_number"),
                change_summary: r.get("change_summary"),
                affected_sections: serde_json::from_str(r.get::<String, _>("affected_sections").as_str())
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrate_and_round_trip_competitor() {
        let store = SqliteStore::connect(":memory:").await.unwrap();
        let competitor = Competitor::new("c1", "https://example.com");
        store.save(&competitor).await.unwrap();

        let fetched = store.get("c1").await.unwrap().unwrap();
        assert_eq!(fetched.url, "https://example.com");
    }

    #[tokio::test]
    async fn write_new_version_marks_previous_snapshot_stale() {
        let store = SqliteStore::connect(":memory:").await.unwrap();
        store
            .write_new_version(NewSnapshot {
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
        store
            .write_new_version(NewSnapshot {
                competitor_id: "c1".into(),
                version_number: 2,
                is_full_version: false,
                full_html: None,
                change_count: 1,
                change_percentage: 10.0,
                severity: Severity::Medium,
                change_type: ChangeType::Content,
                change_summary: "change".into(),
            })
            .await
            .unwrap();

        let current = store.get_current("c1").await.unwrap().unwrap();
        assert_eq!(current.version_number, 2);
        let old = store.get_by_version("c1", 1).await.unwrap().unwrap();
        assert!(!old.is_current);
    }
}
