//! Alert Emitter: turns a detected change into a structured [`Alert`] record.
//!
//! Pure with respect to persistence — callers decide whether/how to store
//! the result via [`crate::store::SnapshotRepository::create_alert`].

use crate::differ::DiffResult;
use crate::model::{Alert, AlertStatus, AlertType, ChangeType, Severity, Snapshot};
use crate::model::{uuid_like, AffectedSection};

/// Build the alert for a significant capture.
///
/// `sections` is the Section Extractor's best-effort output (may be empty);
/// its dominant section type can upgrade a `content_change` alert to
/// `price_change` alongside the `change_type` classification.
pub fn emit_change_alert(
    user_id: &str,
    competitor_id: &str,
    snapshot: &Snapshot,
    diff: &DiffResult,
    sections: &[AffectedSection],
) -> Alert {
    let alert_type = classify_alert_type(diff, snapshot.severity, sections);
    let title = title_for(alert_type, diff.change_count, diff.change_percentage);

    Alert {
        id: format!("alert-{}", uuid_like()),
        user_id: user_id.to_string(),
        competitor_id: competitor_id.to_string(),
        snapshot_id: snapshot.id.clone(),
        alert_type,
        severity: snapshot.severity,
        status: AlertStatus::Unread,
        title,
        message: diff.change_summary.clone(),
        change_count: diff.change_count,
        change_percentage: diff.change_percentage,
        version_number: snapshot.version_number,
        change_summary: diff.change_summary.clone(),
        affected_sections: sections.to_vec(),
    }
}

/// Build the alert for a competitor's first-ever successful capture.
pub fn emit_new_page_alert(user_id: &str, competitor_id: &str, snapshot: &Snapshot) -> Alert {
    Alert {
        id: format!("alert-{}", uuid_like()),
        user_id: user_id.to_string(),
        competitor_id: competitor_id.to_string(),
        snapshot_id: snapshot.id.clone(),
        alert_type: AlertType::NewPage,
        severity: Severity::Low,
        status: AlertStatus::Unread,
        title: "New page captured".to_string(),
        message: "Baseline snapshot recorded; future changes will be compared against it.".to_string(),
        change_count: 0,
        change_percentage: 0.0,
        version_number: snapshot.version_number,
        change_summary: "initial capture".to_string(),
        affected_sections: Vec::new(),
    }
}

/// Build the alert for an unrecoverable capture failure.
///
/// Always `severity=high`, `type=error`, and carries no version/snapshot
/// attribution beyond the competitor — the orchestrator calls this when
/// there is no snapshot to attach to.
pub fn emit_error_alert(user_id: &str, competitor_id: &str, message: &str) -> Alert {
    Alert {
        id: format!("alert-{}", uuid_like()),
        user_id: user_id.to_string(),
        competitor_id: competitor_id.to_string(),
        snapshot_id: String::new(),
        alert_type: AlertType::Error,
        severity: Severity::High,
        status: AlertStatus::Unread,
        title: "Capture failed".to_string(),
        message: message.to_string(),
        change_count: 0,
        change_percentage: 0.0,
        version_number: 0,
        change_summary: message.to_string(),
        affected_sections: Vec::new(),
    }
}

fn classify_alert_type(diff: &DiffResult, severity: Severity, sections: &[AffectedSection]) -> AlertType {
    let dominant_is_pricing = dominant_section_type(sections)
        .map(|t| t == "pricing")
        .unwrap_or(false);

    if diff.change_type == ChangeType::Pricing
        || (dominant_is_pricing && severity >= Severity::Medium)
    {
        AlertType::PriceChange
    } else {
        AlertType::ContentChange
    }
}

fn dominant_section_type(sections: &[AffectedSection]) -> Option<&str> {
    sections
        .iter()
        .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))
        .map(|s| s.section_type.as_str())
}

fn title_for(alert_type: AlertType, change_count: u32, change_percentage: f32) -> String {
    let label = match alert_type {
        AlertType::PriceChange => "Pricing change detected",
        AlertType::ContentChange => "Page content changed",
        AlertType::NewPage => "New page captured",
        AlertType::PageRemoved => "Page no longer reachable",
        AlertType::Error => "Capture failed",
    };
    format!(
        "{} ({} change(s), {:.1}%)",
        label, change_count, change_percentage
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Hunk, HunkTag};

    fn snapshot(severity: Severity) -> Snapshot {
        Snapshot {
            id: "snap-2".into(),
            competitor_id: "c1".into(),
            version_number: 2,
            captured_at: 0,
            is_full_version: false,
            is_current: true,
            full_html: None,
            change_count: 1,
            change_percentage: 10.0,
            severity,
            change_type: ChangeType::Content,
            change_summary: "1 content change(s), 10.0% of the page".into(),
        }
    }

    fn diff(change_type: ChangeType) -> DiffResult {
        DiffResult {
            hunks: vec![Hunk {
                tag: HunkTag::Added,
                text: "x".repeat(120),
                line_count: 1,
            }],
            change_count: 1,
            change_percentage: 10.0,
            severity: Severity::Medium,
            change_type,
            change_summary: "change".into(),
        }
    }

    #[test]
    fn defaults_to_content_change() {
        let alert = emit_change_alert("u1", "c1", &snapshot(Severity::Medium), &diff(ChangeType::Content), &[]);
        assert_eq!(alert.alert_type, AlertType::ContentChange);
        assert_eq!(alert.severity, Severity::Medium);
    }

    #[test]
    fn pricing_change_type_upgrades_alert() {
        let alert = emit_change_alert("u1", "c1", &snapshot(Severity::Medium), &diff(ChangeType::Pricing), &[]);
        assert_eq!(alert.alert_type, AlertType::PriceChange);
    }

    #[test]
    fn dominant_pricing_section_upgrades_alert_at_medium_or_above() {
        let sections = vec![AffectedSection {
            selector: "#pricing".into(),
            section_type: "pricing".into(),
            confidence: 0.9,
            changes: vec!["$29/mo".into()],
        }];
        let alert = emit_change_alert("u1", "c1", &snapshot(Severity::Medium), &diff(ChangeType::Content), &sections);
        assert_eq!(alert.alert_type, AlertType::PriceChange);
    }

    #[test]
    fn dominant_pricing_section_does_not_upgrade_below_medium() {
        let sections = vec![AffectedSection {
            selector: "#pricing".into(),
            section_type: "pricing".into(),
            confidence: 0.9,
            changes: vec!["$29/mo".into()],
        }];
        let alert = emit_change_alert("u1", "c1", &snapshot(Severity::Low), &diff(ChangeType::Content), &sections);
        assert_eq!(alert.alert_type, AlertType::ContentChange);
    }

    #[test]
    fn new_page_alert_carries_low_severity() {
        let alert = emit_new_page_alert("u1", "c1", &snapshot(Severity::Low));
        assert_eq!(alert.alert_type, AlertType::NewPage);
        assert_eq!(alert.severity, Severity::Low);
    }

    #[test]
    fn error_alert_carries_high_severity() {
        let alert = emit_error_alert("u1", "c1", "renderer unavailable");
        assert_eq!(alert.alert_type, AlertType::Error);
        assert_eq!(alert.severity, Severity::High);
    }
}
