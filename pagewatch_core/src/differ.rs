//! Line-level diffing: LCS diff, significance filtering, and severity/type
//! classification.
//!
//! The longest-common-subsequence computation is delegated to `similar`; this
//! module owns the threshold filtering and classification rules layered on
//! top of it.

use crate::model::{ChangeType, Hunk, HunkTag, Severity};
use similar::{ChangeTag, TextDiff};

/// Aggregate result of comparing two normalized HTML strings.
#[derive(Debug, Clone)]
pub struct DiffResult {
    /// Ordered hunks, including unchanged runs (needed for reconstruction).
    pub hunks: Vec<Hunk>,
    /// Count of significant (added/removed, large-enough) hunks.
    pub change_count: u32,
    /// Change magnitude as a 0-100 percentage of normalized lines.
    pub change_percentage: f32,
    /// Severity classification.
    pub severity: Severity,
    /// Change type classification.
    pub change_type: ChangeType,
    /// Short human-readable summary.
    pub change_summary: String,
}

impl DiffResult {
    /// Whether the old and new text constitute a significant change worth storing.
    pub fn is_significant(&self, change_threshold: f32) -> bool {
        self.change_count > 0 && self.change_percentage >= change_threshold * 100.0
    }

    fn empty() -> Self {
        Self {
            hunks: Vec::new(),
            change_count: 0,
            change_percentage: 0.0,
            severity: Severity::Low,
            change_type: ChangeType::Other,
            change_summary: "no change".to_string(),
        }
    }
}

const PRICING_KEYWORDS: &[&str] = &[
    "price", "pricing", "$", "cost", "plan", "subscription", "discount", "free trial", "per month",
    "per year", "billed",
];
const FEATURE_KEYWORDS: &[&str] = &[
    "feature", "capability", "support", "integration", "api", "tool", "included", "unlimited",
];
const DESIGN_KEYWORDS: &[&str] = &[
    "layout", "color", "theme", "style", "design", "class=", "css", "font",
];
const CONTENT_KEYWORDS: &[&str] = &[
    "announcement", "blog", "article", "news", "update", "release", "read more",
];

/// Compare normalized `old` and `new` HTML and produce a classified diff.
///
/// Short-circuits on byte equality: an unchanged page never pays for LCS.
pub fn diff(old: &str, new: &str, significant_change_threshold: usize) -> DiffResult {
    if old == new {
        return DiffResult::empty();
    }

    let text_diff = TextDiff::from_lines(old, new);
    let hunks = group_into_hunks(&text_diff);

    let significant: Vec<&Hunk> = hunks
        .iter()
        .filter(|h| h.tag != HunkTag::Unchanged && h.text.trim().len() >= significant_change_threshold)
        .collect();

    let change_count = significant.len() as u32;
    let changed_lines: u32 = significant.iter().map(|h| h.line_count).sum();
    let total_lines = new.lines().count().max(1) as u32;
    let change_percentage = 100.0 * changed_lines as f32 / total_lines as f32;

    let severity = classify_severity(change_percentage, change_count);
    let joined: String = significant
        .iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let change_type = classify_change_type(&joined);
    let change_summary = summarize(change_count, change_percentage, change_type);

    DiffResult {
        hunks,
        change_count,
        change_percentage,
        severity,
        change_type,
        change_summary,
    }
}

fn group_into_hunks(text_diff: &TextDiff<'_, '_, '_, str>) -> Vec<Hunk> {
    let mut hunks: Vec<Hunk> = Vec::new();

    for change in text_diff.iter_all_changes() {
        let tag = match change.tag() {
            ChangeTag::Insert => HunkTag::Added,
            ChangeTag::Delete => HunkTag::Removed,
            ChangeTag::Equal => HunkTag::Unchanged,
        };
        let value = change.value();

        match hunks.last_mut() {
            Some(last) if last.tag == tag => {
                last.text.push_str(value);
                last.line_count += 1;
            }
            _ => hunks.push(Hunk {
                tag,
                text: value.to_string(),
                line_count: 1,
            }),
        }
    }

    hunks
}

fn classify_severity(change_percentage: f32, change_count: u32) -> Severity {
    if change_percentage > 20.0 || change_count > 50 {
        Severity::Critical
    } else if change_percentage > 10.0 || change_count > 20 {
        Severity::High
    } else if change_percentage > 5.0 || change_count > 10 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn classify_change_type(text: &str) -> ChangeType {
    let lower = text.to_lowercase();
    let score = |keywords: &[&str]| keywords.iter().filter(|k| lower.contains(*k)).count();

    let scores = [
        (ChangeType::Pricing, score(PRICING_KEYWORDS)),
        (ChangeType::Feature, score(FEATURE_KEYWORDS)),
        (ChangeType::Design, score(DESIGN_KEYWORDS)),
        (ChangeType::Content, score(CONTENT_KEYWORDS)),
    ];

    scores
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(t, _)| t)
        .unwrap_or(ChangeType::Other)
}

fn summarize(change_count: u32, change_percentage: f32, change_type: ChangeType) -> String {
    let type_label = match change_type {
        ChangeType::Pricing => "pricing",
        ChangeType::Feature => "feature",
        ChangeType::Design => "design",
        ChangeType::Content => "content",
        ChangeType::Other => "general",
    };
    format!(
        "{} {} change(s), {:.1}% of the page",
        change_count, type_label, change_percentage
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_identical_input_short_circuits_to_empty() {
        let result = diff("<p>same</p>", "<p>same</p>", 100);
        assert_eq!(result.change_count, 0);
        assert_eq!(result.severity, Severity::Low);
    }

    #[test]
    fn hunk_below_threshold_is_not_significant() {
        let old = "line one\nline two\n";
        let new = "line one\nline two\nshort\n";
        let result = diff(old, new, 100);
        assert_eq!(result.change_count, 0);
    }

    #[test]
    fn hunk_at_or_above_threshold_is_significant() {
        let added_line = "x".repeat(100);
        let old = "line one\n";
        let new = format!("line one\n{}\n", added_line);
        let result = diff(old, &new, 100);
        assert_eq!(result.change_count, 1);
        assert!(result.change_percentage > 0.0);
    }

    #[test]
    fn severity_escalates_with_percentage() {
        assert_eq!(classify_severity(2.0, 1), Severity::Low);
        assert_eq!(classify_severity(6.0, 1), Severity::Medium);
        assert_eq!(classify_severity(11.0, 1), Severity::High);
        assert_eq!(classify_severity(21.0, 1), Severity::Critical);
    }

    #[test]
    fn severity_escalates_with_hunk_count() {
        assert_eq!(classify_severity(0.0, 11), Severity::Medium);
        assert_eq!(classify_severity(0.0, 21), Severity::High);
        assert_eq!(classify_severity(0.0, 51), Severity::Critical);
    }

    #[test]
    fn classifies_pricing_change() {
        let text = "Our pricing is now $29/month per plan".repeat(3);
        assert_eq!(classify_change_type(&text), ChangeType::Pricing);
    }

    #[test]
    fn classifies_other_when_no_keyword_matches() {
        assert_eq!(classify_change_type("xyzzy plugh"), ChangeType::Other);
    }

    #[test]
    fn is_significant_respects_threshold() {
        let mut result = DiffResult::empty();
        result.change_count = 1;
        result.change_percentage = 4.9;
        assert!(!result.is_significant(0.05));

        result.change_percentage = 5.0;
        assert!(result.is_significant(0.05));
    }
}
