//! Section extraction: maps diff hunks to semantic page regions so alerts can
//! say *where* a change happened, not just that one occurred.
//!
//! This is strictly enrichment — a failure here degrades to an empty
//! [`AffectedSection`] list and never blocks a capture.

use crate::model::{AffectedSection, Hunk, HunkTag};

const SECTION_TYPES: &[&str] = &[
    "hero",
    "pricing",
    "features",
    "testimonials",
    "cta",
    "navigation",
    "header",
    "footer",
    "form",
    "about",
    "team",
    "gallery",
    "blog",
    "faq",
    "content",
];

const SNIPPET_LIMIT: usize = 200;

/// Extract an [`AffectedSection`] for each significant hunk in `html`.
///
/// `html` is the full (pre-diff-filtering) page the hunks were taken from,
/// used to locate selector/ancestor context for the content-search and
/// structural-analogy strategies.
pub fn extract_sections(html: &str, hunks: &[Hunk]) -> Vec<AffectedSection> {
    hunks
        .iter()
        .filter(|h| h.tag != HunkTag::Unchanged)
        .map(|hunk| extract_one(html, hunk))
        .collect()
}

fn extract_one(html: &str, hunk: &Hunk) -> AffectedSection {
    let snippet = truncate(&hunk.text, SNIPPET_LIMIT);

    if let Some((selector, section_type)) = explicit_selector_match(html, &hunk.text) {
        return build(selector, section_type, 0.8, snippet);
    }
    if let Some((selector, section_type)) = semantic_ancestor_match(html, &hunk.text) {
        return build(selector, section_type, 0.6, snippet);
    }
    if let Some((selector, section_type)) = header_keyword_match(html, &hunk.text) {
        return build(selector, section_type, 0.55, snippet);
    }
    if let Some((selector, section_type)) = content_search_fallback(html, &hunk.text) {
        return build(selector, section_type, 0.5, snippet);
    }
    if let Some((selector, section_type)) = structural_analogy_fallback(html) {
        return build(selector, section_type, 0.45, snippet);
    }

    build("body".to_string(), "content".to_string(), 0.3, snippet)
}

fn build(selector: String, section_type: String, mut confidence: f32, snippet: String) -> AffectedSection {
    if selector.contains(&format!("#{}", section_type)) {
        confidence += 0.3;
    } else if selector.contains(&format!(".{}", section_type)) {
        confidence += 0.2;
    }
    if content_heuristic_matches(&section_type, &snippet) {
        confidence += 0.15;
    }
    AffectedSection {
        selector,
        section_type,
        confidence: confidence.min(1.0),
        changes: vec![snippet],
    }
}

fn explicit_selector_match(html: &str, hunk_text: &str) -> Option<(String, String)> {
    for section_type in SECTION_TYPES {
        let id_selector = format!(r#"id="{}"#, section_type);
        let class_selector = format!(r#"class="{}"#, section_type);
        for (selector_prefix, marker) in [("#", id_selector), (".", class_selector)] {
            if let Some(pos) = html.find(&marker) {
                let tail = &html[pos..];
                if let Some(end) = find_enclosing_tag_end(tail) {
                    let block = &tail[..end];
                    if hunk_contains_fragment(block, hunk_text) {
                        return Some((
                            format!("{}{}", selector_prefix, section_type),
                            section_type.to_string(),
                        ));
                    }
                }
            }
        }
    }
    None
}

const SEMANTIC_TAGS: &[&str] = &[
    "header", "nav", "main", "section", "article", "aside", "footer",
];

fn semantic_ancestor_match(html: &str, hunk_text: &str) -> Option<(String, String)> {
    let needle = first_words(hunk_text, 8);
    if needle.is_empty() {
        return None;
    }
    let pos = html.find(&needle)?;
    let before = &html[..pos];
    for tag in SEMANTIC_TAGS {
        let open = format!("<{}", tag);
        if let Some(start) = before.rfind(&open) {
            let section_type = classify_by_keywords(&before[start..pos]).unwrap_or_else(|| tag.to_string());
            return Some((tag.to_string(), section_type));
        }
    }
    None
}

fn header_keyword_match(html: &str, hunk_text: &str) -> Option<(String, String)> {
    let _ = hunk_text;
    for level in 1..=4 {
        let open = format!("<h{}", level);
        if let Some(pos) = html.find(&open) {
            let tail = &html[pos..];
            if let Some(end) = find_enclosing_tag_end(tail) {
                let heading_text = &tail[..end];
                if let Some(section_type) = classify_by_keywords(heading_text) {
                    return Some((format!("h{}", level), section_type));
                }
            }
        }
    }
    None
}

fn content_search_fallback(html: &str, hunk_text: &str) -> Option<(String, String)> {
    let needle = first_words(hunk_text, 10);
    if needle.is_empty() || needle.len() > 50 {
        return content_search_fallback(html, &first_words(hunk_text, 5));
    }
    let pos = html.find(&needle)?;
    let before = &html[..pos];
    for tag in ["div", "section", "article"] {
        let open = format!("<{}", tag);
        if before.rfind(&open).is_some() {
            return Some((tag.to_string(), "content".to_string()));
        }
    }
    None
}

fn structural_analogy_fallback(html: &str) -> Option<(String, String)> {
    if html.matches("class=\"card").count() >= 2 || html.matches("class=\"plan").count() >= 2 {
        return Some(("div.card".to_string(), "features".to_string()));
    }
    None
}

fn classify_by_keywords(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    SECTION_TYPES
        .iter()
        .find(|kw| lower.contains(*kw))
        .map(|kw| kw.to_string())
}

fn content_heuristic_matches(section_type: &str, snippet: &str) -> bool {
    let lower = snippet.to_lowercase();
    match section_type {
        "pricing" => lower.contains('$') || lower.contains("price"),
        "form" => lower.contains("<input") || lower.contains("<form"),
        "testimonials" => lower.contains('"') || lower.contains('\u{2019}'),
        "cta" => lower.contains("sign up") || lower.contains("get started") || lower.contains("buy now"),
        _ => false,
    }
}

fn hunk_contains_fragment(block: &str, hunk_text: &str) -> bool {
    let needle = first_words(hunk_text, 6);
    !needle.is_empty() && block.contains(&needle)
}

fn find_enclosing_tag_end(tail: &str) -> Option<usize> {
    tail.find('>').map(|p| (p + 1200).min(tail.len()))
}

fn first_words(text: &str, n: usize) -> String {
    text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        text.to_string()
    } else {
        let mut cut = limit;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &text[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HunkTag;

    fn hunk(tag: HunkTag, text: &str) -> Hunk {
        Hunk {
            tag,
            text: text.to_string(),
            line_count: 1,
        }
    }

    #[test]
    fn unchanged_hunks_are_skipped() {
        let html = "<div id=\"pricing\">Price: $10</div>";
        let hunks = vec![hunk(HunkTag::Unchanged, "Price: $10")];
        assert!(extract_sections(html, &hunks).is_empty());
    }

    #[test]
    fn explicit_id_selector_is_detected() {
        let html = r#"<div id="pricing">Price: $10 per month</div>"#;
        let hunks = vec![hunk(HunkTag::Added, "Price: $10 per month")];
        let sections = extract_sections(html, &hunks);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].section_type, "pricing");
        assert!(sections[0].confidence > 0.5);
    }

    #[test]
    fn snippet_is_truncated() {
        let long_text = "word ".repeat(100);
        let html = format!("<div>{}</div>", long_text);
        let hunks = vec![hunk(HunkTag::Added, &long_text)];
        let sections = extract_sections(&html, &hunks);
        assert!(sections[0].changes[0].chars().count() <= SNIPPET_LIMIT + 1);
    }

    #[test]
    fn falls_back_to_body_when_nothing_matches() {
        let html = "<html></html>";
        let hunks = vec![hunk(HunkTag::Added, "totally unmatched fragment of text")];
        let sections = extract_sections(html, &hunks);
        assert_eq!(sections[0].selector, "body");
    }
}
