//! Deterministic HTML normalization: strips volatile noise so that two
//! captures of an unchanged page become byte-identical.
//!
//! Operates at the regex level rather than parsing into a DOM, which keeps
//! the operation cheap and resilient to malformed markup — the same
//! trade-off this crate's HTML-diffing utilities make elsewhere.

use regex::Regex;

lazy_static::lazy_static! {
    static ref SCRIPT_BLOCK: Regex = Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap();
    static ref NOSCRIPT_BLOCK: Regex = Regex::new(r"(?is)<noscript\b[^>]*>.*?</noscript\s*>").unwrap();
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref ISO_TIMESTAMP: Regex =
        Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?").unwrap();
    static ref LOCALIZED_DATETIME: Regex = Regex::new(
        r"\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.? \d{1,2},? \d{4}\b"
    ).unwrap();
    static ref UNIX_MILLIS: Regex = Regex::new(r"\b\d{13,}\b").unwrap();
    static ref CLASS_HASH_SUFFIX: Regex =
        Regex::new(r"__className_[0-9a-fA-F]{6,}|__nextjs_[0-9a-fA-F]{6,}").unwrap();
    static ref ID_HASH_ATTR: Regex = Regex::new(r#"id="[0-9a-fA-F]{8,}""#).unwrap();
    static ref CLASS_HASH_ATTR: Regex =
        Regex::new(r#"class="[^"]*[0-9a-fA-F]{8,}[^"]*""#).unwrap();
    static ref DATA_ATTR: Regex = Regex::new(r#"\sdata-[a-zA-Z0-9_-]+="[^"]*""#).unwrap();
    static ref ARIA_DYNAMIC_ATTR: Regex =
        Regex::new(r#"\saria-(?:describedby|labelledby|controls)="[^"]*""#).unwrap();
    static ref INLINE_STYLE: Regex = Regex::new(r#"\sstyle="[^"]*""#).unwrap();
    static ref VOLATILE_META: Regex = Regex::new(
        r#"(?is)<meta\b[^>]*name="(?:csrf-token|token)"[^>]*>|<meta\b[^>]*property="og:updated_time"[^>]*>"#
    ).unwrap();
    static ref CACHE_BUST_QUERY: Regex = Regex::new(r"\?(?:v|t|_)=[^\"&'\s>]*").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref TAG_GAP: Regex = Regex::new(r">\s+<").unwrap();
}

/// Apply the ordered normalization rules to `html`, returning the canonical form.
///
/// Pure and deterministic: identical input always yields identical output,
/// independent of capture order. Empty input returns the empty string.
pub fn normalize(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let mut s = html.to_string();

    s = SCRIPT_BLOCK.replace_all(&s, "").into_owned();
    s = NOSCRIPT_BLOCK.replace_all(&s, "").into_owned();
    s = COMMENT.replace_all(&s, "").into_owned();

    s = ISO_TIMESTAMP.replace_all(&s, "[TIMESTAMP]").into_owned();
    s = LOCALIZED_DATETIME.replace_all(&s, "[TIMESTAMP]").into_owned();
    s = UNIX_MILLIS.replace_all(&s, "[UNIX_TIMESTAMP]").into_owned();

    s = CLASS_HASH_SUFFIX.replace_all(&s, "[HASH_CLASS]").into_owned();
    s = ID_HASH_ATTR.replace_all(&s, r#"id="[HASH]""#).into_owned();
    s = CLASS_HASH_ATTR
        .replace_all(&s, r#"class="[HASH_CLASS]""#)
        .into_owned();

    s = DATA_ATTR.replace_all(&s, "").into_owned();
    s = ARIA_DYNAMIC_ATTR.replace_all(&s, "").into_owned();
    s = INLINE_STYLE.replace_all(&s, "").into_owned();
    s = VOLATILE_META.replace_all(&s, "").into_owned();

    s = CACHE_BUST_QUERY.replace_all(&s, "?[CACHE_BUST]").into_owned();

    s = TAG_GAP.replace_all(&s, "><").into_owned();
    s = WHITESPACE_RUN.replace_all(&s, " ").into_owned();

    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_and_comments() {
        let html = "<html><!-- build 123 --><script>track();</script><body>hi</body></html>";
        let normalized = normalize(html);
        assert!(!normalized.contains("script"));
        assert!(!normalized.contains("build 123"));
        assert!(normalized.contains("hi"));
    }

    #[test]
    fn replaces_iso_timestamp() {
        let html = r#"<span data-ts="2024-01-01T12:00:00Z">Updated 2024-01-01T12:00:00Z</span>"#;
        let normalized = normalize(html);
        assert!(normalized.contains("[TIMESTAMP]"));
        assert!(!normalized.contains("2024-01-01T12:00:00Z"));
    }

    #[test]
    fn replaces_unix_millis() {
        let html = "<span>1700000000000</span>";
        let normalized = normalize(html);
        assert!(normalized.contains("[UNIX_TIMESTAMP]"));
    }

    #[test]
    fn collapses_hash_ids_and_classes() {
        let html = r#"<div id="a1b2c3d4e5f6" class="card a1b2c3d4e5f6">x</div>"#;
        let normalized = normalize(html);
        assert!(normalized.contains(r#"id="[HASH]""#));
        assert!(normalized.contains(r#"class="[HASH_CLASS]""#));
    }

    #[test]
    fn strips_data_and_dynamic_aria_attrs() {
        let html = r#"<button data-testid="buy-now" aria-describedby="tooltip-42">Buy</button>"#;
        let normalized = normalize(html);
        assert!(!normalized.contains("data-testid"));
        assert!(!normalized.contains("aria-describedby"));
    }

    #[test]
    fn strips_inline_style() {
        let html = r#"<div style="color: red;">x</div>"#;
        let normalized = normalize(html);
        assert!(!normalized.contains("style="));
    }

    #[test]
    fn replaces_cache_busting_query() {
        let html = r#"<script src="/app.js?v=abc123"></script><img src="/logo.png?t=999">"#;
        let normalized = normalize(html);
        assert!(normalized.contains("?[CACHE_BUST]") || normalized.is_empty());
    }

    #[test]
    fn collapses_whitespace() {
        let html = "<div>\n\n  hello    world  \n</div>";
        let normalized = normalize(html);
        assert_eq!(normalized, "<div> hello world </div>");
    }

    #[test]
    fn is_idempotent() {
        let html = r#"<div id="deadbeefcafe" style="color:red" data-x="1"> hi   there </div>"#;
        let once = normalize(html);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn unchanged_page_normalizes_byte_identical_across_timestamps() {
        let a = r#"<div data-ts="2024-01-01T00:00:00Z">Price: $10</div>"#;
        let b = r#"<div data-ts="2024-06-05T00:00:00Z">Price: $10</div>"#;
        assert_eq!(normalize(a), normalize(b));
    }
}
