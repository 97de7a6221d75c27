//! Gzip-then-base64 framing for stored `full_html` payloads.
//!
//! Purely a storage-layer concern: the Version Engine always hands the
//! Differ plain HTML, so every call site that reads a snapshot's
//! `full_html` back from a compressed-capable store must invert this before
//! the bytes reach [`crate::differ`] or [`crate::version_engine`].

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use std::io::Read;

/// Gzip `html` and frame it as base64 text, safe to store in a text column.
pub fn encode(html: &str) -> String {
    let mut encoder = GzEncoder::new(html.as_bytes(), Compression::default());
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .expect("in-memory gzip read cannot fail");
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, compressed)
}

/// Invert [`encode`], returning the original HTML.
pub fn decode(framed: &str) -> Result<String, String> {
    let compressed = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, framed)
        .map_err(|e| format!("invalid base64 full_html frame: {}", e))?;
    let mut decoder = GzDecoder::new(&compressed[..]);
    let mut html = String::new();
    decoder
        .read_to_string(&mut html)
        .map_err(|e| format!("invalid gzip full_html frame: {}", e))?;
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_html() {
        let html = "<html><body>hello world</body></html>".repeat(20);
        let framed = encode(&html);
        assert_ne!(framed, html);
        assert_eq!(decode(&framed).unwrap(), html);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode("not valid base64!!!").is_err());
    }
}
