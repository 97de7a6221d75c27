//! Renderer gateway: fetches rendered HTML for a URL.

mod http;
mod simulate;

pub use http::HttpRendererGateway;
pub use simulate::SimulateRendererGateway;

use crate::error::PageWatchResult;
use async_trait::async_trait;

/// Options controlling one render request.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Milliseconds to wait for the page to settle before returning.
    pub wait_ms: u64,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
    /// Ask the renderer to strip `<script>` tags before returning.
    pub remove_scripts: bool,
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Skip the remote call and use caller-supplied HTML instead.
    pub simulate: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            wait_ms: 3000,
            viewport_width: 1280,
            viewport_height: 800,
            remove_scripts: false,
            timeout_ms: 30_000,
            simulate: false,
        }
    }
}

/// Result of a successful render.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Rendered HTML.
    pub html: String,
    /// Page title, if the renderer reported one.
    pub title: Option<String>,
    /// The URL actually rendered (post-redirect).
    pub rendered_url: String,
    /// Whether the renderer hit its own internal wait timeout.
    pub was_timeout: bool,
}

/// Abstraction over "fetch rendered HTML for a URL".
///
/// Kept as a trait so the orchestrator can run against a real HTTP-backed
/// renderer service in production and a deterministic in-process double in
/// tests, without any conditional compilation at the call site.
#[async_trait]
pub trait RendererGateway: Send + Sync {
    /// Fetch rendered HTML for `url`, honoring `options`.
    async fn fetch(&self, url: &str, options: &FetchOptions) -> PageWatchResult<FetchResponse>;

    /// Gateway name for logging/debugging.
    fn gateway_name(&self) -> &'static str;
}

/// Normalize a possibly-bare host into an absolute http(s) URL.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_adds_scheme() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn default_fetch_options_match_reference_values() {
        let opts = FetchOptions::default();
        assert_eq!(opts.wait_ms, 3000);
        assert_eq!(opts.timeout_ms, 30_000);
        assert!(!opts.simulate);
    }
}
