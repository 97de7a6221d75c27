use super::{FetchOptions, FetchResponse, RendererGateway};
use crate::error::PageWatchResult;
use async_trait::async_trait;
use dashmap::DashMap;

/// A renderer gateway that serves caller-supplied HTML instead of reaching a
/// real service. Used by the initial-capture placeholder path, the CLI's
/// `--simulate-file` flag, and every test that needs deterministic input.
#[derive(Debug, Default)]
pub struct SimulateRendererGateway {
    pages: DashMap<String, String>,
}

impl SimulateRendererGateway {
    /// Create an empty simulated gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the HTML that will be returned for `url`.
    ///
    /// Async to mirror the shape of a real gateway call at test call sites,
    /// even though registering a page never actually suspends.
    pub async fn set_page(&self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(super::normalize_url(&url.into()), html.into());
    }
}

#[async_trait]
impl RendererGateway for SimulateRendererGateway {
    async fn fetch(&self, url: &str, _options: &FetchOptions) -> PageWatchResult<FetchResponse> {
        let normalized = super::normalize_url(url);
        let html = self
            .pages
            .get(&normalized)
            .map(|v| v.value().clone())
            .unwrap_or_default();
        Ok(FetchResponse {
            html,
            title: None,
            rendered_url: normalized,
            was_timeout: false,
        })
    }

    fn gateway_name(&self) -> &'static str {
        "simulate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_registered_page() {
        let gateway = SimulateRendererGateway::new();
        gateway.set_page("example.com", "<html>hello</html>").await;

        let resp = gateway
            .fetch("https://example.com", &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.html, "<html>hello</html>");
    }

    #[tokio::test]
    async fn unregistered_page_returns_empty_html() {
        let gateway = SimulateRendererGateway::new();
        let resp = gateway
            .fetch("https://unknown.example", &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.html, "");
    }
}
