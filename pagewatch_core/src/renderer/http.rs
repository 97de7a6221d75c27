use super::{FetchOptions, FetchResponse, RendererGateway};
use crate::error::{PageWatchError, PageWatchResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Renderer gateway backed by an HTTP rendering service.
///
/// Retries transport-level failures up to twice with exponential backoff;
/// never retries a 4xx response from the upstream service.
pub struct HttpRendererGateway {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpRendererGateway {
    /// Build a gateway pointed at `base_url`, optionally authenticating with `bearer_token`.
    pub fn new(base_url: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            bearer_token,
        }
    }

    async fn request_once(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> PageWatchResult<FetchResponse> {
        let mut req = self
            .client
            .get(format!("{}/html", self.base_url))
            .query(&[
                ("url", url),
                ("waitFor", &options.wait_ms.to_string()),
                ("removeScripts", &options.remove_scripts.to_string()),
            ])
            .timeout(Duration::from_millis(options.timeout_ms));

        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PageWatchError::RendererRejected {
                status: status.as_u16(),
                message: body,
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PageWatchError::RendererUnavailable(format!(
                "status {}: {}",
                status, body
            )));
        }

        let title = resp
            .headers()
            .get("x-page-title")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let rendered_url = resp
            .headers()
            .get("x-rendered-url")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| url.to_string());
        let was_timeout = resp
            .headers()
            .get("x-was-timeout")
            .and_then(|v| v.to_str().ok())
            .map(|s| s == "true")
            .unwrap_or(false);

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("application/json") {
            let body: RendererJsonBody = resp.json().await?;
            Ok(FetchResponse {
                html: body.html,
                title: body.title.or(title),
                rendered_url: body.url.unwrap_or(rendered_url),
                was_timeout,
            })
        } else {
            let html = resp.text().await?;
            Ok(FetchResponse {
                html,
                title,
                rendered_url,
                was_timeout,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct RendererJsonBody {
    html: String,
    title: Option<String>,
    url: Option<String>,
}

#[async_trait]
impl RendererGateway for HttpRendererGateway {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> PageWatchResult<FetchResponse> {
        let normalized = super::normalize_url(url);
        let mut attempt = 0u32;
        loop {
            match self.request_once(&normalized, options).await {
                Ok(resp) => return Ok(resp),
                Err(PageWatchError::RendererRejected { status, message }) => {
                    return Err(PageWatchError::RendererRejected { status, message });
                }
                Err(err) if attempt < 2 => {
                    attempt += 1;
                    let backoff = Duration::from_millis(250 * 2u64.pow(attempt));
                    log::warn!(
                        "renderer fetch for {} failed ({}), retrying in {:?}",
                        normalized,
                        err,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn gateway_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_reports_its_name() {
        let gateway = HttpRendererGateway::new("http://localhost:4000", None);
        assert_eq!(gateway.gateway_name(), "http");
    }
}
