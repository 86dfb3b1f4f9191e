pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

/// Client for a Browserless headless-browser service.
///
/// Two endpoints are used by the ingestion pipeline: `/content` returns
/// fully-rendered HTML for a single URL, and `/function` runs a scripted
/// browser session server-side, needed for portals that require clicking
/// through an agreement page and paging AJAX-rendered tables inside one
/// cookie session.
pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self::with_timeout(base_url, token, Duration::from_secs(30))
    }

    /// Scripted sessions (agreement flow + pagination) can run for
    /// minutes; callers doing that should raise the timeout.
    pub fn with_timeout(base_url: &str, token: Option<&str>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        match self.token {
            Some(ref token) => format!("{}/{path}?token={token}", self.base_url),
            None => format!("{}/{path}", self.base_url),
        }
    }

    /// Fetch fully-rendered HTML for a URL via the `/content` endpoint.
    pub async fn content(&self, url: &str) -> Result<String> {
        let body = serde_json::json!({ "url": url });

        let resp = self
            .client
            .post(self.endpoint("content"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }

    /// Run a scripted session via the `/function` endpoint. `code` is an
    /// ES module exporting `async ({ page, context }) => ...`; whatever it
    /// returns comes back as JSON.
    pub async fn function(
        &self,
        code: &str,
        context: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let body = serde_json::json!({ "code": code, "context": context });

        tracing::debug!(bytes = code.len(), "Submitting Browserless function");

        let resp = self
            .client
            .post(self.endpoint("function"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| BrowserlessError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_token_when_present() {
        let with_token = BrowserlessClient::new("http://localhost:3000/", Some("secret"));
        assert_eq!(
            with_token.endpoint("function"),
            "http://localhost:3000/function?token=secret"
        );

        let without = BrowserlessClient::new("http://localhost:3000", None);
        assert_eq!(without.endpoint("content"), "http://localhost:3000/content");
    }
}
