//! HTTP client for the uid resolver service.

use crate::error::{ResolveError, ResolveResult};
use crate::UidResolver;
use futures_util::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default timeout for resolver requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for the resolver endpoint.
#[derive(Debug, Serialize)]
struct ResolveRequest<'a> {
    #[serde(rename = "type")]
    request_type: &'static str,
    token: &'a str,
}

/// Response body from the resolver endpoint.
#[derive(Debug, Deserialize)]
struct ResolveResponse {
    uid: Option<u32>,
}

/// Resolver client speaking the service's JSON-over-HTTP protocol.
pub struct HttpResolver {
    client: Client,
    resolve_url: String,
}

impl HttpResolver {
    /// Create a new resolver client.
    ///
    /// # Arguments
    /// * `resolve_url` - URL of the resolver endpoint.
    pub fn new(resolve_url: impl Into<String>) -> ResolveResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ResolveError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            resolve_url: resolve_url.into(),
        })
    }

    async fn fetch_uid(&self, token: &str) -> ResolveResult<u32> {
        if token.is_empty() {
            return Err(ResolveError::EmptyToken);
        }

        let request = ResolveRequest {
            request_type: "resolveUid",
            token,
        };

        let response = self
            .client
            .post(&self.resolve_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ResolveError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let body: ResolveResponse = response
            .json()
            .await
            .map_err(|e| ResolveError::HttpClient(format!("Failed to parse response: {e}")))?;

        let uid = body
            .uid
            .ok_or_else(|| ResolveError::UnknownToken(token.to_string()))?;

        debug!(token, uid, "Resolved token");
        Ok(uid)
    }
}

impl UidResolver for HttpResolver {
    fn resolve<'a>(&'a self, token: &'a str) -> BoxFuture<'a, ResolveResult<u32>> {
        Box::pin(self.fetch_uid(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_request_serialization() {
        let request = ResolveRequest {
            request_type: "resolveUid",
            token: "RTS",
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"resolveUid","token":"RTS"}"#);
    }

    #[test]
    fn test_resolve_response_missing_uid() {
        let body: ResolveResponse = serde_json::from_str("{}").unwrap();
        assert!(body.uid.is_none());
    }
}
