//! # Audit Query Client
//!
//! HTTP implementation of [`AuditLogSource`] for the platform's audit-query
//! endpoint.
//!
//! The caller supplies an already-obtained bearer token; acquiring and
//! refreshing credentials is out of scope. The request timeout configured
//! here is the only timeout in the pipeline, and no fetch is retried.

use crate::record::AuditBatch;
use crate::session::{AuditLogSource, FetchError, FetchRequest};
use crate::{AuditSweepError, AuditSweepResult};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Path of the search operation relative to the base URL
const SEARCH_PATH: &str = "auditlog/search";

/// Configuration for audit-query client behavior.
///
/// # Examples
///
/// ```
/// use audit_sweep_core::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_base_url("https://audit.example.com/api/")
///     .with_timeout(Duration::from_secs(120));
/// assert_eq!(config.timeout, Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the audit API; the search path is appended to it
    pub base_url: String,
    /// User agent string for API requests
    pub user_agent: String,
    /// Request timeout duration
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user_agent: format!("audit-sweep/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(300),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for client configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Builder for constructing `ClientConfig` instances.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new configuration builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Wire shape of one search call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequestBody<'a> {
    start_date: String,
    end_date: String,
    result_size: usize,
    session_id: &'a str,
    session_command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_ids: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_type: Option<&'a str>,
}

impl<'a> SearchRequestBody<'a> {
    fn from_request(request: &'a FetchRequest) -> Self {
        let joined = |values: &[String]| {
            if values.is_empty() {
                None
            } else {
                Some(values.join(","))
            }
        };

        Self {
            start_date: request.start_date.to_rfc3339(),
            end_date: request.end_date.to_rfc3339(),
            result_size: request.result_size,
            session_id: request.session_id.as_str(),
            session_command: request.session_command.as_str(),
            user_ids: joined(&request.user_ids),
            operations: joined(&request.operations),
            record_type: request.record_type.as_ref().map(|r| r.as_str()),
        }
    }
}

/// Audit-query endpoint over HTTPS
#[derive(Clone)]
pub struct HttpAuditLogSource {
    http_client: reqwest::Client,
    search_url: Url,
    bearer_token: String,
}

impl HttpAuditLogSource {
    /// Create a client for the endpoint described by `config`
    ///
    /// # Errors
    ///
    /// Returns [`AuditSweepError::Configuration`] if the base URL is invalid or
    /// the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig, bearer_token: impl Into<String>) -> AuditSweepResult<Self> {
        let search_url = Self::search_url(&config.base_url)?;

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuditSweepError::Configuration {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            search_url,
            bearer_token: bearer_token.into(),
        })
    }

    /// URL the search requests are sent to
    pub fn endpoint(&self) -> &Url {
        &self.search_url
    }

    fn search_url(base_url: &str) -> AuditSweepResult<Url> {
        if base_url.trim().is_empty() {
            return Err(AuditSweepError::Configuration {
                message: "endpoint base URL is not set".to_string(),
            });
        }

        // Without a trailing slash `join` would replace the last path segment
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Url::parse(&base)
            .and_then(|url| url.join(SEARCH_PATH))
            .map_err(|e| AuditSweepError::Configuration {
                message: format!("Invalid endpoint base URL '{}': {}", base_url, e),
            })
    }
}

impl fmt::Debug for HttpAuditLogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAuditLogSource")
            .field("search_url", &self.search_url.as_str())
            .field("bearer_token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl AuditLogSource for HttpAuditLogSource {
    async fn fetch_batch(&self, request: &FetchRequest) -> Result<AuditBatch, FetchError> {
        let body = SearchRequestBody::from_request(request);

        let response = self
            .http_client
            .post(self.search_url.clone())
            .bearer_auth(&self.bearer_token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(FetchError::Unauthorized {
                status: status.as_u16(),
                message,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(FetchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Transport {
            message: format!("Failed to read response body: {}", e),
        })?;

        if status == reqwest::StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
            debug!(session_id = %request.session_id, "Empty response body");
            return Ok(AuditBatch::empty());
        }

        // Elements are decoded one by one so a single bad record cannot fail the page
        let values: Vec<serde_json::Value> =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::InvalidResponse {
                message: format!("Failed to parse audit records: {}", e),
            })?;

        Ok(AuditBatch::from_json_values(values))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
