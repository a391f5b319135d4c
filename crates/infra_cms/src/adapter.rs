//! External CMS adapter
//!
//! Authenticated REST client for the CMS despacho endpoint, implementing
//! the `CmsPort` trait. Failure classification is uniform: network errors,
//! timeouts, and 5xx responses are transient; 4xx schema rejections are
//! fatal; 401/403 are credential problems that fail fast. The count
//! endpoint reports its total in the `X-WP-Total` response header, and a
//! missing or malformed header is zero, never an error.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response, StatusCode};

use core_kernel::{
    AdapterHealth, CmsId, CoreError, DomainPort, ExternalAuthConfig, HealthCheckResult,
    HealthCheckable, PortError,
};
use domain_sync::{CmsDespachoDoc, CmsPort, PushReceipt};

use crate::dto::{WpDespachoRequest, WpDespachoResponse, WpUpsertAck};

/// Name of the header carrying list totals
pub const TOTAL_HEADER: &str = "X-WP-Total";

/// Configuration for the CMS adapter
#[derive(Debug, Clone)]
pub struct CmsConfig {
    /// Base URL of the CMS REST API (e.g. "https://cms.example.com")
    pub base_url: String,
    /// HTTP Basic credentials
    pub auth: ExternalAuthConfig,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth: ExternalAuthConfig::None,
            timeout_secs: 10,
        }
    }
}

/// REST adapter for the external CMS
#[derive(Debug, Clone)]
pub struct CmsAdapter {
    config: CmsConfig,
    http: reqwest::Client,
}

impl CmsAdapter {
    /// Creates the adapter; fails fast on an unusable configuration
    pub fn new(config: CmsConfig) -> Result<Self, CoreError> {
        let trimmed = config.base_url.trim();
        if trimmed.is_empty() {
            return Err(CoreError::configuration("CMS base URL is empty"));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config: CmsConfig {
                base_url: trimmed.trim_end_matches('/').to_string(),
                ..config
            },
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, PortError> {
        let url = format!("{}/{}", self.config.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);
        match &self.config.auth {
            ExternalAuthConfig::Basic { username, password } => {
                if !self.config.auth.is_configured() {
                    return Err(PortError::unauthorized("CMS credentials are not configured"));
                }
                Ok(builder.basic_auth(username, Some(password)))
            }
            ExternalAuthConfig::None => {
                Err(PortError::unauthorized("CMS credentials are not configured"))
            }
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, PortError> {
        let response = builder.send().await.map_err(classify_transport)?;
        match classify_status(response.status()) {
            None => Ok(response),
            Some(error) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::debug!(%status, body = %truncate(&body, 200), "CMS error response");
                Err(with_body_context(error, &body))
            }
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, PortError> {
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Transformation {
                message: format!("CMS response did not match the expected shape: {}", e),
            })
    }
}

/// Maps transport-level failures onto the port taxonomy
///
/// Everything here is transient by definition: the request never produced
/// an HTTP status.
fn classify_transport(error: reqwest::Error) -> PortError {
    if error.is_timeout() {
        PortError::Timeout {
            operation: "cms_request".to_string(),
            duration_ms: 0,
        }
    } else {
        PortError::Connection {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}

/// Maps an HTTP status onto the port taxonomy; `None` means success
pub fn classify_status(status: StatusCode) -> Option<PortError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PortError::unauthorized(format!("CMS rejected the credentials ({})", status))
        }
        StatusCode::NOT_FOUND => PortError::not_found("CmsDespachoDoc", "requested id"),
        StatusCode::TOO_MANY_REQUESTS => PortError::RateLimited {
            retry_after_secs: 60,
        },
        s if s.is_server_error() => PortError::ServiceUnavailable {
            service: format!("cms ({})", s),
        },
        s => PortError::validation(format!("CMS rejected the request ({})", s)),
    })
}

fn with_body_context(error: PortError, body: &str) -> PortError {
    match error {
        PortError::Validation { message, field } => PortError::Validation {
            message: format!("{}: {}", message, truncate(body, 200)),
            field,
        },
        other => other,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Parses the list total out of the count header
///
/// Missing or malformed values are zero by contract.
pub fn parse_total_header(value: Option<&str>) -> u64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

impl DomainPort for CmsAdapter {}

#[async_trait]
impl CmsPort for CmsAdapter {
    async fn push_upsert(&self, doc: &CmsDespachoDoc) -> Result<PushReceipt, PortError> {
        let payload = WpDespachoRequest::from(doc);
        let (path, created) = match doc.id {
            Some(id) => (format!("wp/v2/despacho/{}", id), false),
            None => ("wp/v2/despacho".to_string(), true),
        };

        let response = self
            .send(self.request(Method::POST, &path)?.json(&payload))
            .await?;
        let ack: WpUpsertAck = Self::decode(response).await?;

        tracing::debug!(cms_id = ack.id, created, "CMS upsert acknowledged");
        Ok(PushReceipt {
            cms_id: CmsId::new(ack.id),
            created,
        })
    }

    async fn fetch_by_id(&self, id: CmsId) -> Result<CmsDespachoDoc, PortError> {
        let response = self
            .send(self.request(Method::GET, &format!("wp/v2/despacho/{}", id))?)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    PortError::not_found("CmsDespachoDoc", id)
                } else {
                    e
                }
            })?;
        let wp: WpDespachoResponse = Self::decode(response).await?;
        Ok(wp.into())
    }

    async fn search_by_text(
        &self,
        query: &str,
        per_page: u32,
    ) -> Result<Vec<CmsDespachoDoc>, PortError> {
        let response = self
            .send(
                self.request(Method::GET, "wp/v2/despacho")?
                    .query(&[("search", query), ("per_page", &per_page.to_string())]),
            )
            .await?;
        let results: Vec<WpDespachoResponse> = Self::decode(response).await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn count_published(&self) -> Result<u64, PortError> {
        let response = self
            .send(
                self.request(Method::GET, "wp/v2/despacho")?
                    .query(&[("per_page", "1"), ("status", "publish")]),
            )
            .await?;
        let total = parse_total_header(
            response
                .headers()
                .get(TOTAL_HEADER)
                .and_then(|v| v.to_str().ok()),
        );
        Ok(total)
    }
}

#[async_trait]
impl HealthCheckable for CmsAdapter {
    /// Probes the despacho endpoint to verify connectivity and credentials
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let outcome = match self.request(Method::GET, "wp/v2/despacho") {
            Ok(builder) => self.send(builder.query(&[("per_page", "1")])).await.map(|_| ()),
            Err(e) => Err(e),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => HealthCheckResult {
                adapter_id: "cms-adapter".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: "cms-adapter".to_string(),
                status: if e.is_transient() {
                    AdapterHealth::Unhealthy
                } else {
                    AdapterHealth::Degraded
                },
                latency_ms,
                message: Some(e.to_string()),
                checked_at: Utc::now(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_config() -> CmsConfig {
        CmsConfig {
            base_url: "https://cms.example.com/".to_string(),
            auth: ExternalAuthConfig::Basic {
                username: "editor".to_string(),
                password: "secret".to_string(),
            },
            timeout_secs: 10,
        }
    }

    #[test]
    fn test_new_trims_base_url() {
        let adapter = CmsAdapter::new(basic_config()).unwrap();
        assert_eq!(adapter.base_url(), "https://cms.example.com");
    }

    #[test]
    fn test_new_rejects_empty_base_url() {
        let config = CmsConfig {
            base_url: "  ".to_string(),
            ..basic_config()
        };
        assert!(CmsAdapter::new(config).is_err());
    }

    #[test]
    fn test_missing_credentials_fail_fast() {
        let config = CmsConfig {
            auth: ExternalAuthConfig::None,
            ..basic_config()
        };
        let adapter = CmsAdapter::new(config).unwrap();
        let error = adapter.request(Method::GET, "wp/v2/despacho").unwrap_err();
        assert!(matches!(error, PortError::Unauthorized { .. }));

        let blank = CmsConfig {
            auth: ExternalAuthConfig::Basic {
                username: "editor".to_string(),
                password: String::new(),
            },
            ..basic_config()
        };
        let adapter = CmsAdapter::new(blank).unwrap();
        assert!(adapter.request(Method::GET, "wp/v2/despacho").is_err());
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::OK).is_none());
        assert!(classify_status(StatusCode::CREATED).is_none());

        let e = classify_status(StatusCode::SERVICE_UNAVAILABLE).unwrap();
        assert!(e.is_transient());
        let e = classify_status(StatusCode::BAD_GATEWAY).unwrap();
        assert!(e.is_transient());
        let e = classify_status(StatusCode::TOO_MANY_REQUESTS).unwrap();
        assert!(e.is_transient());

        let e = classify_status(StatusCode::BAD_REQUEST).unwrap();
        assert!(!e.is_transient());
        assert!(matches!(e, PortError::Validation { .. }));

        let e = classify_status(StatusCode::UNAUTHORIZED).unwrap();
        assert!(matches!(e, PortError::Unauthorized { .. }));
        let e = classify_status(StatusCode::FORBIDDEN).unwrap();
        assert!(matches!(e, PortError::Unauthorized { .. }));

        let e = classify_status(StatusCode::NOT_FOUND).unwrap();
        assert!(e.is_not_found());
    }

    #[test]
    fn test_total_header_parsing() {
        assert_eq!(parse_total_header(Some("37")), 37);
        assert_eq!(parse_total_header(Some(" 12 ")), 12);
        assert_eq!(parse_total_header(Some("garbage")), 0);
        assert_eq!(parse_total_header(Some("")), 0);
        assert_eq!(parse_total_header(None), 0);
        assert_eq!(parse_total_header(Some("-3")), 0);
    }
}
