//! Delivery destinations for conversion sync
//!
//! A destination is anywhere a conversion record can be pushed: an ad
//! platform's conversions API, a CRM webhook, a test double. The trait keeps
//! the dispatcher independent of transport; the stock implementation is HTTP.

use std::time::Duration;

use async_trait::async_trait;

use super::payload::ConversionPayload;

/// Tri-state classification of one delivery attempt.
///
/// `Retryable` and `Permanent` are outcomes, not errors: the dispatcher turns
/// them into audit rows and retry decisions.
#[derive(Debug, Clone)]
pub enum Delivery {
    Success {
        http_status: Option<i64>,
        body: Option<String>,
    },
    /// Transient failure: timeout, connect error, 5xx, throttling
    Retryable {
        http_status: Option<i64>,
        detail: String,
    },
    /// The destination rejected the payload; retrying cannot help
    Permanent {
        http_status: Option<i64>,
        detail: String,
    },
}

impl Delivery {
    pub fn http_status(&self) -> Option<i64> {
        match self {
            Delivery::Success { http_status, .. }
            | Delivery::Retryable { http_status, .. }
            | Delivery::Permanent { http_status, .. } => *http_status,
        }
    }

    pub fn response_body(&self) -> Option<String> {
        match self {
            Delivery::Success { body, .. } => body.clone(),
            Delivery::Retryable { detail, .. } | Delivery::Permanent { detail, .. } => {
                Some(detail.clone())
            }
        }
    }
}

/// An outbound conversion sink
#[async_trait]
pub trait Destination: Send + Sync {
    /// Stable identifier, part of the idempotency key
    fn id(&self) -> &str;

    /// Attempt one delivery. Must not retry internally; the dispatcher owns
    /// the retry schedule.
    async fn deliver(&self, payload: &ConversionPayload) -> Delivery;
}

/// HTTP conversions-API destination (reqwest, bounded timeout)
pub struct HttpDestination {
    id: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpDestination {
    pub fn new(
        id: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, crate::core::EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::core::EngineError::Config(e.to_string()))?;
        Ok(Self {
            id: id.into(),
            endpoint: endpoint.into(),
            client,
        })
    }
}

/// Map an HTTP status to a delivery classification.
///
/// 2xx succeeds; 408 and 429 are throttling-shaped and retryable; all other
/// 4xx mean the payload itself was rejected; 5xx is the destination's problem
/// and worth retrying.
pub(super) fn classify_status(status: u16, body: Option<String>) -> Delivery {
    let http_status = Some(status as i64);
    match status {
        200..=299 => Delivery::Success { http_status, body },
        408 | 429 => Delivery::Retryable {
            http_status,
            detail: body.unwrap_or_else(|| format!("HTTP {status}")),
        },
        400..=499 => Delivery::Permanent {
            http_status,
            detail: body.unwrap_or_else(|| format!("HTTP {status}")),
        },
        _ => Delivery::Retryable {
            http_status,
            detail: body.unwrap_or_else(|| format!("HTTP {status}")),
        },
    }
}

#[async_trait]
impl Destination for HttpDestination {
    fn id(&self) -> &str {
        &self.id
    }

    async fn deliver(&self, payload: &ConversionPayload) -> Delivery {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload.to_json())
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.ok().filter(|b| !b.is_empty());
                classify_status(status, body)
            }
            Err(e) => {
                // Timeouts and connect failures are transient by definition
                tracing::warn!(destination = %self.id, error = %e, "Delivery transport error");
                Delivery::Retryable {
                    http_status: None,
                    detail: e.to_string(),
                }
            }
        }
    }
}
