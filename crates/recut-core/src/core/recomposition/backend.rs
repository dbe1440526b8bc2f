//! Rendering Backend
//!
//! Wire types for submitting a recomposition and the HTTP client that posts
//! them to the backend's composition endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::UpdatedCompositionConfig;
use crate::core::settings::BackendSettings;
use crate::core::{CompositionId, CoreError, CoreResult, GenerationId, RenderJobId, TriggerError};

/// Header carrying the per-submission idempotency key
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Header carrying a fresh id per HTTP attempt, for backend log correlation
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

// =============================================================================
// Wire Types
// =============================================================================

/// Queue priority requested from the backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Body of a recomposition submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub composition_id: CompositionId,
    pub config: UpdatedCompositionConfig,
    pub priority: TriggerPriority,
    pub webhook_url: Option<String>,
    pub generation_id: GenerationId,
    pub edit_summary: String,
}

/// Backend acknowledgement of a submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub job_id: RenderJobId,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub estimated_duration: Option<f64>,
    #[serde(default)]
    pub queue_position: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// =============================================================================
// Backend Trait
// =============================================================================

/// Collaborator that renders compositions
#[async_trait]
pub trait RenderingBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Submits a recomposition. `idempotency_key` is stable per record so a
    /// caller-side retry does not start a second render.
    async fn submit(
        &self,
        request: &TriggerRequest,
        idempotency_key: &str,
    ) -> Result<TriggerResponse, TriggerError>;
}

// =============================================================================
// HTTP Backend
// =============================================================================

/// Rendering backend reached over HTTP + JSON
pub struct HttpRenderingBackend {
    client: reqwest::Client,
    base_url: String,
    composition_path: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpRenderingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRenderingBackend")
            .field("base_url", &self.base_url)
            .field("composition_path", &self.composition_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpRenderingBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            composition_path: "/compositions".to_string(),
            api_key: None,
            timeout,
        })
    }

    pub fn from_settings(settings: &BackendSettings) -> CoreResult<Self> {
        if settings.base_url.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Rendering backend base URL is not configured".to_string(),
            ));
        }

        let backend = Self::new(
            settings.base_url.clone(),
            Duration::from_secs(settings.timeout_sec),
        )?
        .with_composition_path(settings.composition_path.clone());

        Ok(match &settings.api_key {
            Some(key) if !key.is_empty() => backend.with_api_key(key.clone()),
            _ => backend,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_composition_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.composition_path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    /// Build the submission URL
    fn composition_url(&self) -> String {
        format!("{}{}", self.base_url, self.composition_path)
    }

    /// Parse an error response body
    fn parse_api_error(status: StatusCode, body: &str) -> TriggerError {
        if let Ok(err_resp) = serde_json::from_str::<ApiErrorResponse>(body) {
            if let Some(detail) = err_resp.error {
                let message = match detail.code {
                    Some(code) => format!("{} (code: {})", detail.message.unwrap_or_default(), code),
                    None => detail.message.unwrap_or_default(),
                };
                return TriggerError::Rejected {
                    status: status.as_u16(),
                    message,
                };
            }
            if let Some(message) = err_resp.message {
                return TriggerError::Rejected {
                    status: status.as_u16(),
                    message,
                };
            }
        }

        let truncated: String = body.chars().take(500).collect();
        TriggerError::Rejected {
            status: status.as_u16(),
            message: truncated,
        }
    }

    fn parse_response(body: &str) -> Result<TriggerResponse, TriggerError> {
        let parsed: TriggerResponse = serde_json::from_str(body)
            .map_err(|e| TriggerError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if parsed.job_id.trim().is_empty() {
            return Err(TriggerError::InvalidResponse(
                "Backend returned an empty job_id".to_string(),
            ));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl RenderingBackend for HttpRenderingBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(
        &self,
        request: &TriggerRequest,
        idempotency_key: &str,
    ) -> Result<TriggerResponse, TriggerError> {
        let url = self.composition_url();
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(
            "Submitting recomposition of {} to {} ({} edit(s), request {})",
            request.composition_id,
            url,
            request.config.edit_count(),
            request_id
        );

        let mut builder = self
            .client
            .post(&url)
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .header(REQUEST_ID_HEADER, &request_id)
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TriggerError::Timeout(self.timeout)
            } else {
                TriggerError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TriggerError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_api_error(status, &body));
        }

        let parsed = Self::parse_response(&body)?;
        info!(
            "Rendering backend accepted {}: job_id={}, queue_position={:?}",
            request.composition_id, parsed.job_id, parsed.queue_position
        );
        Ok(parsed)
    }
}
