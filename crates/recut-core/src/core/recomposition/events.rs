//! Status Events
//!
//! Inbound status updates from the rendering side (typically a webhook
//! receiver), delivered to the recomposition service over a channel.

use serde::{Deserialize, Serialize};

use super::record::RecompositionStatus;
use crate::core::{RecompositionId, RenderJobId};

/// Which record an event refers to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StatusTarget {
    Recomposition(RecompositionId),
    /// Backend job id, as reported by the rendering backend
    Job(RenderJobId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub target: StatusTarget,
    pub status: RecompositionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<serde_json::Value>,
}

impl StatusEvent {
    pub fn for_record(id: impl Into<RecompositionId>, status: RecompositionStatus) -> Self {
        Self {
            target: StatusTarget::Recomposition(id.into()),
            status,
            error_message: None,
            error_details: None,
        }
    }

    pub fn for_job(job_id: impl Into<RenderJobId>, status: RecompositionStatus) -> Self {
        Self {
            target: StatusTarget::Job(job_id.into()),
            status,
            error_message: None,
            error_details: None,
        }
    }

    /// Attaches a failure message
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Attaches structured failure details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error_details = Some(details);
        self
    }
}
