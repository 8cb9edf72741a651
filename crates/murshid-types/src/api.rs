//! Wire shapes for the public HTTP endpoints.

use serde::Serialize;

use crate::error::FieldError;

/// Success body for `POST /api/submit-lead`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitLeadResponse {
    pub success: bool,
    pub message: String,
    pub payment_link_pending: bool,
    pub duplicate: bool,
}

impl SubmitLeadResponse {
    /// Body for a freshly recorded lead.
    pub fn created(payment_link_pending: bool) -> Self {
        Self {
            success: true,
            message: "Lead received".to_string(),
            payment_link_pending,
            duplicate: false,
        }
    }

    /// Body for a duplicate submission. Reported as success so a
    /// legitimate double-click does not look like a failure.
    pub fn duplicate() -> Self {
        Self {
            success: true,
            message: "Already submitted".to_string(),
            payment_link_pending: false,
            duplicate: true,
        }
    }
}

/// Error body shared by all non-200 responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl ApiErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            errors: None,
        }
    }

    pub fn with_fields(error: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            success: false,
            error: error.into(),
            errors: Some(errors),
        }
    }
}

/// Acknowledgement body for `POST /api/stripe/webhook`.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self {
            success: true,
            disabled: None,
        }
    }

    /// Payments feature-flagged off; still a 200 so the provider stops
    /// retrying.
    pub fn disabled() -> Self {
        Self {
            success: true,
            disabled: Some(true),
        }
    }

    /// Missing webhook secret; soft-fail with a 200 body so a
    /// misconfigured endpoint is not retried forever.
    pub fn misconfigured() -> Self {
        Self {
            success: false,
            disabled: None,
        }
    }
}
