//! Lead pipeline errors

use std::time::Duration;

use murshid_types::FieldError;
use thiserror::Error;

/// Lead pipeline errors
#[derive(Error, Debug)]
pub enum LeadError {
    /// Lead payload failed validation
    #[error("validation failed: {0:?}")]
    Validation(Vec<FieldError>),

    /// Request rejected by the rate limiter
    #[error("rate limit exceeded")]
    RateLimited,

    /// Missing required configuration
    #[error("missing configuration: {0}")]
    Config(&'static str),

    /// Lead Store unreachable after exhausting retries
    #[error("lead store unreachable: {0}")]
    StoreTransport(String),

    /// Lead Store request aborted by the per-attempt timeout
    #[error("lead store timed out after {0:?}")]
    StoreTimeout(Duration),

    /// Lead Store responded but rejected the operation
    #[error("lead store rejected request: {0}")]
    StoreRejected(String),

    /// Billing or messaging provider error
    #[error("provider error: {0}")]
    Provider(String),

    /// Webhook verification or parsing error
    #[error("webhook error: {0}")]
    Webhook(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl LeadError {
    /// Client input errors map to 400.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Webhook(_))
    }

    /// Upstream timeout maps to 504.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StoreTimeout(_))
    }
}
