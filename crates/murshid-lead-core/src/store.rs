//! Lead Store client
//!
//! HTTP client for the external spreadsheet-backed CRM. One POST endpoint,
//! three operations distinguished by an `operation` field, authenticated
//! with a shared secret. Transport failures are retried per
//! [`RetryPolicy`]; any HTTP response means the request arrived and is
//! never retried, so a flaky network cannot create duplicate leads.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, instrument, warn};

use murshid_types::LeadSubmission;

use crate::config::StoreConfig;
use crate::error::LeadError;
use crate::retry::{classify, FailureClass, RetryPolicy, RetryState};

/// Result of `createLead`. The store is authoritative on duplicate
/// detection; a duplicate is a success path for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateLeadOutcome {
    pub duplicate: bool,
}

/// Payment details recorded when marking a lead paid.
#[derive(Debug, Clone, Default)]
pub struct PaidDetails {
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub session_id: Option<String>,
}

/// Lead Store operations.
///
/// Trait seam so the pipeline can run against a test double that enforces
/// uniqueness and counts calls.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Record a validated lead. Fully awaited by the submission flow.
    async fn create_lead(&self, lead: &LeadSubmission) -> Result<CreateLeadOutcome, LeadError>;

    /// Attach a generated payment link to an existing lead. Best-effort;
    /// callers log failures and move on.
    async fn attach_payment_link(&self, lead_id: &str, url: &str) -> Result<(), LeadError>;

    /// Mark a lead as paid. Must tolerate repeated calls for the same
    /// `lead_id` (the webhook is delivered at-least-once).
    async fn mark_paid(&self, lead_id: &str, details: &PaidDetails) -> Result<(), LeadError>;
}

/// Store JSON response: `{success, duplicate?, error?}`.
#[derive(Debug, Deserialize)]
struct StoreResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    duplicate: bool,
    error: Option<String>,
}

/// HTTP implementation of [`LeadStore`].
#[derive(Clone)]
pub struct HttpLeadStore {
    client: Client,
    config: StoreConfig,
    policy: RetryPolicy,
}

impl HttpLeadStore {
    pub fn new(config: StoreConfig) -> Self {
        let policy = RetryPolicy::new(config.max_attempts, config.base_backoff);
        Self {
            client: Client::new(),
            config,
            policy,
        }
    }

    /// POST one operation with retry on transport failure.
    async fn post_operation(
        &self,
        operation: &'static str,
        mut body: Map<String, Value>,
    ) -> Result<StoreResponse, LeadError> {
        body.insert("secret".to_string(), json!(self.config.secret));
        body.insert("operation".to_string(), json!(operation));

        let mut state = RetryState::Attempting(1);
        loop {
            let RetryState::Attempting(attempt) = state else {
                return Err(LeadError::Internal("retry state machine stalled".into()));
            };

            let result = self
                .client
                .post(&self.config.endpoint)
                .timeout(self.config.timeout)
                .json(&body)
                .send()
                .await;

            let err = match result {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        // Reached the server; retrying risks duplicates.
                        warn!(%operation, %status, "Lead store returned error status");
                    }
                    let text = response.text().await.map_err(|e| {
                        LeadError::Internal(format!("failed to read lead store response: {e}"))
                    })?;
                    let parsed: StoreResponse = serde_json::from_str(&text).map_err(|_| {
                        error!(%operation, "Lead store returned a non-JSON response");
                        LeadError::Internal("lead store returned a non-JSON response".into())
                    })?;
                    metrics::counter!("lead_store_requests_total",
                        "operation" => operation, "outcome" => "response")
                    .increment(1);
                    return Ok(parsed);
                }
                Err(err) => err,
            };

            let class = classify(&err);
            match self.policy.after_failure(attempt, class) {
                RetryState::Attempting(next) => {
                    let delay = self.policy.backoff_delay(attempt);
                    warn!(%operation, attempt, ?delay, error = %err,
                        "Lead store transport failure, retrying");
                    metrics::counter!("lead_store_requests_total",
                        "operation" => operation, "outcome" => "retry")
                    .increment(1);
                    tokio::time::sleep(delay).await;
                    state = RetryState::Attempting(next);
                }
                _ if class == FailureClass::Timeout => {
                    error!(%operation, timeout = ?self.config.timeout, "Lead store request timed out");
                    metrics::counter!("lead_store_requests_total",
                        "operation" => operation, "outcome" => "timeout")
                    .increment(1);
                    return Err(LeadError::StoreTimeout(self.config.timeout));
                }
                _ => {
                    error!(%operation, attempt, error = %err, "Lead store unreachable");
                    metrics::counter!("lead_store_requests_total",
                        "operation" => operation, "outcome" => "transport_error")
                    .increment(1);
                    return Err(LeadError::StoreTransport(err.to_string()));
                }
            }
        }
    }

    fn lead_fields(lead: &LeadSubmission) -> Map<String, Value> {
        match serde_json::to_value(lead) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[async_trait]
impl LeadStore for HttpLeadStore {
    #[instrument(skip(self, lead), fields(lead_id = %lead.lead_id))]
    async fn create_lead(&self, lead: &LeadSubmission) -> Result<CreateLeadOutcome, LeadError> {
        let response = self
            .post_operation("createLead", Self::lead_fields(lead))
            .await?;

        if response.duplicate {
            debug!(lead_id = %lead.lead_id, "Lead store reported duplicate");
            return Ok(CreateLeadOutcome { duplicate: true });
        }
        if !response.success {
            let message = response.error.unwrap_or_else(|| "unknown store error".into());
            return Err(LeadError::StoreRejected(message));
        }
        Ok(CreateLeadOutcome { duplicate: false })
    }

    #[instrument(skip(self, url))]
    async fn attach_payment_link(&self, lead_id: &str, url: &str) -> Result<(), LeadError> {
        let mut body = Map::new();
        body.insert("leadId".to_string(), json!(lead_id));
        body.insert("paymentLink".to_string(), json!(url));

        let response = self.post_operation("attachPaymentLink", body).await?;
        if !response.success {
            let message = response.error.unwrap_or_else(|| "unknown store error".into());
            return Err(LeadError::StoreRejected(message));
        }
        Ok(())
    }

    #[instrument(skip(self, details))]
    async fn mark_paid(&self, lead_id: &str, details: &PaidDetails) -> Result<(), LeadError> {
        let mut body = Map::new();
        body.insert("leadId".to_string(), json!(lead_id));
        if let Some(amount) = details.amount_minor {
            body.insert("amountMinor".to_string(), json!(amount));
        }
        if let Some(currency) = &details.currency {
            body.insert("currency".to_string(), json!(currency));
        }
        if let Some(session) = &details.session_id {
            body.insert("sessionId".to_string(), json!(session));
        }

        let response = self.post_operation("markPaid", body).await?;
        if !response.success {
            let message = response.error.unwrap_or_else(|| "unknown store error".into());
            return Err(LeadError::StoreRejected(message));
        }
        Ok(())
    }
}

impl std::fmt::Debug for HttpLeadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLeadStore")
            .field("endpoint", &self.config.endpoint)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
