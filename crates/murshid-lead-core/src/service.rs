//! Lead submission service
//!
//! The request-scoped pipeline behind `POST /api/submit-lead`: rate limit
//! gate, validation, store write (fully awaited, duplicate observed),
//! then the independent downstream effects — operator notification and
//! the detached payment-link job. Collaborators are injected; there are
//! no ambient singletons.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};

use murshid_types::{LeadSubmission, RawLead};

use crate::analytics::AnalyticsSink;
use crate::eligibility::{requires_payment, wants_payment_link};
use crate::error::LeadError;
use crate::jobs::JobQueue;
use crate::notify::NotificationDispatcher;
use crate::rate_limit::RateLimiter;
use crate::store::LeadStore;
use crate::validate::validate;

/// Result of one submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub lead_id: String,
    pub duplicate: bool,
    pub payment_link_pending: bool,
}

/// The lead submission pipeline.
pub struct LeadService {
    limiter: Arc<RateLimiter>,
    store: Arc<dyn LeadStore>,
    notifier: Arc<NotificationDispatcher>,
    analytics: Arc<dyn AnalyticsSink>,
    /// Absent when payments are feature-flagged off
    jobs: Option<JobQueue>,
}

impl LeadService {
    pub fn new(
        limiter: Arc<RateLimiter>,
        store: Arc<dyn LeadStore>,
        notifier: Arc<NotificationDispatcher>,
        analytics: Arc<dyn AnalyticsSink>,
        jobs: Option<JobQueue>,
    ) -> Self {
        Self {
            limiter,
            store,
            notifier,
            analytics,
            jobs,
        }
    }

    /// Process one raw submission from `client_key` (derived from the
    /// forwarded-for address).
    ///
    /// `createLead` is fully awaited and its duplicate flag observed
    /// before any downstream effect fires; a duplicate short-circuits
    /// both the notification and the payment-link job.
    #[instrument(skip(self, raw), fields(client_key))]
    pub async fn submit(
        &self,
        raw: RawLead,
        client_key: &str,
    ) -> Result<SubmitOutcome, LeadError> {
        let decision = self.limiter.check(client_key).await;
        if !decision.allowed {
            metrics::counter!("leads_submitted_total", "status" => "rate_limited").increment(1);
            return Err(LeadError::RateLimited);
        }

        let lead = validate(raw).map_err(|errors| {
            metrics::counter!("leads_submitted_total", "status" => "invalid").increment(1);
            LeadError::Validation(errors)
        })?;

        let outcome = self.store.create_lead(&lead).await.map_err(|e| {
            metrics::counter!("leads_submitted_total", "status" => "store_error").increment(1);
            e
        })?;

        if outcome.duplicate {
            info!(lead_id = %lead.lead_id, "Duplicate submission, skipping side effects");
            metrics::counter!("leads_submitted_total", "status" => "duplicate").increment(1);
            return Ok(SubmitOutcome {
                lead_id: lead.lead_id,
                duplicate: true,
                payment_link_pending: false,
            });
        }

        metrics::counter!("leads_submitted_total", "status" => "created").increment(1);
        self.analytics
            .track(
                "lead_submitted",
                json!({
                    "lead_id": lead.lead_id,
                    "category": lead.category,
                    "country": lead.country,
                    "package": lead.package,
                }),
            )
            .await;

        // Notification and the payment-link job are independent of each
        // other; the dispatcher handles its own failures.
        self.notifier.notify_lead(&lead).await;

        let payment_link_pending = self.dispatch_payment_link(&lead);

        Ok(SubmitOutcome {
            lead_id: lead.lead_id,
            duplicate: false,
            payment_link_pending,
        })
    }

    /// Enqueue the detached payment-link job when the lead qualifies.
    fn dispatch_payment_link(&self, lead: &LeadSubmission) -> bool {
        let Some(jobs) = &self.jobs else {
            return false;
        };
        if !wants_payment_link(lead) {
            if requires_payment(&lead.category, &lead.country) {
                warn!(lead_id = %lead.lead_id,
                    "Payment required but no package on lead, skipping payment link");
            }
            return false;
        }
        jobs.enqueue(lead.clone())
    }
}

impl std::fmt::Debug for LeadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeadService")
            .field("payments_enabled", &self.jobs.is_some())
            .finish_non_exhaustive()
    }
}
