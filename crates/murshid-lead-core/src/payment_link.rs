//! Payment link orchestration
//!
//! Runs as a detached background job after the submission response has
//! already been sent: resolve the requested program, create a hosted
//! payment link, write the link back to the Lead Store. There is no caller
//! to report to, so every step is independently logged and a failure
//! short-circuits the remaining steps without propagating.

use std::sync::Arc;

use tracing::{info, warn};

use murshid_types::LeadSubmission;

use crate::catalog::CatalogResolver;
use crate::store::LeadStore;
use crate::stripe::StripeClient;

/// Creates hosted payment links and attaches them to leads.
pub struct PaymentLinkOrchestrator {
    stripe: StripeClient,
    catalog: Arc<CatalogResolver>,
    store: Arc<dyn LeadStore>,
}

impl PaymentLinkOrchestrator {
    pub fn new(
        stripe: StripeClient,
        catalog: Arc<CatalogResolver>,
        store: Arc<dyn LeadStore>,
    ) -> Self {
        Self {
            stripe,
            catalog,
            store,
        }
    }

    /// Create a payment link for this lead and attach it to the stored
    /// record. Returns the link URL when one was created.
    pub async fn create_payment_link(&self, lead: &LeadSubmission) -> Option<String> {
        let Some(program_id) = lead.package.as_deref().filter(|p| !p.trim().is_empty()) else {
            warn!(lead_id = %lead.lead_id, "Lead has no package, skipping payment link");
            return None;
        };

        let Some(entry) = self.catalog.resolve(program_id).await else {
            warn!(lead_id = %lead.lead_id, program_id, "No resolvable price, skipping payment link");
            return None;
        };

        let mut metadata = vec![
            ("lead_id".to_string(), lead.lead_id.clone()),
            ("customer_name".to_string(), lead.full_name.clone()),
            ("country".to_string(), lead.country.clone()),
            ("phone".to_string(), lead.phone.clone()),
            ("category".to_string(), lead.category.clone()),
            ("package".to_string(), program_id.to_string()),
            ("program_id".to_string(), entry.program_id.clone()),
        ];
        if let Some(sessions) = entry.sessions {
            metadata.push(("sessions".to_string(), sessions.to_string()));
        }
        if let Some(duration) = &entry.duration_label {
            metadata.push(("duration".to_string(), duration.clone()));
        }

        let link = match self
            .stripe
            .create_payment_link(&entry.price_id, &metadata)
            .await
        {
            Ok(link) => link,
            Err(e) => {
                warn!(lead_id = %lead.lead_id, program_id, error = %e,
                    "Payment link creation failed");
                metrics::counter!("payment_links_created_total", "outcome" => "error")
                    .increment(1);
                return None;
            }
        };

        info!(lead_id = %lead.lead_id, link_id = %link.id, "Payment link created");
        metrics::counter!("payment_links_created_total", "outcome" => "created").increment(1);

        // Best-effort write-back; the link itself was still created.
        if let Err(e) = self
            .store
            .attach_payment_link(&lead.lead_id, &link.url)
            .await
        {
            warn!(lead_id = %lead.lead_id, error = %e,
                "Failed to attach payment link to lead record");
        }

        Some(link.url)
    }
}

impl std::fmt::Debug for PaymentLinkOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentLinkOrchestrator").finish_non_exhaustive()
    }
}
