//! Application state for the Lead API service.

use std::sync::Arc;

use murshid_lead_core::{JobQueue, LeadService, WebhookReconciler};

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Lead submission pipeline
    pub leads: Arc<LeadService>,
    /// Webhook reconciler; absent when payments are off or the webhook
    /// secret is unconfigured
    pub reconciler: Option<Arc<WebhookReconciler>>,
    /// Payment-link job queue (for readiness reporting)
    pub jobs: Option<JobQueue>,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        leads: LeadService,
        reconciler: Option<WebhookReconciler>,
        jobs: Option<JobQueue>,
        config: Config,
    ) -> Self {
        Self {
            leads: Arc::new(leads),
            reconciler: reconciler.map(Arc::new),
            jobs,
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("payments_enabled", &self.config.payments_enabled)
            .finish_non_exhaustive()
    }
}
