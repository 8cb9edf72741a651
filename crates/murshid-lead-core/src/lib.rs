//! Murshid Lead Core - Lead pipeline business logic
//!
//! Everything between the HTTP surface and the external systems: lead
//! validation, payment eligibility, the spreadsheet-backed Lead Store
//! client with its retry policy, catalog resolution and payment-link
//! creation against Stripe, WhatsApp operator notifications, webhook
//! reconciliation, and rate limiting.
//!
//! # Example
//!
//! ```rust,ignore
//! use murshid_lead_core::{LeadService, StoreConfig};
//!
//! let store = HttpLeadStore::new(StoreConfig::new("https://script.google.com/...", "secret"));
//! let service = LeadService::new(limiter, Arc::new(store), notifier, analytics, jobs);
//!
//! let outcome = service.submit(raw_lead, "203.0.113.9").await?;
//! assert!(outcome.payment_link_pending);
//! ```

pub mod analytics;
pub mod catalog;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod jobs;
pub mod notify;
pub mod payment_link;
pub mod rate_limit;
pub mod retry;
pub mod service;
pub mod store;
pub mod stripe;
pub mod validate;
pub mod webhook;

pub use analytics::{AnalyticsSink, LogSink, MemorySink};
pub use catalog::{CatalogEntry, CatalogResolver};
pub use config::{
    RateLimitConfig, StoreConfig, StripeConfig, TemplateConfig, WhatsAppConfig,
};
pub use error::LeadError;
pub use jobs::{JobQueue, PaymentLinkJob};
pub use notify::{NotificationDispatcher, PaymentNotification};
pub use payment_link::PaymentLinkOrchestrator;
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use retry::{FailureClass, RetryPolicy, RetryState};
pub use service::{LeadService, SubmitOutcome};
pub use store::{CreateLeadOutcome, HttpLeadStore, LeadStore};
pub use webhook::WebhookReconciler;
