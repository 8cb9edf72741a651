//! Murshid Types - Shared domain types
//!
//! Types crossing crate boundaries in the lead pipeline: the inbound and
//! validated lead shapes, the country allow-list, validation error details,
//! and the public API response shapes.

pub mod api;
pub mod country;
pub mod error;
pub mod lead;

pub use api::{SubmitLeadResponse, WebhookAck};
pub use error::FieldError;
pub use lead::{generate_lead_id, LeadSubmission, RawLead};
