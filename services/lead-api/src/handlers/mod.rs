//! HTTP handlers

mod health;
mod submit;
mod webhook;

pub use health::{health, ready};
pub use submit::submit_lead;
pub use webhook::stripe_webhook;
