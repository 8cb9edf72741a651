//! Billing webhook reconciliation
//!
//! Verifies inbound Stripe events and reconciles completed payments:
//! notify operators, mark the lead paid in the store. Stateless per call;
//! idempotency lives in the store's `markPaid`, which tolerates repeated
//! calls for the same lead id (delivery is at-least-once).

use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, error, info, instrument, warn};

use crate::analytics::AnalyticsSink;
use crate::error::LeadError;
use crate::notify::{NotificationDispatcher, PaymentNotification};
use crate::store::{LeadStore, PaidDetails};

/// Maximum accepted age of a webhook timestamp, in seconds.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Webhook event kinds that drive side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    /// Hosted checkout completed; the primary payment trigger
    CheckoutSessionCompleted,
    /// Secondary confirmation; analytics only
    PaymentIntentSucceeded,
    /// Anything else; acknowledged and ignored
    Unknown(String),
}

impl From<&str> for WebhookEventKind {
    fn from(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Metadata this service stamps onto payment links, decoded back from the
/// provider at the boundary before any business logic touches it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMetadata {
    pub lead_id: Option<String>,
    pub customer_name: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub category: Option<String>,
    pub package: Option<String>,
    pub program_id: Option<String>,
}

/// Checkout session fields the reconciler uses.
#[derive(Debug, Clone, Deserialize)]
struct RawCheckoutSession {
    id: String,
    amount_total: Option<i64>,
    currency: Option<String>,
    #[serde(default)]
    metadata: PaymentMetadata,
}

/// Payment intent fields the reconciler uses.
#[derive(Debug, Clone, Deserialize)]
struct RawPaymentIntent {
    id: String,
    amount: Option<i64>,
    currency: Option<String>,
}

// Raw Stripe event envelope.
#[derive(Debug, Deserialize)]
struct RawStripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// Reconciles billing-provider events against the Lead Store.
pub struct WebhookReconciler {
    webhook_secret: String,
    store: Arc<dyn LeadStore>,
    notifier: Arc<NotificationDispatcher>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl WebhookReconciler {
    pub fn new(
        webhook_secret: impl Into<String>,
        store: Arc<dyn LeadStore>,
        notifier: Arc<NotificationDispatcher>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            store,
            notifier,
            analytics,
        }
    }

    /// Verify and process one webhook delivery.
    ///
    /// Verification and parsing failures are [`LeadError::Webhook`] (400
    /// to the provider). Side-effect failures are isolated: a notification
    /// failure never prevents the store update, and vice versa.
    #[instrument(skip_all)]
    pub async fn handle(&self, payload: &[u8], signature: &str) -> Result<(), LeadError> {
        self.verify_signature(payload, signature)?;

        let raw_event: RawStripeEvent = serde_json::from_slice(payload)
            .map_err(|e| LeadError::Webhook(format!("unparseable event: {e}")))?;

        debug!(event_id = %raw_event.id, event_type = %raw_event.event_type,
            "Verified webhook event");

        let kind = WebhookEventKind::from(raw_event.event_type.as_str());
        match kind {
            WebhookEventKind::CheckoutSessionCompleted => {
                let session: RawCheckoutSession = serde_json::from_value(raw_event.data.object)
                    .map_err(|e| LeadError::Webhook(format!("unparseable session: {e}")))?;
                self.reconcile_checkout(session).await;
                metrics::counter!("webhooks_processed_total", "kind" => "checkout_completed")
                    .increment(1);
            }
            WebhookEventKind::PaymentIntentSucceeded => {
                let intent: RawPaymentIntent = serde_json::from_value(raw_event.data.object)
                    .map_err(|e| LeadError::Webhook(format!("unparseable intent: {e}")))?;
                self.analytics
                    .track(
                        "payment_completed",
                        json!({
                            "source": "payment_intent",
                            "intent_id": intent.id,
                            "amount_minor": intent.amount,
                            "currency": intent.currency,
                        }),
                    )
                    .await;
                metrics::counter!("webhooks_processed_total", "kind" => "payment_succeeded")
                    .increment(1);
            }
            WebhookEventKind::Unknown(other) => {
                debug!(event_type = %other, "Ignoring unhandled webhook event type");
                metrics::counter!("webhooks_processed_total", "kind" => "ignored").increment(1);
            }
        }

        Ok(())
    }

    /// Side effects for a completed checkout. Each effect is caught and
    /// logged independently.
    async fn reconcile_checkout(&self, session: RawCheckoutSession) {
        let amount_minor = session.amount_total.unwrap_or(0);
        let currency = session.currency.clone().unwrap_or_else(|| "eur".into());
        let metadata = session.metadata;

        self.analytics
            .track(
                "payment_completed",
                json!({
                    "source": "checkout_session",
                    "session_id": session.id,
                    "lead_id": metadata.lead_id,
                    "amount_minor": amount_minor,
                    "currency": currency,
                    "package": metadata.package,
                }),
            )
            .await;

        let notification = PaymentNotification {
            customer_name: metadata
                .customer_name
                .clone()
                .unwrap_or_else(|| "Unknown customer".into()),
            amount_minor,
            currency: currency.clone(),
            package: metadata.package.clone().or(metadata.program_id.clone()),
        };
        // The dispatcher logs its own failures; nothing to propagate.
        self.notifier.notify_payment(&notification).await;

        match metadata.lead_id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(lead_id) => {
                let details = PaidDetails {
                    amount_minor: Some(amount_minor),
                    currency: Some(currency),
                    session_id: Some(session.id.clone()),
                };
                if let Err(e) = self.store.mark_paid(lead_id, &details).await {
                    error!(lead_id, error = %e, "Failed to mark lead paid");
                } else {
                    info!(lead_id, session_id = %session.id, "Lead marked paid");
                }
            }
            None => {
                warn!(session_id = %session.id,
                    "Checkout completed without a lead_id in metadata, skipping store update");
            }
        }
    }

    /// Verify the Stripe signature header (`t=timestamp,v1=hex-hmac`).
    fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<(), LeadError> {
        let mut timestamp: Option<&str> = None;
        let mut sig_v1: Option<&str> = None;

        for part in signature.split(',') {
            if let Some((key, value)) = part.split_once('=') {
                match key {
                    "t" => timestamp = Some(value),
                    "v1" => sig_v1 = Some(value),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            warn!("Missing timestamp in webhook signature");
            LeadError::Webhook("missing timestamp".to_string())
        })?;
        let sig_v1 = sig_v1.ok_or_else(|| {
            warn!("Missing v1 signature in webhook signature");
            LeadError::Webhook("missing signature".to_string())
        })?;

        let payload_str = std::str::from_utf8(payload)
            .map_err(|_| LeadError::Webhook("invalid payload encoding".to_string()))?;
        let signed_payload = format!("{timestamp}.{payload_str}");

        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| LeadError::Internal("HMAC error".to_string()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if !constant_time_eq(sig_v1.as_bytes(), expected.as_bytes()) {
            error!("Webhook signature verification failed");
            return Err(LeadError::Webhook("signature verification failed".to_string()));
        }

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| LeadError::Webhook("invalid timestamp format".to_string()))?;
        let now = Utc::now().timestamp();
        if (now - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
            warn!(timestamp = ts, now, "Webhook timestamp outside tolerance");
            return Err(LeadError::Webhook("timestamp too old".to_string()));
        }

        Ok(())
    }
}

impl std::fmt::Debug for WebhookReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookReconciler").finish_non_exhaustive()
    }
}

/// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_mapping() {
        assert_eq!(
            WebhookEventKind::from("checkout.session.completed"),
            WebhookEventKind::CheckoutSessionCompleted
        );
        assert_eq!(
            WebhookEventKind::from("payment_intent.succeeded"),
            WebhookEventKind::PaymentIntentSucceeded
        );
        assert_eq!(
            WebhookEventKind::from("invoice.paid"),
            WebhookEventKind::Unknown("invoice.paid".to_string())
        );
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc123", b"abc123"));
        assert!(!constant_time_eq(b"abc123", b"abc124"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn metadata_decodes_from_partial_object() {
        let metadata: PaymentMetadata = serde_json::from_value(serde_json::json!({
            "lead_id": "abc123",
            "package": "program_breakthrough",
            "unrelated_key": "ignored",
        }))
        .unwrap();
        assert_eq!(metadata.lead_id.as_deref(), Some("abc123"));
        assert_eq!(metadata.package.as_deref(), Some("program_breakthrough"));
        assert!(metadata.phone.is_none());
    }
}
