//! Webhook reconciliation
//!
//! Signature verification and the side-effect contract: a verified
//! checkout completion marks the lead paid; tampered or stale payloads
//! produce zero side effects.

mod common;

use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use common::{silent_notifier, MockLeadStore};
use murshid_lead_core::error::LeadError;
use murshid_lead_core::{MemorySink, WebhookReconciler};

const WEBHOOK_SECRET: &str = "whsec_test_secret_key";

/// Generate a valid Stripe webhook signature header.
fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signed_payload = format!("{}.{}", timestamp, std::str::from_utf8(payload).unwrap());
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed_payload.as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn checkout_completed_payload(lead_id: Option<&str>) -> Vec<u8> {
    let mut metadata = serde_json::json!({
        "customer_name": "Amel Ben Salah",
        "country": "France",
        "phone": "+33612345678",
        "category": "individuals",
        "package": "program_breakthrough",
    });
    if let Some(id) = lead_id {
        metadata["lead_id"] = serde_json::json!(id);
    }
    serde_json::to_vec(&serde_json::json!({
        "id": "evt_test_123",
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "cs_test_123",
                "amount_total": 49900,
                "currency": "eur",
                "metadata": metadata,
            }
        }
    }))
    .unwrap()
}

struct Fixture {
    reconciler: WebhookReconciler,
    store: Arc<MockLeadStore>,
    analytics: Arc<MemorySink>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MockLeadStore::default());
    let analytics = Arc::new(MemorySink::default());
    let reconciler = WebhookReconciler::new(
        WEBHOOK_SECRET,
        store.clone(),
        silent_notifier(analytics.clone()),
        analytics.clone(),
    );
    Fixture {
        reconciler,
        store,
        analytics,
    }
}

#[tokio::test]
async fn verified_checkout_marks_the_lead_paid_once() {
    let f = fixture();
    let payload = checkout_completed_payload(Some("abc123"));
    let signature = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());

    f.reconciler.handle(&payload, &signature).await.unwrap();

    assert_eq!(f.store.mark_paid_calls().await, vec!["abc123".to_string()]);
    assert_eq!(f.analytics.count("payment_completed").await, 1);
}

#[tokio::test]
async fn tampered_body_is_rejected_with_zero_side_effects() {
    let f = fixture();
    let payload = checkout_completed_payload(Some("abc123"));
    let signature = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());

    // Signature computed over the original body, body then tampered.
    let mut tampered = payload.clone();
    let needle = b"abc123";
    let pos = tampered
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap();
    tampered[pos..pos + needle.len()].copy_from_slice(b"evil99");

    let err = f.reconciler.handle(&tampered, &signature).await.unwrap_err();
    assert!(matches!(err, LeadError::Webhook(_)));
    assert!(f.store.mark_paid_calls().await.is_empty());
    assert_eq!(f.analytics.count("payment_completed").await, 0);
}

#[tokio::test]
async fn stale_timestamp_is_rejected() {
    let f = fixture();
    let payload = checkout_completed_payload(Some("abc123"));
    let stale = Utc::now().timestamp() - 600;
    let signature = sign(&payload, WEBHOOK_SECRET, stale);

    let err = f.reconciler.handle(&payload, &signature).await.unwrap_err();
    assert!(matches!(err, LeadError::Webhook(_)));
    assert!(f.store.mark_paid_calls().await.is_empty());
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let f = fixture();
    let payload = checkout_completed_payload(Some("abc123"));
    let signature = sign(&payload, "whsec_other_secret", Utc::now().timestamp());

    let err = f.reconciler.handle(&payload, &signature).await.unwrap_err();
    assert!(matches!(err, LeadError::Webhook(_)));
    assert!(f.store.mark_paid_calls().await.is_empty());
}

#[tokio::test]
async fn missing_lead_id_skips_the_store_update() {
    let f = fixture();
    let payload = checkout_completed_payload(None);
    let signature = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());

    // Still acknowledged; the warning is operational, not an error.
    f.reconciler.handle(&payload, &signature).await.unwrap();
    assert!(f.store.mark_paid_calls().await.is_empty());
    assert_eq!(f.analytics.count("payment_completed").await, 1);
}

#[tokio::test]
async fn payment_intent_succeeded_is_analytics_only() {
    let f = fixture();
    let payload = serde_json::to_vec(&serde_json::json!({
        "id": "evt_test_456",
        "type": "payment_intent.succeeded",
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "pi_test_456",
                "amount": 49900,
                "currency": "eur",
            }
        }
    }))
    .unwrap();
    let signature = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());

    f.reconciler.handle(&payload, &signature).await.unwrap();
    assert_eq!(f.analytics.count("payment_completed").await, 1);
    assert!(f.store.mark_paid_calls().await.is_empty());
}

#[tokio::test]
async fn unknown_event_kinds_are_acknowledged_and_ignored() {
    let f = fixture();
    let payload = serde_json::to_vec(&serde_json::json!({
        "id": "evt_test_789",
        "type": "invoice.paid",
        "created": Utc::now().timestamp(),
        "data": { "object": {} }
    }))
    .unwrap();
    let signature = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());

    f.reconciler.handle(&payload, &signature).await.unwrap();
    assert!(f.store.mark_paid_calls().await.is_empty());
    assert_eq!(f.analytics.count("payment_completed").await, 0);
}
