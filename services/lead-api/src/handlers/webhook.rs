//! Stripe webhook handler

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use murshid_types::api::ApiErrorBody;
use murshid_types::WebhookAck;

use crate::state::AppState;

/// POST /api/stripe/webhook
///
/// Handle billing-provider events with signature verification. Soft-fails
/// (200) when payments are flagged off or the webhook secret is missing,
/// so the provider does not endlessly retry a misconfigured endpoint.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();

    if !state.config.payments_enabled {
        tracing::debug!("Payments disabled, acknowledging webhook without processing");
        return (StatusCode::OK, Json(WebhookAck::disabled())).into_response();
    }

    let Some(reconciler) = &state.reconciler else {
        tracing::warn!("Webhook received but no webhook secret is configured");
        return (StatusCode::OK, Json(WebhookAck::misconfigured())).into_response();
    };

    let Some(sig_header) = headers.get("stripe-signature") else {
        tracing::warn!("Missing Stripe-Signature header");
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorBody::new("Missing stripe-signature header")),
        )
            .into_response();
    };
    let Ok(signature) = sig_header.to_str() else {
        tracing::warn!("Invalid Stripe-Signature header encoding");
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorBody::new("Invalid stripe-signature header")),
        )
            .into_response();
    };

    match reconciler.handle(&body, signature).await {
        Ok(()) => {
            metrics::histogram!("lead_operation_duration_seconds", "operation" => "webhook")
                .record(start.elapsed().as_secs_f64());
            (StatusCode::OK, Json(WebhookAck::ok())).into_response()
        }
        Err(e) if e.is_client_error() => {
            tracing::warn!(error = %e, "Webhook rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(ApiErrorBody::new("Webhook verification failed")),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorBody::new("Webhook processing failed")),
            )
                .into_response()
        }
    }
}
