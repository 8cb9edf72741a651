//! Lead submission handler

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use murshid_types::{RawLead, SubmitLeadResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /api/submit-lead
///
/// Validates and records a lead. The response returns as soon as the
/// Lead Store write completes; payment-link creation continues in the
/// background.
pub async fn submit_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<SubmitLeadResponse>> {
    let start = Instant::now();
    let client_key = client_key(&headers);

    // Malformed JSON is a distinct 400, not a validation error list.
    let raw: RawLead = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON body".to_string()))?;

    let outcome = state.leads.submit(raw, &client_key).await?;

    metrics::histogram!("lead_operation_duration_seconds", "operation" => "submit_lead")
        .record(start.elapsed().as_secs_f64());

    let response = if outcome.duplicate {
        SubmitLeadResponse::duplicate()
    } else {
        tracing::info!(lead_id = %outcome.lead_id,
            payment_link_pending = outcome.payment_link_pending, "Lead recorded");
        SubmitLeadResponse::created(outcome.payment_link_pending)
    };

    Ok(Json(response))
}

/// Client key for rate limiting: first hop of `x-forwarded-for`, falling
/// back to a shared bucket when the header is absent.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_key_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_key(&headers), "203.0.113.9");
    }

    #[test]
    fn client_key_defaults_to_shared_bucket() {
        assert_eq!(client_key(&HeaderMap::new()), "unknown");

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));
        assert_eq!(client_key(&headers), "unknown");
    }
}
