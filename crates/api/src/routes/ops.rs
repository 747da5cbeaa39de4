//! Internal operations endpoints
//!
//! Called by the checkout workflow runner (compensation) and by operators
//! (invariant checks). Protected by a shared bearer token compared in
//! constant time; these endpoints are not exposed publicly.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use mentora_pipeline::CompensationOutcome;
use serde::Deserialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

pub(crate) fn check_internal_token(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(ApiError::unauthorized)?;

    let matches = presented.len() == expected.len()
        && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()));

    if matches {
        Ok(())
    } else {
        Err(ApiError::unauthorized())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensateRequest {
    pub payment_intent_id: String,
    /// Why the booking flow failed, for the escalation trail.
    pub booking_error: String,
}

/// Refund a captured payment whose booking never materialized.
pub async fn compensate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CompensateRequest>,
) -> Result<Json<Value>, ApiError> {
    check_internal_token(&headers, &state.config.internal_api_token)?;

    let outcome = state
        .pipeline
        .compensator
        .compensate(&req.payment_intent_id, &req.booking_error)
        .await?;

    let body = match outcome {
        CompensationOutcome::Refunded { refund_id } => {
            json!({ "result": "refunded", "refundId": refund_id })
        }
        CompensationOutcome::RefundedNotificationFailed { refund_id } => {
            json!({ "result": "refunded_notification_failed", "refundId": refund_id })
        }
        CompensationOutcome::ManualInterventionRequired {
            booking_error,
            refund_error,
        } => {
            json!({
                "result": "manual_intervention_required",
                "bookingError": booking_error,
                "refundError": refund_error,
            })
        }
    };

    Ok(Json(body))
}

/// Run the read-only consistency checks.
pub async fn check_invariants(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    check_internal_token(&headers, &state.config.internal_api_token)?;

    let summary = state.pipeline.invariants.check_all().await?;
    Ok(Json(serde_json::to_value(&summary).map_err(|e| {
        ApiError::internal(format!("failed to serialize summary: {}", e))
    })?))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_matching_token() {
        assert!(check_internal_token(&headers_with("tok_1"), "tok_1").is_ok());
    }

    #[test]
    fn rejects_wrong_token() {
        assert!(check_internal_token(&headers_with("tok_2"), "tok_1").is_err());
    }

    #[test]
    fn rejects_missing_header() {
        assert!(check_internal_token(&HeaderMap::new(), "tok_1").is_err());
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic tok_1"));
        assert!(check_internal_token(&headers, "tok_1").is_err());
    }
}
