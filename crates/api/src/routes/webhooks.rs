//! Webhook ingress
//!
//! Both providers deliver at-least-once with no ordering guarantees. The
//! handlers verify the signature on the raw body before anything else, then
//! hand the event to the pipeline and translate its outcome into the status
//! code the provider's retry policy expects: 2xx only on full success.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use mentora_pipeline::{CaptureOutcome, SchedulingEvent, SchedulingOutcome, StripeOutcome};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
const SCHEDULING_SIGNATURE_HEADER: &str = "x-cal-signature-256";

fn signature_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request(format!("missing {} header", name)))
}

/// Payments provider ingress.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let signature = signature_header(&headers, STRIPE_SIGNATURE_HEADER)?;

    let event = state
        .pipeline
        .stripe_webhooks
        .verify_event(&body, signature)?;

    let outcome = state.pipeline.stripe_webhooks.handle_event(event).await?;

    match outcome {
        StripeOutcome::Capture(CaptureOutcome::Captured { payment_id }) => {
            Ok(Json(json!({ "received": true, "paymentId": payment_id })))
        }
        StripeOutcome::Capture(CaptureOutcome::Duplicate) => {
            Ok(Json(json!({ "received": true, "duplicate": true })))
        }
        StripeOutcome::Capture(CaptureOutcome::CapturedSignalFailed { payment_id, error }) => {
            // Payment is in the ledger but the booking flow never started;
            // an operator alert is already on its way. Non-2xx is still
            // correct: the retry will land on the duplicate path without
            // re-signaling.
            Err(ApiError::internal(format!(
                "payment {} captured but booking dispatch failed: {}",
                payment_id, error
            )))
        }
        StripeOutcome::Ignored { event_type } => {
            Ok(Json(json!({ "received": true, "ignored": event_type })))
        }
    }
}

/// Scheduling provider ingress.
pub async fn scheduling_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let signature = signature_header(&headers, SCHEDULING_SIGNATURE_HEADER)?;
    state.pipeline.scheduling_verifier.verify(&body, signature)?;

    let event = SchedulingEvent::parse(&body)?;
    let trigger = event.trigger_event.clone();

    let outcome = state.pipeline.scheduling_webhooks.handle(event).await?;

    let response = match outcome {
        SchedulingOutcome::Materialized(m) => match m {
            mentora_pipeline::MaterializeOutcome::Created { booking_id } => {
                json!({ "message": "booking created", "bookingId": booking_id })
            }
            mentora_pipeline::MaterializeOutcome::Duplicate => {
                json!({ "message": "booking already exists" })
            }
        },
        SchedulingOutcome::Cancelled => json!({ "message": "booking cancelled" }),
        SchedulingOutcome::Completed => json!({ "message": "booking completed" }),
        SchedulingOutcome::NoShowUpdated => json!({ "message": "no-show flags updated" }),
        SchedulingOutcome::Ignored { trigger } => {
            json!({ "message": "event ignored", "triggerEvent": trigger })
        }
    };

    tracing::info!(trigger_event = %trigger, "Scheduling webhook handled");
    Ok(Json(response))
}
