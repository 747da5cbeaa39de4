//! Payments provider webhook handling
//!
//! Verifies and routes Stripe events. The only event that mutates state is
//! `checkout.session.completed`, which feeds the payment ledger; everything
//! else is logged and acknowledged.

use std::collections::HashMap;

use stripe::{Event, EventObject, EventType};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::fees;
use crate::ledger::{CaptureOutcome, CheckoutCaptured, PaymentLedger};
use crate::signature::{SignatureScheme, SignatureVerifier};

/// Checkout metadata our checkout flow attaches to every session.
///
/// The payment provider round-trips it verbatim; it carries everything the
/// ledger needs that is not part of the provider's own session object.
#[derive(Debug, Clone)]
pub struct CheckoutMetadata {
    pub mentor_id: Uuid,
    pub cal_event_type_id: i64,
    /// Requested session start, RFC 3339, forwarded to the scheduling call.
    pub start_time: String,
    pub attendee_time_zone: String,
    pub platform_fee_cents: Option<i64>,
    pub mentor_payout_cents: Option<i64>,
}

/// Parse the session metadata map. Missing or malformed required keys are an
/// `InvalidPayload` - the provider will retry, and if the metadata really is
/// broken the delivery needs investigation, not silent acceptance.
pub fn parse_checkout_metadata(
    metadata: &HashMap<String, String>,
) -> PipelineResult<CheckoutMetadata> {
    let mentor_id = metadata
        .get("mentorId")
        .ok_or_else(|| PipelineError::InvalidPayload("missing mentorId metadata".to_string()))?
        .parse::<Uuid>()
        .map_err(|e| PipelineError::InvalidPayload(format!("bad mentorId: {}", e)))?;

    let cal_event_type_id = metadata
        .get("calEventTypeId")
        .ok_or_else(|| {
            PipelineError::InvalidPayload("missing calEventTypeId metadata".to_string())
        })?
        .parse::<i64>()
        .map_err(|e| PipelineError::InvalidPayload(format!("bad calEventTypeId: {}", e)))?;

    let start_time = metadata
        .get("startTime")
        .ok_or_else(|| PipelineError::InvalidPayload("missing startTime metadata".to_string()))?
        .clone();

    let attendee_time_zone = metadata
        .get("timeZone")
        .cloned()
        .unwrap_or_else(|| "UTC".to_string());

    let platform_fee_cents = metadata
        .get("platformFeeCents")
        .and_then(|v| v.parse::<i64>().ok());
    let mentor_payout_cents = metadata
        .get("mentorPayoutCents")
        .and_then(|v| v.parse::<i64>().ok());

    Ok(CheckoutMetadata {
        mentor_id,
        cal_event_type_id,
        start_time,
        attendee_time_zone,
        platform_fee_cents,
        mentor_payout_cents,
    })
}

/// A session field the ledger cannot proceed without. Missing means the
/// delivery needs investigation, not a zero-filled Payment row.
fn required_field<T>(value: Option<T>, name: &str) -> PipelineResult<T> {
    value.ok_or_else(|| PipelineError::InvalidPayload(format!("session has no {}", name)))
}

/// What handling a payments event did.
#[derive(Debug)]
pub enum StripeOutcome {
    Capture(CaptureOutcome),
    /// Event type we have no handler for; acknowledged.
    Ignored { event_type: String },
}

/// Webhook handler for payments provider events.
#[derive(Clone)]
pub struct StripeWebhookHandler {
    verifier: SignatureVerifier,
    ledger: PaymentLedger,
}

impl StripeWebhookHandler {
    pub fn new(webhook_secret: &str, ledger: PaymentLedger) -> Self {
        Self {
            verifier: SignatureVerifier::new(webhook_secret, SignatureScheme::TimestampedV1),
            ledger,
        }
    }

    /// Verify the signature header and parse the event.
    ///
    /// Verification happens on the raw body before any parsing, and the
    /// event JSON is deserialized directly; the provider ships API versions
    /// faster than SDK event parsing keeps up, and unknown fields must not
    /// reject an authentic delivery.
    pub fn verify_event(&self, payload: &str, signature: &str) -> PipelineResult<Event> {
        self.verifier.verify(payload, signature)?;

        serde_json::from_str(payload).map_err(|e| {
            tracing::error!(parse_error = %e, "Failed to parse verified webhook event");
            PipelineError::InvalidPayload(format!("bad event json: {}", e))
        })
    }

    /// Route a verified event.
    pub async fn handle_event(&self, event: Event) -> PipelineResult<StripeOutcome> {
        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                let outcome = self.handle_checkout_completed(event).await?;
                Ok(StripeOutcome::Capture(outcome))
            }
            _ => {
                tracing::info!(
                    event_type = %event.type_,
                    event_id = %event.id,
                    "Unhandled payments event type - acknowledged"
                );
                Ok(StripeOutcome::Ignored {
                    event_type: event.type_.to_string(),
                })
            }
        }
    }

    async fn handle_checkout_completed(&self, event: Event) -> PipelineResult<CaptureOutcome> {
        let EventObject::CheckoutSession(session) = event.data.object else {
            return Err(PipelineError::InvalidPayload(
                "checkout.session.completed without a session object".to_string(),
            ));
        };

        let payment_intent_id = required_field(
            session.payment_intent.as_ref().map(|pi| match pi {
                stripe::Expandable::Id(id) => id.to_string(),
                stripe::Expandable::Object(obj) => obj.id.to_string(),
            }),
            "payment intent",
        )?;

        let payer_email = required_field(
            session
                .customer_details
                .as_ref()
                .and_then(|d| d.email.clone()),
            "customer email",
        )?;
        let payer_name = session.customer_details.as_ref().and_then(|d| d.name.clone());

        let amount_cents = required_field(session.amount_total, "amount total")?;
        let currency = session
            .currency
            .map(|c| c.to_string())
            .unwrap_or_else(|| "usd".to_string());

        let metadata = session.metadata.unwrap_or_default();
        let meta = parse_checkout_metadata(&metadata)?;

        // The checkout flow precomputes the split; fall back to the standard
        // split when the metadata predates that.
        let (platform_fee_cents, mentor_payout_cents) =
            match (meta.platform_fee_cents, meta.mentor_payout_cents) {
                (Some(fee), Some(payout)) => (fee, payout),
                _ => {
                    let s = fees::split(amount_cents);
                    (s.platform_fee_cents, s.mentor_payout_cents)
                }
            };

        self.ledger
            .capture(CheckoutCaptured {
                checkout_session_id: session.id.to_string(),
                payment_intent_id,
                payer_email,
                payer_name,
                mentor_id: meta.mentor_id,
                amount_cents,
                currency,
                platform_fee_cents,
                mentor_payout_cents,
                cal_event_type_id: meta.cal_event_type_id,
                start_time: meta.start_time,
                attendee_time_zone: meta.attendee_time_zone,
            })
            .await
    }
}
