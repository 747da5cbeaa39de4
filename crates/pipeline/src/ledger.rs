//! Payment ledger
//!
//! Captures a successful checkout as a Payment row exactly once and fires the
//! downstream booking-creation signal on first capture only. The UNIQUE
//! constraint on the checkout session id is the idempotency boundary; a
//! suppressed insert (zero rows) means a duplicate delivery and skips the
//! signal entirely.

use sqlx::PgPool;
use uuid::Uuid;

use crate::dispatch::{BookingRequest, SchedulingClient};
use crate::email::PipelineEmailService;
use crate::error::PipelineResult;

/// A verified "checkout completed" event, already reduced to the fields the
/// ledger persists. Built by the webhook handler from the provider payload
/// plus caller-supplied metadata.
#[derive(Debug, Clone)]
pub struct CheckoutCaptured {
    pub checkout_session_id: String,
    pub payment_intent_id: String,
    pub payer_email: String,
    pub payer_name: Option<String>,
    pub mentor_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub platform_fee_cents: i64,
    pub mentor_payout_cents: i64,
    /// Offering the payer selected, as known to the scheduling provider.
    pub cal_event_type_id: i64,
    /// Requested session start, RFC 3339.
    pub start_time: String,
    pub attendee_time_zone: String,
}

/// Outcome of a capture attempt.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// First delivery: Payment written, booking signal dispatched.
    Captured { payment_id: Uuid },
    /// Redelivery: the row already existed, no signal fired.
    Duplicate,
    /// Payment written but the booking signal could not be dispatched.
    /// An operator alert has been raised; the caller should return non-2xx
    /// knowing the retry will land in `Duplicate` and not re-signal.
    CapturedSignalFailed { payment_id: Uuid, error: String },
}

/// Idempotent payment capture service.
#[derive(Clone)]
pub struct PaymentLedger {
    pool: PgPool,
    scheduling: SchedulingClient,
    email: PipelineEmailService,
}

impl PaymentLedger {
    pub fn new(pool: PgPool, scheduling: SchedulingClient, email: PipelineEmailService) -> Self {
        Self {
            pool,
            scheduling,
            email,
        }
    }

    /// Record a checkout and, on first capture, request the paired booking.
    pub async fn capture(&self, event: CheckoutCaptured) -> PipelineResult<CaptureOutcome> {
        // ON CONFLICT DO NOTHING + RETURNING id: Some(id) means we own this
        // capture, None means a concurrent or earlier delivery already did.
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO payments (
                stripe_checkout_session_id,
                stripe_payment_intent_id,
                payer_email,
                payer_name,
                mentor_id,
                amount_cents,
                currency,
                platform_fee_cents,
                mentor_payout_cents,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'captured')
            ON CONFLICT (stripe_checkout_session_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&event.checkout_session_id)
        .bind(&event.payment_intent_id)
        .bind(&event.payer_email)
        .bind(&event.payer_name)
        .bind(event.mentor_id)
        .bind(event.amount_cents)
        .bind(&event.currency)
        .bind(event.platform_fee_cents)
        .bind(event.mentor_payout_cents)
        .fetch_optional(&self.pool)
        .await?;

        let Some((payment_id,)) = inserted else {
            tracing::info!(
                checkout_session_id = %event.checkout_session_id,
                "Duplicate checkout delivery - payment already captured, signal suppressed"
            );
            return Ok(CaptureOutcome::Duplicate);
        };

        tracing::info!(
            payment_id = %payment_id,
            checkout_session_id = %event.checkout_session_id,
            amount_cents = event.amount_cents,
            "Payment captured"
        );

        let request = BookingRequest {
            payment_id,
            cal_event_type_id: event.cal_event_type_id,
            start_time: event.start_time.clone(),
            attendee_name: event
                .payer_name
                .clone()
                .unwrap_or_else(|| event.payer_email.clone()),
            attendee_email: event.payer_email.clone(),
            attendee_time_zone: event.attendee_time_zone.clone(),
            checkout_session_id: event.checkout_session_id.clone(),
        };

        match self.scheduling.request_booking(&request).await {
            Ok(()) => Ok(CaptureOutcome::Captured { payment_id }),
            Err(e) => {
                // Money is captured but the booking flow never started. This
                // must not be dropped: alert an operator and tell the caller.
                let error = e.to_string();
                self.email
                    .send_operator_alert(
                        "Booking dispatch failed after payment capture",
                        &format!(
                            "checkout_session_id={} payment_id={} error={}",
                            event.checkout_session_id, payment_id, error
                        ),
                    )
                    .await;

                tracing::error!(
                    payment_id = %payment_id,
                    checkout_session_id = %event.checkout_session_id,
                    error = %error,
                    "Booking signal dispatch failed after capture"
                );

                Ok(CaptureOutcome::CapturedSignalFailed { payment_id, error })
            }
        }
    }

    /// Attach a compensating refund id to an existing Payment.
    pub async fn record_refund(
        &self,
        payment_intent_id: &str,
        refund_id: &str,
    ) -> PipelineResult<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET stripe_refund_id = $2, status = 'refunded'
            WHERE stripe_payment_intent_id = $1
            "#,
        )
        .bind(payment_intent_id)
        .bind(refund_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
