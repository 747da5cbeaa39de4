//! Pipeline error taxonomy
//!
//! Every stage returns an explicit error kind instead of signalling through
//! panics or sentinel values. The taxonomy mirrors how the webhook callers
//! must respond:
//!
//! - `SignatureInvalid`: reject before any state change (HTTP 400)
//! - `OfferingNotFound` / `BookingNotFound`: rolled back, surfaced non-2xx
//!   so the provider retries on its own backoff
//! - duplicate deliveries are *not* errors; they surface as outcome variants
//!   on the individual operations and map to 2xx
//! - `ManualIntervention`: funds captured with neither booking nor refund,
//!   the highest-severity state in the system

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("webhook signature verification failed")]
    SignatureInvalid,

    #[error("no offering found for external event type {0}")]
    OfferingNotFound(i64),

    #[error("no booking found for uid {0}")]
    BookingNotFound(String),

    #[error("malformed event payload: {0}")]
    InvalidPayload(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("stripe api error: {0}")]
    Stripe(#[from] stripe::StripeError),

    #[error("refund failed for payment intent {payment_intent_id}: {reason}")]
    RefundFailed {
        payment_intent_id: String,
        reason: String,
    },

    #[error("booking dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("manual intervention required: {0}")]
    ManualIntervention(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Database(e.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
