// Pipeline crate clippy configuration
#![allow(clippy::too_many_arguments)] // Some capture/materialize paths carry many fields
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Mentora Reconciliation Pipeline
//!
//! Turns asynchronous, at-least-once webhook deliveries from the payment
//! processor and the scheduling provider into consistent persisted state.
//!
//! ## Components
//!
//! - **Signature verification**: per-provider HMAC check before any state change
//! - **Payment ledger**: exactly-once checkout capture, downstream booking signal
//! - **Booking materializer**: transactional booking + organizer + attendee writes
//! - **Compensator**: refund-or-escalate when a captured payment's booking fails
//! - **Status machine**: cancellation / completion / no-show transitions by UID
//! - **Ranking reducer**: idempotent analytics-event folding + weekly decay

pub mod client;
pub mod compensator;
pub mod dispatch;
pub mod email;
pub mod error;
pub mod fees;
pub mod invariants;
pub mod ledger;
pub mod materializer;
pub mod ranking;
pub mod scheduling;
pub mod signature;
pub mod status;
pub mod tax;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Client
pub use client::{StripeClient, StripeConfig};

// Compensator
pub use compensator::{CompensationOutcome, Compensator};

// Dispatch
pub use dispatch::{BookingRequest, SchedulingClient};

// Email
pub use email::PipelineEmailService;

// Error
pub use error::{PipelineError, PipelineResult};

// Fees
pub use fees::{FeeSplit, PLATFORM_FEE_PERCENT};

// Invariants
pub use invariants::{InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity};

// Ledger
pub use ledger::{CaptureOutcome, CheckoutCaptured, PaymentLedger};

// Materializer
pub use materializer::{BookingCreated, BookingMaterializer, ContactSnapshot, MaterializeOutcome};

// Ranking
pub use ranking::{RankingReducer, ReducerSummary};

// Scheduling
pub use scheduling::{SchedulingEvent, SchedulingOutcome, SchedulingWebhookHandler};

// Signature
pub use signature::{SignatureScheme, SignatureVerifier};

// Status
pub use status::{BookingStatus, BookingStatusMachine};

// Tax
pub use tax::AmountAdjustmentService;

// Webhooks
pub use webhooks::{StripeOutcome, StripeWebhookHandler};

use sqlx::PgPool;

/// Main pipeline service combining every component.
pub struct PipelineService {
    pub stripe_webhooks: StripeWebhookHandler,
    pub scheduling_webhooks: SchedulingWebhookHandler,
    pub ledger: PaymentLedger,
    pub materializer: BookingMaterializer,
    pub compensator: Compensator,
    pub status: BookingStatusMachine,
    pub ranking: RankingReducer,
    pub adjustment: AmountAdjustmentService,
    pub invariants: InvariantChecker,
    pub email: PipelineEmailService,
    /// Verifier for the scheduling provider's signature header.
    pub scheduling_verifier: SignatureVerifier,
}

impl PipelineService {
    /// Create the pipeline from environment variables.
    pub fn from_env(pool: PgPool) -> PipelineResult<Self> {
        let stripe = StripeClient::from_env()?;
        let scheduling_client = SchedulingClient::from_env()?;
        let cal_webhook_secret = std::env::var("CAL_WEBHOOK_SECRET")
            .map_err(|_| PipelineError::Config("CAL_WEBHOOK_SECRET not set".to_string()))?;
        let email = PipelineEmailService::from_env();

        Ok(Self::new(
            pool,
            stripe,
            scheduling_client,
            &cal_webhook_secret,
            email,
        ))
    }

    pub fn new(
        pool: PgPool,
        stripe: StripeClient,
        scheduling_client: SchedulingClient,
        cal_webhook_secret: &str,
        email: PipelineEmailService,
    ) -> Self {
        let ledger = PaymentLedger::new(pool.clone(), scheduling_client, email.clone());
        let materializer = BookingMaterializer::new(pool.clone());
        let status = BookingStatusMachine::new(pool.clone());

        Self {
            stripe_webhooks: StripeWebhookHandler::new(
                &stripe.config().webhook_secret,
                ledger.clone(),
            ),
            scheduling_webhooks: SchedulingWebhookHandler::new(
                materializer.clone(),
                status.clone(),
            ),
            ledger,
            materializer,
            compensator: Compensator::new(stripe.clone(), pool.clone(), email.clone()),
            status,
            ranking: RankingReducer::new(pool.clone()),
            adjustment: AmountAdjustmentService::new(stripe),
            invariants: InvariantChecker::new(pool),
            email,
            scheduling_verifier: SignatureVerifier::new(
                cal_webhook_secret,
                SignatureScheme::PlainHex,
            ),
        }
    }
}
