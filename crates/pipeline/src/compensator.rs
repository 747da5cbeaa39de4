//! Failure compensation
//!
//! When a payment was captured but the paired booking never materialized,
//! the compensator refunds the payment intent (reversing the platform fee
//! and transfer) and notifies the payer. A refund that itself fails is the
//! highest-severity state in the system: funds are captured with neither a
//! booking nor an automatic refund, so an operator escalation is mandatory.

use std::time::Duration;

use sqlx::PgPool;
use stripe::{CreateRefund, Refund};

use crate::client::StripeClient;
use crate::email::PipelineEmailService;
use crate::error::{PipelineError, PipelineResult};

/// Hard ceiling on the synchronous refund call. Retrying after a timeout is
/// safe: refund-by-payment-intent is idempotent on the provider side.
const REFUND_TIMEOUT: Duration = Duration::from_secs(30);

/// How a compensation attempt ended.
#[derive(Debug)]
pub enum CompensationOutcome {
    /// Refund issued and payer notified.
    Refunded { refund_id: String },
    /// Refund issued; the payer notification failed. Cosmetic only - the
    /// money is on its way back.
    RefundedNotificationFailed { refund_id: String },
    /// Refund failed too. An operator escalation has been raised.
    ManualInterventionRequired {
        booking_error: String,
        refund_error: String,
    },
}

/// Compensates captured payments whose booking flow failed.
#[derive(Clone)]
pub struct Compensator {
    stripe: StripeClient,
    pool: PgPool,
    email: PipelineEmailService,
}

impl Compensator {
    pub fn new(stripe: StripeClient, pool: PgPool, email: PipelineEmailService) -> Self {
        Self {
            stripe,
            pool,
            email,
        }
    }

    /// Refund the captured payment behind `payment_intent_id`.
    ///
    /// `booking_error` is the materialization failure that triggered the
    /// compensation; it is carried into the escalation alert when the refund
    /// also fails. The call itself never returns `Err` for the refund-failed
    /// case - that is an outcome, not an error, because the caller must still
    /// acknowledge the webhook after escalation.
    pub async fn compensate(
        &self,
        payment_intent_id: &str,
        booking_error: &str,
    ) -> PipelineResult<CompensationOutcome> {
        let payment = self.load_payment(payment_intent_id).await?;

        match self.issue_refund(payment_intent_id).await {
            Ok(refund_id) => {
                self.mark_refunded(payment_intent_id, &refund_id).await?;

                tracing::info!(
                    payment_intent_id = payment_intent_id,
                    refund_id = %refund_id,
                    booking_error = booking_error,
                    "Compensating refund issued"
                );

                // Best-effort payer notification. Its failure never unwinds
                // the refund.
                let notified = match &payment {
                    Some(p) => {
                        self.email
                            .send_refund_notification(&p.payer_email, p.amount_cents, &p.currency)
                            .await
                    }
                    None => {
                        tracing::warn!(
                            payment_intent_id = payment_intent_id,
                            "No payment row found for refund notification"
                        );
                        false
                    }
                };

                if notified {
                    Ok(CompensationOutcome::Refunded { refund_id })
                } else {
                    Ok(CompensationOutcome::RefundedNotificationFailed { refund_id })
                }
            }
            Err(refund_error) => {
                let refund_error = refund_error.to_string();
                let checkout_session_id = payment
                    .as_ref()
                    .map(|p| p.checkout_session_id.as_str())
                    .unwrap_or("<unknown>");

                // This escalation is the last line of defence; it must never
                // be silent. send_operator_alert logs at error level even if
                // the email itself cannot be delivered.
                self.email
                    .send_operator_alert(
                        "MANUAL INTERVENTION: refund failed after booking failure",
                        &format!(
                            "checkout_session_id={} payment_intent_id={} \
                             booking_error={} refund_error={}",
                            checkout_session_id, payment_intent_id, booking_error, refund_error
                        ),
                    )
                    .await;

                Ok(CompensationOutcome::ManualInterventionRequired {
                    booking_error: booking_error.to_string(),
                    refund_error,
                })
            }
        }
    }

    async fn issue_refund(&self, payment_intent_id: &str) -> PipelineResult<String> {
        let intent_id = payment_intent_id.parse().map_err(|e| {
            PipelineError::RefundFailed {
                payment_intent_id: payment_intent_id.to_string(),
                reason: format!("invalid payment intent id: {}", e),
            }
        })?;

        let mut params = CreateRefund::new();
        params.payment_intent = Some(intent_id);
        // Claw back the platform's cut and reverse the connected-account
        // transfer along with the charge.
        params.refund_application_fee = Some(true);
        params.reverse_transfer = Some(true);

        let refund = tokio::time::timeout(
            REFUND_TIMEOUT,
            Refund::create(self.stripe.inner(), params),
        )
        .await
        .map_err(|_| PipelineError::RefundFailed {
            payment_intent_id: payment_intent_id.to_string(),
            reason: format!("refund call timed out after {:?}", REFUND_TIMEOUT),
        })?
        .map_err(|e| PipelineError::RefundFailed {
            payment_intent_id: payment_intent_id.to_string(),
            reason: e.to_string(),
        })?;

        Ok(refund.id.to_string())
    }

    async fn load_payment(&self, payment_intent_id: &str) -> PipelineResult<Option<PaymentRow>> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            SELECT stripe_checkout_session_id, payer_email, amount_cents, currency
            FROM payments
            WHERE stripe_payment_intent_id = $1
            "#,
        )
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn mark_refunded(&self, payment_intent_id: &str, refund_id: &str) -> PipelineResult<()> {
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

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    #[sqlx(rename = "stripe_checkout_session_id")]
    checkout_session_id: String,
    payer_email: String,
    amount_cents: i64,
    currency: String,
}
