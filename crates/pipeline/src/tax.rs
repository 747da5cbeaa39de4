//! Pre-capture amount adjustment
//!
//! The checkout flow computes a tax-inclusive total after the payment intent
//! is created but before capture. This module is that consumed collaborator:
//! it mutates the intent's amount on the provider side and computes the
//! inclusive total.

use stripe::{PaymentIntent, UpdatePaymentIntent};

use crate::client::StripeClient;
use crate::error::{PipelineError, PipelineResult};

/// Tax-inclusive total for a base amount and a rate in basis points.
///
/// Rounded half-up per cent, matching how the checkout flow displays it.
pub fn tax_inclusive_total(amount_cents: i64, tax_rate_bps: i64) -> i64 {
    amount_cents + (amount_cents * tax_rate_bps + 5_000) / 10_000
}

/// Adjusts payment-intent amounts before capture.
#[derive(Clone)]
pub struct AmountAdjustmentService {
    stripe: StripeClient,
}

impl AmountAdjustmentService {
    pub fn new(stripe: StripeClient) -> Self {
        Self { stripe }
    }

    /// Set the intent's amount to the tax-inclusive total.
    ///
    /// Only valid while the intent is still awaiting capture; the provider
    /// rejects amount changes on captured intents, which surfaces as a
    /// Stripe error here.
    pub async fn apply_adjusted_amount(
        &self,
        payment_intent_id: &str,
        total_cents: i64,
    ) -> PipelineResult<()> {
        let intent_id = payment_intent_id.parse().map_err(|e| {
            PipelineError::InvalidPayload(format!("invalid payment intent id: {}", e))
        })?;

        let mut params = UpdatePaymentIntent::new();
        params.amount = Some(total_cents);

        PaymentIntent::update(self.stripe.inner(), &intent_id, params).await?;

        tracing::info!(
            payment_intent_id = payment_intent_id,
            total_cents = total_cents,
            "Payment intent amount adjusted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_total_applies_rate() {
        // 19% VAT on 50.00
        assert_eq!(tax_inclusive_total(5000, 1900), 5950);
    }

    #[test]
    fn inclusive_total_rounds_half_up() {
        // 8.25% of 999 = 82.4175 cents -> 82
        assert_eq!(tax_inclusive_total(999, 825), 999 + 82);
        // 8.25% of 1000 = 82.5 -> 83
        assert_eq!(tax_inclusive_total(1000, 825), 1083);
    }

    #[test]
    fn zero_rate_is_identity() {
        assert_eq!(tax_inclusive_total(5000, 0), 5000);
    }
}
