//! Stripe client wrapper

use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};

/// Stripe configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... / sk_test_...)
    pub secret_key: String,
    /// Webhook signing secret (whsec_...)
    pub webhook_secret: String,
}

impl StripeConfig {
    pub fn from_env() -> PipelineResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PipelineError::Config("STRIPE_SECRET_KEY not set".to_string()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PipelineError::Config("STRIPE_WEBHOOK_SECRET not set".to_string()))?;

        Ok(Self {
            secret_key,
            webhook_secret,
        })
    }
}

/// Cheaply cloneable handle around the async-stripe client
#[derive(Clone)]
pub struct StripeClient {
    inner: stripe::Client,
    config: Arc<StripeConfig>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            inner: stripe::Client::new(config.secret_key.clone()),
            config: Arc::new(config),
        }
    }

    pub fn from_env() -> PipelineResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    pub fn inner(&self) -> &stripe::Client {
        &self.inner
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }
}
