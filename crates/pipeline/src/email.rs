//! Email dispatch collaborator
//!
//! Sends payer notifications and operator alerts through the Resend HTTP API.
//! All sends are best-effort: a failure is logged (and reported to the caller
//! so the compensator can downgrade its outcome) but never unwinds a
//! completed database write.

use serde_json::json;

/// Email service for pipeline notifications.
#[derive(Clone)]
pub struct PipelineEmailService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    from_address: String,
    /// Destination for manual-intervention alerts.
    ops_address: String,
}

impl PipelineEmailService {
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: std::env::var("RESEND_API_KEY").unwrap_or_default(),
            base_url: "https://api.resend.com".to_string(),
            from_address: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Mentora <no-reply@mentora.dev>".to_string()),
            ops_address: std::env::var("OPS_ALERT_EMAIL")
                .unwrap_or_else(|_| "ops@mentora.dev".to_string()),
        }
    }

    /// Construct against an explicit endpoint. Used by tests.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            from_address: "Mentora <no-reply@mentora.dev>".to_string(),
            ops_address: "ops@mentora.dev".to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Tell the payer their session payment was refunded.
    pub async fn send_refund_notification(
        &self,
        to: &str,
        amount_cents: i64,
        currency: &str,
    ) -> bool {
        let amount = format!("{:.2} {}", amount_cents as f64 / 100.0, currency.to_uppercase());
        self.send(
            to,
            "Your mentoring session payment was refunded",
            &format!(
                "We could not confirm your mentoring session, so your payment of {} \
                 has been refunded in full. The refund should appear on your statement \
                 within 5-10 business days.",
                amount
            ),
        )
        .await
    }

    /// Escalate a failure that needs a human. Logged at error level whether
    /// or not the send itself succeeds, so the escalation is never silent.
    pub async fn send_operator_alert(&self, subject: &str, detail: &str) -> bool {
        tracing::error!(subject = subject, detail = detail, "Operator alert raised");
        self.send(&self.ops_address, subject, detail).await
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        if !self.is_enabled() {
            tracing::warn!(
                subject = subject,
                "Email not configured (missing RESEND_API_KEY) - skipping send"
            );
            return false;
        }

        let payload = json!({
            "from": self.from_address,
            "to": [to],
            "subject": subject,
            "text": body,
        });

        let result = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(to = to, subject = subject, "Email sent");
                true
            }
            Ok(resp) => {
                tracing::error!(
                    to = to,
                    subject = subject,
                    status = %resp.status(),
                    "Email send rejected by provider"
                );
                false
            }
            Err(e) => {
                tracing::error!(to = to, subject = subject, error = %e, "Email send failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn send_posts_to_emails_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/emails")
            .match_header("authorization", "Bearer re_test")
            .with_status(200)
            .with_body(r#"{"id":"email_1"}"#)
            .create_async()
            .await;

        let svc = PipelineEmailService::with_base_url("re_test", &server.url());
        let ok = svc
            .send_refund_notification("payer@example.com", 5000, "usd")
            .await;

        assert!(ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn send_reports_provider_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/emails")
            .with_status(500)
            .create_async()
            .await;

        let svc = PipelineEmailService::with_base_url("re_test", &server.url());
        let ok = svc.send_operator_alert("alert", "detail").await;

        assert!(!ok);
    }

    #[tokio::test]
    async fn unconfigured_service_skips_send() {
        let svc = PipelineEmailService::with_base_url("", "http://127.0.0.1:1");
        assert!(!svc.is_enabled());
        assert!(!svc.send_operator_alert("alert", "detail").await);
    }
}
