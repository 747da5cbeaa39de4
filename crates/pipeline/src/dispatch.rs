//! Downstream booking-creation signal
//!
//! After a checkout is captured, the ledger asks the scheduling provider to
//! create the reservation. The provider confirms asynchronously through its
//! own webhook; this call only starts the flow.

use serde_json::json;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

/// A booking-creation request derived from a captured checkout.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    /// Internal id of the freshly captured Payment row.
    pub payment_id: Uuid,
    /// Provider-assigned event type (offering) id.
    pub cal_event_type_id: i64,
    /// Requested session start, RFC 3339.
    pub start_time: String,
    pub attendee_name: String,
    pub attendee_email: String,
    pub attendee_time_zone: String,
    /// Checkout session id, threaded through so the confirmation webhook can
    /// link the booking back to the payment.
    pub checkout_session_id: String,
}

/// HTTP client for the scheduling provider's booking API.
#[derive(Clone)]
pub struct SchedulingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SchedulingClient {
    pub fn from_env() -> PipelineResult<Self> {
        let base_url = std::env::var("CAL_API_URL")
            .unwrap_or_else(|_| "https://api.cal.com/v1".to_string());
        let api_key = std::env::var("CAL_API_KEY")
            .map_err(|_| PipelineError::Config("CAL_API_KEY not set".to_string()))?;

        Ok(Self::new(&base_url, &api_key))
    }

    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Request a reservation for a captured payment.
    ///
    /// Exactly one call per first-time capture; the ledger suppresses this on
    /// duplicate deliveries. A non-2xx response or transport error surfaces
    /// as `DispatchFailed` so the caller can alert - money has already been
    /// captured at this point.
    pub async fn request_booking(&self, req: &BookingRequest) -> PipelineResult<()> {
        let body = json!({
            "eventTypeId": req.cal_event_type_id,
            "start": req.start_time,
            "timeZone": req.attendee_time_zone,
            "language": "en",
            "responses": {
                "name": req.attendee_name,
                "email": req.attendee_email,
            },
            "metadata": {
                "checkoutSessionId": req.checkout_session_id,
                "paymentId": req.payment_id.to_string(),
            },
        });

        let resp = self
            .client
            .post(format!("{}/bookings", self.base_url))
            .query(&[("apiKey", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::DispatchFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::DispatchFailed(format!(
                "scheduling provider returned {}: {}",
                status, text
            )));
        }

        tracing::info!(
            payment_id = %req.payment_id,
            cal_event_type_id = req.cal_event_type_id,
            "Booking creation requested from scheduling provider"
        );
        Ok(())
    }
}
