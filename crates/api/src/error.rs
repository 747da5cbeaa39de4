//! HTTP error mapping
//!
//! Translates pipeline errors into webhook-appropriate status codes. The
//! provider's retry policy is the system's only retry mechanism, so the
//! mapping is load-bearing: 2xx acknowledges and stops redelivery, anything
//! else schedules a retry on the provider's backoff.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mentora_pipeline::PipelineError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            // Reject before state change; the provider should not retry a
            // signature it cannot get right.
            PipelineError::SignatureInvalid => StatusCode::BAD_REQUEST,
            PipelineError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            // Ordering problems: non-2xx so the provider retries once the
            // missing row has synced.
            PipelineError::OfferingNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::BookingNotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Database(_)
            | PipelineError::Stripe(_)
            | PipelineError::RefundFailed { .. }
            | PipelineError::DispatchFailed(_)
            | PipelineError::ManualIntervention(_)
            | PipelineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            tracing::warn!(status = %self.status, error = %self.message, "Request rejected");
        }

        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn signature_failures_map_to_400() {
        let err: ApiError = PipelineError::SignatureInvalid.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_offering_maps_to_500_for_provider_retry() {
        let err: ApiError = PipelineError::OfferingNotFound(42).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_booking_maps_to_404() {
        let err: ApiError = PipelineError::BookingNotFound("uid_1".to_string()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_errors_map_to_500() {
        let err: ApiError = PipelineError::Database("connection reset".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
