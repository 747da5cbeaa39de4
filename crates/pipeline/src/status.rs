//! Booking lifecycle transitions
//!
//! Later lifecycle events (cancellation, completion, no-show) arrive keyed by
//! the scheduling provider's booking UID, never our internal id. Zero rows
//! affected means the booking does not exist yet - reported as NotFound, not
//! retried here, since it usually indicates out-of-order delivery.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{PipelineError, PipelineResult};

/// Lifecycle states of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Accepted => "ACCEPTED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::NoShow => "NO_SHOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "ACCEPTED" => Some(BookingStatus::Accepted),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "COMPLETED" => Some(BookingStatus::Completed),
            "NO_SHOW" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }
}

/// Applies lifecycle transitions to existing bookings.
#[derive(Clone)]
pub struct BookingStatusMachine {
    pool: PgPool,
}

impl BookingStatusMachine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Mark a booking cancelled, recording the provider-supplied reason.
    pub async fn cancel(&self, uid: &str, reason: Option<&str>) -> PipelineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'CANCELLED',
                cancellation_reason = COALESCE($2, cancellation_reason)
            WHERE cal_booking_uid = $1
            "#,
        )
        .bind(uid)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::BookingNotFound(uid.to_string()));
        }

        tracing::info!(uid = uid, "Booking cancelled");
        Ok(())
    }

    /// Set a booking's status and/or its no-show flags.
    ///
    /// Each flag is independent: passing `None` leaves the stored value
    /// untouched, so a no-show flag can change without a status transition
    /// and vice versa.
    pub async fn update_status(
        &self,
        uid: &str,
        status: Option<BookingStatus>,
        host_no_show: Option<bool>,
        attendee_no_show: Option<bool>,
    ) -> PipelineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = COALESCE($2, status),
                host_no_show = COALESCE($3, host_no_show),
                attendee_no_show = COALESCE($4, attendee_no_show)
            WHERE cal_booking_uid = $1
            "#,
        )
        .bind(uid)
        .bind(status.map(|s| s.as_str()))
        .bind(host_no_show)
        .bind(attendee_no_show)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::BookingNotFound(uid.to_string()));
        }

        tracing::info!(
            uid = uid,
            status = ?status.map(|s| s.as_str()),
            host_no_show = ?host_no_show,
            attendee_no_show = ?attendee_no_show,
            "Booking status updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Accepted,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
            BookingStatus::NoShow,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_status_string_is_rejected() {
        assert_eq!(BookingStatus::parse("REJECTED"), None);
        assert_eq!(BookingStatus::parse("accepted"), None);
    }

    #[test]
    fn status_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&BookingStatus::NoShow).unwrap();
        assert_eq!(json, "\"NO_SHOW\"");
        let parsed: BookingStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(parsed, BookingStatus::Cancelled);
    }
}
