//! Pipeline invariant checks
//!
//! Runnable consistency checks over the persisted pipeline state. Useful
//! after a webhook replay or an incident. Checks only read, never write.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::PipelineResult;

/// A single detected inconsistency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Rows affected
    pub ids: Vec<Uuid>,
    /// Human-readable description of the violation
    pub description: String,
    /// Severity level
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Money may be in the wrong place
    Critical,
    /// Data inconsistency that needs attention
    High,
    /// Potential issue, should investigate
    Medium,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
        }
    }
}

/// Summary of a full check run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
    pub checks_run: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

/// Read-only consistency checker for the pipeline tables.
#[derive(Clone)]
pub struct InvariantChecker {
    pool: PgPool,
}

impl InvariantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run every check and summarize.
    pub async fn check_all(&self) -> PipelineResult<InvariantCheckSummary> {
        let mut violations = Vec::new();
        let checks_run = 4;

        violations.extend(self.check_bookings_have_contacts().await?);
        violations.extend(self.check_refunded_payments_have_refund_id().await?);
        violations.extend(self.check_refunded_payment_not_accepted_booking().await?);
        violations.extend(self.check_analytics_queue_not_stalled().await?);

        let checks_failed = violations.len().min(checks_run);

        Ok(InvariantCheckSummary {
            checked_at: OffsetDateTime::now_utc(),
            checks_run,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        })
    }

    /// Every booking must have at least one organizer and one attendee row.
    /// A bare booking means the materializer's transaction was somehow split.
    async fn check_bookings_have_contacts(&self) -> PipelineResult<Vec<InvariantViolation>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT b.id FROM bookings b
            WHERE NOT EXISTS (SELECT 1 FROM booking_organizers o WHERE o.booking_id = b.id)
               OR NOT EXISTS (SELECT 1 FROM booking_attendees a WHERE a.booking_id = b.id)
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![InvariantViolation {
            invariant: "bookings_have_contacts".to_string(),
            ids: rows.into_iter().map(|(id,)| id).collect(),
            description: "bookings exist without an organizer or attendee snapshot".to_string(),
            severity: ViolationSeverity::Critical,
        }])
    }

    /// A payment marked refunded must carry the provider's refund id.
    async fn check_refunded_payments_have_refund_id(
        &self,
    ) -> PipelineResult<Vec<InvariantViolation>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM payments WHERE status = 'refunded' AND stripe_refund_id IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![InvariantViolation {
            invariant: "refunded_payments_have_refund_id".to_string(),
            ids: rows.into_iter().map(|(id,)| id).collect(),
            description: "payments marked refunded without a refund id".to_string(),
            severity: ViolationSeverity::High,
        }])
    }

    /// A refund compensates a booking that never happened; an ACCEPTED
    /// booking pointing at a refunded payment means both paths ran.
    async fn check_refunded_payment_not_accepted_booking(
        &self,
    ) -> PipelineResult<Vec<InvariantViolation>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT b.id FROM bookings b
            JOIN payments p ON b.payment_id = p.id
            WHERE p.status = 'refunded' AND b.status = 'ACCEPTED'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![InvariantViolation {
            invariant: "refunded_payment_not_accepted_booking".to_string(),
            ids: rows.into_iter().map(|(id,)| id).collect(),
            description: "accepted bookings reference refunded payments".to_string(),
            severity: ViolationSeverity::Critical,
        }])
    }

    /// Unprocessed analytics events older than a week mean the reducer has
    /// not been running.
    async fn check_analytics_queue_not_stalled(&self) -> PipelineResult<Vec<InvariantViolation>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM analytics_events
            WHERE processed = FALSE AND created_at < NOW() - INTERVAL '7 days'
            LIMIT 100
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![InvariantViolation {
            invariant: "analytics_queue_not_stalled".to_string(),
            ids: rows.into_iter().map(|(id,)| id).collect(),
            description: "unprocessed analytics events older than 7 days".to_string(),
            severity: ViolationSeverity::Medium,
        }])
    }
}
