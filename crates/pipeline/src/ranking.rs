//! Mentor ranking reducer
//!
//! Folds unprocessed analytics events into per-mentor score deltas and
//! applies them as additive SQL updates - the score column is never
//! read-modified-written in application code. Each run claims its batch
//! inside the transaction (processed flip with SKIP LOCKED) and weighs only
//! the rows the claim returned, so overlapping runs take disjoint event
//! sets, a crash mid-run rolls the claim back, and events arriving mid-run
//! wait for the next invocation.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PipelineResult;

/// Fixed event weights.
pub const PROFILE_VIEW_WEIGHT: f64 = 0.3;
pub const BOOKING_COMPLETED_WEIGHT: f64 = 10.0;
pub const BOOKING_CANCELLED_WEIGHT: f64 = -5.0;

/// Weekly multiplicative decay: every score keeps 95% of its value.
pub const DECAY_FACTOR: f64 = 0.95;

/// Analytics event kinds the reducer knows how to weigh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsEventType {
    ProfileView,
    BookingCompleted,
    BookingCancelled,
}

impl AnalyticsEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsEventType::ProfileView => "profile_view",
            AnalyticsEventType::BookingCompleted => "booking_completed",
            AnalyticsEventType::BookingCancelled => "booking_cancelled",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            AnalyticsEventType::ProfileView => PROFILE_VIEW_WEIGHT,
            AnalyticsEventType::BookingCompleted => BOOKING_COMPLETED_WEIGHT,
            AnalyticsEventType::BookingCancelled => BOOKING_CANCELLED_WEIGHT,
        }
    }
}

/// Weight for a stored event type string. Unknown types weigh zero but are
/// still consumed, so a producer shipping a new event type ahead of us does
/// not wedge the queue.
pub fn weight_for(event_type: &str) -> f64 {
    match event_type {
        "profile_view" => PROFILE_VIEW_WEIGHT,
        "booking_completed" => BOOKING_COMPLETED_WEIGHT,
        "booking_cancelled" => BOOKING_CANCELLED_WEIGHT,
        other => {
            tracing::debug!(event_type = other, "Unknown analytics event type, weight 0");
            0.0
        }
    }
}

/// One unprocessed analytics fact.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnprocessedEvent {
    pub id: Uuid,
    pub event_type: String,
    pub mentor_id: Uuid,
}

/// What a reducer run did.
#[derive(Debug, Default)]
pub struct ReducerSummary {
    pub events_consumed: usize,
    pub mentors_updated: usize,
}

/// Fold events into per-mentor deltas. Pure; exercised directly by tests.
pub fn compute_deltas(events: &[UnprocessedEvent]) -> HashMap<Uuid, f64> {
    let mut deltas: HashMap<Uuid, f64> = HashMap::new();
    for event in events {
        *deltas.entry(event.mentor_id).or_insert(0.0) += weight_for(&event.event_type);
    }
    deltas
}

/// Scheduled score reducer.
#[derive(Clone)]
pub struct RankingReducer {
    pool: PgPool,
}

impl RankingReducer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Consume every currently-unprocessed event and fold it into the
    /// mentors' scores. Safe to trigger concurrently or repeatedly: the
    /// claim below hands each run a disjoint batch, and a run that claims
    /// nothing does nothing.
    pub async fn run(&self) -> PipelineResult<ReducerSummary> {
        let mut tx = self.pool.begin().await?;

        // Claim the batch before weighing anything. SKIP LOCKED keeps a
        // concurrent run from waiting on these rows and re-applying the
        // same deltas after this transaction commits; only the rows the
        // claim returns are folded into scores.
        let events: Vec<UnprocessedEvent> = sqlx::query_as(
            r#"
            UPDATE analytics_events
            SET processed = TRUE
            WHERE id IN (
                SELECT id FROM analytics_events
                WHERE processed = FALSE
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, event_type, mentor_id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        if events.is_empty() {
            tx.rollback().await?;
            return Ok(ReducerSummary::default());
        }

        let deltas = compute_deltas(&events);

        let mut mentors_updated = 0usize;
        for (mentor_id, delta) in &deltas {
            if *delta == 0.0 {
                continue;
            }
            let result = sqlx::query(
                "UPDATE mentor_profiles SET ranking_score = ranking_score + $1 WHERE id = $2",
            )
            .bind(delta)
            .bind(mentor_id)
            .execute(&mut *tx)
            .await?;
            mentors_updated += result.rows_affected() as usize;
        }

        tx.commit().await?;

        tracing::info!(
            events_consumed = events.len(),
            mentors_updated = mentors_updated,
            "Ranking reducer run complete"
        );

        Ok(ReducerSummary {
            events_consumed: events.len(),
            mentors_updated,
        })
    }

    /// Multiply every mentor's score by the decay factor.
    ///
    /// Independent of the reducer: it never consults the events table, and
    /// running it an extra time is just a slightly larger decay.
    pub async fn decay(&self) -> PipelineResult<u64> {
        let result = sqlx::query("UPDATE mentor_profiles SET ranking_score = ranking_score * $1")
            .bind(DECAY_FACTOR)
            .execute(&self.pool)
            .await?;

        tracing::info!(
            mentors = result.rows_affected(),
            factor = DECAY_FACTOR,
            "Ranking decay applied"
        );

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str, mentor_id: Uuid) -> UnprocessedEvent {
        UnprocessedEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            mentor_id,
        }
    }

    #[test]
    fn deltas_sum_per_mentor() {
        let mentor = Uuid::new_v4();
        let events = vec![
            event("profile_view", mentor),
            event("profile_view", mentor),
            event("profile_view", mentor),
            event("booking_completed", mentor),
        ];

        let deltas = compute_deltas(&events);
        assert_eq!(deltas.len(), 1);
        // 3 * 0.3 + 10 = 10.9
        assert!((deltas[&mentor] - 10.9).abs() < 1e-9);
    }

    #[test]
    fn deltas_are_isolated_between_mentors() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let events = vec![
            event("booking_completed", a),
            event("booking_cancelled", b),
        ];

        let deltas = compute_deltas(&events);
        assert!((deltas[&a] - 10.0).abs() < 1e-9);
        assert!((deltas[&b] + 5.0).abs() < 1e-9);
    }

    #[test]
    fn cancelled_bookings_subtract() {
        let mentor = Uuid::new_v4();
        let events = vec![
            event("booking_completed", mentor),
            event("booking_cancelled", mentor),
            event("booking_cancelled", mentor),
        ];

        let deltas = compute_deltas(&events);
        assert!((deltas[&mentor] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_event_types_weigh_zero() {
        let mentor = Uuid::new_v4();
        let events = vec![event("mystery_event", mentor), event("profile_view", mentor)];

        let deltas = compute_deltas(&events);
        assert!((deltas[&mentor] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn empty_input_yields_no_deltas() {
        assert!(compute_deltas(&[]).is_empty());
    }

    #[test]
    fn disjoint_claimed_batches_sum_to_a_single_run() {
        // Concurrent runs each fold only the rows their claim returned, so
        // two runs over disjoint halves must total exactly one run over the
        // whole set - never twice it.
        let mentor = Uuid::new_v4();
        let all = vec![
            event("profile_view", mentor),
            event("profile_view", mentor),
            event("booking_completed", mentor),
            event("booking_cancelled", mentor),
        ];
        let (first, second) = all.split_at(2);

        let split_total = compute_deltas(first)[&mentor] + compute_deltas(second)[&mentor];
        let single_run = compute_deltas(&all)[&mentor];

        assert!((split_total - single_run).abs() < 1e-9);
        assert!((split_total - 5.6).abs() < 1e-9);
    }

    #[test]
    fn decay_factor_compounds() {
        // 100 -> 95 -> 90.25 over two applications
        let once = 100.0 * DECAY_FACTOR;
        let twice = once * DECAY_FACTOR;
        assert!((once - 95.0).abs() < 1e-9);
        assert!((twice - 90.25).abs() < 1e-9);
    }

    #[test]
    fn typed_weights_match_string_weights() {
        for t in [
            AnalyticsEventType::ProfileView,
            AnalyticsEventType::BookingCompleted,
            AnalyticsEventType::BookingCancelled,
        ] {
            assert_eq!(t.weight(), weight_for(t.as_str()));
        }
    }
}
