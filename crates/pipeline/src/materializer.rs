//! Booking materialization
//!
//! Turns a confirmed-reservation event from the scheduling provider into a
//! Booking plus its organizer and attendee snapshots, in one transaction.
//! The UNIQUE constraint on the provider's booking UID makes the insert
//! idempotent under redelivery: a conflict is a successful no-op.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

/// Contact snapshot taken at booking time.
#[derive(Debug, Clone)]
pub struct ContactSnapshot {
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub time_zone: String,
}

/// A verified "booking created" event, reduced to the fields we persist.
#[derive(Debug, Clone)]
pub struct BookingCreated {
    pub cal_booking_id: i64,
    pub cal_booking_uid: String,
    pub title: String,
    pub start_time: OffsetDateTime,
    pub end_time: OffsetDateTime,
    /// Offering id as assigned by the scheduling provider.
    pub cal_event_type_id: i64,
    pub organizer: ContactSnapshot,
    pub attendee: ContactSnapshot,
    /// Checkout session this booking pays for, if the provider echoed our
    /// metadata back.
    pub checkout_session_id: Option<String>,
    pub meeting_url: Option<String>,
}

/// Outcome of a materialization attempt.
#[derive(Debug)]
pub enum MaterializeOutcome {
    /// Booking, organizer and attendee rows written.
    Created { booking_id: Uuid },
    /// Redelivery: a booking with this UID already exists. Nothing written.
    Duplicate,
}

/// Transactional booking writer.
#[derive(Clone)]
pub struct BookingMaterializer {
    pool: PgPool,
}

impl BookingMaterializer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Materialize a confirmed reservation.
    ///
    /// All three inserts share one transaction: either the booking exists
    /// with exactly one organizer and one attendee afterwards, or nothing
    /// was written at all. An unresolvable offering rolls everything back
    /// and surfaces `OfferingNotFound` so the provider retries - the
    /// offering may simply not have synced yet.
    pub async fn materialize(&self, event: BookingCreated) -> PipelineResult<MaterializeOutcome> {
        let mut tx = self.pool.begin().await?;

        // 1. Resolve the offering. Failure here aborts before any write.
        let offering: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM mentor_event_types WHERE cal_event_type_id = $1")
                .bind(event.cal_event_type_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((event_type_id,)) = offering else {
            tx.rollback().await?;
            return Err(PipelineError::OfferingNotFound(event.cal_event_type_id));
        };

        // 2. Resolve the paired payment, when the provider echoed our
        //    checkout metadata. A missing payment is not an error: the
        //    booking may have been made without going through checkout.
        let payment_id: Option<Uuid> = match &event.checkout_session_id {
            Some(session_id) => {
                let row: Option<(Uuid,)> =
                    sqlx::query_as("SELECT id FROM payments WHERE stripe_checkout_session_id = $1")
                        .bind(session_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                row.map(|(id,)| id)
            }
            None => None,
        };

        // 3. Insert the booking. A UID conflict means redelivery; commit
        //    nothing and report success.
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO bookings (
                cal_booking_id,
                cal_booking_uid,
                title,
                start_time,
                end_time,
                status,
                event_type_id,
                payment_id,
                meeting_url
            )
            VALUES ($1, $2, $3, $4, $5, 'ACCEPTED', $6, $7, $8)
            ON CONFLICT (cal_booking_uid) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(event.cal_booking_id)
        .bind(&event.cal_booking_uid)
        .bind(&event.title)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event_type_id)
        .bind(payment_id)
        .bind(&event.meeting_url)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((booking_id,)) = inserted else {
            tx.rollback().await?;
            tracing::info!(
                uid = %event.cal_booking_uid,
                "Duplicate booking delivery - already materialized"
            );
            return Ok(MaterializeOutcome::Duplicate);
        };

        // 4. Organizer and attendee snapshots, tied to the new booking.
        sqlx::query(
            r#"
            INSERT INTO booking_organizers (booking_id, name, email, username, time_zone)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(booking_id)
        .bind(&event.organizer.name)
        .bind(&event.organizer.email)
        .bind(&event.organizer.username)
        .bind(&event.organizer.time_zone)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO booking_attendees (booking_id, name, email, time_zone)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(booking_id)
        .bind(&event.attendee.name)
        .bind(&event.attendee.email)
        .bind(&event.attendee.time_zone)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            booking_id = %booking_id,
            uid = %event.cal_booking_uid,
            cal_event_type_id = event.cal_event_type_id,
            payment_linked = payment_id.is_some(),
            "Booking materialized"
        );

        Ok(MaterializeOutcome::Created { booking_id })
    }
}
