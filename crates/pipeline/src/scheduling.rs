//! Scheduling provider webhook events
//!
//! The provider delivers a discriminated envelope:
//! `{ "triggerEvent": "...", "createdAt": "...", "payload": { ... } }`
//! where the payload shape varies by trigger. Unknown triggers are
//! acknowledged and ignored so new provider event types cannot break us.

use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::{PipelineError, PipelineResult};
use crate::materializer::{
    BookingCreated, BookingMaterializer, ContactSnapshot, MaterializeOutcome,
};
use crate::status::{BookingStatus, BookingStatusMachine};

/// Trigger names we act on.
pub const TRIGGER_BOOKING_CREATED: &str = "BOOKING_CREATED";
pub const TRIGGER_BOOKING_CANCELLED: &str = "BOOKING_CANCELLED";
pub const TRIGGER_MEETING_ENDED: &str = "MEETING_ENDED";
pub const TRIGGER_NO_SHOW_UPDATED: &str = "BOOKING_NO_SHOW_UPDATED";

/// The outer envelope, common to every trigger.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingEvent {
    pub trigger_event: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub payload: serde_json::Value,
}

impl SchedulingEvent {
    pub fn parse(body: &str) -> PipelineResult<Self> {
        serde_json::from_str(body)
            .map_err(|e| PipelineError::InvalidPayload(format!("bad envelope: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonPayload {
    name: String,
    email: String,
    #[serde(default)]
    username: Option<String>,
    time_zone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoCallData {
    #[serde(default)]
    url: Option<String>,
}

/// Full reservation payload, sent for created and cancelled bookings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingPayload {
    booking_id: i64,
    uid: String,
    title: String,
    #[serde(with = "time::serde::rfc3339")]
    start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    end_time: OffsetDateTime,
    event_type_id: i64,
    organizer: PersonPayload,
    attendees: Vec<PersonPayload>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    #[serde(default)]
    video_call_data: Option<VideoCallData>,
}

/// Reduced payloads carried by lifecycle triggers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancellationPayload {
    uid: String,
    #[serde(default)]
    cancellation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingEndedPayload {
    uid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoShowPayload {
    booking_uid: String,
    #[serde(default)]
    host_no_show: Option<bool>,
    #[serde(default)]
    attendee_no_show: Option<bool>,
}

/// What handling a scheduling event did.
#[derive(Debug)]
pub enum SchedulingOutcome {
    Materialized(MaterializeOutcome),
    Cancelled,
    Completed,
    NoShowUpdated,
    /// Forward-compatibility: unknown trigger, acknowledged and dropped.
    Ignored { trigger: String },
}

/// Convert a full reservation payload into the materializer's input.
///
/// Exactly one attendee is required; the provider sends at least one for any
/// confirmed booking, and the first is the payer.
pub(crate) fn to_booking_created(payload: serde_json::Value) -> PipelineResult<BookingCreated> {
    let parsed: BookingPayload = serde_json::from_value(payload)
        .map_err(|e| PipelineError::InvalidPayload(format!("bad booking payload: {}", e)))?;

    let attendee = parsed
        .attendees
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::InvalidPayload("booking has no attendees".to_string()))?;

    let checkout_session_id = parsed
        .metadata
        .as_ref()
        .and_then(|m| m.get("checkoutSessionId"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(BookingCreated {
        cal_booking_id: parsed.booking_id,
        cal_booking_uid: parsed.uid,
        title: parsed.title,
        start_time: parsed.start_time,
        end_time: parsed.end_time,
        cal_event_type_id: parsed.event_type_id,
        organizer: ContactSnapshot {
            name: parsed.organizer.name,
            email: parsed.organizer.email,
            username: parsed.organizer.username,
            time_zone: parsed.organizer.time_zone,
        },
        attendee: ContactSnapshot {
            name: attendee.name,
            email: attendee.email,
            username: attendee.username,
            time_zone: attendee.time_zone,
        },
        checkout_session_id,
        meeting_url: parsed.video_call_data.and_then(|v| v.url),
    })
}

/// Routes verified scheduling events to the materializer or status machine.
#[derive(Clone)]
pub struct SchedulingWebhookHandler {
    materializer: BookingMaterializer,
    status: BookingStatusMachine,
}

impl SchedulingWebhookHandler {
    pub fn new(materializer: BookingMaterializer, status: BookingStatusMachine) -> Self {
        Self {
            materializer,
            status,
        }
    }

    pub async fn handle(&self, event: SchedulingEvent) -> PipelineResult<SchedulingOutcome> {
        match event.trigger_event.as_str() {
            TRIGGER_BOOKING_CREATED => {
                let booking = to_booking_created(event.payload)?;
                let outcome = self.materializer.materialize(booking).await?;
                Ok(SchedulingOutcome::Materialized(outcome))
            }
            TRIGGER_BOOKING_CANCELLED => {
                let payload: CancellationPayload = serde_json::from_value(event.payload)
                    .map_err(|e| {
                        PipelineError::InvalidPayload(format!("bad cancellation payload: {}", e))
                    })?;
                self.status
                    .cancel(&payload.uid, payload.cancellation_reason.as_deref())
                    .await?;
                Ok(SchedulingOutcome::Cancelled)
            }
            TRIGGER_MEETING_ENDED => {
                let payload: MeetingEndedPayload =
                    serde_json::from_value(event.payload).map_err(|e| {
                        PipelineError::InvalidPayload(format!("bad meeting-ended payload: {}", e))
                    })?;
                self.status
                    .update_status(&payload.uid, Some(BookingStatus::Completed), None, None)
                    .await?;
                Ok(SchedulingOutcome::Completed)
            }
            TRIGGER_NO_SHOW_UPDATED => {
                let payload: NoShowPayload = serde_json::from_value(event.payload)
                    .map_err(|e| {
                        PipelineError::InvalidPayload(format!("bad no-show payload: {}", e))
                    })?;
                // A no-show flag can flip without an overall status change;
                // only set NO_SHOW when the attendee missed the session.
                let status = if payload.attendee_no_show == Some(true) {
                    Some(BookingStatus::NoShow)
                } else {
                    None
                };
                self.status
                    .update_status(
                        &payload.booking_uid,
                        status,
                        payload.host_no_show,
                        payload.attendee_no_show,
                    )
                    .await?;
                Ok(SchedulingOutcome::NoShowUpdated)
            }
            other => {
                tracing::info!(
                    trigger_event = other,
                    "Unhandled scheduling trigger - acknowledged and ignored"
                );
                Ok(SchedulingOutcome::Ignored {
                    trigger: other.to_string(),
                })
            }
        }
    }
}
