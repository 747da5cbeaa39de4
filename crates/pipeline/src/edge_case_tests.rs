// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Reconciliation Pipeline
//!
//! Tests critical boundary conditions in:
//! - Fee splitting (FEE-01 to FEE-04)
//! - Signature verification (SIG-01 to SIG-05)
//! - Ranking reduction (RANK-01 to RANK-05)
//! - Scheduling event parsing (SCHED-01 to SCHED-04)

#[cfg(test)]
mod fee_edge_cases {
    use crate::fees::{split, PLATFORM_FEE_PERCENT};

    // =========================================================================
    // FEE-01: One-cent amount - platform share floors to zero
    // =========================================================================
    #[test]
    fn test_one_cent_goes_entirely_to_mentor() {
        let s = split(1);
        assert_eq!(s.platform_fee_cents, 0);
        assert_eq!(s.mentor_payout_cents, 1);
    }

    // =========================================================================
    // FEE-02: Amount just below a fee boundary
    // =========================================================================
    #[test]
    fn test_six_cents_still_floors() {
        // 15% of 6 = 0.9 -> 0
        let s = split(6);
        assert_eq!(s.platform_fee_cents, 0);
    }

    // =========================================================================
    // FEE-03: Amount exactly at a fee boundary
    // =========================================================================
    #[test]
    fn test_boundary_amount_takes_whole_cent() {
        // 15% of 20 = 3 exactly
        let s = split(20);
        assert_eq!(s.platform_fee_cents, 3);
        assert_eq!(s.mentor_payout_cents, 17);
    }

    // =========================================================================
    // FEE-04: Large amount does not overflow i64
    // =========================================================================
    #[test]
    fn test_large_amount() {
        let amount = 10_000_000_000i64; // $100M in cents
        let s = split(amount);
        assert_eq!(s.platform_fee_cents, amount * PLATFORM_FEE_PERCENT / 100);
        assert_eq!(s.platform_fee_cents + s.mentor_payout_cents, amount);
    }
}

#[cfg(test)]
mod signature_edge_cases {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use crate::error::PipelineError;
    use crate::signature::{SignatureScheme, SignatureVerifier};

    fn sign(secret: &str, message: &str) -> String {
        let key = secret.strip_prefix("whsec_").unwrap_or(secret);
        let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    // =========================================================================
    // SIG-01: Empty signature header - rejected, not panicked
    // =========================================================================
    #[test]
    fn test_empty_header_rejected() {
        let v = SignatureVerifier::new("secret", SignatureScheme::PlainHex);
        assert!(v.verify("body", "").is_err());

        let v = SignatureVerifier::new("whsec_x", SignatureScheme::TimestampedV1);
        assert!(v.verify("body", "").is_err());
    }

    // =========================================================================
    // SIG-02: Signature with correct content but wrong length prefix
    // =========================================================================
    #[test]
    fn test_truncated_signature_rejected() {
        let v = SignatureVerifier::new("secret", SignatureScheme::PlainHex);
        let full = sign("secret", "body");
        assert!(v.verify("body", &full[..full.len() - 2]).is_err());
    }

    // =========================================================================
    // SIG-03: Timestamp exactly at the tolerance boundary - accepted
    // =========================================================================
    #[test]
    fn test_timestamp_at_tolerance_boundary() {
        let v = SignatureVerifier::new("whsec_key", SignatureScheme::TimestampedV1);
        let t = 1_700_000_000i64;
        let sig = sign("whsec_key", &format!("{}.{}", t, "{}"));
        let header = format!("t={},v1={}", t, sig);

        // 300 seconds is still inside, 301 is out
        assert!(v.verify_timestamped("{}", &header, t + 300).is_ok());
        assert!(v.verify_timestamped("{}", &header, t + 301).is_err());
    }

    // =========================================================================
    // SIG-04: Future-dated timestamp beyond tolerance - rejected
    // =========================================================================
    #[test]
    fn test_future_timestamp_rejected() {
        let v = SignatureVerifier::new("whsec_key", SignatureScheme::TimestampedV1);
        let t = 1_700_000_000i64;
        let sig = sign("whsec_key", &format!("{}.{}", t, "{}"));
        let header = format!("t={},v1={}", t, sig);

        assert!(v.verify_timestamped("{}", &header, t - 400).is_err());
    }

    // =========================================================================
    // SIG-05: Extra unknown header parts (v0=) do not break parsing
    // =========================================================================
    #[test]
    fn test_extra_header_parts_ignored() {
        let v = SignatureVerifier::new("whsec_key", SignatureScheme::TimestampedV1);
        let t = 1_700_000_000i64;
        let sig = sign("whsec_key", &format!("{}.{}", t, "{}"));
        let header = format!("t={},v0=deadbeef,v1={}", t, sig);

        assert!(v.verify_timestamped("{}", &header, t).is_ok());
    }

    // Rejection reason is always the same variant regardless of failure mode
    #[test]
    fn test_uniform_rejection_variant() {
        let v = SignatureVerifier::new("secret", SignatureScheme::PlainHex);
        for header in ["", "zz", "00", &"0".repeat(64)] {
            match v.verify("body", header) {
                Err(PipelineError::SignatureInvalid) => {}
                other => panic!("expected SignatureInvalid, got {:?}", other),
            }
        }
    }
}

#[cfg(test)]
mod ranking_edge_cases {
    use uuid::Uuid;

    use crate::ranking::{compute_deltas, UnprocessedEvent, DECAY_FACTOR};

    fn event(event_type: &str, mentor_id: Uuid) -> UnprocessedEvent {
        UnprocessedEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            mentor_id,
        }
    }

    // =========================================================================
    // RANK-01: Reference scenario - 3 views + 1 completed = 10.9
    // =========================================================================
    #[test]
    fn test_reference_delta() {
        let mentor = Uuid::new_v4();
        let events = vec![
            event("profile_view", mentor),
            event("profile_view", mentor),
            event("profile_view", mentor),
            event("booking_completed", mentor),
        ];
        assert!((compute_deltas(&events)[&mentor] - 10.9).abs() < 1e-9);
    }

    // =========================================================================
    // RANK-02: Pure-cancellation batch produces a negative delta
    // =========================================================================
    #[test]
    fn test_negative_delta() {
        let mentor = Uuid::new_v4();
        let events = vec![event("booking_cancelled", mentor)];
        assert!((compute_deltas(&events)[&mentor] + 5.0).abs() < 1e-9);
    }

    // =========================================================================
    // RANK-03: All-unknown batch yields a zero delta (events still consumed)
    // =========================================================================
    #[test]
    fn test_unknown_only_batch() {
        let mentor = Uuid::new_v4();
        let events = vec![event("mystery", mentor), event("mystery", mentor)];
        let deltas = compute_deltas(&events);
        assert_eq!(deltas[&mentor], 0.0);
    }

    // =========================================================================
    // RANK-04: Many mentors in one batch stay independent
    // =========================================================================
    #[test]
    fn test_many_mentors() {
        let mentors: Vec<Uuid> = (0..100).map(|_| Uuid::new_v4()).collect();
        let events: Vec<UnprocessedEvent> = mentors
            .iter()
            .map(|m| event("booking_completed", *m))
            .collect();

        let deltas = compute_deltas(&events);
        assert_eq!(deltas.len(), 100);
        assert!(deltas.values().all(|d| (d - 10.0).abs() < 1e-9));
    }

    // =========================================================================
    // RANK-05: Decay compounds; two runs on 100 give 95 then 90.25
    // =========================================================================
    #[test]
    fn test_decay_compounding() {
        let mut score = 100.0;
        score *= DECAY_FACTOR;
        assert!((score - 95.0).abs() < 1e-9);
        score *= DECAY_FACTOR;
        assert!((score - 90.25).abs() < 1e-9);
    }
}

#[cfg(test)]
mod scheduling_edge_cases {
    use serde_json::json;

    use crate::scheduling::SchedulingEvent;

    // =========================================================================
    // SCHED-01: Envelope with unknown trigger still parses
    // =========================================================================
    #[test]
    fn test_unknown_trigger_parses() {
        let body = json!({
            "triggerEvent": "RECORDING_READY",
            "createdAt": "2026-09-01T00:00:00Z",
            "payload": { "anything": true }
        })
        .to_string();

        let event = SchedulingEvent::parse(&body).unwrap();
        assert_eq!(event.trigger_event, "RECORDING_READY");
    }

    // =========================================================================
    // SCHED-02: Envelope missing createdAt is tolerated
    // =========================================================================
    #[test]
    fn test_missing_created_at() {
        let body = r#"{"triggerEvent":"PING","payload":{}}"#;
        let event = SchedulingEvent::parse(body).unwrap();
        assert!(event.created_at.is_none());
    }

    // =========================================================================
    // SCHED-03: Non-JSON body rejected as invalid payload
    // =========================================================================
    #[test]
    fn test_non_json_rejected() {
        assert!(SchedulingEvent::parse("not json").is_err());
    }

    // =========================================================================
    // SCHED-04: Extra unknown envelope fields are ignored
    // =========================================================================
    #[test]
    fn test_extra_fields_ignored() {
        let body = json!({
            "triggerEvent": "PING",
            "createdAt": "2026-09-01T00:00:00Z",
            "payload": {},
            "appId": "cal-video",
            "secretHint": "xyz"
        })
        .to_string();

        assert!(SchedulingEvent::parse(&body).is_ok());
    }
}
