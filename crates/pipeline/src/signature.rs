//! Webhook signature verification
//!
//! Both external providers sign their deliveries with HMAC-SHA256 over the
//! raw request body, but with different envelope formats:
//!
//! - the payments provider sends `t=<unix>,v1=<hex>` and signs
//!   `"{t}.{body}"` with a 5-minute timestamp tolerance
//! - the scheduling provider sends a bare hex digest of the body
//!
//! Verification happens before any state change. A rejected delivery logs
//! only the rejection itself, never payload contents.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{PipelineError, PipelineResult};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a timestamped signature before it is rejected as a replay.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Signature envelope format used by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// `t=<unix>,v1=<hex>` header; HMAC over `"{t}.{body}"`.
    TimestampedV1,
    /// Bare lowercase hex HMAC of the body.
    PlainHex,
}

/// Verifies inbound webhook signatures for one provider.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    scheme: SignatureScheme,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>, scheme: SignatureScheme) -> Self {
        Self {
            secret: secret.into(),
            scheme,
        }
    }

    /// Verify `header` against `payload`.
    ///
    /// Returns `Ok(())` only when the signature matches; every failure mode
    /// collapses to `SignatureInvalid` so callers cannot leak which part of
    /// the check failed.
    pub fn verify(&self, payload: &str, header: &str) -> PipelineResult<()> {
        match self.scheme {
            SignatureScheme::TimestampedV1 => self.verify_timestamped(payload, header, unix_now()),
            SignatureScheme::PlainHex => self.verify_plain_hex(payload, header),
        }
    }

    /// Timestamped verification with an injectable clock, used by tests.
    pub(crate) fn verify_timestamped(
        &self,
        payload: &str,
        header: &str,
        now: i64,
    ) -> PipelineResult<()> {
        // Parse the signature header: t=timestamp,v1=signature
        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<&str> = None;

        for part in header.split(',') {
            let kv: Vec<&str> = part.splitn(2, '=').collect();
            if kv.len() == 2 {
                match kv[0] {
                    "t" => timestamp = kv[1].parse().ok(),
                    "v1" => v1_signature = Some(kv[1]),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or(PipelineError::SignatureInvalid)?;
        let v1_signature = v1_signature.ok_or(PipelineError::SignatureInvalid)?;

        if (now - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                age_secs = (now - timestamp).abs(),
                "Rejected webhook: signature timestamp outside tolerance"
            );
            return Err(PipelineError::SignatureInvalid);
        }

        let signed_payload = format!("{}.{}", timestamp, payload);
        let expected = self.compute_hex(signed_payload.as_bytes())?;

        constant_time_eq(expected.as_bytes(), v1_signature.as_bytes())
    }

    fn verify_plain_hex(&self, payload: &str, header: &str) -> PipelineResult<()> {
        let expected = self.compute_hex(payload.as_bytes())?;
        constant_time_eq(expected.as_bytes(), header.trim().as_bytes())
    }

    fn compute_hex(&self, message: &[u8]) -> PipelineResult<String> {
        // The payments provider's secret carries a "whsec_" prefix; the raw
        // remainder is the HMAC key.
        let key = self
            .secret
            .strip_prefix("whsec_")
            .unwrap_or(&self.secret);

        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|_| PipelineError::SignatureInvalid)?;
        mac.update(message);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> PipelineResult<()> {
    if a.len() == b.len() && a.ct_eq(b).into() {
        Ok(())
    } else {
        tracing::warn!("Rejected webhook: signature mismatch");
        Err(PipelineError::SignatureInvalid)
    }
}

fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_hex(secret: &str, message: &str) -> String {
        let key = secret.strip_prefix("whsec_").unwrap_or(secret);
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn plain_hex_accepts_valid_signature() {
        let verifier = SignatureVerifier::new("cal-secret", SignatureScheme::PlainHex);
        let body = r#"{"triggerEvent":"BOOKING_CREATED"}"#;
        let sig = sign_hex("cal-secret", body);

        assert!(verifier.verify(body, &sig).is_ok());
    }

    #[test]
    fn plain_hex_rejects_tampered_body() {
        let verifier = SignatureVerifier::new("cal-secret", SignatureScheme::PlainHex);
        let sig = sign_hex("cal-secret", "original");

        assert!(matches!(
            verifier.verify("tampered", &sig),
            Err(PipelineError::SignatureInvalid)
        ));
    }

    #[test]
    fn plain_hex_rejects_wrong_secret() {
        let verifier = SignatureVerifier::new("right-secret", SignatureScheme::PlainHex);
        let sig = sign_hex("wrong-secret", "body");

        assert!(verifier.verify("body", &sig).is_err());
    }

    #[test]
    fn timestamped_accepts_fresh_signature() {
        let verifier = SignatureVerifier::new("whsec_abc123", SignatureScheme::TimestampedV1);
        let body = r#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        let sig = sign_hex("whsec_abc123", &format!("{}.{}", now, body));
        let header = format!("t={},v1={}", now, sig);

        assert!(verifier.verify_timestamped(body, &header, now + 10).is_ok());
    }

    #[test]
    fn timestamped_rejects_stale_timestamp() {
        let verifier = SignatureVerifier::new("whsec_abc123", SignatureScheme::TimestampedV1);
        let body = "{}";
        let then = 1_700_000_000;
        let sig = sign_hex("whsec_abc123", &format!("{}.{}", then, body));
        let header = format!("t={},v1={}", then, sig);

        // 301 seconds later: outside the 5 minute tolerance
        assert!(verifier
            .verify_timestamped(body, &header, then + 301)
            .is_err());
    }

    #[test]
    fn timestamped_rejects_missing_v1() {
        let verifier = SignatureVerifier::new("whsec_abc123", SignatureScheme::TimestampedV1);
        assert!(verifier
            .verify_timestamped("{}", "t=1700000000", 1_700_000_000)
            .is_err());
    }
}
