//! Signature stamp generation.
//!
//! A stamp is a deterministic SHA-256 digest over the canonical JSON
//! serialization of `{user_id, action, timestamp, data}`. It is
//! tamper-evidence within a single trust boundary: verification recomputes
//! the digest from claimed inputs and compares for equality, which detects
//! later alteration of any of the four fields but does not prove the named
//! user performed the action. There is no key and no non-repudiation.
//!
//! Deployments that want server-side key binding can configure the keyed
//! variant ([`Stamper::keyed`]), which computes HMAC-SHA-256 over the same
//! canonical bytes.

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::user::UserId;

type HmacSha256 = Hmac<Sha256>;

/// The exact material covered by a stamp. Field order is fixed; the
/// timestamp is serialized as RFC 3339 with millisecond precision so that
/// the same instant always canonicalizes to the same bytes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StampPayload {
    pub user_id: UserId,
    pub action: String,
    pub timestamp: String,
    pub data: Option<serde_json::Value>,
}

impl StampPayload {
    pub fn new(
        user_id: UserId,
        action: impl Into<String>,
        timestamp: DateTime<Utc>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            user_id,
            action: action.into(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            data,
        }
    }

    fn canonical_bytes(&self) -> Vec<u8> {
        // serde_json maps are sorted (BTreeMap-backed), so identical `data`
        // values always serialize identically.
        serde_json::to_vec(self).unwrap_or_else(|_| {
            format!("{}|{}|{}", self.user_id.0, self.action, self.timestamp).into_bytes()
        })
    }
}

#[derive(Clone, Debug)]
enum StampMode {
    Digest,
    Keyed(Vec<u8>),
}

/// Produces and verifies stamps. The default is the unkeyed digest; the
/// keyed mode binds stamps to a server-side secret.
#[derive(Clone, Debug)]
pub struct Stamper {
    mode: StampMode,
}

impl Default for Stamper {
    fn default() -> Self {
        Self { mode: StampMode::Digest }
    }
}

impl Stamper {
    pub fn keyed(signing_key: impl AsRef<[u8]>) -> Self {
        Self { mode: StampMode::Keyed(signing_key.as_ref().to_vec()) }
    }

    pub fn stamp(&self, payload: &StampPayload) -> String {
        let bytes = payload.canonical_bytes();
        match &self.mode {
            StampMode::Digest => sha256_hex(&bytes),
            StampMode::Keyed(key) => hmac_hex(key, &bytes),
        }
    }

    /// Recompute-and-compare. Only meaningful when the verifier obtained
    /// the payload fields independently of the stored stamp.
    pub fn verify(&self, payload: &StampPayload, stamp: &str) -> bool {
        self.stamp(payload) == stamp
    }
}

fn hmac_hex(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return sha256_hex(payload),
    };
    mac.update(payload);
    encode_hex(mac.finalize().into_bytes().as_slice())
}

fn sha256_hex(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    encode_hex(digest.as_slice())
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{StampPayload, Stamper};
    use crate::domain::user::UserId;

    fn payload() -> StampPayload {
        StampPayload::new(
            UserId("u-conducteur".to_string()),
            "valider",
            Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
            Some(json!({"demande": "DEM-2026-0007", "step": "validation_conducteur"})),
        )
    }

    #[test]
    fn same_inputs_always_produce_same_stamp() {
        let stamper = Stamper::default();
        assert_eq!(stamper.stamp(&payload()), stamper.stamp(&payload()));
    }

    #[test]
    fn stamp_verifies_against_original_inputs() {
        let stamper = Stamper::default();
        let stamp = stamper.stamp(&payload());
        assert!(stamper.verify(&payload(), &stamp));
    }

    #[test]
    fn changing_any_field_changes_the_stamp() {
        let stamper = Stamper::default();
        let base = stamper.stamp(&payload());

        let mut other_user = payload();
        other_user.user_id = UserId("u-autre".to_string());
        assert_ne!(stamper.stamp(&other_user), base);

        let mut other_action = payload();
        other_action.action = "cloturer".to_string();
        assert_ne!(stamper.stamp(&other_action), base);

        let mut other_timestamp = payload();
        other_timestamp.timestamp = "2026-03-14T09:26:54.000Z".to_string();
        assert_ne!(stamper.stamp(&other_timestamp), base);

        let mut other_data = payload();
        other_data.data = None;
        assert_ne!(stamper.stamp(&other_data), base);
    }

    #[test]
    fn data_with_reordered_keys_canonicalizes_identically() {
        let stamper = Stamper::default();
        let a = StampPayload::new(
            UserId("u-1".to_string()),
            "valider",
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            Some(json!({"a": 1, "b": 2})),
        );
        let b = StampPayload::new(
            UserId("u-1".to_string()),
            "valider",
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            Some(json!({"b": 2, "a": 1})),
        );
        assert_eq!(stamper.stamp(&a), stamper.stamp(&b));
    }

    #[test]
    fn keyed_stamper_differs_from_digest_and_per_key() {
        let payload = payload();
        let digest = Stamper::default().stamp(&payload);
        let keyed_a = Stamper::keyed("secret-a").stamp(&payload);
        let keyed_b = Stamper::keyed("secret-b").stamp(&payload);

        assert_ne!(digest, keyed_a);
        assert_ne!(keyed_a, keyed_b);
        assert!(Stamper::keyed("secret-a").verify(&payload, &keyed_a));
        assert!(!Stamper::keyed("secret-b").verify(&payload, &keyed_a));
    }
}
