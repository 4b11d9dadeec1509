//! Signed QR credentials.
//!
//! Wire format: `base64url(payload JSON) "." base64url(signature)`, where the
//! Ed25519 signature covers the UTF-8 bytes of the base64url payload text.
//!
//! Two payload shapes are accepted:
//!
//! - compact: `{"a","n","d","f","t","p"}` with `f`/`t` as epoch seconds
//! - legacy: `{"authId","personName","personDoc","validFrom","validTo","vehiclePlate"}`
//!   with ISO-8601 dates
//!
//! Each compact field falls back to its legacy key when absent.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use gatekeep_crypto::{b64url_decode, b64url_encode, verify_ed25519, Ed25519Signer};
use gatekeep_storage::VisitorAuthorization;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::GateError;

const COMPACT_KEYS: [&str; 6] = ["a", "n", "d", "f", "t", "p"];

/// Read access to the visitor fields a payload claims.
pub trait AuthorizationClaims {
    fn authorization_id(&self) -> Option<&str>;
    fn person_name(&self) -> Option<&str>;
    fn person_document(&self) -> Option<&str>;
    fn valid_from(&self) -> Option<DateTime<Utc>>;
    fn valid_to(&self) -> Option<DateTime<Utc>>;
    fn vehicle_plate(&self) -> Option<&str>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPayload {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub person_doc: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactPayload {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub a: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(default, deserialize_with = "lenient_epoch", skip_serializing_if = "Option::is_none")]
    pub f: Option<i64>,
    #[serde(default, deserialize_with = "lenient_epoch", skip_serializing_if = "Option::is_none")]
    pub t: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    /// Legacy keys present alongside compact ones.
    #[serde(flatten)]
    pub fallback: LegacyPayload,
}

/// Decoded signed QR payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QrPayload {
    Compact(CompactPayload),
    Legacy(LegacyPayload),
}

impl QrPayload {
    /// Compact payload for an authorization, as issuance workflows emit it.
    pub fn for_authorization(auth: &VisitorAuthorization) -> Self {
        QrPayload::Compact(CompactPayload {
            a: Some(auth.id.to_string()),
            n: Some(auth.person_name.clone()),
            d: Some(auth.person_document.clone()),
            f: Some(auth.valid_from.timestamp()),
            t: Some(auth.valid_to.timestamp()),
            p: auth.vehicle_plate.clone(),
            fallback: LegacyPayload::default(),
        })
    }

    /// Structured decode; the shape is compact when any compact key is present.
    pub fn from_json(bytes: &[u8]) -> Result<Self, GateError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| GateError::InvalidFormat(format!("payload is not JSON: {e}")))?;
        let is_compact = match &value {
            Value::Object(map) => COMPACT_KEYS.iter().any(|k| map.contains_key(*k)),
            _ => {
                return Err(GateError::InvalidFormat(
                    "payload is not a JSON object".to_string(),
                ))
            }
        };

        let payload = if is_compact {
            serde_json::from_value(value).map(QrPayload::Compact)
        } else {
            serde_json::from_value(value).map(QrPayload::Legacy)
        };
        payload.map_err(|e| GateError::InvalidFormat(e.to_string()))
    }

    fn claims(&self) -> &dyn AuthorizationClaims {
        match self {
            QrPayload::Compact(c) => c,
            QrPayload::Legacy(l) => l,
        }
    }
}

impl AuthorizationClaims for LegacyPayload {
    fn authorization_id(&self) -> Option<&str> {
        self.auth_id.as_deref()
    }

    fn person_name(&self) -> Option<&str> {
        self.person_name.as_deref()
    }

    fn person_document(&self) -> Option<&str> {
        self.person_doc.as_deref()
    }

    fn valid_from(&self) -> Option<DateTime<Utc>> {
        self.valid_from.as_deref().and_then(parse_instant)
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to.as_deref().and_then(parse_instant)
    }

    fn vehicle_plate(&self) -> Option<&str> {
        self.vehicle_plate.as_deref()
    }
}

impl AuthorizationClaims for CompactPayload {
    fn authorization_id(&self) -> Option<&str> {
        self.a.as_deref().or(self.fallback.authorization_id())
    }

    fn person_name(&self) -> Option<&str> {
        self.n.as_deref().or(self.fallback.person_name())
    }

    fn person_document(&self) -> Option<&str> {
        self.d.as_deref().or(self.fallback.person_document())
    }

    fn valid_from(&self) -> Option<DateTime<Utc>> {
        self.f
            .and_then(|s| DateTime::from_timestamp(s, 0))
            .or_else(|| self.fallback.valid_from())
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.t
            .and_then(|s| DateTime::from_timestamp(s, 0))
            .or_else(|| self.fallback.valid_to())
    }

    fn vehicle_plate(&self) -> Option<&str> {
        self.p.as_deref().or(self.fallback.vehicle_plate())
    }
}

impl AuthorizationClaims for QrPayload {
    fn authorization_id(&self) -> Option<&str> {
        self.claims().authorization_id()
    }

    fn person_name(&self) -> Option<&str> {
        self.claims().person_name()
    }

    fn person_document(&self) -> Option<&str> {
        self.claims().person_document()
    }

    fn valid_from(&self) -> Option<DateTime<Utc>> {
        self.claims().valid_from()
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.claims().valid_to()
    }

    fn vehicle_plate(&self) -> Option<&str> {
        self.claims().vehicle_plate()
    }
}

/// RFC 3339, or a zone-less ISO-8601 timestamp taken as UTC.
fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Strings and numbers are taken as text; blanks and other JSON types as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_epoch<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// A parsed, not yet verified, signed QR.
#[derive(Clone, Debug)]
pub struct SignedQr {
    payload_b64: String,
    signature_b64: String,
    payload: QrPayload,
}

impl SignedQr {
    /// Split and decode the wire form. The signature half is only decoded at
    /// verification time.
    pub fn parse(input: &str) -> Result<Self, GateError> {
        let input = input.trim();
        let (payload_b64, signature_b64) = input
            .split_once('.')
            .ok_or_else(|| GateError::InvalidFormat("missing '.' separator".to_string()))?;
        if payload_b64.is_empty() || signature_b64.is_empty() {
            return Err(GateError::InvalidFormat("empty payload or signature".to_string()));
        }
        if signature_b64.contains('.') {
            return Err(GateError::InvalidFormat("too many '.' separators".to_string()));
        }

        let bytes = b64url_decode(payload_b64)
            .map_err(|e| GateError::InvalidFormat(format!("payload: {e}")))?;
        let payload = QrPayload::from_json(&bytes)?;

        Ok(Self {
            payload_b64: payload_b64.to_string(),
            signature_b64: signature_b64.to_string(),
            payload,
        })
    }

    /// Sign a payload and produce the wire form.
    pub fn encode(payload: &QrPayload, signer: &Ed25519Signer) -> Result<String, GateError> {
        let json = serde_json::to_vec(payload)
            .map_err(|e| GateError::InvalidFormat(e.to_string()))?;
        let payload_b64 = b64url_encode(json);
        let signature = signer.sign(payload_b64.as_bytes());
        Ok(format!("{payload_b64}.{}", b64url_encode(signature)))
    }

    pub fn payload(&self) -> &QrPayload {
        &self.payload
    }

    /// Fail-closed: malformed keys or signatures verify as false.
    pub fn verify(&self, public_key: &[u8]) -> bool {
        let signature = match b64url_decode(&self.signature_b64) {
            Ok(sig) => sig,
            Err(e) => {
                debug!("signature is not base64url: {}", e);
                return false;
            }
        };
        match verify_ed25519(public_key, self.payload_b64.as_bytes(), &signature) {
            Ok(valid) => valid,
            Err(e) => {
                debug!("signature verification error: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(value: &Value, signer: &Ed25519Signer) -> String {
        let payload_b64 = b64url_encode(serde_json::to_vec(value).unwrap());
        let sig = signer.sign(payload_b64.as_bytes());
        format!("{payload_b64}.{}", b64url_encode(sig))
    }

    #[test]
    fn test_compact_payload() {
        let signer = Ed25519Signer::random();
        let qr = wire(
            &json!({"a": "auth-1", "n": "Ana", "d": "123", "f": 1_700_000_000, "t": 1_700_003_600, "p": "ABC1D23"}),
            &signer,
        );
        let parsed = SignedQr::parse(&qr).unwrap();
        let payload = parsed.payload();

        assert!(matches!(payload, QrPayload::Compact(_)));
        assert_eq!(payload.authorization_id(), Some("auth-1"));
        assert_eq!(payload.person_name(), Some("Ana"));
        assert_eq!(payload.person_document(), Some("123"));
        assert_eq!(payload.vehicle_plate(), Some("ABC1D23"));
        assert_eq!(payload.valid_from().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(payload.valid_to().unwrap().timestamp(), 1_700_003_600);
        assert!(parsed.verify(&signer.public_key_bytes()));
    }

    #[test]
    fn test_legacy_payload() {
        let signer = Ed25519Signer::random();
        let qr = wire(
            &json!({
                "authId": "auth-2",
                "personName": "Bruno",
                "personDoc": "456",
                "validFrom": "2023-11-14T22:13:20Z",
                "validTo": "2023-11-14T23:13:20"
            }),
            &signer,
        );
        let parsed = SignedQr::parse(&qr).unwrap();
        let payload = parsed.payload();

        assert!(matches!(payload, QrPayload::Legacy(_)));
        assert_eq!(payload.authorization_id(), Some("auth-2"));
        assert_eq!(payload.valid_from().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(payload.valid_to().unwrap().timestamp(), 1_700_003_600);
        assert_eq!(payload.vehicle_plate(), None);
    }

    #[test]
    fn test_compact_falls_back_to_legacy_keys() {
        let payload = QrPayload::from_json(
            json!({"n": "Caio", "authId": "auth-3", "validFrom": "2023-11-14T22:13:20Z", "t": "1700003600"})
                .to_string()
                .as_bytes(),
        )
        .unwrap();

        assert!(matches!(payload, QrPayload::Compact(_)));
        assert_eq!(payload.authorization_id(), Some("auth-3"));
        assert_eq!(payload.person_name(), Some("Caio"));
        assert_eq!(payload.valid_from().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(payload.valid_to().unwrap().timestamp(), 1_700_003_600);
    }

    #[test]
    fn test_blank_and_odd_values_are_absent() {
        let payload =
            QrPayload::from_json(json!({"a": "  ", "f": true, "t": [1]}).to_string().as_bytes())
                .unwrap();
        assert_eq!(payload.authorization_id(), None);
        assert_eq!(payload.valid_from(), None);
        assert_eq!(payload.valid_to(), None);

        let legacy = QrPayload::from_json(json!({"validTo": "next tuesday"}).to_string().as_bytes())
            .unwrap();
        assert_eq!(legacy.valid_to(), None);
    }

    #[test]
    fn test_malformed_wire_forms() {
        for input in ["", "no-separator", ".c2ln", "eyJhIjoiMSJ9.", "a.b.c", "!!!.c2ln"] {
            assert!(
                matches!(SignedQr::parse(input), Err(GateError::InvalidFormat(_))),
                "{input:?} should be rejected"
            );
        }
        // Valid base64, but not a JSON object.
        let not_object = format!("{}.c2ln", b64url_encode("[1,2]"));
        assert!(matches!(
            SignedQr::parse(&not_object),
            Err(GateError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_encode_roundtrip_and_signature_binding() {
        let signer = Ed25519Signer::random();
        let payload = QrPayload::Legacy(LegacyPayload {
            auth_id: Some("auth-4".to_string()),
            person_name: Some("Dora".to_string()),
            ..LegacyPayload::default()
        });
        let qr = SignedQr::encode(&payload, &signer).unwrap();
        let parsed = SignedQr::parse(&qr).unwrap();

        assert_eq!(parsed.payload(), &payload);
        assert!(parsed.verify(&signer.public_key_bytes()));
        assert!(!parsed.verify(&Ed25519Signer::random().public_key_bytes()));
        assert!(!parsed.verify(&[1, 2, 3]));

        let garbage_sig = format!("{}.%%%", qr.split_once('.').unwrap().0);
        assert!(!SignedQr::parse(&garbage_sig).unwrap().verify(&signer.public_key_bytes()));
    }
}
