//! JWK (RFC 8037 `OKP`) representation of tenant public keys.

use serde::{Deserialize, Serialize};

use crate::{b64url_decode, b64url_encode, hash_sha256, CryptoError};

/// Public half of a tenant signing key, as handed to checkpoint devices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
}

impl PublicJwk {
    pub fn from_public_bytes(public_key: &[u8; 32]) -> Self {
        Self {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: b64url_encode(public_key),
        }
    }

    /// Parse a JWK JSON string, rejecting anything that is not an Ed25519 OKP key.
    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        let jwk: Self =
            serde_json::from_str(json).map_err(|e| CryptoError::invalid_jwk(e.to_string()))?;
        if jwk.kty != "OKP" || jwk.crv != "Ed25519" {
            return Err(CryptoError::invalid_jwk(format!(
                "unsupported key type {}/{}",
                jwk.kty, jwk.crv
            )));
        }
        jwk.public_key_bytes()?;
        Ok(jwk)
    }

    pub fn to_json(&self) -> String {
        // Only plain strings inside, serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn public_key_bytes(&self) -> Result<[u8; 32], CryptoError> {
        let bytes = b64url_decode(&self.x)?;
        bytes.as_slice().try_into().map_err(|_| {
            CryptoError::invalid_jwk(format!("x must decode to 32 bytes, got {}", bytes.len()))
        })
    }

    /// RFC 7638 thumbprint: base64url SHA-256 over the required members in
    /// lexicographic order without whitespace.
    pub fn thumbprint(&self) -> String {
        let canonical = format!(
            r#"{{"crv":"{}","kty":"{}","x":"{}"}}"#,
            self.crv, self.kty, self.x
        );
        b64url_encode(hash_sha256(canonical.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwk_json_shape() {
        let jwk = PublicJwk::from_public_bytes(&[7u8; 32]);
        let value: serde_json::Value = serde_json::from_str(&jwk.to_json()).unwrap();
        assert_eq!(value["kty"], "OKP");
        assert_eq!(value["crv"], "Ed25519");
        assert_eq!(PublicJwk::from_json(&jwk.to_json()).unwrap(), jwk);
        assert_eq!(jwk.public_key_bytes().unwrap(), [7u8; 32]);
    }

    #[test]
    fn test_rfc8037_thumbprint() {
        // RFC 8037 appendix A.3
        let jwk = PublicJwk {
            kty: "OKP".into(),
            crv: "Ed25519".into(),
            x: "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo".into(),
        };
        assert_eq!(
            jwk.thumbprint(),
            "kPrK_qmxVWaYVA9wwBF6Iuo3vVzz7TxHCTwXBygrS4k"
        );
    }

    #[test]
    fn test_from_json_rejects_other_curves() {
        let json = r#"{"kty":"EC","crv":"P-256","x":"AAAA"}"#;
        assert!(matches!(
            PublicJwk::from_json(json),
            Err(CryptoError::InvalidJwk { .. })
        ));
        let short = r#"{"kty":"OKP","crv":"Ed25519","x":"AAAA"}"#;
        assert!(PublicJwk::from_json(short).is_err());
    }
}
