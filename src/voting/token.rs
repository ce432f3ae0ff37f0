//! Best-effort reading of a public voting token.
//!
//! The token's payload segment is decoded without verifying its signature,
//! only to pre-fill identifiers a link may have omitted. Nothing decoded here
//! grants access: every later call is checked by the backend.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenHint {
    Resolved {
        property_id: Option<i64>,
        voting_id: Option<i64>,
        group_id: Option<i64>,
    },
    Unresolved,
}

#[derive(Debug, Clone, Deserialize)]
struct HintClaims {
    #[serde(default, alias = "hp_id", alias = "horizontal_property_id")]
    property_id: Option<i64>,
    #[serde(default)]
    voting_id: Option<i64>,
    #[serde(default)]
    group_id: Option<i64>,
}

impl TokenHint {
    pub fn extract(token: &str) -> Self {
        match decode_payload(token) {
            Ok(claims) => TokenHint::Resolved {
                property_id: claims.property_id,
                voting_id: claims.voting_id,
                group_id: claims.group_id,
            },
            Err(reason) => {
                tracing::debug!("Public token carries no readable hint: {reason}");
                TokenHint::Unresolved
            }
        }
    }

    pub fn property_id(&self) -> Option<i64> {
        match self {
            TokenHint::Resolved { property_id, .. } => *property_id,
            TokenHint::Unresolved => None,
        }
    }

    pub fn voting_id(&self) -> Option<i64> {
        match self {
            TokenHint::Resolved { voting_id, .. } => *voting_id,
            TokenHint::Unresolved => None,
        }
    }

    pub fn group_id(&self) -> Option<i64> {
        match self {
            TokenHint::Resolved { group_id, .. } => *group_id,
            TokenHint::Unresolved => None,
        }
    }
}

/// Reads the middle segment only; the header and signature are ignored, so
/// any signing algorithm yields the same hint.
fn decode_payload(token: &str) -> Result<HintClaims, String> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next()) {
        (Some(_), Some(payload)) if !payload.is_empty() => payload.trim_end_matches('='),
        _ => return Err("token has no payload segment".into()),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|e| format!("invalid payload base64: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid payload JSON: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    fn sign(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"server-side secret"),
        )
        .unwrap()
    }

    #[test]
    fn reads_identifiers_without_the_signing_key() {
        let token = sign(json!({"hp_id": 42, "voting_id": 100, "exp": 1}));

        assert_eq!(
            TokenHint::extract(&token),
            TokenHint::Resolved {
                property_id: Some(42),
                voting_id: Some(100),
                group_id: None,
            }
        );
    }

    fn segment(json: serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(json.to_string())
    }

    #[test]
    fn header_algorithm_does_not_matter() {
        let payload = segment(json!({"hp_id": 42, "voting_id": 100, "group_id": 7}));
        let expected = TokenHint::Resolved {
            property_id: Some(42),
            voting_id: Some(100),
            group_id: Some(7),
        };

        for header in [
            segment(json!({"alg": "RS256", "typ": "JWT"})),
            segment(json!({"alg": "ES256", "kid": "link-2026"})),
            "v1".to_owned(),
            String::new(),
        ] {
            let token = format!("{header}.{payload}.c2lnbmF0dXJl");
            assert_eq!(TokenHint::extract(&token), expected, "header {header:?}");
        }

        let unsigned = format!("v1.{payload}");
        assert_eq!(TokenHint::extract(&unsigned).group_id(), Some(7));
    }

    #[test]
    fn garbage_is_unresolved() {
        assert_eq!(TokenHint::extract("not-a-token"), TokenHint::Unresolved);
        assert_eq!(TokenHint::extract("a.b.c"), TokenHint::Unresolved);
        assert_eq!(TokenHint::extract("v1..sig"), TokenHint::Unresolved);
        let not_json = format!("v1.{}", URL_SAFE_NO_PAD.encode("plain text"));
        assert_eq!(TokenHint::extract(&not_json), TokenHint::Unresolved);
        assert_eq!(TokenHint::Unresolved.voting_id(), None);
    }
}
