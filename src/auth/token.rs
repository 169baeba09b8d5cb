// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compact JWS framing for client-signed tokens.
//!
//! ```text
//! b64url(header) "." b64url(payload) "." b64url(signature)
//! ```
//!
//! The signature covers the ASCII bytes of the first two encoded segments
//! joined by `.`, never the raw JSON objects. All segments are unpadded.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::jwk::JwkSet;
use p256::ecdsa::{signature::Verifier, Signature};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::error::CredentialError;
use super::jwks::{find_key, jwk_to_verifying_key};
use super::keypair::{KeyPair, SIGNING_ALGORITHM};

/// Default lifetime of a client assertion, in seconds.
pub const DEFAULT_ASSERTION_LIFETIME_SECS: i64 = 60;

/// JOSE header for tokens signed with the client key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl JwsHeader {
    /// `{"alg":"ES256","typ":"JWT","kid":<kid>}`
    pub fn es256(kid: impl Into<String>) -> Self {
        Self {
            alg: SIGNING_ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
            kid: Some(kid.into()),
        }
    }
}

/// Encode one token segment as unpadded base64url JSON.
pub fn encode_segment<T: Serialize + ?Sized>(value: &T) -> Result<String, CredentialError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

/// Decode one token segment from unpadded base64url JSON.
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, CredentialError> {
    let bytes = Base64UrlUnpadded::decode_vec(segment)
        .map_err(|e| CredentialError::Verification(format!("invalid segment encoding: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| CredentialError::Verification(format!("invalid segment JSON: {e}")))
}

/// Sign `header` and `payload` with `pair`, producing a compact token.
pub(crate) fn sign_compact<H, P>(
    pair: &KeyPair,
    header: &H,
    payload: &P,
) -> Result<String, CredentialError>
where
    H: Serialize + ?Sized,
    P: Serialize + ?Sized,
{
    let signing_input = format!("{}.{}", encode_segment(header)?, encode_segment(payload)?);
    let signature = pair.sign(signing_input.as_bytes())?;
    Ok(format!(
        "{signing_input}.{}",
        Base64UrlUnpadded::encode_string(&signature)
    ))
}

/// Verify `token` against `jwks` and return its decoded payload.
///
/// The key is located by the header `kid`; a token without `kid` is checked
/// against the first EC key in the set.
pub fn verify_token<P: DeserializeOwned>(token: &str, jwks: &JwkSet) -> Result<P, CredentialError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CredentialError::Verification(
            "token must have three segments".to_string(),
        ));
    };

    let header: JwsHeader = decode_segment(header_b64)?;
    if header.alg != SIGNING_ALGORITHM {
        return Err(CredentialError::Verification(format!(
            "unsupported algorithm {}",
            header.alg
        )));
    }

    let jwk = find_key(jwks, header.kid.as_deref())
        .ok_or_else(|| CredentialError::Verification("No matching key found in JWKS".to_string()))?;
    let verifying_key = jwk_to_verifying_key(jwk)?;

    let signature_bytes = Base64UrlUnpadded::decode_vec(signature_b64)
        .map_err(|e| CredentialError::Verification(format!("invalid signature encoding: {e}")))?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|e| CredentialError::Verification(format!("invalid signature: {e}")))?;

    let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| CredentialError::Verification("Token signature is invalid".to_string()))?;

    decode_segment(payload_b64)
}

/// `Authorization` header value carrying `token`.
pub fn bearer_header_value(token: &str) -> String {
    format!("Bearer {token}")
}

/// Claim set of a `private_key_jwt` client assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Builder for client assertions presented to the authorization server.
#[derive(Debug, Clone)]
pub struct ClientAssertion {
    client_id: String,
    audience: String,
    lifetime: Duration,
}

impl ClientAssertion {
    /// - `client_id`: OAuth client identifier (used as `iss` and `sub`)
    /// - `audience`: authorization server issuer or token endpoint
    pub fn new(client_id: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            audience: audience.into(),
            lifetime: Duration::seconds(DEFAULT_ASSERTION_LIFETIME_SECS),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Claims for an assertion issued at `now`, with a fresh `jti`.
    pub fn claims(&self, now: DateTime<Utc>) -> AssertionClaims {
        AssertionClaims {
            iss: self.client_id.clone(),
            sub: self.client_id.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwks::signing_metadata_document;
    use serde_json::{json, Value};

    fn signed(pair: &KeyPair) -> String {
        sign_compact(
            pair,
            &JwsHeader::es256(pair.key_id()),
            &json!({"sub": "did:example:alice", "n": 1}),
        )
        .unwrap()
    }

    #[test]
    fn segments_are_unpadded_base64url() {
        let pair = KeyPair::generate();
        let token = signed(&pair);
        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn header_and_payload_encode_independently() {
        let pair = KeyPair::generate();
        let header = JwsHeader::es256(pair.key_id());
        let payload = json!({"a": "b"});
        let token = sign_compact(&pair, &header, &payload).unwrap();

        let mut parts = token.split('.');
        assert_eq!(parts.next().unwrap(), encode_segment(&header).unwrap());
        assert_eq!(parts.next().unwrap(), encode_segment(&payload).unwrap());
    }

    #[test]
    fn signed_token_verifies() {
        let pair = KeyPair::generate();
        let jwks = signing_metadata_document(&pair);
        let payload: Value = verify_token(&signed(&pair), &jwks).unwrap();
        assert_eq!(payload["sub"], "did:example:alice");
    }

    #[test]
    fn flipped_signature_byte_fails() {
        let pair = KeyPair::generate();
        let jwks = signing_metadata_document(&pair);
        let token = signed(&pair);
        let (input, signature_b64) = token.rsplit_once('.').unwrap();

        let mut signature = Base64UrlUnpadded::decode_vec(signature_b64).unwrap();
        for i in [0, 31, 63] {
            signature[i] ^= 0x01;
            let tampered = format!("{input}.{}", Base64UrlUnpadded::encode_string(&signature));
            assert!(verify_token::<Value>(&tampered, &jwks).is_err(), "byte {i}");
            signature[i] ^= 0x01;
        }
    }

    #[test]
    fn token_from_other_key_fails() {
        let pair = KeyPair::generate();
        let other = KeyPair::generate();
        let jwks = signing_metadata_document(&other);
        assert!(verify_token::<Value>(&signed(&pair), &jwks).is_err());
    }

    #[test]
    fn malformed_tokens_fail() {
        let pair = KeyPair::generate();
        let jwks = signing_metadata_document(&pair);
        for token in ["", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(matches!(
                verify_token::<Value>(token, &jwks),
                Err(CredentialError::Verification(_))
            ));
        }
    }

    #[test]
    fn bearer_value_format() {
        assert_eq!(bearer_header_value("abc"), "Bearer abc");
    }

    #[test]
    fn assertion_claims_window() {
        let now = Utc::now();
        let claims = ClientAssertion::new(
            "https://app.example.com/client-metadata.json",
            "https://auth.example.com",
        )
        .with_lifetime(Duration::seconds(120))
        .claims(now);

        assert_eq!(claims.iss, claims.sub);
        assert_eq!(claims.aud, "https://auth.example.com");
        assert_eq!(claims.exp - claims.iat, 120);
        assert!(Uuid::parse_str(&claims.jti).is_ok());
    }

    #[test]
    fn assertion_jti_is_unique() {
        let assertion = ClientAssertion::new("client", "aud");
        let now = Utc::now();
        assert_ne!(assertion.claims(now).jti, assertion.claims(now).jti);
    }
}
