// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) document for the client signing key.
//!
//! The authorization server fetches this document to verify tokens the
//! client signs. It always carries exactly one key, identified by
//! [`SIGNING_KEY_ID`](super::SIGNING_KEY_ID).

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::jwk::{
    AlgorithmParameters, CommonParameters, EllipticCurve, EllipticCurveKeyParameters,
    EllipticCurveKeyType, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse,
};
use p256::ecdsa::VerifyingKey;

use super::error::CredentialError;
use super::keypair::KeyPair;

/// Public JWK for `pair`.
pub fn public_jwk(pair: &KeyPair) -> Jwk {
    let (x, y) = pair.public_coordinates();
    Jwk {
        common: CommonParameters {
            public_key_use: Some(PublicKeyUse::Signature),
            key_algorithm: Some(KeyAlgorithm::ES256),
            key_id: Some(pair.key_id().to_string()),
            ..Default::default()
        },
        algorithm: AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
            key_type: EllipticCurveKeyType::EC,
            curve: EllipticCurve::P256,
            x,
            y,
        }),
    }
}

/// Single-key signing metadata document for `pair`.
pub fn signing_metadata_document(pair: &KeyPair) -> JwkSet {
    JwkSet {
        keys: vec![public_jwk(pair)],
    }
}

/// Find the key for `kid`, or the only EC key when the token has no `kid`.
pub fn find_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid)),
        None => jwks
            .keys
            .iter()
            .find(|k| matches!(k.algorithm, AlgorithmParameters::EllipticCurve(_))),
    }
}

/// Convert a P-256 JWK to a verifying key.
pub fn jwk_to_verifying_key(jwk: &Jwk) -> Result<VerifyingKey, CredentialError> {
    match &jwk.algorithm {
        AlgorithmParameters::EllipticCurve(ec) => {
            if ec.curve != EllipticCurve::P256 {
                return Err(CredentialError::Verification(
                    "JWK is not a P-256 key".to_string(),
                ));
            }
            let x = decode_coordinate(&ec.x)?;
            let y = decode_coordinate(&ec.y)?;
            // SEC1 uncompressed point: 0x04 || x || y
            let mut sec1 = Vec::with_capacity(1 + x.len() + y.len());
            sec1.push(0x04);
            sec1.extend_from_slice(&x);
            sec1.extend_from_slice(&y);
            VerifyingKey::from_sec1_bytes(&sec1).map_err(|e| {
                CredentialError::Verification(format!("invalid EC public key: {e}"))
            })
        }
        _ => Err(CredentialError::Verification(
            "Unsupported key type in JWKS".to_string(),
        )),
    }
}

fn decode_coordinate(encoded: &str) -> Result<Vec<u8>, CredentialError> {
    let bytes = Base64UrlUnpadded::decode_vec(encoded)
        .map_err(|e| CredentialError::Verification(format!("invalid coordinate encoding: {e}")))?;
    if bytes.len() != 32 {
        return Err(CredentialError::Verification(format!(
            "coordinate must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}
