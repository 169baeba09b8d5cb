// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The client's ES256 signing key pair.

use base64ct::{Base64UrlUnpadded, Encoding};
use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::OsRng;
use sha2::{Digest, Sha256};

use super::error::CredentialError;

/// Key identifier published in the JWKS and stamped into token headers.
///
/// Fixed so verifiers can always locate the client key by `kid`.
pub const SIGNING_KEY_ID: &str = "client-signing-key";

/// JWS algorithm name for ECDSA P-256 with SHA-256.
pub const SIGNING_ALGORITHM: &str = "ES256";

/// JWK curve name for P-256.
pub const CURVE_NAME: &str = "P-256";

/// ECDSA P-256 key pair used to authenticate this client.
///
/// The private scalar never leaves this type; callers sign through
/// [`CredentialManager`](super::CredentialManager).
pub struct KeyPair {
    signing_key: SigningKey,
    key_id: String,
}

impl KeyPair {
    /// Generate a fresh pair from the OS random source.
    pub(crate) fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    pub(crate) fn from_signing_key(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            key_id: SIGNING_KEY_ID.to_string(),
        }
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn algorithm(&self) -> &'static str {
        SIGNING_ALGORITHM
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Base64url (unpadded) affine coordinates `(x, y)` of the public key.
    pub fn public_coordinates(&self) -> (String, String) {
        public_coordinates(self.verifying_key())
    }

    /// RFC 7638 JWK thumbprint of the public key.
    pub fn thumbprint(&self) -> String {
        let (x, y) = self.public_coordinates();
        // Members in lexicographic order, no whitespace
        let canonical = format!(r#"{{"crv":"{CURVE_NAME}","kty":"EC","x":"{x}","y":"{y}"}}"#);
        Base64UrlUnpadded::encode_string(&Sha256::digest(canonical.as_bytes()))
    }

    /// Sign `message` (ECDSA over SHA-256), returning the 64-byte `r || s` form.
    pub(crate) fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CredentialError> {
        let signature: Signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| CredentialError::Signing(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id)
            .field("algorithm", &SIGNING_ALGORITHM)
            .field("thumbprint", &self.thumbprint())
            .finish_non_exhaustive()
    }
}

/// Base64url (unpadded) affine coordinates of an uncompressed P-256 point.
pub(crate) fn public_coordinates(key: &VerifyingKey) -> (String, String) {
    let point = key.to_encoded_point(false);
    // 0x04 || x || y
    let coordinates = point.as_bytes().get(1..).unwrap_or_default();
    let (x, y) = coordinates.split_at(coordinates.len() / 2);
    (
        Base64UrlUnpadded::encode_string(x),
        Base64UrlUnpadded::encode_string(y),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier;

    #[test]
    fn coordinates_are_32_bytes() {
        let pair = KeyPair::generate();
        let (x, y) = pair.public_coordinates();
        assert_eq!(Base64UrlUnpadded::decode_vec(&x).unwrap().len(), 32);
        assert_eq!(Base64UrlUnpadded::decode_vec(&y).unwrap().len(), 32);
    }

    #[test]
    fn coordinates_rebuild_the_sec1_point() {
        let pair = KeyPair::generate();
        let (x, y) = pair.public_coordinates();

        let mut sec1 = vec![0x04];
        sec1.extend(Base64UrlUnpadded::decode_vec(&x).unwrap());
        sec1.extend(Base64UrlUnpadded::decode_vec(&y).unwrap());
        assert_eq!(sec1, pair.verifying_key().to_encoded_point(false).as_bytes());
        assert_eq!(&VerifyingKey::from_sec1_bytes(&sec1).unwrap(), pair.verifying_key());
    }

    #[test]
    fn key_id_is_fixed() {
        assert_eq!(KeyPair::generate().key_id(), SIGNING_KEY_ID);
        assert_eq!(KeyPair::generate().algorithm(), "ES256");
    }

    #[test]
    fn thumbprint_is_stable_and_key_specific() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_eq!(a.thumbprint(), a.thumbprint());
        assert_ne!(a.thumbprint(), b.thumbprint());
        // SHA-256 digest, unpadded base64url
        assert_eq!(a.thumbprint().len(), 43);
    }

    #[test]
    fn signature_verifies_with_public_key() {
        let pair = KeyPair::generate();
        let bytes = pair.sign(b"header.payload").unwrap();
        assert_eq!(bytes.len(), 64);

        let signature = Signature::from_slice(&bytes).unwrap();
        assert!(pair.verifying_key().verify(b"header.payload", &signature).is_ok());
        assert!(pair.verifying_key().verify(b"header.payload2", &signature).is_err());
    }

    #[test]
    fn debug_does_not_leak_private_scalar() {
        let pair = KeyPair::generate();
        let rendered = format!("{pair:?}");
        assert!(rendered.contains(SIGNING_KEY_ID));
        assert!(!rendered.contains("signing_key"));
    }
}
