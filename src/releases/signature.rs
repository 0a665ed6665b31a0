//! Detached signature verification for checksum manifests

#[cfg(test)]
use mockall::automock;

use std::io::Cursor;

use pgp::{Deserializable, SignedPublicKey, StandaloneSignature};
use tracing::debug;

use crate::error::VerifyError;

/// Verifies a detached signature over exact message bytes
#[cfg_attr(test, automock)]
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), VerifyError>;
}

/// OpenPGP verifier backed by a single ASCII-armored public key
///
/// Signatures made by the primary key or any of its subkeys are accepted.
pub struct PgpVerifier {
    key: SignedPublicKey,
}

impl PgpVerifier {
    pub fn from_armored(armored: &str) -> Result<Self, VerifyError> {
        let (key, _headers) = SignedPublicKey::from_string(armored)
            .map_err(|e| VerifyError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { key })
    }

    fn parse_signature(signature: &[u8]) -> Result<StandaloneSignature, VerifyError> {
        let armored = signature
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .is_some_and(|start| signature[start..].starts_with(b"-----BEGIN PGP SIGNATURE"));

        let parsed = if armored {
            let text = std::str::from_utf8(signature)
                .map_err(|e| VerifyError::BadSignature(e.to_string()))?;
            StandaloneSignature::from_string(text).map(|(sig, _headers)| sig)
        } else {
            StandaloneSignature::from_bytes(Cursor::new(signature))
        };

        parsed.map_err(|e| VerifyError::BadSignature(e.to_string()))
    }
}

impl SignatureVerifier for PgpVerifier {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), VerifyError> {
        let signature = Self::parse_signature(signature)?;

        let primary = signature.verify(&self.key, message);
        if primary.is_ok() {
            debug!("signature verified with primary key");
            return Ok(());
        }

        for subkey in &self.key.public_subkeys {
            if signature.verify(subkey, message).is_ok() {
                debug!("signature verified with subkey");
                return Ok(());
            }
        }

        Err(VerifyError::BadSignature(match primary {
            Err(e) => e.to_string(),
            Ok(()) => "no matching key".to_string(),
        }))
    }
}
