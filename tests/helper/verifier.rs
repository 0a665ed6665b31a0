//! Signature verifier stand-in

use hc_install::error::VerifyError;
use hc_install::releases::SignatureVerifier;

/// Signature bytes accepted by [`FakeVerifier`]
pub const TRUSTED_SIGNATURE: &[u8] = b"trusted-signature";

/// Accepts exactly [`TRUSTED_SIGNATURE`], over any manifest
pub struct FakeVerifier;

impl SignatureVerifier for FakeVerifier {
    fn verify(&self, _message: &[u8], signature: &[u8]) -> Result<(), VerifyError> {
        if signature == TRUSTED_SIGNATURE {
            Ok(())
        } else {
            Err(VerifyError::BadSignature("unknown signer".to_string()))
        }
    }
}
