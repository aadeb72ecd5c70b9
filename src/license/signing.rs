//! License signing.
//!
//! Ed25519 over [`License::signing_bytes`]. The signer holds the private key
//! together with the public key published to reading systems (the
//! "certificate"); the two must match or nothing gets signed.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use tracing::debug;

use super::model::{decode_base64, encode_base64, License, Signature};
use crate::error::{constants, LcpError, Result};
use crate::utils::crypto::random_key;

/// Signature algorithm identifier written into licenses
pub const ALGORITHM_ED25519: &str = "http://www.w3.org/2021/04/xmldsig-more#eddsa-ed25519";

pub struct LicenseSigner {
    signing_key: SigningKey,
    certificate: VerifyingKey,
}

impl LicenseSigner {
    /// Pair a private key with the certificate it is published under.
    pub fn new(signing_key: SigningKey, certificate: VerifyingKey) -> Self {
        Self {
            signing_key,
            certificate,
        }
    }

    /// Signer whose certificate is derived from the key itself.
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let certificate = signing_key.verifying_key();
        Self::new(signing_key, certificate)
    }

    /// Fresh random key pair, for tests and development servers.
    pub fn generate() -> Self {
        Self::from_secret(&random_key())
    }

    pub fn certificate(&self) -> &VerifyingKey {
        &self.certificate
    }

    /// Certificate as written into signatures
    pub fn certificate_base64(&self) -> String {
        encode_base64(self.certificate.as_bytes())
    }

    /// Sign the license as it stands. Any later change to the license
    /// invalidates the result.
    pub fn sign(&self, license: &License) -> Result<Signature> {
        if self.signing_key.verifying_key() != self.certificate {
            return Err(LcpError::SigningError(
                constants::ERR_KEY_CERT_MISMATCH.into(),
            ));
        }

        let bytes = license.signing_bytes()?;
        let signature = self.signing_key.sign(&bytes);
        debug!(license_id = %license.id, signed_bytes = bytes.len(), "License signed");

        Ok(Signature {
            algorithm: ALGORITHM_ED25519.to_string(),
            certificate: self.certificate_base64(),
            value: encode_base64(&signature.to_bytes()),
        })
    }
}

/// Check a license signature against the certificate it carries.
pub fn verify_signature(license: &License) -> Result<()> {
    let signature = license
        .signature
        .as_ref()
        .ok_or_else(|| LcpError::SigningError("license is not signed".into()))?;

    if signature.algorithm != ALGORITHM_ED25519 {
        return Err(LcpError::SigningError(format!(
            "unsupported signature algorithm: {}",
            signature.algorithm
        )));
    }

    let cert_bytes: [u8; 32] = decode_base64(&signature.certificate)?
        .try_into()
        .map_err(|_| LcpError::SigningError("certificate must be 32 bytes".into()))?;
    let certificate = VerifyingKey::from_bytes(&cert_bytes)
        .map_err(|e| LcpError::SigningError(format!("invalid certificate: {e}")))?;

    let value = decode_base64(&signature.value)?;
    let signature = ed25519_dalek::Signature::from_slice(&value)
        .map_err(|e| LcpError::SigningError(format!("invalid signature value: {e}")))?;

    certificate
        .verify(&license.signing_bytes()?, &signature)
        .map_err(|e| LcpError::SigningError(format!("signature mismatch: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn license() -> License {
        License {
            id: "lic-1".into(),
            content_id: "content-1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = LicenseSigner::generate();
        let mut license = license();
        license.signature = Some(signer.sign(&license).unwrap());

        verify_signature(&license).unwrap();
        assert_eq!(
            license.signature.as_ref().unwrap().certificate,
            signer.certificate_base64()
        );
    }

    #[test]
    fn test_mutation_invalidates_signature() {
        let signer = LicenseSigner::generate();
        let mut license = license();
        license.signature = Some(signer.sign(&license).unwrap());

        license.rights.print = Some(100);
        assert!(matches!(
            verify_signature(&license),
            Err(LcpError::SigningError(_))
        ));
    }

    #[test]
    fn test_key_certificate_mismatch() {
        let key = SigningKey::from_bytes(&random_key());
        let other = SigningKey::from_bytes(&random_key()).verifying_key();
        let signer = LicenseSigner::new(key, other);

        assert!(matches!(
            signer.sign(&license()),
            Err(LcpError::SigningError(_))
        ));
    }
}
