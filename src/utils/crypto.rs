//! Symmetric encryption for license fields.
//!
//! XChaCha20-Poly1305 with a random 24-byte nonce. Sealed values are laid out
//! as `nonce || ciphertext+tag` so a single opaque byte string carries
//! everything a client needs to decrypt with the right key.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{constants, LcpError, Result};

/// Nonce length for XChaCha20-Poly1305
pub const NONCE_LEN: usize = 24;

/// Key length for every symmetric key handled by the crate
pub const KEY_LEN: usize = 32;

/// Algorithm identifier recorded for values sealed by [`Crypto`]
pub const ALGORITHM_XCHACHA20_POLY1305: &str =
    "https://datatracker.ietf.org/doc/html/draft-irtf-cfrg-xchacha#xchacha20-poly1305";

/// Algorithm identifier of the user key derivation (SHA-256 of the passphrase)
pub const ALGORITHM_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

pub struct Crypto {
    cipher: XChaCha20Poly1305,
}

impl Crypto {
    /// Build a cipher from raw key material. Anything but 32 bytes is rejected.
    pub fn new(key: &[u8]) -> Result<Self> {
        let cipher = XChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| LcpError::EncryptionError(constants::ERR_INVALID_KEY_LENGTH.into()))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, data: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
        self.cipher
            .encrypt(XNonce::from_slice(nonce), data)
            .map_err(|_| LcpError::EncryptionError(constants::ERR_ENCRYPTION_FAILED.into()))
    }

    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| LcpError::EncryptionError(constants::ERR_DECRYPTION_FAILED.into()))
    }

    /// Encrypt under a fresh nonce and prepend the nonce.
    pub fn seal(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = Self::generate_nonce()?;
        let ciphertext = self.encrypt(data, &nonce)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend(ciphertext);

        nonce.zeroize();
        Ok(sealed)
    }

    /// Reverse of [`Crypto::seal`].
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(LcpError::EncryptionError(
                constants::ERR_DECRYPTION_FAILED.into(),
            ));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);

        let plaintext = self.decrypt(ciphertext, &nonce);
        nonce.zeroize();
        plaintext
    }

    /// Generate a random nonce from the OS RNG
    pub fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce)
            .map_err(|e| LcpError::EncryptionError(format!("nonce generation failed: {e}")))?;
        Ok(nonce)
    }
}

/// Generate random symmetric key material
pub fn random_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    key
}

/// SHA-256 digest of `data`
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Derive the user key from a passphrase, as a reading system would.
pub fn user_key_from_passphrase(passphrase: &str) -> [u8; KEY_LEN] {
    sha256(passphrase.as_bytes())
}
