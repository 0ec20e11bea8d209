//! AES-GCM-SIV authenticated encryption over raw key bytes.
//!
//! **Algorithm choice:** AES-GCM-SIV (RFC 8452) is nonce-misuse-resistant.
//! Repeating a nonce only reveals whether two (plaintext, associated data)
//! pairs were equal, which is exactly the leak a deterministic AEAD accepts.
//! The same key therefore backs both capabilities:
//!
//! - [`Aead`]: a fresh random nonce per call, output `nonce || ciphertext || tag`;
//! - [`DeterministicAead`]: the all-zero nonce, output `ciphertext || tag`.
//!
//! **Do NOT substitute plain AES-GCM here.** GCM nonce reuse is catastrophic.

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead as _, KeyInit, OsRng, Payload},
    Aes128GcmSiv, Aes256GcmSiv, Nonce,
};
use keyset_common::KeysetError;
use thiserror::Error;

use crate::primitives::{Aead, DeterministicAead};

/// Accepted key lengths in bytes (AES-128 and AES-256).
pub const KEY_SIZES: [usize; 2] = [16, 32];

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the authentication tag.
pub const TAG_LEN: usize = 16;

const DETERMINISTIC_NONCE: [u8; NONCE_LEN] = [0u8; NONCE_LEN];

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key is neither 16 nor 32 bytes long.
    #[error("invalid AES-GCM-SIV key length: {0} bytes")]
    InvalidKeyLength(usize),

    /// The ciphertext cannot even hold a tag (and nonce, when randomised).
    #[error("ciphertext too short")]
    CiphertextTooShort,

    /// AES-GCM-SIV encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,
}

impl From<CipherError> for KeysetError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::InvalidKeyLength(_) => KeysetError::InvalidKey(e.to_string()),
            _ => KeysetError::Crypto(e.to_string()),
        }
    }
}

enum Cipher {
    Aes128(Aes128GcmSiv),
    Aes256(Aes256GcmSiv),
}

/// AES-GCM-SIV primitive keyed with 16 or 32 bytes.
pub struct AesGcmSiv {
    cipher: Cipher,
}

impl AesGcmSiv {
    /// Build a cipher from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] unless `key` is 16 or 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let cipher = match key.len() {
            16 => Aes128GcmSiv::new_from_slice(key).map(Cipher::Aes128),
            32 => Aes256GcmSiv::new_from_slice(key).map(Cipher::Aes256),
            n => return Err(CipherError::InvalidKeyLength(n)),
        }
        .map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
        Ok(Self { cipher })
    }

    fn seal(&self, nonce: &[u8; NONCE_LEN], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload { msg, aad };
        let sealed = match &self.cipher {
            Cipher::Aes128(c) => c.encrypt(nonce, payload),
            Cipher::Aes256(c) => c.encrypt(nonce, payload),
        };
        sealed.map_err(|_| CipherError::AeadFailure)
    }

    fn open(&self, nonce: &[u8], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        if msg.len() < TAG_LEN {
            return Err(CipherError::CiphertextTooShort);
        }
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload { msg, aad };
        let opened = match &self.cipher {
            Cipher::Aes128(c) => c.decrypt(nonce, payload),
            Cipher::Aes256(c) => c.decrypt(nonce, payload),
        };
        opened.map_err(|_| CipherError::AeadFailure)
    }
}

impl Aead for AesGcmSiv {
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, KeysetError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let sealed = self.seal(&nonce, plaintext, associated_data)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, KeysetError> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::CiphertextTooShort.into());
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        Ok(self.open(nonce, sealed, associated_data)?)
    }
}

impl DeterministicAead for AesGcmSiv {
    fn encrypt_deterministically(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, KeysetError> {
        Ok(self.seal(&DETERMINISTIC_NONCE, plaintext, associated_data)?)
    }

    fn decrypt_deterministically(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, KeysetError> {
        Ok(self.open(&DETERMINISTIC_NONCE, ciphertext, associated_data)?)
    }
}
