//! Concrete primitives backing the built-in key managers.
//!
//! This module is intentionally free of keyset, registry and serialization
//! concerns. It turns raw key bytes into objects implementing the capability
//! traits of [`crate::primitives`].
//!
//! # Output formats
//!
//! ```text
//! AEAD:               nonce(12) || ciphertext || tag(16)
//! Deterministic AEAD: ciphertext || tag(16)
//! MAC:                leftmost tag_size bytes of HMAC(key, data)
//! ```
//!
//! Identifier prefixes are added by the wrappers, never here.

pub mod cipher;
pub mod mac;

pub use cipher::AesGcmSiv;
pub use mac::{HashType, HmacSha2};

use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};

/// Fill a fresh buffer of `len` bytes from the operating system RNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Random non-zero `u32`, used for key ids.
pub fn random_key_id() -> u32 {
    loop {
        let id = OsRng.next_u32();
        if id != 0 {
            return id;
        }
    }
}
