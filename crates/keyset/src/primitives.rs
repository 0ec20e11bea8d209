//! Capability interfaces implemented by concrete algorithms and by wrappers.
//!
//! A [`Primitive`] is the closed, tagged union of every capability; key
//! managers return one, primitive sets hold them and wrappers produce them.

use std::fmt;
use std::sync::Arc;

use keyset_common::{KeysetError, PrimitiveKind};

/// Authenticated encryption with associated data.
#[cfg_attr(test, mockall::automock)]
pub trait Aead: Send + Sync {
    /// Encrypt `plaintext`, binding `associated_data` to the ciphertext.
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, KeysetError>;

    /// Decrypt and authenticate `ciphertext` against `associated_data`.
    fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, KeysetError>;
}

/// Deterministic authenticated encryption: equal inputs give equal ciphertexts.
#[cfg_attr(test, mockall::automock)]
pub trait DeterministicAead: Send + Sync {
    /// Deterministically encrypt `plaintext` bound to `associated_data`.
    fn encrypt_deterministically(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, KeysetError>;

    /// Decrypt and authenticate a deterministic ciphertext.
    fn decrypt_deterministically(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, KeysetError>;
}

/// Message authentication codes.
#[cfg_attr(test, mockall::automock)]
pub trait Mac: Send + Sync {
    /// Compute a tag over `data`.
    fn compute_mac(&self, data: &[u8]) -> Result<Vec<u8>, KeysetError>;

    /// Verify that `tag` authenticates `data`.
    fn verify_mac(&self, tag: &[u8], data: &[u8]) -> Result<(), KeysetError>;
}

/// Digital signature creation.
#[cfg_attr(test, mockall::automock)]
pub trait PublicKeySign: Send + Sync {
    /// Sign `data`.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeysetError>;
}

/// Digital signature verification.
#[cfg_attr(test, mockall::automock)]
pub trait PublicKeyVerify: Send + Sync {
    /// Verify `signature` over `data`.
    fn verify(&self, signature: &[u8], data: &[u8]) -> Result<(), KeysetError>;
}

/// Hybrid encryption to a public key.
#[cfg_attr(test, mockall::automock)]
pub trait HybridEncrypt: Send + Sync {
    /// Encrypt `plaintext`, binding `context_info` to the ciphertext.
    fn encrypt(&self, plaintext: &[u8], context_info: &[u8]) -> Result<Vec<u8>, KeysetError>;
}

/// Hybrid decryption with a private key.
#[cfg_attr(test, mockall::automock)]
pub trait HybridDecrypt: Send + Sync {
    /// Decrypt `ciphertext` bound to `context_info`.
    fn decrypt(&self, ciphertext: &[u8], context_info: &[u8]) -> Result<Vec<u8>, KeysetError>;
}

/// A live primitive of one [`PrimitiveKind`].
///
/// Primitives are stateless after construction and shared behind `Arc`.
#[derive(Clone)]
pub enum Primitive {
    /// See [`Aead`].
    Aead(Arc<dyn Aead>),
    /// See [`DeterministicAead`].
    DeterministicAead(Arc<dyn DeterministicAead>),
    /// See [`Mac`].
    Mac(Arc<dyn Mac>),
    /// See [`PublicKeySign`].
    PublicKeySign(Arc<dyn PublicKeySign>),
    /// See [`PublicKeyVerify`].
    PublicKeyVerify(Arc<dyn PublicKeyVerify>),
    /// See [`HybridEncrypt`].
    HybridEncrypt(Arc<dyn HybridEncrypt>),
    /// See [`HybridDecrypt`].
    HybridDecrypt(Arc<dyn HybridDecrypt>),
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Primitive").field(&self.kind()).finish()
    }
}

macro_rules! accessors {
    ($($variant:ident => $as_fn:ident, $into_fn:ident;)*) => {
        $(
            #[doc = concat!("Borrow the [`", stringify!($variant), "`] capability, if this is one.")]
            pub fn $as_fn(&self) -> Option<&dyn $variant> {
                match self {
                    Primitive::$variant(p) => Some(p.as_ref()),
                    _ => None,
                }
            }

            #[doc = concat!("Take the [`", stringify!($variant), "`] capability.")]
            ///
            /// # Errors
            ///
            /// Returns [`KeysetError::KindMismatch`] for any other kind.
            pub fn $into_fn(self) -> Result<Arc<dyn $variant>, KeysetError> {
                match self {
                    Primitive::$variant(p) => Ok(p),
                    other => Err(KeysetError::KindMismatch {
                        expected: PrimitiveKind::$variant,
                        actual: other.kind(),
                    }),
                }
            }
        )*
    };
}

impl Primitive {
    /// The capability this primitive provides.
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Aead(_) => PrimitiveKind::Aead,
            Primitive::DeterministicAead(_) => PrimitiveKind::DeterministicAead,
            Primitive::Mac(_) => PrimitiveKind::Mac,
            Primitive::PublicKeySign(_) => PrimitiveKind::PublicKeySign,
            Primitive::PublicKeyVerify(_) => PrimitiveKind::PublicKeyVerify,
            Primitive::HybridEncrypt(_) => PrimitiveKind::HybridEncrypt,
            Primitive::HybridDecrypt(_) => PrimitiveKind::HybridDecrypt,
        }
    }

    accessors! {
        Aead => as_aead, into_aead;
        DeterministicAead => as_deterministic_aead, into_deterministic_aead;
        Mac => as_mac, into_mac;
        PublicKeySign => as_public_key_sign, into_public_key_sign;
        PublicKeyVerify => as_public_key_verify, into_public_key_verify;
        HybridEncrypt => as_hybrid_encrypt, into_hybrid_encrypt;
        HybridDecrypt => as_hybrid_decrypt, into_hybrid_decrypt;
    }
}
