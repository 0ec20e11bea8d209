//! Multi-key hybrid encryption and decryption.

use std::sync::Arc;

use keyset_common::{KeysetError, PrimitiveKind};

use super::{ensure_kind, prefixed, try_candidates, PrimitiveWrapper};
use crate::primitive_set::PrimitiveSet;
use crate::primitives::{HybridDecrypt, HybridEncrypt, Primitive};

/// Wraps hybrid encryption sets; only the primary encrypts.
#[derive(Debug, Default, Clone, Copy)]
pub struct HybridEncryptWrapper;

impl PrimitiveWrapper for HybridEncryptWrapper {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::HybridEncrypt
    }

    fn wrap(&self, set: Arc<PrimitiveSet>) -> Result<Primitive, KeysetError> {
        ensure_kind(&set, PrimitiveKind::HybridEncrypt)?;
        let primary = set.primary().primitive().clone().into_hybrid_encrypt()?;
        Ok(Primitive::HybridEncrypt(Arc::new(WrappedHybridEncrypt { set, primary })))
    }
}

struct WrappedHybridEncrypt {
    set: Arc<PrimitiveSet>,
    primary: Arc<dyn HybridEncrypt>,
}

impl HybridEncrypt for WrappedHybridEncrypt {
    fn encrypt(&self, plaintext: &[u8], context_info: &[u8]) -> Result<Vec<u8>, KeysetError> {
        let ciphertext = self.primary.encrypt(plaintext, context_info)?;
        Ok(prefixed(self.set.primary().identifier(), ciphertext))
    }
}

/// Wraps hybrid decryption sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct HybridDecryptWrapper;

impl PrimitiveWrapper for HybridDecryptWrapper {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::HybridDecrypt
    }

    fn wrap(&self, set: Arc<PrimitiveSet>) -> Result<Primitive, KeysetError> {
        ensure_kind(&set, PrimitiveKind::HybridDecrypt)?;
        Ok(Primitive::HybridDecrypt(Arc::new(WrappedHybridDecrypt { set })))
    }
}

struct WrappedHybridDecrypt {
    set: Arc<PrimitiveSet>,
}

impl HybridDecrypt for WrappedHybridDecrypt {
    fn decrypt(&self, ciphertext: &[u8], context_info: &[u8]) -> Result<Vec<u8>, KeysetError> {
        try_candidates(&self.set, ciphertext, |entry, payload| {
            entry
                .primitive()
                .as_hybrid_decrypt()
                .ok_or(KeysetError::AllCandidatesFailed)?
                .decrypt(payload, context_info)
        })
    }
}
