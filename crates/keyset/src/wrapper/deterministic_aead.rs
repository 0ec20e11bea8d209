//! Multi-key deterministic AEAD.

use std::sync::Arc;

use keyset_common::{KeysetError, PrimitiveKind};

use super::{ensure_kind, prefixed, try_candidates, PrimitiveWrapper};
use crate::primitive_set::PrimitiveSet;
use crate::primitives::{DeterministicAead, Primitive};

/// Wraps deterministic AEAD primitive sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeterministicAeadWrapper;

impl PrimitiveWrapper for DeterministicAeadWrapper {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::DeterministicAead
    }

    fn wrap(&self, set: Arc<PrimitiveSet>) -> Result<Primitive, KeysetError> {
        ensure_kind(&set, PrimitiveKind::DeterministicAead)?;
        let primary = set.primary().primitive().clone().into_deterministic_aead()?;
        Ok(Primitive::DeterministicAead(Arc::new(WrappedDeterministicAead { set, primary })))
    }
}

struct WrappedDeterministicAead {
    set: Arc<PrimitiveSet>,
    primary: Arc<dyn DeterministicAead>,
}

impl DeterministicAead for WrappedDeterministicAead {
    fn encrypt_deterministically(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, KeysetError> {
        let ciphertext = self.primary.encrypt_deterministically(plaintext, associated_data)?;
        Ok(prefixed(self.set.primary().identifier(), ciphertext))
    }

    fn decrypt_deterministically(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, KeysetError> {
        try_candidates(&self.set, ciphertext, |entry, payload| {
            entry
                .primitive()
                .as_deterministic_aead()
                .ok_or(KeysetError::AllCandidatesFailed)?
                .decrypt_deterministically(payload, associated_data)
        })
    }
}
