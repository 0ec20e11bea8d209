//! Multi-key AEAD.

use std::sync::Arc;

use keyset_common::{KeysetError, PrimitiveKind};

use super::{ensure_kind, prefixed, try_candidates, PrimitiveWrapper};
use crate::primitive_set::{Entry, PrimitiveSet};
use crate::primitives::{Aead, Primitive};

/// Wraps AEAD primitive sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct AeadWrapper;

impl PrimitiveWrapper for AeadWrapper {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Aead
    }

    fn wrap(&self, set: Arc<PrimitiveSet>) -> Result<Primitive, KeysetError> {
        ensure_kind(&set, PrimitiveKind::Aead)?;
        let primary = set.primary().primitive().clone().into_aead()?;
        Ok(Primitive::Aead(Arc::new(WrappedAead { set, primary })))
    }
}

struct WrappedAead {
    set: Arc<PrimitiveSet>,
    primary: Arc<dyn Aead>,
}

fn candidate(entry: &Entry) -> Result<&dyn Aead, KeysetError> {
    entry.primitive().as_aead().ok_or(KeysetError::AllCandidatesFailed)
}

impl Aead for WrappedAead {
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, KeysetError> {
        let ciphertext = self.primary.encrypt(plaintext, associated_data)?;
        Ok(prefixed(self.set.primary().identifier(), ciphertext))
    }

    fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, KeysetError> {
        try_candidates(&self.set, ciphertext, |entry, payload| {
            candidate(entry)?.decrypt(payload, associated_data)
        })
    }
}
