//! Multi-key signing and verification.
//!
//! Signatures are `prefix || signature`. LEGACY keys sign `data || 0x00`.

use std::sync::Arc;

use keyset_common::{KeysetError, PrimitiveKind};

use super::{authenticated_data, ensure_kind, prefixed, try_candidates, PrimitiveWrapper};
use crate::primitive_set::PrimitiveSet;
use crate::primitives::{Primitive, PublicKeySign, PublicKeyVerify};

/// Wraps signing primitive sets; only the primary signs.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublicKeySignWrapper;

impl PrimitiveWrapper for PublicKeySignWrapper {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::PublicKeySign
    }

    fn wrap(&self, set: Arc<PrimitiveSet>) -> Result<Primitive, KeysetError> {
        ensure_kind(&set, PrimitiveKind::PublicKeySign)?;
        let primary = set.primary().primitive().clone().into_public_key_sign()?;
        Ok(Primitive::PublicKeySign(Arc::new(WrappedSign { set, primary })))
    }
}

struct WrappedSign {
    set: Arc<PrimitiveSet>,
    primary: Arc<dyn PublicKeySign>,
}

impl PublicKeySign for WrappedSign {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeysetError> {
        let entry = self.set.primary();
        let signature = self
            .primary
            .sign(&authenticated_data(entry.output_prefix_type(), data))?;
        Ok(prefixed(entry.identifier(), signature))
    }
}

/// Wraps verification primitive sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublicKeyVerifyWrapper;

impl PrimitiveWrapper for PublicKeyVerifyWrapper {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::PublicKeyVerify
    }

    fn wrap(&self, set: Arc<PrimitiveSet>) -> Result<Primitive, KeysetError> {
        ensure_kind(&set, PrimitiveKind::PublicKeyVerify)?;
        Ok(Primitive::PublicKeyVerify(Arc::new(WrappedVerify { set })))
    }
}

struct WrappedVerify {
    set: Arc<PrimitiveSet>,
}

impl PublicKeyVerify for WrappedVerify {
    fn verify(&self, signature: &[u8], data: &[u8]) -> Result<(), KeysetError> {
        try_candidates(&self.set, signature, |entry, payload| {
            entry
                .primitive()
                .as_public_key_verify()
                .ok_or(KeysetError::AllCandidatesFailed)?
                .verify(payload, &authenticated_data(entry.output_prefix_type(), data))
        })
    }
}
