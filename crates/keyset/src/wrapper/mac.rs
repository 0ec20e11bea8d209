//! Multi-key MAC.
//!
//! Tags are `prefix || tag`. LEGACY keys authenticate `data || 0x00`.

use std::sync::Arc;

use keyset_common::{KeysetError, PrimitiveKind};

use super::{authenticated_data, ensure_kind, prefixed, try_candidates, PrimitiveWrapper};
use crate::primitive_set::PrimitiveSet;
use crate::primitives::{Mac, Primitive};

/// Wraps MAC primitive sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacWrapper;

impl PrimitiveWrapper for MacWrapper {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Mac
    }

    fn wrap(&self, set: Arc<PrimitiveSet>) -> Result<Primitive, KeysetError> {
        ensure_kind(&set, PrimitiveKind::Mac)?;
        let primary = set.primary().primitive().clone().into_mac()?;
        Ok(Primitive::Mac(Arc::new(WrappedMac { set, primary })))
    }
}

struct WrappedMac {
    set: Arc<PrimitiveSet>,
    primary: Arc<dyn Mac>,
}

impl Mac for WrappedMac {
    fn compute_mac(&self, data: &[u8]) -> Result<Vec<u8>, KeysetError> {
        let entry = self.set.primary();
        let tag = self
            .primary
            .compute_mac(&authenticated_data(entry.output_prefix_type(), data))?;
        Ok(prefixed(entry.identifier(), tag))
    }

    fn verify_mac(&self, tag: &[u8], data: &[u8]) -> Result<(), KeysetError> {
        try_candidates(&self.set, tag, |entry, payload| {
            entry
                .primitive()
                .as_mac()
                .ok_or(KeysetError::AllCandidatesFailed)?
                .verify_mac(payload, &authenticated_data(entry.output_prefix_type(), data))
        })
    }
}
