//! Wrappers turn a [`PrimitiveSet`] into one primitive of the same kind.
//!
//! Every wrapper follows the same policy:
//!
//! - single-key operations (encrypt, sign, compute) use the primary entry and
//!   prepend its identifier prefix;
//! - multi-key operations (decrypt, verify) try the entries matching the input's
//!   leading prefix first, then every RAW entry on the full input, sequentially
//!   and in keyset order. The first success wins. When nothing succeeds the
//!   caller sees [`KeysetError::AllCandidatesFailed`] and nothing else.

pub mod aead;
pub mod deterministic_aead;
pub mod hybrid;
pub mod mac;
pub mod signature;

pub use self::aead::AeadWrapper;
pub use self::deterministic_aead::DeterministicAeadWrapper;
pub use self::hybrid::{HybridDecryptWrapper, HybridEncryptWrapper};
pub use self::mac::MacWrapper;
pub use self::signature::{PublicKeySignWrapper, PublicKeyVerifyWrapper};

use std::sync::Arc;

use keyset_common::{KeysetError, OutputPrefixType, PrimitiveKind};
use tracing::debug;

use crate::prefix;
use crate::primitive_set::{Entry, PrimitiveSet};
use crate::primitives::Primitive;

/// Combines a primitive set into a single primitive.
pub trait PrimitiveWrapper: Send + Sync {
    /// The kind of primitive this wrapper consumes and produces.
    fn kind(&self) -> PrimitiveKind;

    /// Wrap `set` into one primitive of [`PrimitiveWrapper::kind`].
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::KindMismatch`] if `set` holds another kind.
    fn wrap(&self, set: Arc<PrimitiveSet>) -> Result<Primitive, KeysetError>;
}

/// One wrapper per supported kind.
pub fn standard_wrappers() -> Vec<Arc<dyn PrimitiveWrapper>> {
    vec![
        Arc::new(AeadWrapper),
        Arc::new(DeterministicAeadWrapper),
        Arc::new(MacWrapper),
        Arc::new(PublicKeySignWrapper),
        Arc::new(PublicKeyVerifyWrapper),
        Arc::new(HybridEncryptWrapper),
        Arc::new(HybridDecryptWrapper),
    ]
}

/// Byte appended to the data authenticated by LEGACY MAC and signature keys.
pub const LEGACY_DATA_SUFFIX: u8 = 0x00;

pub(crate) fn ensure_kind(set: &PrimitiveSet, expected: PrimitiveKind) -> Result<(), KeysetError> {
    if set.kind() != expected {
        return Err(KeysetError::KindMismatch {
            expected,
            actual: set.kind(),
        });
    }
    Ok(())
}

/// `prefix || body`.
pub(crate) fn prefixed(prefix: &[u8], body: Vec<u8>) -> Vec<u8> {
    if prefix.is_empty() {
        return body;
    }
    let mut out = Vec::with_capacity(prefix.len() + body.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(&body);
    out
}

/// The bytes a key actually authenticates: `data || 0x00` for LEGACY keys.
pub(crate) fn authenticated_data(output_prefix_type: OutputPrefixType, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 1);
    out.extend_from_slice(data);
    if output_prefix_type == OutputPrefixType::Legacy {
        out.push(LEGACY_DATA_SUFFIX);
    }
    out
}

/// Run `op` on every candidate for `input` until one succeeds.
///
/// Prefixed candidates receive the input without its prefix; RAW candidates
/// receive it whole. Per-candidate errors are discarded.
pub(crate) fn try_candidates<T>(
    set: &PrimitiveSet,
    input: &[u8],
    mut op: impl FnMut(&Entry, &[u8]) -> Result<T, KeysetError>,
) -> Result<T, KeysetError> {
    if let Some((prefix, payload)) = prefix::split_prefix(input) {
        for entry in set.entries_for_prefix(prefix) {
            if let Ok(out) = op(entry, payload) {
                return Ok(out);
            }
        }
    }
    for entry in set.raw_entries() {
        if let Ok(out) = op(entry, input) {
            return Ok(out);
        }
    }
    debug!(kind = %set.kind(), "no candidate key accepted the input");
    Err(KeysetError::AllCandidatesFailed)
}


#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::test_support::set_of;
    use super::*;
    use crate::primitives::MockAead;

    fn mock() -> Primitive {
        Primitive::Aead(Arc::new(MockAead::new()))
    }

    #[test]
    fn prefixed_candidates_are_tried_before_raw_ones() {
        let set = set_of(
            PrimitiveKind::Aead,
            vec![
                (mock(), 10, OutputPrefixType::Raw),
                (mock(), 5, OutputPrefixType::Tink),
                (mock(), 11, OutputPrefixType::Raw),
            ],
        );
        let mut input = prefix::output_prefix(5, OutputPrefixType::Tink);
        input.push(0xEE);

        let tried = Mutex::new(Vec::new());
        let result: Result<(), _> = try_candidates(&set, &input, |entry, payload| {
            tried.lock().unwrap().push((entry.key_id(), payload.len()));
            Err(KeysetError::Crypto("nope".into()))
        });

        assert!(matches!(result, Err(KeysetError::AllCandidatesFailed)));
        assert_eq!(*tried.lock().unwrap(), vec![(5, 1), (10, 6), (11, 6)]);
    }

    #[test]
    fn first_success_stops_the_search() {
        let set = set_of(
            PrimitiveKind::Aead,
            vec![
                (mock(), 1, OutputPrefixType::Raw),
                (mock(), 2, OutputPrefixType::Raw),
                (mock(), 3, OutputPrefixType::Raw),
            ],
        );
        let mut tried = Vec::new();
        let winner = try_candidates(&set, b"abc", |entry, _| {
            tried.push(entry.key_id());
            if entry.key_id() == 2 {
                Ok(entry.key_id())
            } else {
                Err(KeysetError::Crypto("nope".into()))
            }
        })
        .unwrap();
        assert_eq!(winner, 2);
        assert_eq!(tried, vec![1, 2]);
    }

    #[test]
    fn short_input_only_reaches_raw_candidates() {
        let set = set_of(
            PrimitiveKind::Aead,
            vec![(mock(), 1, OutputPrefixType::Tink), (mock(), 2, OutputPrefixType::Raw)],
        );
        let mut tried = Vec::new();
        let _ = try_candidates::<()>(&set, &[0x01, 0, 0], |entry, _| {
            tried.push(entry.key_id());
            Err(KeysetError::Crypto("nope".into()))
        });
        assert_eq!(tried, vec![2]);
    }

    #[test]
    fn legacy_keys_authenticate_a_suffixed_message() {
        assert_eq!(authenticated_data(OutputPrefixType::Legacy, b"ab"), b"ab\x00");
        assert_eq!(authenticated_data(OutputPrefixType::Crunchy, b"ab"), b"ab");
        assert_eq!(authenticated_data(OutputPrefixType::Tink, b"ab"), b"ab");
    }

    #[test]
    fn standard_wrappers_cover_every_kind() {
        let kinds: Vec<_> = standard_wrappers().iter().map(|w| w.kind()).collect();
        assert_eq!(kinds, PrimitiveKind::ALL.to_vec());
    }
}
