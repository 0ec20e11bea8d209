//! Identifier prefixes attached to primitive outputs.
//!
//! # Format
//!
//! ```text
//! TINK:            0x01 || big-endian u32 key_id
//! LEGACY, CRUNCHY: 0x00 || big-endian u32 key_id
//! RAW:             (empty)
//! ```
//!
//! A prefix only narrows the candidate keys for decryption and verification;
//! the primitive operation itself still has to succeed.

use keyset_common::OutputPrefixType;

/// Length of every non-empty identifier prefix.
pub const PREFIX_SIZE: usize = 5;

/// Tag byte of [`OutputPrefixType::Tink`] prefixes.
pub const TINK_START_BYTE: u8 = 0x01;

/// Tag byte of [`OutputPrefixType::Legacy`] and [`OutputPrefixType::Crunchy`] prefixes.
pub const LEGACY_START_BYTE: u8 = 0x00;

/// Prefix of RAW outputs.
pub const RAW_PREFIX: &[u8] = &[];

/// Derive the identifier prefix for a key.
pub fn output_prefix(key_id: u32, output_prefix_type: OutputPrefixType) -> Vec<u8> {
    let start = match output_prefix_type {
        OutputPrefixType::Raw => return RAW_PREFIX.to_vec(),
        OutputPrefixType::Tink => TINK_START_BYTE,
        OutputPrefixType::Legacy | OutputPrefixType::Crunchy => LEGACY_START_BYTE,
    };
    let mut prefix = Vec::with_capacity(PREFIX_SIZE);
    prefix.push(start);
    prefix.extend_from_slice(&key_id.to_be_bytes());
    prefix
}

/// Split `input` into its candidate prefix and the remaining payload.
///
/// Returns `None` when `input` is too short to carry a prefix.
pub fn split_prefix(input: &[u8]) -> Option<(&[u8], &[u8])> {
    (input.len() >= PREFIX_SIZE).then(|| input.split_at(PREFIX_SIZE))
}
