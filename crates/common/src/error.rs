//! The error type shared by every keyset crate.

use thiserror::Error;

use crate::kind::PrimitiveKind;

/// Every failure the key-management layer can report.
///
/// Variants fall into two groups, see [`KeysetError::is_configuration_error`]:
/// - configuration bugs: a missing or conflicting registration, or a request for
///   a capability nobody provides;
/// - data and security failures: malformed or rejected key material, malformed
///   keysets, and failed cryptographic operations.
#[derive(Debug, Error)]
pub enum KeysetError {
    /// Serialized bytes (a key, a key format, a keyset) could not be decoded.
    #[error("failed to parse {what}: {reason}")]
    Parse {
        /// What was being parsed, e.g. the key type identifier.
        what: String,
        /// Decoder diagnostic.
        reason: String,
    },

    /// A well-formed key was rejected by its manager's validation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A well-formed key format was rejected by its manager's validation.
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// The manager does not build primitives of the requested kind.
    #[error("key type {key_type} does not support primitive {kind}")]
    UnsupportedPrimitive {
        /// Key type identifier of the manager that was asked.
        key_type: String,
        /// The requested capability.
        kind: PrimitiveKind,
    },

    /// The manager does not implement the requested operation (e.g. key generation).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// No manager, wrapper or catalogue is registered under the given name.
    #[error("not found: {0}")]
    NotFound(String),

    /// A different object is already registered under the same name.
    #[error("duplicate registration: {0}")]
    DuplicateRegistration(String),

    /// A primitive, primitive set or wrapper of the wrong kind was supplied.
    #[error("expected primitive {expected}, got {actual}")]
    KindMismatch {
        /// Kind the caller asked for.
        expected: PrimitiveKind,
        /// Kind that was actually supplied.
        actual: PrimitiveKind,
    },

    /// The designated primary key is absent, or is not enabled.
    #[error("keyset has no usable primary key: {0}")]
    NoPrimaryKey(String),

    /// No enabled key survived primitive-set construction.
    #[error("keyset contains no enabled keys")]
    EmptyKeyset,

    /// The keyset is structurally invalid, or an operation would make it so.
    #[error("invalid keyset: {0}")]
    InvalidKeyset(String),

    /// Every candidate key failed to decrypt or verify the input.
    ///
    /// Deliberately carries no detail about which keys were tried or why they failed.
    #[error("no matching key found for the input")]
    AllCandidatesFailed,

    /// A single primitive's cryptographic operation failed.
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),
}

impl KeysetError {
    /// Shorthand for a [`KeysetError::Parse`] failure.
    pub fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        KeysetError::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` when the error points at a missing or conflicting
    /// registration rather than at bad data or a failed operation.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            KeysetError::NotFound(_)
                | KeysetError::DuplicateRegistration(_)
                | KeysetError::UnsupportedPrimitive { .. }
                | KeysetError::UnsupportedOperation(_)
                | KeysetError::KindMismatch { .. }
        )
    }
}
