//! The closed set of primitive capabilities a key manager can produce.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A primitive capability.
///
/// Every key manager declares which of these it can build, every primitive set
/// holds primitives of exactly one kind, and every wrapper produces exactly one
/// kind. Adding an algorithm family means adding a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// Authenticated encryption with associated data.
    Aead,
    /// Deterministic authenticated encryption.
    DeterministicAead,
    /// Message authentication codes.
    Mac,
    /// Digital signature creation.
    PublicKeySign,
    /// Digital signature verification.
    PublicKeyVerify,
    /// Hybrid (public-key) encryption.
    HybridEncrypt,
    /// Hybrid (public-key) decryption.
    HybridDecrypt,
}

impl PrimitiveKind {
    /// Every kind, in declaration order.
    pub const ALL: [PrimitiveKind; 7] = [
        PrimitiveKind::Aead,
        PrimitiveKind::DeterministicAead,
        PrimitiveKind::Mac,
        PrimitiveKind::PublicKeySign,
        PrimitiveKind::PublicKeyVerify,
        PrimitiveKind::HybridEncrypt,
        PrimitiveKind::HybridDecrypt,
    ];

    /// Canonical lowercase primitive name, as used by catalogues.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Aead => "aead",
            PrimitiveKind::DeterministicAead => "deterministicaead",
            PrimitiveKind::Mac => "mac",
            PrimitiveKind::PublicKeySign => "publickeysign",
            PrimitiveKind::PublicKeyVerify => "publickeyverify",
            PrimitiveKind::HybridEncrypt => "hybridencrypt",
            PrimitiveKind::HybridDecrypt => "hybriddecrypt",
        }
    }

    /// Resolve a primitive name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
