//! Keyset data model, primitive kinds, and errors shared across the keyset crates.

pub mod error;
pub mod keyset;
pub mod kind;

pub use error::KeysetError;
pub use keyset::{
    KeyData, KeyEntry, KeyInfo, KeyMaterial, KeyMaterialType, KeyStatus, KeyTemplate, Keyset,
    KeysetInfo, OutputPrefixType,
};
pub use kind::PrimitiveKind;
