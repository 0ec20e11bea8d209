//! Key managers, registry, primitive sets and wrappers for rotating keysets.
//!
//! # Flow
//!
//! 1. Bootstrap a [`Registry`]: [`RegistryConfig::apply`] adds catalogues and
//!    registers key managers plus the wrapper for each primitive they build.
//! 2. Load or generate a [`KeysetHandle`].
//! 3. [`KeysetHandle::primitive`] turns every enabled key into a primitive via
//!    its [`KeyManager`], collects them into a [`PrimitiveSet`] and wraps the
//!    set into one [`Primitive`] that encrypts with the primary key and
//!    decrypts with whichever key matches.

pub mod catalogue;
pub mod config;
pub mod crypto;
pub mod key_manager;
pub mod keyset_handle;
pub mod keyset_manager;
pub mod prefix;
pub mod primitive_set;
pub mod primitives;
pub mod registry;
pub mod telemetry;
pub mod wrapper;

pub use catalogue::{Catalogue, Registrar, StandardCatalogue};
pub use config::RegistryConfig;
pub use key_manager::{KeyFactory, KeyManager, KeyManagerImpl, KeyTypeManager, PrimitiveFactory};
pub use keyset_common::{
    KeyData, KeyEntry, KeyInfo, KeyMaterial, KeyMaterialType, KeyStatus, KeyTemplate, Keyset,
    KeysetError, KeysetInfo, OutputPrefixType, PrimitiveKind,
};
pub use keyset_handle::KeysetHandle;
pub use keyset_manager::KeysetManager;
pub use primitive_set::{PrimitiveSet, PrimitiveSetBuilder};
pub use primitives::{
    Aead, DeterministicAead, HybridDecrypt, HybridEncrypt, Mac, Primitive, PublicKeySign,
    PublicKeyVerify,
};
pub use registry::{RegistrationOptions, Registry};
pub use wrapper::PrimitiveWrapper;

use anyhow::{Context, Result};

/// Read [`RegistryConfig`] from the environment, install logging and populate
/// [`Registry::global`].
///
/// # Errors
///
/// Returns an error if the configuration is invalid, a subscriber is already
/// installed, or a registration fails.
pub fn init_from_env() -> Result<&'static Registry> {
    let config = RegistryConfig::from_env().context("failed to load keyset configuration")?;
    telemetry::init_telemetry(&config.log_level)?;
    let registry = Registry::global();
    config
        .apply(registry)
        .context("failed to populate the global registry")?;
    Ok(registry)
}
