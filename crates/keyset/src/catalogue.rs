//! Catalogues: named sources of key managers and wrappers for one primitive.
//!
//! Bootstrap code asks a catalogue for the manager of a key type and then
//! registers what it gets through a [`Registrar`]. Swapping a catalogue swaps
//! the implementation behind a primitive without touching callers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use keyset_common::{KeysetError, PrimitiveKind};

use crate::key_manager::{AesGcmSivKeyManager, HmacKeyManager, KeyManager, KeyManagerImpl};
use crate::registry::{RegistrationOptions, Registry};
use crate::wrapper::{AeadWrapper, DeterministicAeadWrapper, MacWrapper, PrimitiveWrapper};

/// A source of key managers and the wrapper for one primitive.
pub trait Catalogue: Send + Sync {
    /// The manager for `type_url` producing `primitive_name`, at version
    /// `min_version` or newer. Primitive names ignore ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::NotFound`] when the catalogue does not serve the
    /// primitive, does not know the key type, or only has an older manager.
    fn key_manager(
        &self,
        type_url: &str,
        primitive_name: &str,
        min_version: u32,
    ) -> Result<Arc<dyn KeyManager>, KeysetError>;

    /// The wrapper for this catalogue's primitive.
    fn primitive_wrapper(&self) -> Result<Arc<dyn PrimitiveWrapper>, KeysetError>;
}

/// In-memory catalogue serving one primitive kind.
pub struct StandardCatalogue {
    kind: PrimitiveKind,
    wrapper: Arc<dyn PrimitiveWrapper>,
    managers: HashMap<String, Arc<dyn KeyManager>>,
}

impl StandardCatalogue {
    /// A catalogue for `wrapper`'s kind with no managers yet.
    pub fn new(wrapper: Arc<dyn PrimitiveWrapper>) -> Self {
        Self {
            kind: wrapper.kind(),
            wrapper,
            managers: HashMap::new(),
        }
    }

    /// Add `manager`, which must build this catalogue's kind.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::UnsupportedPrimitive`] otherwise.
    pub fn with_manager(mut self, manager: Arc<dyn KeyManager>) -> Result<Self, KeysetError> {
        if !manager.supports_primitive(self.kind) {
            return Err(KeysetError::UnsupportedPrimitive {
                key_type: manager.key_type().to_owned(),
                kind: self.kind,
            });
        }
        self.managers.insert(manager.key_type().to_owned(), manager);
        Ok(self)
    }

    /// The primitive this catalogue serves.
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }
}

impl Catalogue for StandardCatalogue {
    fn key_manager(
        &self,
        type_url: &str,
        primitive_name: &str,
        min_version: u32,
    ) -> Result<Arc<dyn KeyManager>, KeysetError> {
        if PrimitiveKind::from_name(primitive_name) != Some(self.kind) {
            return Err(KeysetError::NotFound(format!(
                "catalogue {} has no support for primitive {primitive_name}",
                self.kind
            )));
        }
        let manager = self
            .managers
            .get(type_url)
            .ok_or_else(|| KeysetError::NotFound(format!("no key manager for key type {type_url}")))?;
        if manager.version() < min_version {
            return Err(KeysetError::NotFound(format!(
                "no key manager for key type {type_url} with version at least {min_version}"
            )));
        }
        Ok(Arc::clone(manager))
    }

    fn primitive_wrapper(&self) -> Result<Arc<dyn PrimitiveWrapper>, KeysetError> {
        Ok(Arc::clone(&self.wrapper))
    }
}

impl fmt::Debug for StandardCatalogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut key_types: Vec<_> = self.managers.keys().collect();
        key_types.sort();
        f.debug_struct("StandardCatalogue")
            .field("kind", &self.kind)
            .field("key_types", &key_types)
            .finish()
    }
}

/// Add the `aead`, `deterministicaead` and `mac` catalogues to `registry`.
///
/// The AEAD and deterministic AEAD catalogues share one AES-GCM-SIV manager
/// instance, so registering it through both is idempotent.
///
/// # Errors
///
/// Returns [`KeysetError::DuplicateRegistration`] if a different catalogue is
/// already registered under any of those names; nothing is added then.
pub fn register_standard_catalogues(registry: &Registry) -> Result<(), KeysetError> {
    let aes: Arc<dyn KeyManager> = Arc::new(KeyManagerImpl::new(AesGcmSivKeyManager)?);
    let hmac: Arc<dyn KeyManager> = Arc::new(KeyManagerImpl::new(HmacKeyManager)?);

    let catalogues = [
        StandardCatalogue::new(Arc::new(AeadWrapper)).with_manager(Arc::clone(&aes))?,
        StandardCatalogue::new(Arc::new(DeterministicAeadWrapper)).with_manager(aes)?,
        StandardCatalogue::new(Arc::new(MacWrapper)).with_manager(hmac)?,
    ];
    registry.add_catalogues(catalogues.map(|catalogue| {
        let name = catalogue.kind().name();
        let catalogue: Arc<dyn Catalogue> = Arc::new(catalogue);
        (name, catalogue)
    }))
}

/// Registration entry point handed to bootstrap code.
#[derive(Debug, Clone, Copy)]
pub struct Registrar<'a> {
    registry: &'a Registry,
    options: RegistrationOptions,
}

impl<'a> Registrar<'a> {
    /// Register into `registry` with default options.
    pub fn new(registry: &'a Registry) -> Self {
        Self::with_options(registry, RegistrationOptions::default())
    }

    /// Register into `registry` with `options`.
    pub fn with_options(registry: &'a Registry, options: RegistrationOptions) -> Self {
        Self { registry, options }
    }

    /// Register `manager` for `key_type`.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::UnsupportedOperation`] if `manager` handles another key type;
    /// - any error of [`Registry::register_key_manager_with`].
    pub fn register(&self, key_type: &str, manager: Arc<dyn KeyManager>) -> Result<(), KeysetError> {
        if !manager.does_support(key_type) {
            return Err(KeysetError::UnsupportedOperation(format!(
                "key manager for {} cannot be registered as {key_type}",
                manager.key_type()
            )));
        }
        self.registry.register_key_manager_with(manager, self.options)
    }

    /// Register `wrapper` for `kind`.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::KindMismatch`] if `wrapper` produces another kind;
    /// - any error of [`Registry::register_primitive_wrapper`].
    pub fn register_wrapper(
        &self,
        kind: PrimitiveKind,
        wrapper: Arc<dyn PrimitiveWrapper>,
    ) -> Result<(), KeysetError> {
        if wrapper.kind() != kind {
            return Err(KeysetError::KindMismatch {
                expected: kind,
                actual: wrapper.kind(),
            });
        }
        self.registry.register_primitive_wrapper(wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_manager::aes_gcm_siv::AES_GCM_SIV_KEY_TYPE;
    use crate::key_manager::hmac::HMAC_KEY_TYPE;

    fn registry() -> Registry {
        let registry = Registry::new();
        register_standard_catalogues(&registry).unwrap();
        registry
    }

    #[test]
    fn primitive_names_ignore_case() {
        let registry = registry();
        let catalogue = registry.catalogue("DeterministicAead").unwrap();
        assert!(catalogue
            .key_manager(AES_GCM_SIV_KEY_TYPE, "DETERMINISTICAEAD", 0)
            .is_ok());
        assert!(catalogue
            .key_manager(AES_GCM_SIV_KEY_TYPE, "deterministicaead", 0)
            .is_ok());
    }

    #[test]
    fn wrong_primitive_or_key_type_not_found() {
        let registry = registry();
        let mac = registry.catalogue("mac").unwrap();
        assert!(matches!(
            mac.key_manager(HMAC_KEY_TYPE, "aead", 0),
            Err(KeysetError::NotFound(_))
        ));
        assert!(matches!(
            mac.key_manager(AES_GCM_SIV_KEY_TYPE, "mac", 0),
            Err(KeysetError::NotFound(_))
        ));
        assert!(matches!(registry.catalogue("streamingaead"), Err(KeysetError::NotFound(_))));
    }

    #[test]
    fn min_version_filters_managers() {
        let registry = registry();
        let aead = registry.catalogue("aead").unwrap();
        let err = aead.key_manager(AES_GCM_SIV_KEY_TYPE, "aead", 1).err();
        assert!(matches!(err, Some(KeysetError::NotFound(msg)) if msg.contains("at least 1")));
    }

    #[test]
    fn aead_catalogues_share_one_manager() {
        let registry = registry();
        let a = registry
            .catalogue("aead")
            .unwrap()
            .key_manager(AES_GCM_SIV_KEY_TYPE, "aead", 0)
            .unwrap();
        let d = registry
            .catalogue("deterministicaead")
            .unwrap()
            .key_manager(AES_GCM_SIV_KEY_TYPE, "deterministicaead", 0)
            .unwrap();
        let registrar = Registrar::new(&registry);
        registrar.register(AES_GCM_SIV_KEY_TYPE, a).unwrap();
        registrar.register(AES_GCM_SIV_KEY_TYPE, d).unwrap();
    }

    #[test]
    fn manager_must_serve_catalogue_kind() {
        let hmac: Arc<dyn KeyManager> = Arc::new(KeyManagerImpl::new(HmacKeyManager).unwrap());
        assert!(matches!(
            StandardCatalogue::new(Arc::new(AeadWrapper)).with_manager(hmac),
            Err(KeysetError::UnsupportedPrimitive { .. })
        ));
    }

    #[test]
    fn registrar_checks_key_type_and_kind() {
        let registry = Registry::new();
        let registrar = Registrar::new(&registry);
        let hmac: Arc<dyn KeyManager> = Arc::new(KeyManagerImpl::new(HmacKeyManager).unwrap());
        assert!(matches!(
            registrar.register(AES_GCM_SIV_KEY_TYPE, Arc::clone(&hmac)),
            Err(KeysetError::UnsupportedOperation(_))
        ));
        registrar.register(HMAC_KEY_TYPE, hmac).unwrap();

        assert!(matches!(
            registrar.register_wrapper(PrimitiveKind::Aead, Arc::new(MacWrapper)),
            Err(KeysetError::KindMismatch { .. })
        ));
        registrar
            .register_wrapper(PrimitiveKind::Mac, Arc::new(MacWrapper))
            .unwrap();
    }

    #[test]
    fn standard_catalogues_register_once() {
        let registry = registry();
        // Fresh catalogue instances under the same names conflict.
        assert!(matches!(
            register_standard_catalogues(&registry),
            Err(KeysetError::DuplicateRegistration(_))
        ));
    }

    #[test]
    fn conflicting_catalogue_leaves_registry_untouched() {
        let registry = Registry::new();
        let mac: Arc<dyn Catalogue> = Arc::new(StandardCatalogue::new(Arc::new(MacWrapper)));
        registry.add_catalogue("MAC", mac).unwrap();

        assert!(matches!(
            register_standard_catalogues(&registry),
            Err(KeysetError::DuplicateRegistration(_))
        ));
        assert!(matches!(registry.catalogue("aead"), Err(KeysetError::NotFound(_))));
        assert!(matches!(
            registry.catalogue("deterministicaead"),
            Err(KeysetError::NotFound(_))
        ));
    }
}
