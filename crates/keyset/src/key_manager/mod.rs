//! Key managers: the only gate between serialized key material and live primitives.
//!
//! Algorithm implementations describe a key type through [`KeyTypeManager`]
//! (parse, validate, serialize, one [`PrimitiveFactory`] per capability) and,
//! when they can generate keys, [`KeyFactory`]. [`KeyManagerImpl`] turns that
//! description into the object-safe [`KeyManager`] stored by the registry.
//!
//! # Invariants
//!
//! - Key bytes are always parsed and then validated before any factory runs.
//! - Key formats are always parsed and then validated before a key is created.
//! - A manager only builds the capabilities it declared at construction; a
//!   factory that returns a primitive of another kind is rejected.

pub mod aes_gcm_siv;
pub mod hmac;

pub use self::aes_gcm_siv::AesGcmSivKeyManager;
pub use self::hmac::HmacKeyManager;

use std::collections::BTreeMap;
use std::fmt;

use keyset_common::{KeyData, KeyMaterial, KeyMaterialType, KeysetError, PrimitiveKind};

use crate::primitives::Primitive;

/// Object-safe view of a key manager for one key type.
pub trait KeyManager: Send + Sync {
    /// Key type identifier this manager handles.
    fn key_type(&self) -> &str;

    /// Version of this manager's implementation.
    fn version(&self) -> u32;

    /// Classification of the material this manager produces.
    fn key_material_type(&self) -> KeyMaterialType;

    /// Every capability this manager can build, in ascending order.
    fn primitive_kinds(&self) -> Vec<PrimitiveKind>;

    /// Parse and validate `key_material`, then build a primitive of `kind`.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::UnsupportedPrimitive`] if `kind` was not declared;
    /// - [`KeysetError::Parse`] on malformed bytes;
    /// - [`KeysetError::InvalidKey`] if validation rejects the key.
    fn primitive(&self, key_material: &[u8], kind: PrimitiveKind) -> Result<Primitive, KeysetError>;

    /// Parse and validate `key_format`, then generate and serialize a fresh key.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::UnsupportedOperation`] if the manager is import-only;
    /// - [`KeysetError::Parse`] on malformed bytes;
    /// - [`KeysetError::InvalidKeyFormat`] if validation rejects the format.
    fn new_key(&self, key_format: &[u8]) -> Result<KeyMaterial, KeysetError>;

    /// [`KeyManager::new_key`] packaged with this manager's type and material type.
    fn new_key_data(&self, key_format: &[u8]) -> Result<KeyData, KeysetError> {
        Ok(KeyData {
            type_url: self.key_type().to_owned(),
            value: self.new_key(key_format)?,
            key_material_type: self.key_material_type(),
        })
    }

    /// Returns `true` if this manager handles `key_type`.
    fn does_support(&self, key_type: &str) -> bool {
        self.key_type() == key_type
    }

    /// Returns `true` if this manager can build primitives of `kind`.
    fn supports_primitive(&self, kind: PrimitiveKind) -> bool {
        self.primitive_kinds().contains(&kind)
    }
}

/// Builds one capability from a parsed, validated key.
pub struct PrimitiveFactory<K> {
    kind: PrimitiveKind,
    build: Box<dyn Fn(&K) -> Result<Primitive, KeysetError> + Send + Sync>,
}

impl<K> PrimitiveFactory<K> {
    /// Declare that `build` produces primitives of `kind`.
    pub fn new<F>(kind: PrimitiveKind, build: F) -> Self
    where
        F: Fn(&K) -> Result<Primitive, KeysetError> + Send + Sync + 'static,
    {
        Self {
            kind,
            build: Box::new(build),
        }
    }

    /// The capability this factory produces.
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }
}

/// Key generation half of a key type.
pub trait KeyFactory: Send + Sync {
    /// Parsed key representation.
    type Key;
    /// Parsed key-format representation.
    type KeyFormat;

    /// Decode a serialized key format.
    fn parse_key_format(&self, serialized: &[u8]) -> Result<Self::KeyFormat, KeysetError>;

    /// Reject formats that would produce unsafe keys.
    fn validate_key_format(&self, format: &Self::KeyFormat) -> Result<(), KeysetError>;

    /// Generate a fresh key satisfying `format`.
    fn create_key(&self, format: &Self::KeyFormat) -> Result<Self::Key, KeysetError>;
}

/// Algorithm-side description of one key type.
pub trait KeyTypeManager: Send + Sync + 'static {
    /// Parsed key representation.
    type Key: Send + Sync;
    /// Parsed key-format representation; `()` for import-only key types.
    type KeyFormat;

    /// Key type identifier.
    fn key_type(&self) -> &str;

    /// Implementation version.
    fn version(&self) -> u32;

    /// Classification of the key material.
    fn key_material_type(&self) -> KeyMaterialType;

    /// Decode serialized key material.
    fn parse_key(&self, serialized: &[u8]) -> Result<Self::Key, KeysetError>;

    /// Encode a key for storage in a keyset.
    fn serialize_key(&self, key: &Self::Key) -> Result<Vec<u8>, KeysetError>;

    /// Reject keys whose parameters violate the algorithm's safety requirements.
    fn validate_key(&self, key: &Self::Key) -> Result<(), KeysetError>;

    /// One factory per capability this key type provides.
    fn primitive_factories(&self) -> Vec<PrimitiveFactory<Self::Key>>;

    /// Key generation support; `None` for import-only key types.
    fn key_factory(&self) -> Option<&dyn KeyFactory<Key = Self::Key, KeyFormat = Self::KeyFormat>> {
        None
    }
}

/// [`KeyManager`] implementation driven by a [`KeyTypeManager`].
pub struct KeyManagerImpl<M: KeyTypeManager> {
    manager: M,
    factories: BTreeMap<PrimitiveKind, PrimitiveFactory<M::Key>>,
}

impl<M: KeyTypeManager> KeyManagerImpl<M> {
    /// Index the factories declared by `manager`.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::DuplicateRegistration`] if two factories claim the
    /// same capability.
    pub fn new(manager: M) -> Result<Self, KeysetError> {
        let mut factories = BTreeMap::new();
        for factory in manager.primitive_factories() {
            let kind = factory.kind();
            if factories.insert(kind, factory).is_some() {
                return Err(KeysetError::DuplicateRegistration(format!(
                    "key type {} declares two factories for primitive {kind}",
                    manager.key_type()
                )));
            }
        }
        Ok(Self { manager, factories })
    }

    /// The wrapped key type description.
    pub fn inner(&self) -> &M {
        &self.manager
    }

    /// Validate an already-parsed key and build a primitive of `kind` from it.
    pub fn primitive_from_key(&self, key: &M::Key, kind: PrimitiveKind) -> Result<Primitive, KeysetError> {
        let factory = self.factory(kind)?;
        self.manager.validate_key(key)?;
        let primitive = (factory.build)(key)?;
        if primitive.kind() != kind {
            return Err(KeysetError::KindMismatch {
                expected: kind,
                actual: primitive.kind(),
            });
        }
        Ok(primitive)
    }

    /// Validate an already-parsed format and generate a key from it.
    pub fn create_key(&self, format: &M::KeyFormat) -> Result<M::Key, KeysetError> {
        let factory = self.key_factory()?;
        factory.validate_key_format(format)?;
        factory.create_key(format)
    }

    fn factory(&self, kind: PrimitiveKind) -> Result<&PrimitiveFactory<M::Key>, KeysetError> {
        self.factories
            .get(&kind)
            .ok_or_else(|| KeysetError::UnsupportedPrimitive {
                key_type: self.manager.key_type().to_owned(),
                kind,
            })
    }

    fn key_factory(
        &self,
    ) -> Result<&dyn KeyFactory<Key = M::Key, KeyFormat = M::KeyFormat>, KeysetError> {
        self.manager.key_factory().ok_or_else(|| {
            KeysetError::UnsupportedOperation(format!(
                "key type {} does not support key generation",
                self.manager.key_type()
            ))
        })
    }
}

impl<M: KeyTypeManager> KeyManager for KeyManagerImpl<M> {
    fn key_type(&self) -> &str {
        self.manager.key_type()
    }

    fn version(&self) -> u32 {
        self.manager.version()
    }

    fn key_material_type(&self) -> KeyMaterialType {
        self.manager.key_material_type()
    }

    fn primitive_kinds(&self) -> Vec<PrimitiveKind> {
        self.factories.keys().copied().collect()
    }

    fn primitive(&self, key_material: &[u8], kind: PrimitiveKind) -> Result<Primitive, KeysetError> {
        // Reject undeclared capabilities before touching the key bytes.
        self.factory(kind)?;
        let key = self.manager.parse_key(key_material)?;
        self.primitive_from_key(&key, kind)
    }

    fn new_key(&self, key_format: &[u8]) -> Result<KeyMaterial, KeysetError> {
        let factory = self.key_factory()?;
        let format = factory.parse_key_format(key_format)?;
        factory.validate_key_format(&format)?;
        let key = factory.create_key(&format)?;
        Ok(KeyMaterial::new(self.manager.serialize_key(&key)?))
    }
}

impl<M: KeyTypeManager> fmt::Debug for KeyManagerImpl<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManagerImpl")
            .field("key_type", &self.manager.key_type())
            .field("version", &self.manager.version())
            .field("primitives", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
