//! Immutable collections of live primitives built from one keyset snapshot.
//!
//! A [`PrimitiveSet`] holds primitives of a single [`PrimitiveKind`], indexed by
//! identifier prefix, with exactly one primary entry. Rotation never mutates a
//! set; callers build a new one from the updated keyset.

use std::collections::HashMap;

use keyset_common::{KeyEntry, KeyStatus, Keyset, KeysetError, OutputPrefixType, PrimitiveKind};
use tracing::debug;

use crate::prefix::{self, RAW_PREFIX};
use crate::primitives::Primitive;
use crate::registry::Registry;

/// One live primitive plus the metadata of the key it was built from.
#[derive(Debug, Clone)]
pub struct Entry {
    primitive: Primitive,
    key_id: u32,
    status: KeyStatus,
    output_prefix_type: OutputPrefixType,
    identifier: Vec<u8>,
    key_type: String,
}

impl Entry {
    /// The primitive built from this entry's key.
    pub fn primitive(&self) -> &Primitive {
        &self.primitive
    }

    /// Id of the key.
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    /// Status of the key; always [`KeyStatus::Enabled`].
    pub fn status(&self) -> KeyStatus {
        self.status
    }

    /// Prefix policy of the key.
    pub fn output_prefix_type(&self) -> OutputPrefixType {
        self.output_prefix_type
    }

    /// Identifier prefix attached to outputs of this key; empty for RAW.
    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    /// Key type identifier of the key.
    pub fn key_type(&self) -> &str {
        &self.key_type
    }
}

/// Primitives of one kind, indexed by identifier prefix, with one primary.
#[derive(Debug)]
pub struct PrimitiveSet {
    kind: PrimitiveKind,
    entries: Vec<Entry>,
    by_prefix: HashMap<Vec<u8>, Vec<usize>>,
    primary: usize,
}

impl PrimitiveSet {
    /// Start assembling a set of `kind` primitives.
    pub fn builder(kind: PrimitiveKind) -> PrimitiveSetBuilder {
        PrimitiveSetBuilder {
            kind,
            entries: Vec::new(),
            primary_key_id: None,
        }
    }

    /// Build a primitive of `kind` for every enabled key of `keyset`.
    ///
    /// Disabled and destroyed keys are skipped. Any enabled key that cannot be
    /// turned into a primitive fails the whole construction.
    ///
    /// # Errors
    ///
    /// - any error of [`Keyset::validate`], including
    ///   [`KeysetError::EmptyKeyset`] and [`KeysetError::NoPrimaryKey`];
    /// - any error of [`Registry::get_primitive`] for an enabled key.
    pub fn from_keyset(
        registry: &Registry,
        keyset: &Keyset,
        kind: PrimitiveKind,
    ) -> Result<Self, KeysetError> {
        keyset.validate()?;

        let mut builder = Self::builder(kind);
        for key in keyset.keys.iter().filter(|k| k.status == KeyStatus::Enabled) {
            let primitive = registry.get_primitive(key, kind)?;
            builder.add(primitive, key)?;
        }
        builder.set_primary(keyset.primary_key_id);
        let set = builder.build()?;

        debug!(
            kind = %kind,
            entries = set.len(),
            primary_key_id = keyset.primary_key_id,
            "primitive set built"
        );
        Ok(set)
    }

    /// The capability every entry provides.
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// The designated primary entry.
    pub fn primary(&self) -> &Entry {
        &self.entries[self.primary]
    }

    /// Every entry without an identifier prefix, in keyset order.
    pub fn raw_entries(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.indexed(RAW_PREFIX)
    }

    /// Every prefixed entry whose identifier equals `prefix`, in keyset order.
    pub fn entries_for_prefix<'a>(&'a self, prefix: &'a [u8]) -> impl Iterator<Item = &'a Entry> + 'a {
        // The empty prefix belongs to RAW entries only.
        let prefix = if prefix.is_empty() { None } else { Some(prefix) };
        prefix.into_iter().flat_map(move |p| self.indexed(p))
    }

    /// Every entry, in keyset order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A built set always holds at least its primary.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn indexed<'a>(&'a self, prefix: &[u8]) -> impl Iterator<Item = &'a Entry> + 'a {
        self.by_prefix
            .get(prefix)
            .into_iter()
            .flatten()
            .map(move |&i| &self.entries[i])
    }
}

/// Collects entries for a [`PrimitiveSet`].
#[derive(Debug)]
pub struct PrimitiveSetBuilder {
    kind: PrimitiveKind,
    entries: Vec<Entry>,
    primary_key_id: Option<u32>,
}

impl PrimitiveSetBuilder {
    /// Append `primitive`, built from `key`.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::KindMismatch`] if `primitive` is not of the set's kind;
    /// - [`KeysetError::InvalidKeyset`] if `key` is not enabled or has no material.
    pub fn add(&mut self, primitive: Primitive, key: &KeyEntry) -> Result<&mut Self, KeysetError> {
        if primitive.kind() != self.kind {
            return Err(KeysetError::KindMismatch {
                expected: self.kind,
                actual: primitive.kind(),
            });
        }
        if key.status != KeyStatus::Enabled {
            return Err(KeysetError::InvalidKeyset(format!(
                "key {} is not enabled and cannot join a primitive set",
                key.key_id
            )));
        }
        let key_type = key.key_type().ok_or_else(|| {
            KeysetError::InvalidKeyset(format!("key {} has no key material", key.key_id))
        })?;

        self.entries.push(Entry {
            primitive,
            key_id: key.key_id,
            status: key.status,
            output_prefix_type: key.output_prefix_type,
            identifier: prefix::output_prefix(key.key_id, key.output_prefix_type),
            key_type: key_type.to_owned(),
        });
        Ok(self)
    }

    /// Designate the entry with `key_id` as primary.
    pub fn set_primary(&mut self, key_id: u32) -> &mut Self {
        self.primary_key_id = Some(key_id);
        self
    }

    /// Freeze the collected entries.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::EmptyKeyset`] if no entry was added;
    /// - [`KeysetError::NoPrimaryKey`] if no primary was designated or no entry
    ///   carries the designated id.
    pub fn build(self) -> Result<PrimitiveSet, KeysetError> {
        if self.entries.is_empty() {
            return Err(KeysetError::EmptyKeyset);
        }
        let primary_key_id = self
            .primary_key_id
            .ok_or_else(|| KeysetError::NoPrimaryKey("no primary key designated".into()))?;
        let primary = self
            .entries
            .iter()
            .position(|e| e.key_id == primary_key_id)
            .ok_or_else(|| {
                KeysetError::NoPrimaryKey(format!(
                    "primary key {primary_key_id} is not among the enabled keys"
                ))
            })?;

        let mut by_prefix: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();
        for (i, entry) in self.entries.iter().enumerate() {
            by_prefix.entry(entry.identifier.clone()).or_default().push(i);
        }

        Ok(PrimitiveSet {
            kind: self.kind,
            entries: self.entries,
            by_prefix,
            primary,
        })
    }
}
