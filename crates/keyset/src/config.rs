//! Registry bootstrap configuration.
//!
//! Values are read from `KEYSET_`-prefixed environment variables:
//!
//! | Variable                          | Default | Meaning                                 |
//! |-----------------------------------|---------|-----------------------------------------|
//! | `KEYSET_KEY_TYPES`                | none    | comma-separated key types, **required** |
//! | `KEYSET_MIN_KEY_MANAGER_VERSION`  | `0`     | oldest acceptable manager version       |
//! | `KEYSET_NEW_KEY_ALLOWED`          | `true`  | allow key generation                    |
//! | `KEYSET_ALLOW_OVERWRITE`          | `false` | replace conflicting registrations       |
//! | `KEYSET_LOG_LEVEL`                | `info`  | tracing filter when `RUST_LOG` is unset |

use std::sync::Arc;

use anyhow::{Context, Result};
use keyset_common::{KeysetError, PrimitiveKind};
use serde::Deserialize;
use tracing::info;

use crate::catalogue::{self, Registrar};
use crate::key_manager::KeyManager;
use crate::registry::{RegistrationOptions, Registry};

const ENV_PREFIX: &str = "KEYSET";

/// Validated registry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Key type identifiers to register. **Required.**
    pub key_types: Vec<String>,

    /// Managers older than this are treated as absent.
    #[serde(default)]
    pub min_key_manager_version: u32,

    /// Whether registered managers may generate new keys.
    #[serde(default = "default_new_key_allowed")]
    pub new_key_allowed: bool,

    /// Whether a conflicting registration replaces the existing one.
    #[serde(default)]
    pub allow_overwrite: bool,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_new_key_allowed() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}

impl RegistryConfig {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `KEYSET_KEY_TYPES` is absent or any value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::load(environment())
    }

    /// Load from an explicit variable map instead of the process environment.
    ///
    /// # Errors
    ///
    /// As [`RegistryConfig::from_env`].
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> =
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::load(environment().source(Some(map)))
    }

    fn load(source: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to build configuration from environment")?;

        let c: RegistryConfig = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.key_types.is_empty() {
            anyhow::bail!("KEYSET_KEY_TYPES must list at least one key type");
        }
        for key_type in &self.key_types {
            ensure_non_empty(key_type, "KEYSET_KEY_TYPES entry")?;
        }
        ensure_non_empty(&self.log_level, "KEYSET_LOG_LEVEL")?;
        Ok(())
    }

    /// Populate `registry`: add the standard catalogues, then register the
    /// manager for every configured key type together with the wrapper of each
    /// primitive that manager builds.
    ///
    /// Call once per registry; the catalogues themselves are not re-added.
    ///
    /// # Errors
    ///
    /// Returns an error if a key type is unknown to every catalogue, or if a
    /// registration conflicts with an existing one.
    pub fn apply(&self, registry: &Registry) -> Result<()> {
        catalogue::register_standard_catalogues(registry)
            .context("failed to add standard catalogues")?;

        let registrar = Registrar::with_options(
            registry,
            RegistrationOptions {
                allow_overwrite: self.allow_overwrite,
                new_key_allowed: self.new_key_allowed,
            },
        );

        for key_type in &self.key_types {
            let manager = self
                .resolve(registry, key_type)
                .with_context(|| format!("failed to resolve key type {key_type}"))?;
            registrar
                .register(key_type, Arc::clone(&manager))
                .with_context(|| format!("failed to register key manager for {key_type}"))?;

            for kind in manager.primitive_kinds() {
                let wrapper = registry
                    .catalogue(kind.name())
                    .and_then(|c| c.primitive_wrapper())
                    .with_context(|| format!("no wrapper available for primitive {kind}"))?;
                registrar
                    .register_wrapper(kind, wrapper)
                    .with_context(|| format!("failed to register wrapper for primitive {kind}"))?;
            }
        }

        info!(
            key_types = self.key_types.len(),
            min_key_manager_version = self.min_key_manager_version,
            "registry configured"
        );
        Ok(())
    }

    /// The first catalogue, in primitive order, that serves `key_type`.
    fn resolve(&self, registry: &Registry, key_type: &str) -> Result<Arc<dyn KeyManager>, KeysetError> {
        let mut last = KeysetError::NotFound(format!("no catalogue serves key type {key_type}"));
        for kind in PrimitiveKind::ALL {
            let Ok(catalogue) = registry.catalogue(kind.name()) else {
                continue;
            };
            match catalogue.key_manager(key_type, kind.name(), self.min_key_manager_version) {
                Ok(manager) => return Ok(manager),
                Err(e) => last = e,
            }
        }
        Err(last)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("key_types")
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
