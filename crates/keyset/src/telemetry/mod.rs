//! Structured logging setup.
//!
//! # Telemetry invariants
//!
//! - **No key material**, plaintext or ciphertext appears in any log field.
//! - Decrypt and verify failures are logged without per-candidate detail.
//! - Log level is configurable via `KEYSET_LOG_LEVEL` (default: `info`);
//!   `RUST_LOG` takes precedence when set.

pub mod init;

pub use init::init_telemetry;
