//! Alias-resolving address registries.
//!
//! One file per network, kept in a registry directory:
//!
//! | Registry | File | Format |
//! |----------|------|--------|
//! | [`DeploymentRegistry`] | `<network>.deployments.txt` | `address:abi[:alias...]` per line |
//! | [`AccountRegistry`] | `<network>.accounts.json` | `{pubkey: {address, index, alias}}` |
//! | [`DeclarationRegistry`] | `<network>.declarations.txt` | `class_hash:alias` per line |
//!
//! Every update rewrites the whole file while holding an exclusive advisory
//! lock on `<file>.lock`, so concurrent writers from other processes are
//! serialized. The rewrite goes through a temporary file and a rename; a
//! reader never sees a half-written registry.

mod accounts;
mod declarations;
mod deployments;

pub use accounts::{AccountRecord, AccountRegistry};
pub use declarations::{DeclarationRecord, DeclarationRegistry};
pub use deployments::{DeploymentRecord, DeploymentRegistry};

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use starknet_core::types::Felt;

use crate::error::RegistryError;
use crate::types::Network;

/// Separator between fields of the line-based registries.
const FIELD_SEPARATOR: char = ':';

/// A per-network store mapping human-readable names to on-chain values.
pub trait AddressStore {
    /// What gets registered.
    type Record;
    /// What a lookup returns.
    type Resolved;

    /// Add a record, or update the one already stored for the same key.
    ///
    /// Fails with [`RegistryError::DuplicateAlias`] if an alias is already
    /// bound to something else.
    fn register(&self, record: Self::Record, network: Network) -> Result<(), RegistryError>;

    /// Look up by alias or raw value. Fails with [`RegistryError::NotFound`]
    /// when nothing matches.
    fn resolve(&self, identifier: &str, network: Network) -> Result<Self::Resolved, RegistryError>;

    /// Remove every record for `address`. Removing nothing is not an error.
    fn unregister(&self, address: Felt, network: Network) -> Result<(), RegistryError>;
}

// ============================================================================
// File plumbing
// ============================================================================

/// `<dir>/<network>.<suffix>`
pub(crate) fn network_file(dir: &Path, network: Network, suffix: &str) -> PathBuf {
    dir.join(format!("{}.{}", network, suffix))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive advisory lock on `<file>.lock`, released on drop.
pub(crate) struct RegistryLock {
    file: File,
}

impl RegistryLock {
    /// Block until the lock for `path` is held.
    pub(crate) fn acquire(path: &Path) -> Result<Self, RegistryError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(with_suffix(path, ".lock"))?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Read a registry file; a missing file reads as empty.
pub(crate) fn read_registry(path: &Path) -> Result<String, RegistryError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Replace a registry file with `contents`.
///
/// Callers must hold the file's [`RegistryLock`].
pub(crate) fn write_registry(path: &Path, contents: &str) -> Result<(), RegistryError> {
    let tmp = with_suffix(path, ".tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Parse a registry value, reporting the file and line on failure.
pub(crate) fn parse_felt(value: &str, path: &Path, line: usize) -> Result<Felt, RegistryError> {
    value
        .trim()
        .parse::<Felt>()
        .map_err(|_| RegistryError::Malformed {
            path: path.to_path_buf(),
            line,
            reason: format!("'{}' is not a field element", value),
        })
}

/// Reject aliases that would not survive a round trip through a registry
/// file.
pub(crate) fn check_alias(alias: &str) -> Result<(), RegistryError> {
    let reason = if alias.trim().is_empty() {
        "alias is empty"
    } else if alias.contains(FIELD_SEPARATOR) {
        "':' separates registry fields"
    } else if alias.contains(['\n', '\r']) {
        "line breaks end registry entries"
    } else if alias.trim() != alias {
        "surrounding whitespace is not preserved"
    } else {
        return Ok(());
    };
    Err(RegistryError::InvalidAlias {
        alias: alias.to_string(),
        reason: reason.to_string(),
    })
}

/// Reject ABI references that would split a registry line.
pub(crate) fn check_abi_ref(abi: &str) -> Result<(), RegistryError> {
    if abi.is_empty() || abi.contains(FIELD_SEPARATOR) || abi.contains(['\n', '\r']) {
        return Err(RegistryError::InvalidAbiRef(abi.to_string()));
    }
    Ok(())
}

/// Interpret a lookup identifier as a raw value, if it is one.
///
/// Only `0x`-prefixed identifiers count; bare words are always aliases.
pub(crate) fn identifier_felt(identifier: &str) -> Option<Felt> {
    let identifier = identifier.trim();
    if identifier.starts_with("0x") || identifier.starts_with("0X") {
        identifier.parse::<Felt>().ok()
    } else {
        None
    }
}
