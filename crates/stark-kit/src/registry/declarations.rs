//! Declared classes, one `class_hash:alias` line each.

use std::path::{Path, PathBuf};

use starknet_core::types::Felt;
use tracing::info;

use super::{
    AddressStore, RegistryLock, check_alias, identifier_felt, network_file, parse_felt,
    read_registry, write_registry,
};
use crate::error::RegistryError;
use crate::types::Network;

const SUFFIX: &str = "declarations.txt";

/// A declared class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclarationRecord {
    pub class_hash: Felt,
    /// Usually the contract name.
    pub alias: String,
}

impl DeclarationRecord {
    pub fn new(class_hash: Felt, alias: impl Into<String>) -> Self {
        Self {
            class_hash,
            alias: alias.into(),
        }
    }
}

/// Registry of declared classes. Unregistering takes a class hash.
#[derive(Clone, Debug)]
pub struct DeclarationRegistry {
    dir: PathBuf,
}

impl DeclarationRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, network: Network) -> PathBuf {
        network_file(&self.dir, network, SUFFIX)
    }

    pub fn entries(&self, network: Network) -> Result<Vec<DeclarationRecord>, RegistryError> {
        load(&self.path(network))
    }

    /// Check that `alias` could be registered for `class_hash` without
    /// writing anything.
    pub fn check_available(
        &self,
        alias: &str,
        class_hash: Felt,
        network: Network,
    ) -> Result<(), RegistryError> {
        check_alias(alias)?;
        match conflict(&self.entries(network)?, alias, class_hash) {
            Some(existing) => Err(RegistryError::DuplicateAlias {
                alias: alias.to_string(),
                existing,
            }),
            None => Ok(()),
        }
    }
}

/// Class hash already bound to `alias`, if it is not `class_hash`.
fn conflict(records: &[DeclarationRecord], alias: &str, class_hash: Felt) -> Option<Felt> {
    records
        .iter()
        .find(|r| r.alias == alias && r.class_hash != class_hash)
        .map(|r| r.class_hash)
}

impl AddressStore for DeclarationRegistry {
    type Record = DeclarationRecord;
    type Resolved = Felt;

    fn register(&self, record: DeclarationRecord, network: Network) -> Result<(), RegistryError> {
        check_alias(&record.alias)?;

        let path = self.path(network);
        let _lock = RegistryLock::acquire(&path)?;
        let mut records = load(&path)?;

        if let Some(existing) = conflict(&records, &record.alias, record.class_hash) {
            return Err(RegistryError::DuplicateAlias {
                alias: record.alias,
                existing,
            });
        }

        match records.iter_mut().find(|r| r.class_hash == record.class_hash) {
            Some(existing) if existing.alias == record.alias => return Ok(()),
            Some(existing) => existing.alias = record.alias.clone(),
            None => records.push(record.clone()),
        }

        store(&path, &records)?;
        info!(
            class_hash = %record.class_hash.to_hex_string(),
            alias = %record.alias,
            %network,
            "registered declaration"
        );
        Ok(())
    }

    fn resolve(&self, identifier: &str, network: Network) -> Result<Felt, RegistryError> {
        let as_hash = identifier_felt(identifier);
        self.entries(network)?
            .into_iter()
            .find(|r| r.alias == identifier || Some(r.class_hash) == as_hash)
            .map(|r| r.class_hash)
            .ok_or_else(|| RegistryError::not_found(identifier, network))
    }

    fn unregister(&self, class_hash: Felt, network: Network) -> Result<(), RegistryError> {
        let path = self.path(network);
        let _lock = RegistryLock::acquire(&path)?;
        let mut records = load(&path)?;

        let before = records.len();
        records.retain(|r| r.class_hash != class_hash);
        if records.len() != before {
            store(&path, &records)?;
        }
        Ok(())
    }
}

fn load(path: &Path) -> Result<Vec<DeclarationRecord>, RegistryError> {
    read_registry(path)?
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let (hash, alias) =
                line.trim()
                    .split_once(':')
                    .ok_or_else(|| RegistryError::Malformed {
                        path: path.to_path_buf(),
                        line: i + 1,
                        reason: "expected class_hash:alias".to_string(),
                    })?;
            Ok(DeclarationRecord {
                class_hash: parse_felt(hash, path, i + 1)?,
                alias: alias.to_string(),
            })
        })
        .collect()
}

fn store(path: &Path, records: &[DeclarationRecord]) -> Result<(), RegistryError> {
    let contents: String = records
        .iter()
        .map(|r| format!("{}:{}\n", r.class_hash.to_hex_string(), r.alias))
        .collect();
    write_registry(path, &contents)
}
