//! Generated accounts, one JSON object per network keyed by public key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use starknet_core::types::Felt;
use tracing::info;

use super::{
    AddressStore, RegistryLock, check_alias, identifier_felt, network_file, parse_felt,
    read_registry, write_registry,
};
use crate::error::RegistryError;
use crate::types::Network;

const SUFFIX: &str = "accounts.json";

/// An account known to the toolbelt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountRecord {
    pub public_key: Felt,
    pub address: Felt,
    /// Registration order within the network, starting at 0.
    pub index: u64,
    /// Alias, which is also the name of the variable holding the key.
    pub alias: String,
    pub network: Network,
}

#[derive(Serialize, Deserialize)]
struct StoredAccount {
    address: String,
    index: u64,
    alias: String,
}

/// Registry of accounts.
///
/// At most one record per public key: registering a known key replaces its
/// record.
#[derive(Clone, Debug)]
pub struct AccountRegistry {
    dir: PathBuf,
}

impl AccountRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding `network`'s accounts.
    pub fn path(&self, network: Network) -> PathBuf {
        network_file(&self.dir, network, SUFFIX)
    }

    /// Every record for `network`, ordered by index.
    pub fn entries(&self, network: Network) -> Result<Vec<AccountRecord>, RegistryError> {
        let mut records = load(&self.path(network), network)?;
        records.sort_by_key(|r| r.index);
        Ok(records)
    }

    /// Returns true if `public_key` has an account on `network`.
    pub fn exists(&self, public_key: Felt, network: Network) -> Result<bool, RegistryError> {
        Ok(load(&self.path(network), network)?
            .iter()
            .any(|r| r.public_key == public_key))
    }

    /// Check that `alias` could be registered for `public_key` without
    /// writing anything.
    pub fn check_available(
        &self,
        alias: &str,
        public_key: Felt,
        network: Network,
    ) -> Result<(), RegistryError> {
        check_alias(alias)?;
        match conflict(&load(&self.path(network), network)?, alias, public_key) {
            Some(existing) => Err(RegistryError::DuplicateAlias {
                alias: alias.to_string(),
                existing,
            }),
            None => Ok(()),
        }
    }

    /// Index the next registered account should get.
    pub fn next_index(&self, network: Network) -> Result<u64, RegistryError> {
        Ok(load(&self.path(network), network)?
            .iter()
            .map(|r| r.index + 1)
            .max()
            .unwrap_or(0))
    }
}

impl AddressStore for AccountRegistry {
    type Record = AccountRecord;
    type Resolved = AccountRecord;

    fn register(&self, record: AccountRecord, network: Network) -> Result<(), RegistryError> {
        check_alias(&record.alias)?;

        let path = self.path(network);
        let _lock = RegistryLock::acquire(&path)?;
        let mut records = load(&path, network)?;

        if let Some(existing) = conflict(&records, &record.alias, record.public_key) {
            return Err(RegistryError::DuplicateAlias {
                alias: record.alias,
                existing,
            });
        }

        records.retain(|r| r.public_key != record.public_key);
        records.push(AccountRecord { network, ..record.clone() });
        store(&path, &records)?;

        info!(
            alias = %record.alias,
            address = %record.address.to_hex_string(),
            index = record.index,
            %network,
            "registered account"
        );
        Ok(())
    }

    /// Resolve by alias, address or public key.
    fn resolve(&self, identifier: &str, network: Network) -> Result<AccountRecord, RegistryError> {
        let as_felt = identifier_felt(identifier);
        load(&self.path(network), network)?
            .into_iter()
            .find(|r| {
                r.alias == identifier
                    || Some(r.address) == as_felt
                    || Some(r.public_key) == as_felt
            })
            .ok_or_else(|| RegistryError::not_found(identifier, network))
    }

    fn unregister(&self, address: Felt, network: Network) -> Result<(), RegistryError> {
        let path = self.path(network);
        let _lock = RegistryLock::acquire(&path)?;
        let mut records = load(&path, network)?;

        let before = records.len();
        records.retain(|r| r.address != address);
        if records.len() != before {
            store(&path, &records)?;
            info!(address = %address.to_hex_string(), %network, "unregistered account");
        }
        Ok(())
    }
}

/// Address of another key's account already registered as `alias`.
fn conflict(records: &[AccountRecord], alias: &str, public_key: Felt) -> Option<Felt> {
    records
        .iter()
        .find(|r| r.alias == alias && r.public_key != public_key)
        .map(|r| r.address)
}

fn load(path: &Path, network: Network) -> Result<Vec<AccountRecord>, RegistryError> {
    let contents = read_registry(path)?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    let stored: BTreeMap<String, StoredAccount> = serde_json::from_str(&contents)?;
    stored
        .into_iter()
        .enumerate()
        .map(|(i, (public_key, account))| {
            Ok(AccountRecord {
                public_key: parse_felt(&public_key, path, i + 1)?,
                address: parse_felt(&account.address, path, i + 1)?,
                index: account.index,
                alias: account.alias,
                network,
            })
        })
        .collect()
}

fn store(path: &Path, records: &[AccountRecord]) -> Result<(), RegistryError> {
    let stored: BTreeMap<String, StoredAccount> = records
        .iter()
        .map(|r| {
            (
                r.public_key.to_hex_string(),
                StoredAccount {
                    address: r.address.to_hex_string(),
                    index: r.index,
                    alias: r.alias.clone(),
                },
            )
        })
        .collect();
    let mut contents = serde_json::to_string_pretty(&stored)?;
    contents.push('\n');
    write_registry(path, &contents)
}
