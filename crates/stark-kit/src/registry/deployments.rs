//! Deployed contracts, one `address:abi[:alias...]` line each.

use std::path::{Path, PathBuf};

use starknet_core::types::Felt;
use tracing::{debug, info};

use super::{
    AddressStore, RegistryLock, check_abi_ref, check_alias, identifier_felt, network_file,
    parse_felt, read_registry, write_registry,
};
use crate::error::RegistryError;
use crate::types::Network;

const SUFFIX: &str = "deployments.txt";

/// A deployed contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub address: Felt,
    /// ABI path the contract was deployed with.
    pub abi: String,
    /// Aliases, in registration order, without duplicates.
    pub aliases: Vec<String>,
}

impl DeploymentRecord {
    pub fn new(address: Felt, abi: impl Into<String>) -> Self {
        Self {
            address,
            abi: abi.into(),
            aliases: Vec::new(),
        }
    }

    /// Add an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    fn to_line(&self) -> String {
        let mut line = format!("{}:{}", self.address.to_hex_string(), self.abi);
        for alias in &self.aliases {
            line.push(':');
            line.push_str(alias);
        }
        line
    }

    fn from_line(text: &str, path: &Path, line: usize) -> Result<Self, RegistryError> {
        let mut parts = text.split(':');
        let address = parts.next().unwrap_or_default();
        let abi = parts.next().ok_or_else(|| RegistryError::Malformed {
            path: path.to_path_buf(),
            line,
            reason: "expected address:abi[:alias...]".to_string(),
        })?;

        Ok(Self {
            address: parse_felt(address, path, line)?,
            abi: abi.to_string(),
            aliases: parts.filter(|a| !a.is_empty()).map(str::to_string).collect(),
        })
    }
}

#[derive(Clone, Debug)]
enum Location {
    Dir(PathBuf),
    File(PathBuf),
}

/// Registry of deployed contracts.
#[derive(Clone, Debug)]
pub struct DeploymentRegistry {
    location: Location,
}

impl DeploymentRegistry {
    /// Registry with one file per network under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::Dir(dir.into()),
        }
    }

    /// Registry backed by a single file, used for every network.
    ///
    /// Lets debugging use a deployments file from somewhere else.
    pub fn at_file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
        }
    }

    /// File holding `network`'s deployments.
    pub fn path(&self, network: Network) -> PathBuf {
        match &self.location {
            Location::Dir(dir) => network_file(dir, network, SUFFIX),
            Location::File(path) => path.clone(),
        }
    }

    /// Every record for `network`, in file order.
    pub fn entries(&self, network: Network) -> Result<Vec<DeploymentRecord>, RegistryError> {
        load(&self.path(network))
    }

    /// Records whose address is in `addresses`.
    pub fn find_addresses(
        &self,
        addresses: &[Felt],
        network: Network,
    ) -> Result<Vec<DeploymentRecord>, RegistryError> {
        Ok(self
            .entries(network)?
            .into_iter()
            .filter(|r| addresses.contains(&r.address))
            .collect())
    }

    /// Point an existing deployment at a new ABI.
    pub fn update_abi(
        &self,
        address: Felt,
        abi: impl Into<String>,
        network: Network,
    ) -> Result<(), RegistryError> {
        let abi = abi.into();
        check_abi_ref(&abi)?;

        let path = self.path(network);
        let _lock = RegistryLock::acquire(&path)?;
        let mut records = load(&path)?;

        let record = records
            .iter_mut()
            .find(|r| r.address == address)
            .ok_or_else(|| RegistryError::not_found(address.to_hex_string(), network))?;
        record.abi = abi;

        store(&path, &records)
    }
}

impl AddressStore for DeploymentRegistry {
    type Record = DeploymentRecord;
    type Resolved = (Felt, String);

    fn register(&self, record: DeploymentRecord, network: Network) -> Result<(), RegistryError> {
        check_abi_ref(&record.abi)?;
        for alias in &record.aliases {
            check_alias(alias)?;
        }

        let path = self.path(network);
        let _lock = RegistryLock::acquire(&path)?;
        let mut records = load(&path)?;

        for alias in &record.aliases {
            if let Some(existing) = records
                .iter()
                .find(|r| r.address != record.address && r.aliases.contains(alias))
            {
                return Err(RegistryError::DuplicateAlias {
                    alias: alias.clone(),
                    existing: existing.address,
                });
            }
        }

        match records.iter_mut().find(|r| r.address == record.address) {
            Some(existing) => {
                existing.abi = record.abi.clone();
                for alias in &record.aliases {
                    if !existing.aliases.contains(alias) {
                        existing.aliases.push(alias.clone());
                    }
                }
            }
            None => records.push(record.clone()),
        }

        store(&path, &records)?;
        info!(
            address = %record.address.to_hex_string(),
            abi = %record.abi,
            aliases = ?record.aliases,
            %network,
            "registered deployment"
        );
        Ok(())
    }

    fn resolve(&self, identifier: &str, network: Network) -> Result<(Felt, String), RegistryError> {
        let records = self.entries(network)?;
        let as_address = identifier_felt(identifier);

        records
            .into_iter()
            .find(|r| {
                r.aliases.iter().any(|a| a == identifier) || Some(r.address) == as_address
            })
            .map(|r| (r.address, r.abi))
            .ok_or_else(|| RegistryError::not_found(identifier, network))
    }

    fn unregister(&self, address: Felt, network: Network) -> Result<(), RegistryError> {
        let path = self.path(network);
        let _lock = RegistryLock::acquire(&path)?;
        let mut records = load(&path)?;

        let before = records.len();
        records.retain(|r| r.address != address);
        if records.len() == before {
            debug!(address = %address.to_hex_string(), %network, "nothing to unregister");
            return Ok(());
        }

        store(&path, &records)?;
        info!(address = %address.to_hex_string(), %network, "unregistered deployment");
        Ok(())
    }
}

fn load(path: &Path) -> Result<Vec<DeploymentRecord>, RegistryError> {
    read_registry(path)?
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| DeploymentRecord::from_line(line.trim(), path, i + 1))
        .collect()
}

fn store(path: &Path, records: &[DeploymentRecord]) -> Result<(), RegistryError> {
    let mut contents = String::new();
    for record in records {
        contents.push_str(&record.to_line());
        contents.push('\n');
    }
    write_registry(path, &contents)
}
