//! Compiled contract artifacts.
//!
//! Compilation happens elsewhere; this module only reads its output. The
//! layout is fixed:
//!
//! ```text
//! <build>/<name>.json        compiled class
//! <build>/abis/<name>.json   ABI
//! ```

use std::path::{Path, PathBuf};

use starknet_core::types::Felt;
use starknet_core::types::contract::legacy::LegacyContractClass;

use crate::error::ArtifactError;
use crate::types::DeclarePayload;

/// Directory under the build directory holding ABIs.
pub const ABIS_DIR: &str = "abis";

/// Source of compiled classes and their class hashes.
pub trait ArtifactStore: Send + Sync {
    /// Path of the compiled class for `name`.
    fn artifact_path(&self, name: &str, overriding_path: Option<&Path>) -> PathBuf;

    /// Path of the ABI for `name`.
    fn abi_path(&self, name: &str) -> PathBuf;

    /// Read the compiled class.
    fn contract_class(
        &self,
        name: &str,
        overriding_path: Option<&Path>,
    ) -> Result<serde_json::Value, ArtifactError>;

    /// Class hash of the compiled class.
    fn class_hash(&self, name: &str, overriding_path: Option<&Path>) -> Result<Felt, ArtifactError>;

    /// Everything a declare transaction needs about `name`.
    fn declare_payload(
        &self,
        name: &str,
        overriding_path: Option<&Path>,
    ) -> Result<DeclarePayload, ArtifactError> {
        Ok(DeclarePayload {
            contract_name: name.to_string(),
            contract_class: self.contract_class(name, overriding_path)?,
            class_hash: self.class_hash(name, overriding_path)?,
            artifact_path: self.artifact_path(name, overriding_path),
            overriding_path: overriding_path.map(Path::to_path_buf),
        })
    }
}

/// Artifacts read from a build directory on disk.
///
/// Class hashes are computed for legacy (Cairo 0) classes.
#[derive(Clone, Debug)]
pub struct BuildDir {
    root: PathBuf,
}

impl BuildDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, path: &Path) -> Result<String, ArtifactError> {
        std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::NotFound(path.to_path_buf())
            } else {
                ArtifactError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}

impl ArtifactStore for BuildDir {
    fn artifact_path(&self, name: &str, overriding_path: Option<&Path>) -> PathBuf {
        overriding_path
            .unwrap_or(&self.root)
            .join(format!("{}.json", name))
    }

    fn abi_path(&self, name: &str) -> PathBuf {
        self.root.join(ABIS_DIR).join(format!("{}.json", name))
    }

    fn contract_class(
        &self,
        name: &str,
        overriding_path: Option<&Path>,
    ) -> Result<serde_json::Value, ArtifactError> {
        let path = self.artifact_path(name, overriding_path);
        let contents = self.read(&path)?;
        serde_json::from_str(&contents).map_err(|e| ArtifactError::Invalid {
            path,
            reason: e.to_string(),
        })
    }

    fn class_hash(&self, name: &str, overriding_path: Option<&Path>) -> Result<Felt, ArtifactError> {
        let path = self.artifact_path(name, overriding_path);
        let contents = self.read(&path)?;
        let class: LegacyContractClass =
            serde_json::from_str(&contents).map_err(|e| ArtifactError::Invalid {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        class.class_hash().map_err(|e| ArtifactError::Invalid {
            path,
            reason: format!("class hash: {:?}", e),
        })
    }
}

/// Map a registry ABI reference to its compiled artifact path.
///
/// `artifacts/abis/token.json` becomes `artifacts/token.json`. References
/// outside an `abis/` directory are returned unchanged.
pub fn abi_to_artifact(abi_ref: &str) -> String {
    abi_ref.replace(&format!("{}/", ABIS_DIR), "")
}
