//! Error types for stark-kit.
//!
//! # Error Hierarchy
//!
//! - [`Error`](enum@Error) - Main error type, returned by most operations
//!   - [`CallError`] - Malformed multicall input
//!   - [`SignerError`] - Invalid keys, signing failures
//!   - [`ChannelError`] - Submission/query channel failures (never retried)
//!   - [`RegistryError`] - Alias/address lookups and registry file I/O
//!   - [`ArtifactError`] - Compiled artifact lookups
//!   - [`ParseNetworkError`] - Unknown network name
//!
//! On-chain rejection is *not* an error: it is reported as data through
//! [`TransactionStatus`](crate::TransactionStatus).
//!
//! # Example
//!
//! ```rust,no_run
//! use stark_kit::{AddressStore, Error, Network, RegistryError, Toolbelt};
//!
//! # fn example() -> Result<(), Error> {
//! let belt = Toolbelt::localhost().build();
//!
//! match belt.deployments().resolve("my_token", Network::Localhost) {
//!     Ok((address, abi)) => println!("{:#x} uses {}", address, abi),
//!     Err(RegistryError::NotFound { .. }) => println!("not deployed yet"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use starknet_core::types::Felt;
use thiserror::Error;

/// Error parsing a network name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown network '{0}'. Expected one of: localhost, goerli, goerli2, integration, mainnet")]
pub struct ParseNetworkError(pub String);

/// Error building multicall calldata.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("Call #{index} must have exactly 3 elements (target, selector, arguments), got {len}")]
    InvalidCallArity { index: usize, len: usize },

    #[error("Invalid selector '{0}': entry points are named by ASCII strings")]
    InvalidSelector(String),

    #[error("Invalid felt in call #{index}: '{value}'")]
    InvalidFelt { index: usize, value: String },

    #[error("Malformed multicall calldata: {0}")]
    MalformedCalldata(String),
}

/// Error during signing operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Environment variable {0} not set")]
    MissingEnv(String),
}

/// Errors from the submission/query channel.
///
/// These propagate unmodified; nothing in this crate retries a submission.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("Invalid channel response: {0}")]
    InvalidResponse(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the address registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No entry for '{identifier}' in the {network} registry")]
    NotFound { identifier: String, network: String },

    #[error("Alias '{alias}' is already bound to {existing:#x}")]
    DuplicateAlias { alias: String, existing: Felt },

    #[error("Invalid alias '{alias}': {reason}")]
    InvalidAlias { alias: String, reason: String },

    #[error("Invalid ABI reference '{0}': registry fields cannot contain ':' or line breaks")]
    InvalidAbiRef(String),

    #[error("Malformed registry line {line} in {}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    /// Returns true if this is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    pub(crate) fn not_found(identifier: impl Into<String>, network: impl ToString) -> Self {
        RegistryError::NotFound {
            identifier: identifier.into(),
            network: network.to_string(),
        }
    }
}

/// Errors loading compiled contract artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifact {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

// ============================================================================
// Main Error Type
// ============================================================================

/// Main error type for stark-kit operations.
#[derive(Debug, Error)]
pub enum Error {
    // ─── Configuration ───
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    ParseNetwork(#[from] ParseNetworkError),

    // ─── Validation ───
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Transaction hash computed to zero")]
    EmptyHash,

    #[error(transparent)]
    Call(#[from] CallError),

    // ─── Signing ───
    #[error(transparent)]
    Signing(#[from] SignerError),

    // ─── Integrity ───
    #[error("Transaction hash mismatch: computed {expected}, channel reported {received}")]
    HashMismatch { expected: String, received: String },

    #[error("Channel response carries no transaction hash: {0}")]
    MissingTxHash(String),

    // ─── Query responses ───
    #[error("Channel response carries no fee estimate: {0}")]
    InvalidFeeEstimate(String),

    #[error("Invalid simulation payload: {0}")]
    InvalidSimulation(String),

    // ─── Status ───
    #[error("Gave up waiting for {tx_hash} after {elapsed_secs}s")]
    StatusTimeout { tx_hash: String, elapsed_secs: u64 },

    // ─── Collaborators ───
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl Error {
    /// Returns true for integrity failures: the transaction must not be
    /// assumed submitted.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::HashMismatch { .. } | Error::MissingTxHash(_))
    }
}
