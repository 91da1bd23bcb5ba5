//! Build, sign, submit and track Starknet transactions.
//!
//! **stark-kit** is the transaction lifecycle engine of a Starknet developer
//! toolbelt: typed transactions with deterministic hashes, STARK signing,
//! multicall encoding, submission through a pluggable channel, and status
//! polling that can point a rejection back at local source artifacts. Alias
//! registries map human-readable names to deployed addresses.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use stark_kit::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stark_kit::Error> {
//!     let belt = Toolbelt::from_env()?;
//!     let signer = EnvSigner::new("PKEY1")?;
//!     let account = belt.accounts().resolve("PKEY1", belt.network())?.address;
//!
//!     let tx = belt.declare(account, "token").max_fee(10u128.pow(15)).await?;
//!     let fee = belt.estimate_fee(&tx, &signer).await?;
//!     println!("declaring for about {} wei", fee);
//!
//!     let execution = belt.execute(&tx, &signer, Some(WatchMode::Debug)).await?;
//!     if let Some(error) = execution.status.error_message {
//!         eprintln!("rejected: {}", error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Lifecycle
//!
//! 1. A [`Transaction`] computes its hash and query hash at construction.
//! 2. A [`Signer`] signs one of them, producing a [`SignedTransaction`].
//! 3. The [`Channel`] submits it; the reported hash must match the local one.
//! 4. The [`StatusEngine`] polls until the [`WatchMode`] is satisfied.
//!
//! # Core Types
//!
//! - [`Felt`] - Field element, used for addresses, selectors and calldata
//! - [`Network`] - Known networks and their chain ids
//! - [`Call`] - One contract call inside a multicall
//! - [`TxStatus`] - Network-reported transaction status

pub mod artifacts;
pub mod client;
pub mod error;
pub mod registry;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    ArtifactError, CallError, ChannelError, Error, ParseNetworkError, RegistryError, SignerError,
};
pub use types::*;

pub use artifacts::{ArtifactStore, BuildDir, abi_to_artifact};

pub use client::{
    Channel, ChannelFuture, DebugContract, DeclareBuilder, DeployAccountBuilder, EnvSigner,
    Execution, InMemorySigner, InvokeBuilder, QueryFlag, Signature, Signer, StarknetCli,
    StatusEngine, StatusReport, SubmitArgs, SubmitRequest, Toolbelt, ToolbeltBuilder,
};

pub use registry::{
    AccountRecord, AccountRegistry, AddressStore, DeclarationRecord, DeclarationRegistry,
    DeploymentRecord, DeploymentRegistry,
};
