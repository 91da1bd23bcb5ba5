//! Client module: signing, submission and status tracking.
//!
//! - [`Toolbelt`] - The main client, the single entry point for all operations
//! - [`ToolbeltBuilder`] - Fluent builder for configuring the client
//! - [`StatusEngine`] - Status polling with debug-assisted error localization
//!
//! # Signers
//!
//! | Signer | Use Case |
//! |--------|----------|
//! | [`InMemorySigner`] | Scripts and tests with a private key in memory |
//! | [`EnvSigner`] | Keys held in environment variables named after the account alias |
//!
//! # Channels
//!
//! A [`Channel`] carries submissions and status queries to the network.
//! [`StarknetCli`] shells out to the `starknet` command-line client.
//!
//! # Transaction Builders
//!
//! - [`InvokeBuilder`] - Multicall invoke through an account
//! - [`DeclareBuilder`] - Class declaration from a compiled artifact
//! - [`DeployAccountBuilder`] - Counterfactual account deployment

mod channel;
mod cli;
mod execute;
mod signer;
mod status;
mod toolbelt;

pub use channel::{
    Channel, ChannelFuture, DebugContract, QueryFlag, StatusReport, SubmitArgs, SubmitRequest,
};
pub use cli::{STARKNET_PROGRAM, StarknetCli};
pub use execute::{
    SIMULATION_PREAMBLE_LINES, estimate_fee, parse_fee_estimate, parse_simulation, parse_tx_hash,
    simulate, submit,
};
pub use signer::{EC_ORDER, EnvSigner, InMemorySigner, Signature, Signer};
pub use status::{DEFAULT_POLL_INTERVAL, StatusEngine, extract_addresses};
pub use toolbelt::{
    BUILD_DIR_ENV, DEFAULT_ACCOUNT_CONTRACT, DEFAULT_BUILD_DIR, DEFAULT_REGISTRY_DIR, DeclareBuilder, DeployAccountBuilder,
    Execution, InvokeBuilder, NETWORK_ENV, POLL_INTERVAL_ENV, REGISTRY_DIR_ENV, Toolbelt,
    ToolbeltBuilder,
};
