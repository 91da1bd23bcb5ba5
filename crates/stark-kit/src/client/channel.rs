//! Submission and query channel.
//!
//! The engine never talks to the network itself. It hands a signed
//! [`SubmitRequest`] to a [`Channel`] and parses the text that comes back.
//! [`StarknetCli`](super::StarknetCli) is the stock implementation; tests
//! plug in scripted ones.

use std::path::PathBuf;

use futures::future::BoxFuture;
use serde::Deserialize;
use starknet_core::types::Felt;

use super::signer::Signature;
use crate::error::ChannelError;
use crate::types::{Network, Payload, SignedTransaction, TxKind, TxStatus};

/// Future returned by channel operations.
pub type ChannelFuture<'a, T> = BoxFuture<'a, Result<T, ChannelError>>;

// ============================================================================
// Channel Trait
// ============================================================================

/// Transport for submissions and status queries.
///
/// Errors propagate unmodified; implementations should not retry.
pub trait Channel: Send + Sync {
    /// Submit a signed transaction, or run a fee estimate or simulation when
    /// `request.query_flag` is set. Returns the raw response text.
    fn submit(&self, request: SubmitRequest) -> ChannelFuture<'_, String>;

    /// Query the current status of a transaction.
    fn tx_status(&self, tx_hash: Felt, network: Network) -> ChannelFuture<'_, StatusReport>;

    /// Re-query a rejected transaction with local artifacts attached so the
    /// network can locate the failure in source. Returns the enriched error
    /// message.
    fn debug_tx(
        &self,
        tx_hash: Felt,
        network: Network,
        contracts: Vec<DebugContract>,
    ) -> ChannelFuture<'_, String>;

    /// Current nonce of an account.
    fn get_nonce(&self, address: Felt, network: Network) -> ChannelFuture<'_, Felt>;
}

// ============================================================================
// Requests
// ============================================================================

/// Marks a submission as a read-only query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryFlag {
    EstimateFee,
    Simulate,
}

impl QueryFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryFlag::EstimateFee => "estimate_fee",
            QueryFlag::Simulate => "simulate",
        }
    }
}

/// Kind-specific submission arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitArgs {
    Invoke {
        entry_point: String,
        calldata: Vec<Felt>,
        /// Sending account's ABI.
        account_abi: Option<PathBuf>,
    },
    Declare {
        contract_path: PathBuf,
    },
    DeployAccount {
        class_hash: Felt,
        salt: Felt,
        calldata: Vec<Felt>,
    },
}

impl SubmitArgs {
    fn from_payload(payload: &Payload) -> Self {
        match payload {
            Payload::Invoke(p) => SubmitArgs::Invoke {
                entry_point: p.entry_point.clone(),
                calldata: p.calldata.clone(),
                account_abi: p.account_abi.clone(),
            },
            Payload::Declare(p) => SubmitArgs::Declare {
                contract_path: p.artifact_path.clone(),
            },
            Payload::DeployAccount(p) => SubmitArgs::DeployAccount {
                class_hash: p.class_hash,
                salt: p.salt,
                calldata: p.calldata.clone(),
            },
        }
    }
}

/// A signed transaction ready for the channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitRequest {
    pub kind: TxKind,
    pub network: Network,
    /// Sending account, or the predicted address for deploy-account.
    pub sender: Felt,
    pub signature: Signature,
    pub max_fee: u128,
    pub nonce: Felt,
    pub query_flag: Option<QueryFlag>,
    pub args: SubmitArgs,
}

impl SubmitRequest {
    /// Build the request for a signed transaction.
    pub fn new(signed: &SignedTransaction<'_>, query_flag: Option<QueryFlag>) -> Self {
        let tx = signed.transaction();
        Self {
            kind: tx.kind(),
            network: tx.network(),
            sender: tx.account_address(),
            signature: *signed.signature(),
            max_fee: tx.max_fee(),
            nonce: tx.nonce(),
            query_flag,
            args: SubmitArgs::from_payload(tx.payload()),
        }
    }
}

/// A deployed contract and the compiled artifact describing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebugContract {
    pub address: Felt,
    pub artifact_path: String,
}

impl DebugContract {
    /// `address:path`, the form the CLI's `--contracts` takes.
    pub fn to_arg(&self) -> String {
        format!("{:#x}:{}", self.address, self.artifact_path)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Status as reported by the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub status: TxStatus,
    /// Failure reason, present for rejected transactions.
    pub error_message: Option<String>,
}

#[derive(Deserialize)]
struct RawStatus {
    tx_status: TxStatus,
    #[serde(default)]
    tx_failure_reason: Option<RawFailureReason>,
}

#[derive(Deserialize)]
struct RawFailureReason {
    #[serde(default)]
    error_message: Option<String>,
}

impl StatusReport {
    pub fn new(status: TxStatus) -> Self {
        Self {
            status,
            error_message: None,
        }
    }

    pub fn rejected(error_message: impl Into<String>) -> Self {
        Self {
            status: TxStatus::Rejected,
            error_message: Some(error_message.into()),
        }
    }

    /// Parse the gateway's `tx_status` JSON:
    ///
    /// ```json
    /// {"tx_status": "REJECTED", "tx_failure_reason": {"error_message": "..."}}
    /// ```
    pub fn from_json(text: &str) -> Result<Self, ChannelError> {
        let raw: RawStatus = serde_json::from_str(text.trim())?;
        Ok(Self {
            status: raw.tx_status,
            error_message: raw.tx_failure_reason.and_then(|r| r.error_message),
        })
    }
}
