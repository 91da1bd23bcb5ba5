//! Core types for Starknet transactions.
//!
//! Plain data: networks, calls, transactions and their statuses. Nothing in
//! here performs I/O.

mod call;
mod network;
mod status;
mod transaction;

pub use starknet_core::types::Felt;

pub use call::{
    Call, CallDescriptor, DecodedCall, decode_multicall, encode_multicall, to_call_array,
};
pub use network::Network;
pub use status::{TransactionStatus, TxStatus, WatchMode};
pub use transaction::{
    DeclarePayload, DeployAccountPayload, EXECUTE_ENTRY_POINT, InvokePayload, Payload,
    QUERY_VERSION_BASE, SignedTransaction, TRANSACTION_VERSION, Transaction, TxKind,
};
