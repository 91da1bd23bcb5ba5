//! Transaction status types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use starknet_core::types::Felt;

/// Network-reported status of a transaction.
///
/// Progresses `NOT_RECEIVED → RECEIVED → PENDING → ACCEPTED_ON_L2 →
/// ACCEPTED_ON_L1`, or ends in `REJECTED`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    NotReceived,
    Received,
    Pending,
    #[serde(rename = "ACCEPTED_ON_L2")]
    AcceptedOnL2,
    #[serde(rename = "ACCEPTED_ON_L1")]
    AcceptedOnL1,
    Rejected,
}

impl TxStatus {
    /// Returns true only for `REJECTED`.
    pub fn is_rejected(&self) -> bool {
        matches!(self, TxStatus::Rejected)
    }

    /// Returns true for either accepted state.
    pub fn is_accepted(&self) -> bool {
        matches!(self, TxStatus::AcceptedOnL2 | TxStatus::AcceptedOnL1)
    }

    /// Returns true once polling can stop.
    pub fn is_terminal(&self) -> bool {
        self.is_accepted() || self.is_rejected()
    }

    /// Position in the progression. Both terminal branches share the
    /// highest stage after `PENDING`.
    pub fn stage(&self) -> u8 {
        match self {
            TxStatus::NotReceived => 0,
            TxStatus::Received => 1,
            TxStatus::Pending => 2,
            TxStatus::AcceptedOnL2 | TxStatus::Rejected => 3,
            TxStatus::AcceptedOnL1 => 4,
        }
    }

    /// The wire name, e.g. `ACCEPTED_ON_L2`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::NotReceived => "NOT_RECEIVED",
            TxStatus::Received => "RECEIVED",
            TxStatus::Pending => "PENDING",
            TxStatus::AcceptedOnL2 => "ACCEPTED_ON_L2",
            TxStatus::AcceptedOnL1 => "ACCEPTED_ON_L1",
            TxStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_RECEIVED" => Ok(TxStatus::NotReceived),
            "RECEIVED" => Ok(TxStatus::Received),
            "PENDING" => Ok(TxStatus::Pending),
            "ACCEPTED_ON_L2" => Ok(TxStatus::AcceptedOnL2),
            "ACCEPTED_ON_L1" => Ok(TxStatus::AcceptedOnL1),
            "REJECTED" => Ok(TxStatus::Rejected),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// How long [`status`](crate::Toolbelt::status) keeps polling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WatchMode {
    /// Poll until the transaction is accepted or rejected.
    Track,
    /// Like `Track`, and enrich rejection messages with source locations.
    Debug,
}

impl WatchMode {
    /// Returns true for [`WatchMode::Debug`].
    pub fn is_debug(&self) -> bool {
        matches!(self, WatchMode::Debug)
    }
}

impl FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(WatchMode::Track),
            "debug" => Ok(WatchMode::Debug),
            other => Err(format!("unknown watch mode '{}'", other)),
        }
    }
}

/// Outcome of a status query.
///
/// A rejection is an expected outcome and is carried here rather than as an
/// error. Without a watch mode the status may still be non-terminal; callers
/// that need finality poll again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionStatus {
    pub tx_hash: Felt,
    pub status: TxStatus,
    pub error_message: Option<String>,
}

impl TransactionStatus {
    /// Returns true if the network rejected the transaction.
    pub fn is_rejected(&self) -> bool {
        self.status.is_rejected()
    }

    /// Returns true if the network accepted the transaction.
    pub fn is_accepted(&self) -> bool {
        self.status.is_accepted()
    }
}
