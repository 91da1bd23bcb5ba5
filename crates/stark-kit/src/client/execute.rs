//! Execution pipeline: sign, submit, correlate.
//!
//! The channel answers in free text. The patterns below are the contract:
//!
//! ```text
//! Transaction hash: 0x...
//! The estimated fee is: <int> WEI (<float> ETH).
//! ```
//!
//! and, for simulations, a JSON document after a fixed preamble.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::channel::{Channel, QueryFlag, SubmitRequest};
use super::signer::Signer;
use crate::error::Error;
use crate::types::{Felt, Transaction};

/// Text lines the channel prints before a simulation's JSON body.
pub const SIMULATION_PREAMBLE_LINES: usize = 2;

static TX_HASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Transaction hash:\s*(0x[0-9a-fA-F]+)").expect("tx hash pattern is valid")
});

static FEE_ESTIMATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"The estimated fee is:\s*(\d+)").expect("fee pattern is valid")
});

/// Extract the transaction hash from a submission response.
pub fn parse_tx_hash(output: &str) -> Result<Felt, Error> {
    TX_HASH
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<Felt>().ok())
        .ok_or_else(|| Error::MissingTxHash(output.trim().to_string()))
}

/// Extract the fee estimate, in wei, from an `estimate_fee` response.
pub fn parse_fee_estimate(output: &str) -> Result<u128, Error> {
    FEE_ESTIMATE
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u128>().ok())
        .ok_or_else(|| Error::InvalidFeeEstimate(output.trim().to_string()))
}

/// Parse a simulation response, skipping the text preamble.
pub fn parse_simulation(output: &str) -> Result<serde_json::Value, Error> {
    let body = output
        .lines()
        .skip(SIMULATION_PREAMBLE_LINES)
        .collect::<Vec<_>>()
        .join("\n");
    serde_json::from_str(&body).map_err(|e| Error::InvalidSimulation(e.to_string()))
}

/// Sign the canonical hash, submit, and check the reported hash.
///
/// Returns the raw response. A hash mismatch is fatal: the transaction must
/// not be assumed submitted.
pub async fn submit(
    channel: &dyn Channel,
    tx: &Transaction,
    signer: &dyn Signer,
) -> Result<String, Error> {
    let signed = tx.sign(signer)?;
    debug!(
        kind = tx.kind().as_str(),
        hash = %tx.hash().to_hex_string(),
        nonce = %tx.nonce(),
        max_fee = tx.max_fee(),
        network = %tx.network(),
        "submitting transaction"
    );

    let output = channel.submit(SubmitRequest::new(&signed, None)).await?;

    let received = parse_tx_hash(&output)?;
    if received != tx.hash() {
        return Err(Error::HashMismatch {
            expected: tx.hash().to_hex_string(),
            received: received.to_hex_string(),
        });
    }
    Ok(output)
}

/// Estimate the fee of `tx`. Signs the query hash; nothing is submitted.
pub async fn estimate_fee(
    channel: &dyn Channel,
    tx: &Transaction,
    signer: &dyn Signer,
) -> Result<u128, Error> {
    let output = query(channel, tx, signer, QueryFlag::EstimateFee).await?;
    parse_fee_estimate(&output)
}

/// Simulate `tx`. Signs the query hash; nothing is submitted.
pub async fn simulate(
    channel: &dyn Channel,
    tx: &Transaction,
    signer: &dyn Signer,
) -> Result<serde_json::Value, Error> {
    let output = query(channel, tx, signer, QueryFlag::Simulate).await?;
    parse_simulation(&output)
}

async fn query(
    channel: &dyn Channel,
    tx: &Transaction,
    signer: &dyn Signer,
    flag: QueryFlag,
) -> Result<String, Error> {
    let signed = tx.sign_query(signer)?;
    debug!(
        kind = tx.kind().as_str(),
        query = flag.as_str(),
        query_hash = %tx.query_hash().to_hex_string(),
        "querying transaction"
    );
    Ok(channel.submit(SubmitRequest::new(&signed, Some(flag))).await?)
}
