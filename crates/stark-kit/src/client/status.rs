//! Status polling and debug-assisted error localization.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use super::channel::{Channel, DebugContract};
use crate::artifacts::abi_to_artifact;
use crate::error::Error;
use crate::registry::DeploymentRegistry;
use crate::types::{Felt, Network, TransactionStatus, TxStatus, WatchMode};

/// Default delay between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

static ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[\da-f]{1,64}").expect("address pattern is valid"));

/// Every distinct address-shaped value in `message`, in order of appearance.
pub fn extract_addresses(message: &str) -> Vec<Felt> {
    let mut addresses = Vec::new();
    for m in ADDRESS.find_iter(message) {
        if let Ok(address) = m.as_str().parse::<Felt>() {
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
    }
    addresses
}

/// Polls a transaction's status until the watch mode is satisfied.
///
/// Holds no state of its own beyond borrowed collaborators.
pub struct StatusEngine<'a> {
    channel: &'a dyn Channel,
    deployments: &'a DeploymentRegistry,
    poll_interval: Duration,
}

impl<'a> StatusEngine<'a> {
    pub fn new(
        channel: &'a dyn Channel,
        deployments: &'a DeploymentRegistry,
        poll_interval: Duration,
    ) -> Self {
        Self {
            channel,
            deployments,
            poll_interval,
        }
    }

    /// Query the status of `tx_hash`.
    ///
    /// Without a watch mode the first answer is returned as is, terminal or
    /// not. With one, polling continues every `poll_interval` until the
    /// transaction is accepted or rejected; there is no attempt limit, so
    /// callers bound the wait with a timeout or by dropping the future.
    pub async fn status(
        &self,
        tx_hash: Felt,
        network: Network,
        watch: Option<WatchMode>,
    ) -> Result<TransactionStatus, Error> {
        let mut report = self.channel.tx_status(tx_hash, network).await?;

        if watch.is_some() {
            let mut polls = 1u32;
            while !report.status.is_terminal() {
                debug!(
                    tx_hash = %tx_hash.to_hex_string(),
                    status = %report.status,
                    polls,
                    "transaction pending, polling again"
                );
                tokio::time::sleep(self.poll_interval).await;

                let previous = report.status;
                report = self.channel.tx_status(tx_hash, network).await?;
                polls += 1;
                if report.status.stage() < previous.stage() {
                    warn!(
                        tx_hash = %tx_hash.to_hex_string(),
                        from = %previous,
                        to = %report.status,
                        "status moved backwards"
                    );
                }
            }
        }

        let error_message = if report.status == TxStatus::Rejected {
            let message = report.error_message.unwrap_or_default();
            if watch.is_some_and(|w| w.is_debug()) {
                Some(self.debug_assist(tx_hash, network, message).await)
            } else {
                Some(message)
            }
        } else {
            None
        };

        if report.status.is_terminal() {
            info!(
                tx_hash = %tx_hash.to_hex_string(),
                status = %report.status,
                "transaction settled"
            );
        }

        Ok(TransactionStatus {
            tx_hash,
            status: report.status,
            error_message,
        })
    }

    /// Like [`status`](Self::status), giving up after `limit`.
    pub async fn status_with_timeout(
        &self,
        tx_hash: Felt,
        network: Network,
        watch: Option<WatchMode>,
        limit: Duration,
    ) -> Result<TransactionStatus, Error> {
        tokio::time::timeout(limit, self.status(tx_hash, network, watch))
            .await
            .map_err(|_| Error::StatusTimeout {
                tx_hash: tx_hash.to_hex_string(),
                elapsed_secs: limit.as_secs(),
            })?
    }

    /// Re-query with the artifacts of every known contract the message
    /// mentions. Falls back to `message` whenever enrichment is impossible.
    async fn debug_assist(&self, tx_hash: Felt, network: Network, message: String) -> String {
        let addresses = extract_addresses(&message);
        if addresses.is_empty() {
            warn!(tx_hash = %tx_hash.to_hex_string(), "no addresses in error message, skipping debug");
            return message;
        }

        let records = match self.deployments.find_addresses(&addresses, network) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "could not read deployments, skipping debug");
                return message;
            }
        };
        if records.is_empty() {
            warn!(
                tx_hash = %tx_hash.to_hex_string(),
                candidates = addresses.len(),
                "no local deployment matches the error message, skipping debug"
            );
            return message;
        }

        let contracts: Vec<DebugContract> = records
            .into_iter()
            .map(|r| DebugContract {
                address: r.address,
                artifact_path: abi_to_artifact(&r.abi),
            })
            .collect();
        debug!(
            tx_hash = %tx_hash.to_hex_string(),
            contracts = contracts.len(),
            "re-querying with local artifacts"
        );

        match self.channel.debug_tx(tx_hash, network, contracts).await {
            Ok(enriched) if !enriched.trim().is_empty() => enriched.trim().to_string(),
            Ok(_) => message,
            Err(e) => {
                warn!(error = %e, "debug query failed, keeping original error");
                message
            }
        }
    }
}
