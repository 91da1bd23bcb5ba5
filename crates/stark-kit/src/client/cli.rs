//! [`Channel`] backed by the `starknet` command-line client.

use tokio::process::Command;
use tracing::debug;

use super::channel::{
    Channel, ChannelFuture, DebugContract, QueryFlag, StatusReport, SubmitArgs, SubmitRequest,
};
use crate::error::ChannelError;
use crate::types::{Felt, Network};

/// Default program name.
pub const STARKNET_PROGRAM: &str = "starknet";

/// Shells out to the `starknet` CLI for every channel operation.
///
/// Wallet handling is always disabled (`--no_wallet`): the engine signs and
/// passes the signature explicitly.
#[derive(Clone, Debug)]
pub struct StarknetCli {
    program: String,
    gateway_url: Option<String>,
}

impl Default for StarknetCli {
    fn default() -> Self {
        Self::new()
    }
}

impl StarknetCli {
    pub fn new() -> Self {
        Self {
            program: STARKNET_PROGRAM.to_string(),
            gateway_url: None,
        }
    }

    /// Use a different executable, e.g. one inside a virtualenv.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Override the gateway for every network.
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    fn network_args(&self, network: Network) -> Vec<String> {
        let url = self
            .gateway_url
            .clone()
            .unwrap_or_else(|| network.gateway_url().to_string());
        vec![
            "--gateway_url".to_string(),
            url.clone(),
            "--feeder_gateway_url".to_string(),
            url,
        ]
    }

    /// Arguments for a submission.
    pub fn submit_args(&self, request: &SubmitRequest) -> Vec<String> {
        let mut args = vec![request.kind.as_str().to_string()];

        match &request.args {
            SubmitArgs::Invoke {
                entry_point,
                calldata,
                account_abi,
            } => {
                args.extend([
                    "--address".to_string(),
                    hex(&request.sender),
                    "--function".to_string(),
                    entry_point.clone(),
                ]);
                // without it the CLI cannot encode the inputs and exits non-zero
                if let Some(abi) = account_abi {
                    args.extend(["--abi".to_string(), abi.display().to_string()]);
                }
                push_inputs(&mut args, calldata);
            }
            SubmitArgs::Declare { contract_path } => {
                args.extend([
                    "--contract".to_string(),
                    contract_path.display().to_string(),
                    "--sender".to_string(),
                    hex(&request.sender),
                ]);
            }
            SubmitArgs::DeployAccount {
                class_hash,
                salt,
                calldata,
            } => {
                args.extend([
                    "--class_hash".to_string(),
                    hex(class_hash),
                    "--salt".to_string(),
                    hex(salt),
                ]);
                push_inputs(&mut args, calldata);
            }
        }

        args.extend([
            "--signature".to_string(),
            hex(&request.signature.r),
            hex(&request.signature.s),
            "--max_fee".to_string(),
            request.max_fee.to_string(),
            "--nonce".to_string(),
            request.nonce.to_string(),
        ]);

        match request.query_flag {
            Some(QueryFlag::EstimateFee) => args.push("--estimate_fee".to_string()),
            Some(QueryFlag::Simulate) => args.push("--simulate".to_string()),
            None => {}
        }

        args.extend(self.network_args(request.network));
        args.push("--no_wallet".to_string());
        args
    }

    /// Arguments for a status query, optionally with debug contracts.
    pub fn status_args(
        &self,
        tx_hash: Felt,
        network: Network,
        contracts: &[DebugContract],
    ) -> Vec<String> {
        let mut args = vec![
            "tx_status".to_string(),
            "--hash".to_string(),
            hex(&tx_hash),
        ];
        if !contracts.is_empty() {
            let joined = contracts
                .iter()
                .map(DebugContract::to_arg)
                .collect::<Vec<_>>()
                .join(",");
            args.extend(["--contracts".to_string(), joined, "--error_message".to_string()]);
        }
        args.extend(self.network_args(network));
        args
    }

    /// Arguments for a nonce query.
    pub fn nonce_args(&self, address: Felt, network: Network) -> Vec<String> {
        let mut args = vec![
            "get_nonce".to_string(),
            "--contract_address".to_string(),
            hex(&address),
        ];
        args.extend(self.network_args(network));
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<String, ChannelError> {
        debug!(program = %self.program, command = %args.first().map(String::as_str).unwrap_or(""), "running starknet cli");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| ChannelError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ChannelError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Channel for StarknetCli {
    fn submit(&self, request: SubmitRequest) -> ChannelFuture<'_, String> {
        Box::pin(async move { self.run(self.submit_args(&request)).await })
    }

    fn tx_status(&self, tx_hash: Felt, network: Network) -> ChannelFuture<'_, StatusReport> {
        Box::pin(async move {
            let output = self.run(self.status_args(tx_hash, network, &[])).await?;
            StatusReport::from_json(&output)
        })
    }

    fn debug_tx(
        &self,
        tx_hash: Felt,
        network: Network,
        contracts: Vec<DebugContract>,
    ) -> ChannelFuture<'_, String> {
        Box::pin(async move { self.run(self.status_args(tx_hash, network, &contracts)).await })
    }

    fn get_nonce(&self, address: Felt, network: Network) -> ChannelFuture<'_, Felt> {
        Box::pin(async move {
            let output = self.run(self.nonce_args(address, network)).await?;
            output
                .trim()
                .parse::<Felt>()
                .map_err(|_| ChannelError::InvalidResponse(format!("nonce: '{}'", output.trim())))
        })
    }
}

fn hex(felt: &Felt) -> String {
    format!("{:#x}", felt)
}

fn push_inputs(args: &mut Vec<String>, calldata: &[Felt]) {
    if calldata.is_empty() {
        return;
    }
    args.push("--inputs".to_string());
    args.extend(calldata.iter().map(Felt::to_string));
}
