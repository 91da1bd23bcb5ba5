//! Network identification for Starknet.

use std::fmt;
use std::str::FromStr;

use starknet_core::types::Felt;

use crate::error::ParseNetworkError;

/// The Starknet network a transaction targets.
///
/// Registry files are keyed by the network name, so the string form is part
/// of the on-disk format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Network {
    /// A local devnet node.
    #[default]
    Localhost,
    /// Public Goerli testnet.
    Goerli,
    /// Second Goerli testnet.
    Goerli2,
    /// Integration environment.
    Integration,
    /// Starknet mainnet.
    Mainnet,
}

impl Network {
    /// All known networks.
    pub const ALL: [Network; 5] = [
        Network::Localhost,
        Network::Goerli,
        Network::Goerli2,
        Network::Integration,
        Network::Mainnet,
    ];

    /// Returns true if this is mainnet.
    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }

    /// Returns true if this is a local devnet.
    pub fn is_localhost(&self) -> bool {
        matches!(self, Network::Localhost)
    }

    /// Returns the network identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Localhost => "localhost",
            Network::Goerli => "goerli",
            Network::Goerli2 => "goerli2",
            Network::Integration => "integration",
            Network::Mainnet => "mainnet",
        }
    }

    /// The chain id mixed into every transaction hash.
    ///
    /// Local devnets and the integration environment reuse the Goerli id.
    pub fn chain_id(&self) -> Felt {
        let short_string: &[u8] = match self {
            Network::Mainnet => b"SN_MAIN",
            Network::Goerli2 => b"SN_GOERLI2",
            Network::Goerli | Network::Integration | Network::Localhost => b"SN_GOERLI",
        };
        Felt::from_bytes_be_slice(short_string)
    }

    /// Base URL of the network's gateway.
    pub fn gateway_url(&self) -> &'static str {
        match self {
            Network::Localhost => "http://127.0.0.1:5050",
            Network::Goerli => "https://alpha4.starknet.io",
            Network::Goerli2 => "https://alpha4-2.starknet.io",
            Network::Integration => "https://external.integration.starknet.io",
            Network::Mainnet => "https://alpha-mainnet.starknet.io",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ParseNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseNetworkError(s.to_string()))
    }
}
