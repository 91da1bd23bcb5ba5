//! Transaction types.
//!
//! A [`Transaction`] carries the fields shared by every kind plus a
//! [`Payload`] for the kind-specific ones. Both hashes are computed once at
//! construction and only change through [`Transaction::update_fee`].
//!
//! Every kind hashes the same way:
//!
//! ```text
//! h([prefix, version, address, 0, h(payload), max_fee, chain_id, nonce])
//! ```
//!
//! where `h` is the Pedersen hash chain and `prefix` is the ASCII kind name.
//! The prefix keeps kinds from colliding even when every other field matches.

use std::path::PathBuf;

use starknet_core::crypto::compute_hash_on_elements;
use starknet_core::types::Felt;
use starknet_core::utils::{get_contract_address, get_selector_from_name};

use super::Network;
use crate::client::{Signature, Signer};
use crate::error::{CallError, Error, SignerError};

/// Protocol version of every transaction built here.
pub const TRANSACTION_VERSION: Felt = Felt::ONE;

/// Offset added to the version for fee-estimation and simulation hashes
/// (`2^128`). The network never accepts a state change signed under it.
pub const QUERY_VERSION_BASE: Felt = Felt::from_hex_unchecked("0x100000000000000000000000000000000");

/// Account entry point that receives multicall calldata.
pub const EXECUTE_ENTRY_POINT: &str = "__execute__";

const INVOKE_PREFIX: &[u8] = b"invoke";
const DECLARE_PREFIX: &[u8] = b"declare";
const DEPLOY_ACCOUNT_PREFIX: &[u8] = b"deploy_account";

/// The kind of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxKind {
    Invoke,
    Declare,
    DeployAccount,
}

impl TxKind {
    /// Command name used by the submission channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Invoke => "invoke",
            TxKind::Declare => "declare",
            TxKind::DeployAccount => "deploy_account",
        }
    }

    fn prefix(&self) -> Felt {
        let prefix = match self {
            TxKind::Invoke => INVOKE_PREFIX,
            TxKind::Declare => DECLARE_PREFIX,
            TxKind::DeployAccount => DEPLOY_ACCOUNT_PREFIX,
        };
        Felt::from_bytes_be_slice(prefix)
    }
}

/// Invoke-specific fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvokePayload {
    /// Account entry point, `__execute__` unless overridden.
    pub entry_point: String,
    pub calldata: Vec<Felt>,
    /// ABI of the sending account, which the CLI channel needs to encode
    /// the entry point's inputs. Not part of the hash.
    pub account_abi: Option<PathBuf>,
}

impl InvokePayload {
    /// Calldata routed through the account's `__execute__`.
    pub fn execute(calldata: Vec<Felt>) -> Self {
        Self {
            entry_point: EXECUTE_ENTRY_POINT.to_string(),
            calldata,
            account_abi: None,
        }
    }

    /// Attach the sending account's ABI.
    pub fn with_account_abi(mut self, abi: impl Into<PathBuf>) -> Self {
        self.account_abi = Some(abi.into());
        self
    }

    /// Selector of [`entry_point`](Self::entry_point).
    pub fn entry_point_selector(&self) -> Result<Felt, CallError> {
        get_selector_from_name(&self.entry_point)
            .map_err(|_| CallError::InvalidSelector(self.entry_point.clone()))
    }
}

/// Declare-specific fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclarePayload {
    /// Contract name as known to the artifact store.
    pub contract_name: String,
    /// The compiled class.
    pub contract_class: serde_json::Value,
    /// Class hash of `contract_class`.
    pub class_hash: Felt,
    /// Where the compiled class was read from.
    pub artifact_path: PathBuf,
    /// Artifact search override used to locate the class, if any.
    pub overriding_path: Option<PathBuf>,
}

/// DeployAccount-specific fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployAccountPayload {
    pub contract_name: String,
    /// Constructor arguments.
    pub calldata: Vec<Felt>,
    pub class_hash: Felt,
    pub salt: Felt,
    /// Address the account will be deployed at; doubles as the sender.
    pub predicted_address: Felt,
}

impl DeployAccountPayload {
    /// Build the payload, computing the counterfactual address.
    pub fn new(
        contract_name: impl Into<String>,
        class_hash: Felt,
        salt: Felt,
        calldata: Vec<Felt>,
    ) -> Self {
        let predicted_address = get_contract_address(salt, class_hash, &calldata, Felt::ZERO);
        Self {
            contract_name: contract_name.into(),
            calldata,
            class_hash,
            salt,
            predicted_address,
        }
    }
}

/// Kind-specific transaction fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Invoke(InvokePayload),
    Declare(DeclarePayload),
    DeployAccount(DeployAccountPayload),
}

impl Payload {
    /// The transaction kind.
    pub fn kind(&self) -> TxKind {
        match self {
            Payload::Invoke(_) => TxKind::Invoke,
            Payload::Declare(_) => TxKind::Declare,
            Payload::DeployAccount(_) => TxKind::DeployAccount,
        }
    }

    fn data_hash(&self) -> Felt {
        match self {
            Payload::Invoke(p) => compute_hash_on_elements(&p.calldata),
            Payload::Declare(p) => compute_hash_on_elements(&[p.class_hash]),
            Payload::DeployAccount(p) => {
                let mut data = Vec::with_capacity(2 + p.calldata.len());
                data.push(p.class_hash);
                data.push(p.salt);
                data.extend_from_slice(&p.calldata);
                compute_hash_on_elements(&data)
            }
        }
    }
}

/// An unsigned transaction with its derived hashes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    account_address: Felt,
    max_fee: u128,
    nonce: Felt,
    network: Network,
    version: Felt,
    chain_id: Felt,
    payload: Payload,
    hash: Felt,
    query_hash: Felt,
}

impl Transaction {
    /// Create a transaction and compute its hashes.
    ///
    /// For deploy-account payloads `account_address` must be the predicted
    /// address.
    pub fn new(
        account_address: Felt,
        max_fee: u128,
        nonce: Felt,
        network: Network,
        payload: Payload,
    ) -> Result<Self, Error> {
        if let Payload::DeployAccount(p) = &payload {
            if p.predicted_address != account_address {
                return Err(Error::InvalidTransaction(format!(
                    "deploy_account sender {:#x} differs from predicted address {:#x}",
                    account_address, p.predicted_address
                )));
            }
        }

        let mut tx = Self {
            account_address,
            max_fee,
            nonce,
            network,
            version: TRANSACTION_VERSION,
            chain_id: network.chain_id(),
            payload,
            hash: Felt::ZERO,
            query_hash: Felt::ZERO,
        };
        tx.rehash();
        tx.validate()?;
        Ok(tx)
    }

    /// An invoke through the account's `__execute__` entry point.
    pub fn invoke(
        account_address: Felt,
        calldata: Vec<Felt>,
        max_fee: u128,
        nonce: Felt,
        network: Network,
    ) -> Result<Self, Error> {
        Self::new(
            account_address,
            max_fee,
            nonce,
            network,
            Payload::Invoke(InvokePayload::execute(calldata)),
        )
    }

    /// A class declaration sent by `account_address`.
    pub fn declare(
        account_address: Felt,
        payload: DeclarePayload,
        max_fee: u128,
        nonce: Felt,
        network: Network,
    ) -> Result<Self, Error> {
        Self::new(
            account_address,
            max_fee,
            nonce,
            network,
            Payload::Declare(payload),
        )
    }

    /// A counterfactual account deployment.
    pub fn deploy_account(
        payload: DeployAccountPayload,
        max_fee: u128,
        nonce: Felt,
        network: Network,
    ) -> Result<Self, Error> {
        Self::new(
            payload.predicted_address,
            max_fee,
            nonce,
            network,
            Payload::DeployAccount(payload),
        )
    }

    pub fn account_address(&self) -> Felt {
        self.account_address
    }

    pub fn max_fee(&self) -> u128 {
        self.max_fee
    }

    pub fn nonce(&self) -> Felt {
        self.nonce
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn version(&self) -> Felt {
        self.version
    }

    pub fn chain_id(&self) -> Felt {
        self.chain_id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> TxKind {
        self.payload.kind()
    }

    /// Calldata of invoke and deploy-account transactions.
    pub fn calldata(&self) -> Option<&[Felt]> {
        match &self.payload {
            Payload::Invoke(p) => Some(&p.calldata),
            Payload::DeployAccount(p) => Some(&p.calldata),
            Payload::Declare(_) => None,
        }
    }

    /// Canonical hash under [`TRANSACTION_VERSION`].
    pub fn hash(&self) -> Felt {
        self.hash
    }

    /// Hash under `QUERY_VERSION_BASE + version`, for fee estimation and
    /// simulation only.
    pub fn query_hash(&self) -> Felt {
        self.query_hash
    }

    /// Hash of this transaction under an arbitrary version.
    pub fn compute_hash(&self, version: Felt) -> Felt {
        compute_hash_on_elements(&[
            self.payload.kind().prefix(),
            version,
            self.account_address,
            Felt::ZERO,
            self.payload.data_hash(),
            Felt::from(self.max_fee),
            self.chain_id,
            self.nonce,
        ])
    }

    /// Replace `max_fee` and recompute both hashes.
    ///
    /// Used to bump the fee after a rejection for insufficient fee; returns
    /// `self` so re-signing and re-executing can be chained.
    pub fn update_fee(&mut self, max_fee: u128) -> &mut Self {
        self.max_fee = max_fee;
        self.rehash();
        self
    }

    /// Sign the canonical hash.
    pub fn sign(&self, signer: &dyn Signer) -> Result<SignedTransaction<'_>, SignerError> {
        Ok(SignedTransaction {
            transaction: self,
            signature: signer.sign(&self.hash)?,
            is_query: false,
        })
    }

    /// Sign the query hash, for fee estimation and simulation.
    pub fn sign_query(&self, signer: &dyn Signer) -> Result<SignedTransaction<'_>, SignerError> {
        Ok(SignedTransaction {
            transaction: self,
            signature: signer.sign(&self.query_hash)?,
            is_query: true,
        })
    }

    fn rehash(&mut self) {
        self.hash = self.compute_hash(self.version);
        self.query_hash = self.compute_hash(QUERY_VERSION_BASE + self.version);
    }

    fn validate(&self) -> Result<(), Error> {
        if self.hash == Felt::ZERO {
            return Err(Error::EmptyHash);
        }
        Ok(())
    }
}

/// A transaction paired with a signature over one of its hashes.
///
/// Produced by [`Transaction::sign`] or [`Transaction::sign_query`]; it
/// cannot be signed again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction<'a> {
    transaction: &'a Transaction,
    signature: Signature,
    is_query: bool,
}

impl<'a> SignedTransaction<'a> {
    pub fn transaction(&self) -> &'a Transaction {
        self.transaction
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns true if the query hash was signed.
    pub fn is_query(&self) -> bool {
        self.is_query
    }

    /// The hash the signature covers.
    pub fn signed_hash(&self) -> Felt {
        if self.is_query {
            self.transaction.query_hash
        } else {
            self.transaction.hash
        }
    }
}
