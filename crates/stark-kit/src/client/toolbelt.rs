//! The [`Toolbelt`] client and its builders.

use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::channel::Channel;
use super::cli::StarknetCli;
use super::execute;
use super::signer::Signer;
use super::status::{DEFAULT_POLL_INTERVAL, StatusEngine};
use crate::artifacts::{ArtifactStore, BuildDir};
use crate::error::Error;
use crate::registry::{
    AccountRecord, AccountRegistry, AddressStore, DeclarationRecord, DeclarationRegistry,
    DeploymentRegistry,
};
use crate::types::{
    Call, DeployAccountPayload, Felt, InvokePayload, Network, Payload, Transaction, TransactionStatus, WatchMode,
    encode_multicall,
};

/// Default compiled artifact directory.
pub const DEFAULT_BUILD_DIR: &str = "artifacts";

/// Account contract whose ABI accompanies invokes.
pub const DEFAULT_ACCOUNT_CONTRACT: &str = "Account";

/// Default registry directory.
pub const DEFAULT_REGISTRY_DIR: &str = ".";

/// Network name, e.g. `goerli`.
pub const NETWORK_ENV: &str = "STARKNET_NETWORK";
/// Directory holding the registry files.
pub const REGISTRY_DIR_ENV: &str = "STARK_KIT_REGISTRY_DIR";
/// Compiled artifact directory.
pub const BUILD_DIR_ENV: &str = "STARK_KIT_BUILD_DIR";
/// Seconds between status polls.
pub const POLL_INTERVAL_ENV: &str = "STARK_KIT_POLL_INTERVAL";

/// Outcome of [`Toolbelt::execute`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Execution {
    pub status: TransactionStatus,
    /// Raw channel response to the submission.
    pub output: String,
}

/// Entry point for building, submitting and tracking transactions.
///
/// # Example
///
/// ```rust,no_run
/// use stark_kit::*;
///
/// # async fn example() -> Result<(), Error> {
/// let belt = Toolbelt::localhost().poll_interval(std::time::Duration::from_secs(5)).build();
/// let signer = EnvSigner::new("PKEY1")?;
/// let account = belt.accounts().resolve("PKEY1", belt.network())?.address;
/// let (token, _) = belt.deployments().resolve("my_token", belt.network())?;
///
/// let tx = belt
///     .invoke(account)
///     .call(token, "transfer", vec![Felt::from(0x123u64), Felt::from(100u64), Felt::ZERO])
///     .max_fee(1_000_000_000_000)
///     .await?;
///
/// let execution = belt.execute(&tx, &signer, Some(WatchMode::Track)).await?;
/// println!("{}: {}", execution.status.tx_hash.to_hex_string(), execution.status.status);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Toolbelt {
    network: Network,
    channel: Arc<dyn Channel>,
    artifacts: Arc<dyn ArtifactStore>,
    deployments: DeploymentRegistry,
    accounts: AccountRegistry,
    declarations: DeclarationRegistry,
    poll_interval: Duration,
}

impl Toolbelt {
    /// Builder for a local devnet.
    pub fn localhost() -> ToolbeltBuilder {
        ToolbeltBuilder::new(Network::Localhost)
    }

    /// Builder for Goerli.
    pub fn goerli() -> ToolbeltBuilder {
        ToolbeltBuilder::new(Network::Goerli)
    }

    /// Builder for mainnet.
    pub fn mainnet() -> ToolbeltBuilder {
        ToolbeltBuilder::new(Network::Mainnet)
    }

    /// Builder for any network.
    pub fn on(network: Network) -> ToolbeltBuilder {
        ToolbeltBuilder::new(network)
    }

    /// Create a client configured from environment variables.
    ///
    /// Reads, all optional:
    /// - `STARKNET_NETWORK`: network name, defaults to `localhost`
    /// - `STARK_KIT_REGISTRY_DIR`: registry directory, defaults to `.`
    /// - `STARK_KIT_BUILD_DIR`: artifact directory, defaults to `artifacts`
    /// - `STARK_KIT_POLL_INTERVAL`: seconds between status polls, defaults to 30
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Toolbelt, Error> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Toolbelt, Error> {
        let mut builder = match var(NETWORK_ENV) {
            Some(name) => Toolbelt::on(
                name.parse()
                    .map_err(|e| Error::Config(format!("{}: {}", NETWORK_ENV, e)))?,
            ),
            None => Toolbelt::localhost(),
        };

        if let Some(dir) = var(REGISTRY_DIR_ENV) {
            builder = builder.registry_dir(dir);
        }
        if let Some(dir) = var(BUILD_DIR_ENV) {
            builder = builder.build_dir(dir);
        }
        if let Some(secs) = var(POLL_INTERVAL_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    POLL_INTERVAL_ENV, secs
                ))
            })?;
            builder = builder.poll_interval(Duration::from_secs(secs));
        }

        Ok(builder.build())
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn channel(&self) -> &dyn Channel {
        self.channel.as_ref()
    }

    pub fn artifacts(&self) -> &dyn ArtifactStore {
        self.artifacts.as_ref()
    }

    pub fn deployments(&self) -> &DeploymentRegistry {
        &self.deployments
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    pub fn declarations(&self) -> &DeclarationRegistry {
        &self.declarations
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    // ========================================================================
    // Transaction builders
    // ========================================================================

    /// Start an invoke from `account`.
    ///
    /// Add calls with [`InvokeBuilder::call`]; they are multicall-encoded
    /// into the account's `__execute__`.
    pub fn invoke(&self, account: Felt) -> InvokeBuilder<'_> {
        InvokeBuilder {
            belt: self,
            account,
            account_contract: DEFAULT_ACCOUNT_CONTRACT.to_string(),
            calls: Vec::new(),
            max_fee: 0,
            nonce: None,
        }
    }

    /// Start declaring the compiled contract `contract`, sent by `account`.
    pub fn declare(&self, account: Felt, contract: impl Into<String>) -> DeclareBuilder<'_> {
        DeclareBuilder {
            belt: self,
            account,
            contract: contract.into(),
            overriding_path: None,
            max_fee: 0,
            nonce: None,
        }
    }

    /// Start deploying an account contract at its counterfactual address.
    pub fn deploy_account(
        &self,
        contract: impl Into<String>,
        salt: Felt,
        calldata: Vec<Felt>,
    ) -> DeployAccountBuilder<'_> {
        DeployAccountBuilder {
            belt: self,
            contract: contract.into(),
            salt,
            calldata,
            overriding_path: None,
            max_fee: 0,
            nonce: None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Current nonce of `address`.
    pub async fn nonce(&self, address: Felt) -> Result<Felt, Error> {
        Ok(self.channel.get_nonce(address, self.network).await?)
    }

    /// Sign, submit, and report status according to `watch`.
    ///
    /// A declare that is not rejected records its class hash in the
    /// declarations registry. An accepted deploy-account is recorded in the
    /// accounts registry when the signer carries an alias. Once the
    /// transaction is submitted, a failed registry write only logs a warning.
    ///
    /// # Errors
    ///
    /// [`Error::Registry`] before anything is submitted if the alias to be
    /// recorded is invalid or already bound to another class or key.
    /// [`Error::HashMismatch`] if the channel reports a different hash than
    /// the one computed locally; status is not queried in that case. A
    /// rejection is not an error and comes back in the status.
    pub async fn execute(
        &self,
        tx: &Transaction,
        signer: &dyn Signer,
        watch: Option<WatchMode>,
    ) -> Result<Execution, Error> {
        self.check_record(tx, signer)?;

        let output = execute::submit(self.channel.as_ref(), tx, signer).await?;
        let status = self
            .engine(&self.deployments)
            .status(tx.hash(), tx.network(), watch)
            .await?;

        if let Err(e) = self.record(tx, signer, &status) {
            warn!(
                tx_hash = %tx.hash().to_hex_string(),
                kind = tx.kind().as_str(),
                error = %e,
                "transaction submitted but not recorded"
            );
        }
        Ok(Execution { status, output })
    }

    /// Estimated fee of `tx`, in wei.
    pub async fn estimate_fee(&self, tx: &Transaction, signer: &dyn Signer) -> Result<u128, Error> {
        execute::estimate_fee(self.channel.as_ref(), tx, signer).await
    }

    /// Simulated execution trace of `tx`.
    pub async fn simulate(
        &self,
        tx: &Transaction,
        signer: &dyn Signer,
    ) -> Result<serde_json::Value, Error> {
        execute::simulate(self.channel.as_ref(), tx, signer).await
    }

    /// Status of `tx_hash` on this client's network.
    pub async fn status(
        &self,
        tx_hash: Felt,
        watch: Option<WatchMode>,
    ) -> Result<TransactionStatus, Error> {
        self.engine(&self.deployments)
            .status(tx_hash, self.network, watch)
            .await
    }

    /// Like [`status`](Self::status), debugging against another deployments
    /// registry.
    pub async fn status_with_registry(
        &self,
        tx_hash: Felt,
        watch: Option<WatchMode>,
        deployments: &DeploymentRegistry,
    ) -> Result<TransactionStatus, Error> {
        self.engine(deployments)
            .status(tx_hash, self.network, watch)
            .await
    }

    /// Like [`status`](Self::status), failing with [`Error::StatusTimeout`]
    /// once `limit` has passed.
    pub async fn status_with_timeout(
        &self,
        tx_hash: Felt,
        watch: Option<WatchMode>,
        limit: Duration,
    ) -> Result<TransactionStatus, Error> {
        self.engine(&self.deployments)
            .status_with_timeout(tx_hash, self.network, watch, limit)
            .await
    }

    fn engine<'a>(&'a self, deployments: &'a DeploymentRegistry) -> StatusEngine<'a> {
        StatusEngine::new(self.channel.as_ref(), deployments, self.poll_interval)
    }

    fn check_record(&self, tx: &Transaction, signer: &dyn Signer) -> Result<(), Error> {
        match tx.payload() {
            Payload::Declare(p) => {
                self.declarations
                    .check_available(&p.contract_name, p.class_hash, tx.network())?;
            }
            Payload::DeployAccount(_) => {
                if let Some(alias) = signer.alias() {
                    self.accounts
                        .check_available(alias, signer.public_key(), tx.network())?;
                }
            }
            Payload::Invoke(_) => {}
        }
        Ok(())
    }

    fn record(
        &self,
        tx: &Transaction,
        signer: &dyn Signer,
        status: &TransactionStatus,
    ) -> Result<(), Error> {
        match tx.payload() {
            Payload::Declare(p) if !status.is_rejected() => {
                self.declarations.register(
                    DeclarationRecord::new(p.class_hash, &p.contract_name),
                    tx.network(),
                )?;
            }
            Payload::DeployAccount(p) if status.is_accepted() => {
                let Some(alias) = signer.alias() else {
                    debug!(
                        address = %p.predicted_address.to_hex_string(),
                        "signer has no alias, account not recorded"
                    );
                    return Ok(());
                };
                let public_key = signer.public_key();
                let index = match self
                    .accounts
                    .entries(tx.network())?
                    .into_iter()
                    .find(|r| r.public_key == public_key)
                {
                    Some(existing) => existing.index,
                    None => self.accounts.next_index(tx.network())?,
                };
                self.accounts.register(
                    AccountRecord {
                        public_key,
                        address: p.predicted_address,
                        index,
                        alias: alias.to_string(),
                        network: tx.network(),
                    },
                    tx.network(),
                )?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for Toolbelt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbelt")
            .field("network", &self.network)
            .field("deployments", &self.deployments)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Builder for a [`Toolbelt`].
///
/// ```rust,ignore
/// let belt = Toolbelt::on(Network::Goerli)
///     .registry_dir("deployments")
///     .build_dir("target/starknet")
///     .channel(StarknetCli::new().program(".venv/bin/starknet"))
///     .build();
/// ```
pub struct ToolbeltBuilder {
    network: Network,
    channel: Option<Arc<dyn Channel>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    registry_dir: PathBuf,
    build_dir: PathBuf,
    poll_interval: Duration,
}

impl ToolbeltBuilder {
    fn new(network: Network) -> Self {
        Self {
            network,
            channel: None,
            artifacts: None,
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            build_dir: PathBuf::from(DEFAULT_BUILD_DIR),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the submission channel. Defaults to [`StarknetCli`].
    pub fn channel(mut self, channel: impl Channel + 'static) -> Self {
        self.channel = Some(Arc::new(channel));
        self
    }

    /// Set the artifact store. Defaults to a [`BuildDir`] over the build
    /// directory.
    pub fn artifacts(mut self, artifacts: impl ArtifactStore + 'static) -> Self {
        self.artifacts = Some(Arc::new(artifacts));
        self
    }

    pub fn registry_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.registry_dir = dir.into();
        self
    }

    pub fn build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = dir.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn build(self) -> Toolbelt {
        Toolbelt {
            network: self.network,
            channel: self
                .channel
                .unwrap_or_else(|| Arc::new(StarknetCli::new()) as Arc<dyn Channel>),
            artifacts: self
                .artifacts
                .unwrap_or_else(|| Arc::new(BuildDir::new(self.build_dir)) as Arc<dyn ArtifactStore>),
            deployments: DeploymentRegistry::new(&self.registry_dir),
            accounts: AccountRegistry::new(&self.registry_dir),
            declarations: DeclarationRegistry::new(&self.registry_dir),
            poll_interval: self.poll_interval,
        }
    }
}

impl From<ToolbeltBuilder> for Toolbelt {
    fn from(builder: ToolbeltBuilder) -> Self {
        builder.build()
    }
}

// ============================================================================
// Transaction builders
// ============================================================================

/// Resolve the caller's nonce or fetch it from the network.
///
/// Fetching right before construction races with any other transaction from
/// the same account; callers sending concurrently supply their own nonces.
async fn resolve_nonce(belt: &Toolbelt, address: Felt, nonce: Option<Felt>) -> Result<Felt, Error> {
    match nonce {
        Some(nonce) => Ok(nonce),
        None => belt.nonce(address).await,
    }
}

/// Builder for an invoke transaction. Await it to get the [`Transaction`].
pub struct InvokeBuilder<'a> {
    belt: &'a Toolbelt,
    account: Felt,
    account_contract: String,
    calls: Vec<Call>,
    max_fee: u128,
    nonce: Option<Felt>,
}

impl<'a> InvokeBuilder<'a> {
    /// Add a call to `selector` on `to`.
    pub fn call(mut self, to: Felt, selector: impl Into<String>, calldata: Vec<Felt>) -> Self {
        self.calls.push(Call::new(to, selector, calldata));
        self
    }

    /// Name of the account's contract, used to find its ABI. Defaults to
    /// [`DEFAULT_ACCOUNT_CONTRACT`].
    pub fn account_contract(mut self, name: impl Into<String>) -> Self {
        self.account_contract = name.into();
        self
    }

    /// Add several calls.
    pub fn calls(mut self, calls: impl IntoIterator<Item = Call>) -> Self {
        self.calls.extend(calls);
        self
    }

    pub fn max_fee(mut self, max_fee: u128) -> Self {
        self.max_fee = max_fee;
        self
    }

    /// Use `nonce` instead of fetching it.
    pub fn nonce(mut self, nonce: Felt) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub async fn build(self) -> Result<Transaction, Error> {
        let calldata = encode_multicall(&self.calls)?;
        let abi = self.belt.artifacts.abi_path(&self.account_contract);
        let nonce = resolve_nonce(self.belt, self.account, self.nonce).await?;
        Transaction::new(
            self.account,
            self.max_fee,
            nonce,
            self.belt.network,
            Payload::Invoke(InvokePayload::execute(calldata).with_account_abi(abi)),
        )
    }
}

impl<'a> IntoFuture for InvokeBuilder<'a> {
    type Output = Result<Transaction, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.build())
    }
}

/// Builder for a declare transaction.
pub struct DeclareBuilder<'a> {
    belt: &'a Toolbelt,
    account: Felt,
    contract: String,
    overriding_path: Option<PathBuf>,
    max_fee: u128,
    nonce: Option<Felt>,
}

impl<'a> DeclareBuilder<'a> {
    /// Look for the compiled class in `dir` instead of the build directory.
    pub fn overriding_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.overriding_path = Some(dir.into());
        self
    }

    pub fn max_fee(mut self, max_fee: u128) -> Self {
        self.max_fee = max_fee;
        self
    }

    pub fn nonce(mut self, nonce: Felt) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub async fn build(self) -> Result<Transaction, Error> {
        let payload = self
            .belt
            .artifacts
            .declare_payload(&self.contract, self.overriding_path.as_deref())?;
        let nonce = resolve_nonce(self.belt, self.account, self.nonce).await?;
        Transaction::declare(self.account, payload, self.max_fee, nonce, self.belt.network)
    }
}

impl<'a> IntoFuture for DeclareBuilder<'a> {
    type Output = Result<Transaction, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.build())
    }
}

/// Builder for a deploy-account transaction.
///
/// The account does not exist yet, so the nonce defaults to zero rather than
/// being fetched.
pub struct DeployAccountBuilder<'a> {
    belt: &'a Toolbelt,
    contract: String,
    salt: Felt,
    calldata: Vec<Felt>,
    overriding_path: Option<PathBuf>,
    max_fee: u128,
    nonce: Option<Felt>,
}

impl<'a> DeployAccountBuilder<'a> {
    pub fn overriding_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.overriding_path = Some(dir.into());
        self
    }

    pub fn max_fee(mut self, max_fee: u128) -> Self {
        self.max_fee = max_fee;
        self
    }

    pub fn nonce(mut self, nonce: Felt) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Address the account will be deployed at.
    pub fn predicted_address(&self) -> Result<Felt, Error> {
        Ok(self.payload()?.predicted_address)
    }

    fn payload(&self) -> Result<DeployAccountPayload, Error> {
        let class_hash = self
            .belt
            .artifacts
            .class_hash(&self.contract, self.overriding_path.as_deref())?;
        Ok(DeployAccountPayload::new(
            self.contract.clone(),
            class_hash,
            self.salt,
            self.calldata.clone(),
        ))
    }

    pub async fn build(self) -> Result<Transaction, Error> {
        let payload = self.payload()?;
        Transaction::deploy_account(
            payload,
            self.max_fee,
            self.nonce.unwrap_or(Felt::ZERO),
            self.belt.network,
        )
    }
}

impl<'a> IntoFuture for DeployAccountBuilder<'a> {
    type Output = Result<Transaction, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.build())
    }
}
