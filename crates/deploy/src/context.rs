//! Per-network deployment context and the registry holding them.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use anyhow::Context;
use serde_json::Value;

use crate::{
    config::{DeployDefaults, DevStageConfig},
    error::DeployError,
    keyring::{AccountRef, Keyring, Signer},
    network::{ClusterEndpoint, LedgerClient, StorageKey},
    submitter::TxSubmitter,
    types::{ClusterId, ContractId, PublicKey},
};

/// Everything needed to talk to one network: clients, accounts and configuration.
pub struct NetworkContext {
    name: String,
    ledger: Arc<dyn LedgerClient>,
    cluster: Arc<dyn ClusterEndpoint>,
    keyring: Keyring,
    block_time: Duration,
    main_cluster_id: ClusterId,
    defaults: DeployDefaults,
}

impl NetworkContext {
    pub fn new(
        name: impl Into<String>,
        ledger: Arc<dyn LedgerClient>,
        cluster: Arc<dyn ClusterEndpoint>,
        config: &DevStageConfig,
    ) -> Result<Self, anyhow::Error> {
        let keyring = Keyring::from_config(&config.accounts)?;
        Ok(Self {
            name: name.into(),
            ledger,
            cluster,
            keyring,
            block_time: config.block_time(),
            main_cluster_id: config.main_cluster_id.clone(),
            defaults: config.defaults.clone(),
        })
    }

    pub fn with_keyring(mut self, keyring: Keyring) -> Self {
        self.keyring = keyring;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub fn cluster(&self) -> &Arc<dyn ClusterEndpoint> {
        &self.cluster
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    pub fn block_time(&self) -> Duration {
        self.block_time
    }

    pub fn main_cluster_id(&self) -> &ClusterId {
        &self.main_cluster_id
    }

    pub fn defaults(&self) -> &DeployDefaults {
        &self.defaults
    }

    pub fn submitter(&self) -> TxSubmitter {
        TxSubmitter::new(self.ledger.clone())
    }

    /// Resolve the account an operation is sent from.
    ///
    /// Without an explicit account, the configured deploy account is used, then the keyring's
    /// default account.
    pub fn resolve_account(
        &self,
        account: Option<&AccountRef>,
    ) -> Result<Arc<dyn Signer>, DeployError> {
        match (account, &self.defaults.account) {
            (Some(account), _) => self.keyring.resolve(Some(account)),
            (None, Some(name)) => self.keyring.resolve(Some(&AccountRef::ByName(name.clone()))),
            (None, None) => self.keyring.resolve(None),
        }
    }

    /// System contract registered for `cluster`, if the cluster exists yet.
    pub async fn system_contract(
        &self,
        cluster: &ClusterId,
    ) -> Result<Option<ContractId>, DeployError> {
        let record = self
            .ledger
            .query_storage(&StorageKey::cluster(cluster))
            .await
            .with_context(|| format!("Failed to query cluster {}", cluster))
            .map_err(DeployError::Client)?;

        let system_contract = record
            .as_ref()
            .and_then(|record| record.get("systemContract"))
            .and_then(Value::as_str)
            .map(ContractId::new);

        tracing::debug!(
            cluster = %cluster,
            system_contract = ?system_contract,
            "Cluster system contract looked up"
        );

        Ok(system_contract)
    }

    /// Public key of `contract`, once the key registry published it.
    pub async fn contract_key(&self, contract: &ContractId) -> Result<Option<PublicKey>, anyhow::Error> {
        let key = self
            .ledger
            .query_storage(&StorageKey::contract_key(contract))
            .await?;

        Ok(match key {
            Some(Value::String(key)) if !key.is_empty() => Some(PublicKey::new(key)),
            Some(Value::Null) | None => None,
            Some(Value::String(_)) => None,
            Some(other) => anyhow::bail!("Unexpected contract key value: {}", other),
        })
    }
}

impl std::fmt::Debug for NetworkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkContext")
            .field("name", &self.name)
            .field("block_time", &self.block_time)
            .field("main_cluster_id", &self.main_cluster_id)
            .finish_non_exhaustive()
    }
}

/// Registry of initialized network contexts, keyed by network name.
///
/// Each network is initialized at most once.
#[derive(Debug, Default)]
pub struct Networks {
    contexts: RwLock<HashMap<String, Arc<NetworkContext>>>,
}

impl Networks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the context of a network.
    pub fn init(&self, context: NetworkContext) -> Result<Arc<NetworkContext>, DeployError> {
        let name = context.name().to_string();
        let mut contexts = self
            .contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if contexts.contains_key(&name) {
            return Err(DeployError::NetworkAlreadyInitialized(name));
        }

        let context = Arc::new(context);
        contexts.insert(name.clone(), context.clone());
        tracing::info!(network = %name, "Network context initialized");
        Ok(context)
    }

    pub fn get(&self, name: &str) -> Result<Arc<NetworkContext>, DeployError> {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| DeployError::NetworkNotInitialized(name.to_string()))
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
