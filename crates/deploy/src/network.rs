//! Interfaces to the ledger node and the execution cluster.
//!
//! Both are owned outside of this crate; the deployment flow only borrows them per call.

use std::fmt;

use async_trait::async_trait;
use futures::{Stream, StreamExt, stream::BoxStream};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    call::SignedOperation,
    contract::ContractIdentity,
    keyring::Signer,
    status::StatusUpdate,
    types::{Balance, CodeHash, CodeType, ContractId, serde_hex},
};

/// Runtime section of the contracts module.
pub const CONTRACTS_SECTION: &str = "phalaPhatContracts";
/// Runtime section of the cluster key registry.
pub const REGISTRY_SECTION: &str = "phalaRegistry";
/// Event emitted by the contracts module when an instance is being created.
pub const INSTANTIATING_EVENT: &str = "Instantiating";

/// Path of a queryable item of ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub section: String,
    pub item: String,
    pub args: Vec<String>,
}

impl StorageKey {
    pub fn new(section: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            item: item.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Published public key of a contract.
    pub fn contract_key(contract: &ContractId) -> Self {
        Self::new(REGISTRY_SECTION, "contractKeys").arg(contract)
    }

    /// Registration record of a cluster.
    pub fn cluster(cluster: &crate::types::ClusterId) -> Self {
        Self::new(CONTRACTS_SECTION, "clusters").arg(cluster)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.section, self.item, self.args.join(", "))
    }
}

/// Live stream of status notifications for one submitted operation.
///
/// The release callback runs at most once: on [`StatusSubscription::unsubscribe`], or on drop
/// if the owner never unsubscribed.
pub struct StatusSubscription {
    updates: BoxStream<'static, Result<StatusUpdate, anyhow::Error>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StatusSubscription {
    pub fn new<S, R>(updates: S, release: R) -> Self
    where
        S: Stream<Item = Result<StatusUpdate, anyhow::Error>> + Send + 'static,
        R: FnOnce() + Send + 'static,
    {
        Self {
            updates: updates.boxed(),
            release: Some(Box::new(release)),
        }
    }

    /// Next notification, or `None` once the network closed the stream.
    pub async fn next(&mut self) -> Option<Result<StatusUpdate, anyhow::Error>> {
        self.updates.next().await
    }

    /// Release the subscription. Returns `false` if it was already released.
    pub fn unsubscribe(&mut self) -> bool {
        match self.release.take() {
            Some(release) => {
                release();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Client of the ledger node.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a signed operation and subscribe to its status notifications.
    async fn submit_and_watch(
        &self,
        operation: SignedOperation,
    ) -> Result<StatusSubscription, anyhow::Error>;

    /// Read a state item. `None` when the item is empty.
    async fn query_storage(&self, key: &StorageKey) -> Result<Option<Value>, anyhow::Error>;
}

/// Read-only instantiation request simulated by the cluster's system contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantiateRequest {
    pub code_hash: CodeHash,
    pub salt: String,
    #[serde(with = "serde_hex")]
    pub instantiate_data: Vec<u8>,
    pub deposit: Balance,
    pub transfer: Balance,
}

/// Resources an instantiation would consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantiateEstimate {
    pub gas_consumed: u64,
    pub gas_required: u64,
    pub storage_deposit: Balance,
    /// Raw result reported by the simulation.
    #[serde(default)]
    pub result: Value,
}

/// Off-chain endpoint of the execution cluster.
///
/// Implementations sign their own query certificates with the given signer.
#[async_trait]
pub trait ClusterEndpoint: Send + Sync {
    /// Ask the system contract whether a code blob is already registered.
    async fn code_exists(
        &self,
        signer: &dyn Signer,
        system_contract: &ContractId,
        code_hash: &CodeHash,
        code_type: CodeType,
    ) -> Result<bool, anyhow::Error>;

    /// Simulate an instantiation through the system contract.
    async fn estimate_instantiate(
        &self,
        signer: &dyn Signer,
        system_contract: &ContractId,
        request: &InstantiateRequest,
    ) -> Result<InstantiateEstimate, anyhow::Error>;

    /// Run a read-only message against a contract.
    async fn query(
        &self,
        signer: &dyn Signer,
        contract: &ContractIdentity,
        call_data: &[u8],
    ) -> Result<Vec<u8>, anyhow::Error>;
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::status::StatusEvent;

    #[test]
    fn test_storage_key_display() {
        let key = StorageKey::contract_key(&ContractId::new("0xabc"));
        assert_eq!(key.to_string(), "phalaRegistry.contractKeys(0xabc)");
    }

    #[tokio::test]
    async fn test_subscription_releases_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let counter = releases.clone();
        let mut subscription = StatusSubscription::new(
            futures::stream::iter(vec![Ok(StatusUpdate::new(StatusEvent::Ready))]),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert!(subscription.next().await.is_some());
        assert!(subscription.next().await.is_none());
        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        drop(subscription);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_active_subscription_releases_it() {
        let releases = Arc::new(AtomicUsize::new(0));
        let counter = releases.clone();
        let subscription = StatusSubscription::new(futures::stream::empty(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        drop(subscription);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
