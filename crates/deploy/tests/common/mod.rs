//! In-memory ledger and cluster used by the deployment tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use anyhow::Result;
use async_trait::async_trait;
use devstage_deploy::{
    CONTRACTS_SECTION, ChainEvent, ClusterEndpoint, ClusterId, CodeHash, CodeType,
    ContractArtifact, ContractId, ContractIdentity, DevStageConfig, INSTANTIATING_EVENT,
    InstantiateEstimate, InstantiateRequest, LedgerCall, LedgerClient, NetworkContext,
    SignedOperation, Signer, StatusEvent, StatusSubscription, StatusUpdate, StorageKey,
};
use serde_json::{Value, json};

pub const CONTRACT_ID: &str = "0x00c0ffee";
pub const PUBLIC_KEY: &str = "0x02beef";
pub const SYSTEM_CONTRACT: &str = "0x5e57e3";
pub const BLOCK: &str = "0x0b10c4";

pub const FLIPPER: &str = r#"{
    "source": { "hash": "0xf11bbe4", "wasm": "0x0061736d01000000" },
    "spec": {
        "constructors": [
            { "label": "default", "selector": "0xed4b9d1b" },
            { "label": "new", "selector": "0x9bae9d5e" }
        ],
        "messages": [{ "label": "get", "selector": "0x2f865bd9" }]
    }
}"#;

pub fn flipper() -> ContractArtifact {
    ContractArtifact::from_json(FLIPPER).unwrap()
}

/// Initialize tracing for tests (idempotent).
pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// When the fake key registry publishes the contract key.
#[derive(Debug, Clone, Copy)]
pub enum KeyPublication {
    /// On the n-th read (1-based).
    AfterReads(usize),
    Never,
}

/// A ledger answering every submission with `Ready`, `InBlock`, `Finalized`.
pub struct FakeLedger {
    pub submitted: Mutex<Vec<SignedOperation>>,
    storage: Mutex<HashMap<String, Value>>,
    emit_instantiating: AtomicBool,
    key_publication: Mutex<KeyPublication>,
    pub key_reads: AtomicUsize,
    pub releases: Arc<AtomicUsize>,
    rejected: Mutex<HashMap<&'static str, StatusEvent>>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            storage: Mutex::new(HashMap::new()),
            emit_instantiating: AtomicBool::new(true),
            key_publication: Mutex::new(KeyPublication::AfterReads(1)),
            key_reads: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
            rejected: Mutex::new(HashMap::new()),
        }
    }

    /// A ledger where `cluster` has its system contract registered.
    pub fn with_cluster(cluster: &ClusterId) -> Self {
        let ledger = Self::new();
        ledger.set_storage(
            StorageKey::cluster(cluster),
            json!({ "systemContract": SYSTEM_CONTRACT }),
        );
        ledger
    }

    pub fn set_storage(&self, key: StorageKey, value: Value) {
        self.storage.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn omit_instantiating_event(&self) {
        self.emit_instantiating.store(false, Ordering::SeqCst);
    }

    pub fn publish_key(&self, publication: KeyPublication) {
        *self.key_publication.lock().unwrap() = publication;
    }

    /// Answer submissions of the named call with `status` instead of including them.
    pub fn reject(&self, call: &'static str, status: StatusEvent) {
        self.rejected.lock().unwrap().insert(call, status);
    }

    /// Names of the submitted calls, in submission order.
    pub fn call_names(&self) -> Vec<&'static str> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|operation| operation.call.name())
            .collect()
    }

    pub fn calls(&self) -> Vec<LedgerCall> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|operation| operation.call.clone())
            .collect()
    }

    fn events_for(&self, call: &LedgerCall) -> Vec<ChainEvent> {
        match call {
            LedgerCall::InstantiateContract { cluster, .. }
                if self.emit_instantiating.load(Ordering::SeqCst) =>
            {
                vec![
                    ChainEvent::new("balances", "Withdraw", vec![]),
                    ChainEvent::new(
                        CONTRACTS_SECTION,
                        INSTANTIATING_EVENT,
                        vec![json!(CONTRACT_ID), json!(cluster.as_str())],
                    ),
                ]
            }
            _ => vec![ChainEvent::new("system", "ExtrinsicSuccess", vec![])],
        }
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn submit_and_watch(&self, operation: SignedOperation) -> Result<StatusSubscription> {
        let block = devstage_deploy::BlockHash::new(BLOCK);
        let updates = match self.rejected.lock().unwrap().get(operation.call.name()) {
            Some(status) => vec![
                StatusUpdate::new(StatusEvent::Ready),
                StatusUpdate::new(status.clone()),
            ],
            None => {
                let events = self.events_for(&operation.call);
                vec![
                    StatusUpdate::new(StatusEvent::Ready),
                    StatusUpdate::new(StatusEvent::InBlock(block.clone())).with_events(events.clone()),
                    StatusUpdate::new(StatusEvent::Finalized(block)).with_events(events),
                ]
            }
        };

        self.submitted.lock().unwrap().push(operation);

        let releases = self.releases.clone();
        Ok(StatusSubscription::new(
            futures::stream::iter(updates.into_iter().map(Ok)),
            move || {
                releases.fetch_add(1, Ordering::SeqCst);
            },
        ))
    }

    async fn query_storage(&self, key: &StorageKey) -> Result<Option<Value>> {
        if *key == StorageKey::contract_key(&ContractId::new(CONTRACT_ID)) {
            let reads = self.key_reads.fetch_add(1, Ordering::SeqCst) + 1;
            let published = match *self.key_publication.lock().unwrap() {
                KeyPublication::AfterReads(n) => reads >= n,
                KeyPublication::Never => false,
            };
            return Ok(published.then(|| json!(PUBLIC_KEY)));
        }

        Ok(self.storage.lock().unwrap().get(&key.to_string()).cloned())
    }
}

/// A cluster endpoint with a fixed code registry.
#[derive(Default)]
pub struct FakeCluster {
    pub code_registered: AtomicBool,
    pub code_exists_calls: AtomicUsize,
    pub estimate_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
}

impl FakeCluster {
    pub fn with_registered_code() -> Self {
        let cluster = Self::default();
        cluster.code_registered.store(true, Ordering::SeqCst);
        cluster
    }
}

#[async_trait]
impl ClusterEndpoint for FakeCluster {
    async fn code_exists(
        &self,
        _signer: &dyn Signer,
        system_contract: &ContractId,
        _code_hash: &CodeHash,
        _code_type: CodeType,
    ) -> Result<bool> {
        self.code_exists_calls.fetch_add(1, Ordering::SeqCst);
        anyhow::ensure!(
            system_contract.as_str() == SYSTEM_CONTRACT,
            "unexpected system contract {}",
            system_contract
        );
        Ok(self.code_registered.load(Ordering::SeqCst))
    }

    async fn estimate_instantiate(
        &self,
        _signer: &dyn Signer,
        _system_contract: &ContractId,
        request: &InstantiateRequest,
    ) -> Result<InstantiateEstimate> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(InstantiateEstimate {
            gas_consumed: 1_000,
            gas_required: 2_000,
            storage_deposit: 42,
            result: json!({ "salt": request.salt }),
        })
    }

    async fn query(
        &self,
        _signer: &dyn Signer,
        contract: &ContractIdentity,
        call_data: &[u8],
    ) -> Result<Vec<u8>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        anyhow::ensure!(contract.public_key.as_str() == PUBLIC_KEY, "contract key mismatch");
        Ok(call_data.to_vec())
    }
}

/// Configuration with a short block time, so key waits stay short.
pub fn test_config() -> DevStageConfig {
    DevStageConfig {
        block_time_ms: 10,
        ..DevStageConfig::default()
    }
}

pub fn network(
    ledger: Arc<FakeLedger>,
    cluster: Arc<FakeCluster>,
    config: &DevStageConfig,
) -> Arc<NetworkContext> {
    Arc::new(NetworkContext::new("local", ledger, cluster, config).unwrap())
}
