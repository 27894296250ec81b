//! devstage-deploy - Contract deployment library for local development networks.
//!
//! This crate uploads contract code to a ledger, instantiates it on an off-chain execution
//! cluster and waits for the cluster to publish the contract key. The ledger and the cluster
//! are reached through the [`LedgerClient`] and [`ClusterEndpoint`] traits.

mod artifact;
pub use artifact::{ContractArtifact, ContractSource, ContractSpec, SelectorSpec};

mod call;
pub use call::{LedgerCall, SignedOperation, SubmitOptions, SubmittedOperation};

mod config;
pub use config::{
    AccountsConfig, CONFIG_FILENAME, DEFAULT_BLOCK_TIME_MS, DeployDefaults, DevStageConfig,
    NETWORK_LOCAL, NetworkConfig,
};

mod context;
pub use context::{NetworkContext, Networks};

mod contract;
pub use contract::{CallOptions, ContractHandle, ContractIdentity};

mod encoder;
pub use encoder::{CallDataEncoder, SelectorEncoder};

mod error;
pub use error::DeployError;

mod factory;
pub use factory::{
    CodeUpload, ContractFactory, CreateOptions, DeploymentPlan, InstantiateOptions,
    KEY_PROPAGATION_BLOCKS, UploadOptions,
};

mod keyring;
pub use keyring::{AccountRef, DevSigner, Keyring, Signer};

mod network;
pub use network::{
    CONTRACTS_SECTION, ClusterEndpoint, INSTANTIATING_EVENT, InstantiateEstimate,
    InstantiateRequest, LedgerClient, REGISTRY_SECTION, StatusSubscription, StorageKey,
};

pub mod poll;
pub use poll::{CancelHandle, ConditionPoller, WaitError, WaitOptions};

mod status;
pub use status::{ChainEvent, OperationOutcome, StatusEvent, StatusUpdate};

mod submitter;
pub use submitter::TxSubmitter;

mod types;
pub use types::{
    AccountId, Balance, BlockHash, ClusterId, CodeHash, CodeKind, CodeType, ContractId,
    PublicKey, Salt, TxHash,
};
