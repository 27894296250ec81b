//! Errors surfaced by the deployment flow.

use crate::{
    poll::WaitError,
    status::StatusEvent,
    types::{ClusterId, CodeKind, ContractId},
};

/// Failure of a submission, a poll, or a deployment step.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The ledger reported the operation as invalid, dropped, retracted or usurped.
    #[error("transaction `{label}` rejected: {status}")]
    TransactionRejected { label: String, status: StatusEvent },

    /// The artifact's code kind has no code type known to the cluster.
    #[error("unable to map contract type `{0}` to a cluster code type")]
    UnsupportedCodeKind(CodeKind),

    /// The instantiate operation succeeded but did not emit the instantiating event.
    #[error("instantiation `{label}` did not emit the instantiating event")]
    InstantiationEventMissing { label: String },

    /// The contract key never showed up in the key registry.
    #[error("could not get public key of contract {contract_id}")]
    PublicKeyUnavailable {
        contract_id: ContractId,
        #[source]
        source: WaitError,
    },

    /// The call-data encoder failed.
    #[error("failed to encode call data for `{name}`")]
    EncodingFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// No system contract is registered for the cluster yet.
    #[error("system contract of cluster {cluster} is not ready")]
    SystemContractNotReady { cluster: ClusterId },

    /// The account name is not part of the keyring.
    #[error("unknown account `{0}`")]
    UnknownAccount(String),

    /// A context for this network was already registered.
    #[error("network `{0}` was already initialized")]
    NetworkAlreadyInitialized(String),

    /// No context was registered for this network.
    #[error("network `{0}` is not initialized")]
    NetworkNotInitialized(String),

    /// The ledger client or cluster endpoint failed.
    #[error("network client error: {0}")]
    Client(#[source] anyhow::Error),
}
