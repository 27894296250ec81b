//! Handles to instantiated contracts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    artifact::ContractArtifact,
    call::{LedgerCall, SubmittedOperation},
    context::NetworkContext,
    encoder::CallDataEncoder,
    error::DeployError,
    keyring::AccountRef,
    status::OperationOutcome,
    types::{Balance, ClusterId, ContractId, PublicKey},
};

/// Where a contract lives and the key its cluster published for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractIdentity {
    pub cluster_id: ClusterId,
    pub contract_id: ContractId,
    pub public_key: PublicKey,
}

/// Options for [`ContractHandle::call`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub account: Option<AccountRef>,
    /// Amount deposited to the contract along with the message.
    pub deposit: Balance,
}

/// A live contract bound to its cluster endpoint.
#[derive(Clone)]
pub struct ContractHandle {
    identity: ContractIdentity,
    artifact: Arc<ContractArtifact>,
    encoder: Arc<dyn CallDataEncoder>,
    ctx: Arc<NetworkContext>,
}

impl ContractHandle {
    pub(crate) fn new(
        identity: ContractIdentity,
        artifact: Arc<ContractArtifact>,
        encoder: Arc<dyn CallDataEncoder>,
        ctx: Arc<NetworkContext>,
    ) -> Self {
        Self {
            identity,
            artifact,
            encoder,
            ctx,
        }
    }

    pub fn identity(&self) -> &ContractIdentity {
        &self.identity
    }

    pub fn contract_id(&self) -> &ContractId {
        &self.identity.contract_id
    }

    pub fn cluster_id(&self) -> &ClusterId {
        &self.identity.cluster_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.identity.public_key
    }

    pub fn artifact(&self) -> &ContractArtifact {
        &self.artifact
    }

    /// Run a read-only message against the contract through the cluster endpoint.
    pub async fn query(
        &self,
        message: &str,
        args: &[Value],
        account: Option<&AccountRef>,
    ) -> Result<Vec<u8>, DeployError> {
        let signer = self.ctx.resolve_account(account)?;
        let call_data = self.encode_message(message, args)?;

        tracing::debug!(
            contract_id = %self.identity.contract_id,
            message,
            "Querying contract"
        );

        self.ctx
            .cluster()
            .query(signer.as_ref(), &self.identity, &call_data)
            .await
            .map_err(DeployError::Client)
    }

    /// Send a state-changing message to the contract and wait for its inclusion.
    pub async fn call(
        &self,
        message: &str,
        args: &[Value],
        options: &CallOptions,
    ) -> Result<OperationOutcome, DeployError> {
        let signer = self.ctx.resolve_account(options.account.as_ref())?;
        let call_data = self.encode_message(message, args)?;

        tracing::info!(
            contract_id = %self.identity.contract_id,
            message,
            deposit = %options.deposit,
            "Calling contract..."
        );

        self.ctx
            .submitter()
            .submit(
                SubmittedOperation::new(
                    LedgerCall::PushContractMessage {
                        contract: self.identity.contract_id.clone(),
                        call_data,
                        deposit: options.deposit,
                    },
                    signer,
                )
                .labelled(format!("call {}", message)),
            )
            .await
    }

    fn encode_message(&self, message: &str, args: &[Value]) -> Result<Vec<u8>, DeployError> {
        self.encoder
            .encode_message(message, args)
            .map_err(|source| DeployError::EncodingFailed {
                name: message.to_string(),
                source,
            })
    }
}

impl std::fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractHandle")
            .field("identity", &self.identity)
            .field("network", &self.ctx.name())
            .finish_non_exhaustive()
    }
}
