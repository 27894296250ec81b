//! Contract deployment: code upload, instantiation and the confirmation steps around them.

use std::{sync::Arc, time::Duration};

use serde_json::Value;

use crate::{
    artifact::ContractArtifact,
    call::{LedgerCall, SubmittedOperation},
    context::NetworkContext,
    contract::{ContractHandle, ContractIdentity},
    encoder::{CallDataEncoder, SelectorEncoder},
    error::DeployError,
    keyring::{AccountRef, Signer},
    network::{CONTRACTS_SECTION, INSTANTIATING_EVENT, InstantiateEstimate, InstantiateRequest},
    poll::{CancelHandle, ConditionPoller, WaitOptions},
    status::OperationOutcome,
    types::{Balance, ClusterId, CodeType, ContractId, PublicKey, Salt},
};

/// Number of block times to wait for a new contract's key to be published.
pub const KEY_PROPAGATION_BLOCKS: u32 = 50;

/// Options for [`ContractFactory::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Target cluster. Defaults to the network's main cluster.
    pub cluster_id: Option<ClusterId>,
    /// The artifact is the cluster's system contract itself, so no system contract is loaded.
    pub system_contract: bool,
    /// Poll interval used while waiting for on-chain effects.
    pub wait: Option<WaitOptions>,
}

/// Options for [`ContractFactory::deploy`].
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Upload even when the cluster already knows the code. Defaults to the configured value.
    pub force_upload: Option<bool>,
    pub account: Option<AccountRef>,
}

/// Options for [`ContractFactory::instantiate`]. Unset amounts use the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct InstantiateOptions {
    /// Salt; a random one is drawn when unset.
    pub salt: Option<Salt>,
    pub account: Option<AccountRef>,
    pub transfer: Option<Balance>,
    pub gas_limit: Option<u64>,
    pub storage_deposit_limit: Option<Balance>,
    pub deposit: Option<Balance>,
    /// Amount credited to the contract inside its cluster; `0` skips the transfer.
    pub transfer_to_cluster: Option<Balance>,
    /// Stake bound to the contract; `0` skips the adjustment.
    pub adjust_stake: Option<Balance>,
}

/// Outcome of the upload step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeUpload {
    /// The cluster already knew the code; nothing was submitted.
    AlreadyPresent,
    Uploaded(OperationOutcome),
}

/// Everything needed to deploy and instantiate one contract.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    pub artifact: ContractArtifact,
    pub constructor: String,
    pub args: Vec<Value>,
    pub create: CreateOptions,
    pub upload: UploadOptions,
    pub instantiate: InstantiateOptions,
}

impl DeploymentPlan {
    pub fn new(artifact: ContractArtifact, constructor: impl Into<String>) -> Self {
        Self {
            artifact,
            constructor: constructor.into(),
            args: Vec::new(),
            create: CreateOptions::default(),
            upload: UploadOptions::default(),
            instantiate: InstantiateOptions::default(),
        }
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn cluster(mut self, cluster_id: ClusterId) -> Self {
        self.create.cluster_id = Some(cluster_id);
        self
    }

    pub fn upload(mut self, upload: UploadOptions) -> Self {
        self.upload = upload;
        self
    }

    pub fn instantiate(mut self, instantiate: InstantiateOptions) -> Self {
        self.instantiate = instantiate;
        self
    }

    pub async fn execute(self, ctx: Arc<NetworkContext>) -> Result<ContractHandle, DeployError> {
        ContractFactory::deploy_plan(ctx, self).await
    }
}

/// Deploys one contract artifact to one cluster.
pub struct ContractFactory {
    ctx: Arc<NetworkContext>,
    artifact: Arc<ContractArtifact>,
    cluster_id: ClusterId,
    encoder: Arc<dyn CallDataEncoder>,
    system_contract: Option<ContractId>,
    poller: ConditionPoller,
}

impl ContractFactory {
    /// Create a factory for `artifact`, loading the target cluster's system contract.
    pub async fn create(
        ctx: Arc<NetworkContext>,
        artifact: ContractArtifact,
        options: CreateOptions,
    ) -> Result<Self, DeployError> {
        let cluster_id = options
            .cluster_id
            .unwrap_or_else(|| ctx.main_cluster_id().clone());

        let encoder = SelectorEncoder::from_artifact(&artifact).map_err(|source| {
            DeployError::EncodingFailed {
                name: artifact.code_hash().to_string(),
                source,
            }
        })?;

        let system_contract = if options.system_contract {
            None
        } else {
            ctx.system_contract(&cluster_id).await?
        };

        Ok(Self {
            ctx,
            artifact: Arc::new(artifact),
            cluster_id,
            encoder: Arc::new(encoder),
            system_contract,
            poller: ConditionPoller::new(options.wait.unwrap_or_default()),
        })
    }

    /// Upload the plan's code if needed, instantiate it and return the attached contract.
    pub async fn deploy_plan(
        ctx: Arc<NetworkContext>,
        plan: DeploymentPlan,
    ) -> Result<ContractHandle, DeployError> {
        let factory = Self::create(ctx, plan.artifact, plan.create).await?;
        factory.deploy(&plan.upload).await?;
        factory
            .instantiate(&plan.constructor, &plan.args, &plan.instantiate)
            .await
    }

    /// Replace the call-data encoder, e.g. with a full ABI encoder.
    pub fn with_encoder(mut self, encoder: Arc<dyn CallDataEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }

    pub fn artifact(&self) -> &ContractArtifact {
        &self.artifact
    }

    pub fn system_contract(&self) -> Option<&ContractId> {
        self.system_contract.as_ref()
    }

    /// Handle cancelling the waits of this factory.
    ///
    /// Cancellation is permanent: once cancelled, every later key wait of this factory fails
    /// with [`WaitError::Cancelled`](crate::poll::WaitError::Cancelled) without querying the
    /// ledger. Create a new factory to wait again.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.poller.cancel_handle()
    }

    fn code_type(&self) -> Result<CodeType, DeployError> {
        self.artifact
            .kind()
            .code_type()
            .ok_or_else(|| DeployError::UnsupportedCodeKind(self.artifact.kind().clone()))
    }

    /// Upload the contract code to the cluster, unless it is already there.
    pub async fn deploy(&self, options: &UploadOptions) -> Result<CodeUpload, DeployError> {
        let signer = self.ctx.resolve_account(options.account.as_ref())?;
        let force_upload = options
            .force_upload
            .unwrap_or(self.ctx.defaults().force_upload);

        if !force_upload {
            let system_contract =
                self.system_contract
                    .as_ref()
                    .ok_or_else(|| DeployError::SystemContractNotReady {
                        cluster: self.cluster_id.clone(),
                    })?;
            let code_type = self.code_type()?;

            let exists = self
                .ctx
                .cluster()
                .code_exists(
                    signer.as_ref(),
                    system_contract,
                    self.artifact.code_hash(),
                    code_type,
                )
                .await
                .map_err(DeployError::Client)?;

            if exists {
                tracing::info!(
                    code_hash = %self.artifact.code_hash(),
                    cluster = %self.cluster_id,
                    "Code already uploaded, skipping upload"
                );
                return Ok(CodeUpload::AlreadyPresent);
            }
        }

        let code_type = self.code_type()?;

        tracing::info!(
            code_hash = %self.artifact.code_hash(),
            cluster = %self.cluster_id,
            kind = %self.artifact.kind(),
            size = self.artifact.source.wasm.len(),
            "Uploading code..."
        );

        let outcome = self
            .ctx
            .submitter()
            .submit(
                SubmittedOperation::new(
                    LedgerCall::UploadCode {
                        cluster: self.cluster_id.clone(),
                        kind: self.artifact.kind().clone(),
                        code_type,
                        code: self.artifact.source.wasm.clone(),
                    },
                    signer,
                )
                .labelled(format!("upload {}", self.artifact.code_hash())),
            )
            .await?;

        Ok(CodeUpload::Uploaded(outcome))
    }

    /// Instantiate the uploaded code and return the attached contract.
    ///
    /// Waits for the cluster to publish the contract key, then funds and stakes the contract
    /// when the corresponding amounts are non-zero.
    pub async fn instantiate(
        &self,
        constructor: &str,
        args: &[Value],
        options: &InstantiateOptions,
    ) -> Result<ContractHandle, DeployError> {
        let defaults = self.ctx.defaults();
        let signer = self.ctx.resolve_account(options.account.as_ref())?;
        let call_data = self.encode_constructor(constructor, args)?;
        let salt = options.salt.clone().unwrap_or_else(Salt::random);

        tracing::info!(
            code_hash = %self.artifact.code_hash(),
            cluster = %self.cluster_id,
            constructor,
            salt = %salt.to_literal(),
            "Instantiating contract..."
        );

        let outcome = self
            .ctx
            .submitter()
            .submit(
                SubmittedOperation::new(
                    LedgerCall::InstantiateContract {
                        code_hash: self.artifact.code_hash().clone(),
                        call_data,
                        salt: salt.to_literal(),
                        cluster: self.cluster_id.clone(),
                        transfer: options.transfer.unwrap_or(defaults.transfer()),
                        gas_limit: options.gas_limit.unwrap_or(defaults.gas_limit),
                        storage_deposit_limit: options
                            .storage_deposit_limit
                            .or(defaults.storage_deposit_limit()),
                        deposit: options.deposit.unwrap_or(defaults.deposit()),
                    },
                    signer.clone(),
                )
                .labelled(format!("instantiate {}", constructor)),
            )
            .await?;

        let contract_id = instantiated_contract_id(&outcome)?;
        tracing::info!(contract_id = %contract_id, "Contract instantiating, waiting for its key...");

        let public_key = self
            .wait_for_public_key(&contract_id, self.ctx.block_time() * KEY_PROPAGATION_BLOCKS)
            .await?;

        let transfer_to_cluster = options
            .transfer_to_cluster
            .unwrap_or(defaults.transfer_to_cluster());
        if transfer_to_cluster > 0 {
            self.transfer_to_cluster(&contract_id, transfer_to_cluster, signer.clone())
                .await?;
        }

        let adjust_stake = options.adjust_stake.unwrap_or(defaults.adjust_stake());
        if adjust_stake > 0 {
            self.adjust_stake(&contract_id, adjust_stake, signer).await?;
        }

        tracing::info!(contract_id = %contract_id, cluster = %self.cluster_id, "Contract ready");

        Ok(self.bind(ContractIdentity {
            cluster_id: self.cluster_id.clone(),
            contract_id,
            public_key,
        }))
    }

    /// Simulate an instantiation through the system contract without submitting anything.
    pub async fn estimate_instantiation_fee(
        &self,
        constructor: &str,
        args: &[Value],
        options: &InstantiateOptions,
    ) -> Result<InstantiateEstimate, DeployError> {
        let system_contract = self.ctx.system_contract(&self.cluster_id).await?.ok_or_else(|| {
            DeployError::SystemContractNotReady {
                cluster: self.cluster_id.clone(),
            }
        })?;

        let defaults = self.ctx.defaults();
        let signer = self.ctx.resolve_account(options.account.as_ref())?;
        let request = InstantiateRequest {
            code_hash: self.artifact.code_hash().clone(),
            salt: options
                .salt
                .clone()
                .unwrap_or_else(Salt::random)
                .to_literal(),
            instantiate_data: self.encode_constructor(constructor, args)?,
            deposit: options.deposit.unwrap_or(defaults.deposit()),
            transfer: options.transfer.unwrap_or(defaults.transfer()),
        };

        let estimate = self
            .ctx
            .cluster()
            .estimate_instantiate(signer.as_ref(), &system_contract, &request)
            .await
            .map_err(DeployError::Client)?;

        tracing::debug!(
            constructor,
            gas_required = estimate.gas_required,
            storage_deposit = %estimate.storage_deposit,
            "Instantiation estimated"
        );

        Ok(estimate)
    }

    /// Attach to an existing contract of this factory's cluster.
    ///
    /// Waits at most one block time for the contract key; a contract without a published key
    /// cannot be attached.
    pub async fn attach(&self, contract_id: ContractId) -> Result<ContractHandle, DeployError> {
        let public_key = self
            .wait_for_public_key(&contract_id, self.ctx.block_time())
            .await?;
        Ok(self.bind(ContractIdentity {
            cluster_id: self.cluster_id.clone(),
            contract_id,
            public_key,
        }))
    }

    fn bind(&self, identity: ContractIdentity) -> ContractHandle {
        ContractHandle::new(
            identity,
            self.artifact.clone(),
            self.encoder.clone(),
            self.ctx.clone(),
        )
    }

    fn encode_constructor(&self, constructor: &str, args: &[Value]) -> Result<Vec<u8>, DeployError> {
        self.encoder
            .encode_constructor(constructor, args)
            .map_err(|source| DeployError::EncodingFailed {
                name: constructor.to_string(),
                source,
            })
    }

    async fn wait_for_public_key(
        &self,
        contract_id: &ContractId,
        time_limit: Duration,
    ) -> Result<PublicKey, DeployError> {
        let ctx = self.ctx.clone();

        self.poller
            .wait_for(
                || {
                    let ctx = ctx.clone();
                    let contract_id = contract_id.clone();
                    async move { ctx.contract_key(&contract_id).await }
                },
                time_limit,
            )
            .await
            .map_err(|source| DeployError::PublicKeyUnavailable {
                contract_id: contract_id.clone(),
                source,
            })
    }

    async fn transfer_to_cluster(
        &self,
        contract_id: &ContractId,
        amount: Balance,
        signer: Arc<dyn Signer>,
    ) -> Result<OperationOutcome, DeployError> {
        tracing::info!(contract_id = %contract_id, amount = %amount, "Transferring funds to cluster...");
        self.ctx
            .submitter()
            .submit(
                SubmittedOperation::new(
                    LedgerCall::TransferToCluster {
                        amount,
                        cluster: self.cluster_id.clone(),
                        dest: contract_id.clone(),
                    },
                    signer,
                )
                .labelled(format!("transfer to {}", contract_id)),
            )
            .await
    }

    async fn adjust_stake(
        &self,
        contract_id: &ContractId,
        amount: Balance,
        signer: Arc<dyn Signer>,
    ) -> Result<OperationOutcome, DeployError> {
        tracing::info!(contract_id = %contract_id, amount = %amount, "Adjusting stake...");
        self.ctx
            .submitter()
            .submit(
                SubmittedOperation::new(
                    LedgerCall::AdjustStake {
                        contract: contract_id.clone(),
                        amount,
                    },
                    signer,
                )
                .labelled(format!("stake {}", contract_id)),
            )
            .await
    }
}

/// Contract id carried by the instantiating event of `outcome`.
fn instantiated_contract_id(outcome: &OperationOutcome) -> Result<ContractId, DeployError> {
    outcome
        .find_event(CONTRACTS_SECTION, INSTANTIATING_EVENT)
        .and_then(|event| event.data.first())
        .and_then(Value::as_str)
        .map(ContractId::new)
        .ok_or_else(|| DeployError::InstantiationEventMissing {
            label: outcome.label.clone(),
        })
}
