//! Ledger operations and their signed form.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use crate::{
    keyring::Signer,
    types::{AccountId, Balance, ClusterId, CodeHash, CodeKind, CodeType, ContractId, serde_hex},
};

/// A state-changing request understood by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum LedgerCall {
    /// Register a code blob under a cluster.
    #[serde(rename_all = "camelCase")]
    UploadCode {
        cluster: ClusterId,
        kind: CodeKind,
        code_type: CodeType,
        #[serde(with = "serde_hex")]
        code: Vec<u8>,
    },
    /// Create a contract instance from uploaded code.
    #[serde(rename_all = "camelCase")]
    InstantiateContract {
        code_hash: CodeHash,
        #[serde(with = "serde_hex")]
        call_data: Vec<u8>,
        salt: String,
        cluster: ClusterId,
        transfer: Balance,
        gas_limit: u64,
        storage_deposit_limit: Option<Balance>,
        deposit: Balance,
    },
    /// Credit a contract's balance inside its cluster.
    #[serde(rename_all = "camelCase")]
    TransferToCluster {
        amount: Balance,
        cluster: ClusterId,
        dest: ContractId,
    },
    /// Adjust the stake bound to a contract.
    #[serde(rename_all = "camelCase")]
    AdjustStake { contract: ContractId, amount: Balance },
    /// Send a state-changing message to a contract through the ledger.
    #[serde(rename_all = "camelCase")]
    PushContractMessage {
        contract: ContractId,
        #[serde(with = "serde_hex")]
        call_data: Vec<u8>,
        deposit: Balance,
    },
}

impl LedgerCall {
    /// Short name of the call, used as the default operation label.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCall::UploadCode { .. } => "upload_code",
            LedgerCall::InstantiateContract { .. } => "instantiate_contract",
            LedgerCall::TransferToCluster { .. } => "transfer_to_cluster",
            LedgerCall::AdjustStake { .. } => "adjust_stake",
            LedgerCall::PushContractMessage { .. } => "push_contract_message",
        }
    }
}

/// Options applied when signing an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Explicit account nonce; the network picks the next one when unset.
    pub nonce: Option<u64>,
    /// Priority tip paid to block producers.
    pub tip: Balance,
    /// Label used in logs and errors.
    pub label: Option<String>,
}

/// An unsigned call together with the signer and submission options.
#[derive(Debug, Clone)]
pub struct SubmittedOperation {
    pub call: LedgerCall,
    pub signer: Arc<dyn Signer>,
    pub options: SubmitOptions,
}

impl SubmittedOperation {
    pub fn new(call: LedgerCall, signer: Arc<dyn Signer>) -> Self {
        Self {
            call,
            signer,
            options: SubmitOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SubmitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.options.label = Some(label.into());
        self
    }

    pub fn label(&self) -> String {
        self.options
            .label
            .clone()
            .unwrap_or_else(|| self.call.name().to_string())
    }

    /// Sign the operation, consuming it.
    pub fn sign(self) -> Result<SignedOperation, anyhow::Error> {
        let payload = serde_json::to_vec(&SigningPayload {
            call: &self.call,
            signer: self.signer.account_id(),
            nonce: self.options.nonce,
            tip: self.options.tip,
        })
        .context("Failed to encode signing payload")?;

        let signature = self.signer.sign(&payload);

        Ok(SignedOperation {
            label: self.label(),
            signer: self.signer.account_id().clone(),
            call: self.call,
            payload,
            signature,
        })
    }
}

/// Canonical bytes a signer signs over.
#[derive(Serialize)]
struct SigningPayload<'a> {
    call: &'a LedgerCall,
    signer: &'a AccountId,
    nonce: Option<u64>,
    tip: Balance,
}

/// An operation ready to be handed to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOperation {
    pub label: String,
    pub signer: AccountId,
    pub call: LedgerCall,
    /// Bytes the signature covers.
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}
