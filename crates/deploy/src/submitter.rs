//! Submission of signed operations and tracking of their status to a single resolution.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::oneshot;

use crate::{
    call::SubmittedOperation,
    error::DeployError,
    network::{LedgerClient, StatusSubscription},
    status::{OperationOutcome, StatusEvent},
};

type SubmitResult = Result<OperationOutcome, DeployError>;

/// Resolution state of one submission.
///
/// The first resolution is delivered to the caller; every later attempt is a no-op.
enum Resolution {
    Pending(oneshot::Sender<SubmitResult>),
    Resolved,
}

impl Resolution {
    /// Deliver `result` if nothing was delivered yet. Returns whether it was delivered.
    fn resolve(&mut self, result: SubmitResult) -> bool {
        match std::mem::replace(self, Resolution::Resolved) {
            Resolution::Pending(sender) => {
                // The caller may have stopped waiting; the subscription is still driven to release.
                let _ = sender.send(result);
                true
            }
            Resolution::Resolved => false,
        }
    }

    fn is_pending(&self) -> bool {
        matches!(self, Resolution::Pending(_))
    }
}

/// Submits signed operations and waits for their outcome.
#[derive(Clone)]
pub struct TxSubmitter {
    ledger: Arc<dyn LedgerClient>,
}

impl TxSubmitter {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Sign and submit `operation`, then wait for its first decisive status.
    ///
    /// `InBlock`, `Finalized` and `FinalityTimeout` resolve successfully; `Invalid`, `Dropped`,
    /// `Retracted` and `Usurped` fail with [`DeployError::TransactionRejected`]. Only the first
    /// of those is reported. The subscription keeps being driven in the background after an
    /// early resolution and is released once finality (or finality timeout) is reported, or
    /// when the network closes the stream.
    pub async fn submit(&self, operation: SubmittedOperation) -> SubmitResult {
        let label = operation.label();
        let signed = operation.sign().map_err(DeployError::Client)?;

        let subscription = self
            .ledger
            .submit_and_watch(signed)
            .await
            .with_context(|| format!("Failed to submit `{}`", label))
            .map_err(DeployError::Client)?;

        tracing::debug!(label = %label, "Operation submitted, watching status...");

        let (sender, receiver) = oneshot::channel();
        tokio::spawn(drive_subscription(label.clone(), subscription, sender));

        receiver.await.unwrap_or_else(|_| {
            Err(DeployError::Client(anyhow::anyhow!(
                "Status tracking of `{}` stopped before resolving",
                label
            )))
        })
    }
}

/// Consume status notifications until the release point, resolving the submission once.
async fn drive_subscription(
    label: String,
    mut subscription: StatusSubscription,
    sender: oneshot::Sender<SubmitResult>,
) {
    let mut resolution = Resolution::Pending(sender);

    while let Some(update) = subscription.next().await {
        let update = match update {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!(label = %label, error = %e, "Status stream failed");
                resolution.resolve(Err(DeployError::Client(
                    e.context(format!("Status stream of `{}` failed", label)),
                )));
                break;
            }
        };

        let status = update.status.clone();
        match &status {
            StatusEvent::Ready | StatusEvent::Broadcast => {
                tracing::debug!(label = %label, status = %status, "Operation pending");
            }
            StatusEvent::Invalid
            | StatusEvent::Dropped
            | StatusEvent::Retracted(_)
            | StatusEvent::Usurped(_) => {
                tracing::debug!(label = %label, status = %status, "Operation rejected");
                resolution.resolve(Err(DeployError::TransactionRejected {
                    label: label.clone(),
                    status: status.clone(),
                }));
            }
            StatusEvent::InBlock(_) => {
                tracing::debug!(label = %label, status = %status, "Operation included");
                resolution.resolve(Ok(OperationOutcome::from_update(&label, update.clone())));
            }
            StatusEvent::Finalized(_) | StatusEvent::FinalityTimeout(_) => {
                tracing::debug!(label = %label, status = %status, "Operation settled");
            }
        }

        if status.is_final() {
            resolution.resolve(Ok(OperationOutcome::from_update(&label, update)));
            subscription.unsubscribe();
            return;
        }
    }

    if resolution.is_pending() {
        tracing::warn!(label = %label, "Status stream closed before the operation resolved");
        resolution.resolve(Err(DeployError::Client(anyhow::anyhow!(
            "Status stream of `{}` closed before the operation resolved",
            label
        ))));
    }
    subscription.unsubscribe();
}
