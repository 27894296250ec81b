//! Status notifications emitted by the ledger for a submitted operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{BlockHash, TxHash};

/// The ledger's current knowledge of a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum StatusEvent {
    Ready,
    Broadcast,
    InBlock(BlockHash),
    Finalized(BlockHash),
    FinalityTimeout(BlockHash),
    Invalid,
    Dropped,
    Retracted(BlockHash),
    Usurped(TxHash),
}

impl StatusEvent {
    /// Short human readable name, used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            StatusEvent::Ready => "ready",
            StatusEvent::Broadcast => "broadcast",
            StatusEvent::InBlock(_) => "in block",
            StatusEvent::Finalized(_) => "finalized",
            StatusEvent::FinalityTimeout(_) => "finality timeout",
            StatusEvent::Invalid => "invalid",
            StatusEvent::Dropped => "dropped",
            StatusEvent::Retracted(_) => "retracted",
            StatusEvent::Usurped(_) => "usurped",
        }
    }

    /// Whether the network gave up on the operation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StatusEvent::Invalid
                | StatusEvent::Dropped
                | StatusEvent::Retracted(_)
                | StatusEvent::Usurped(_)
        )
    }

    /// Whether no further notifications are expected after this one.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            StatusEvent::Finalized(_) | StatusEvent::FinalityTimeout(_)
        )
    }

    /// The block this status refers to, if any.
    pub fn block(&self) -> Option<&BlockHash> {
        match self {
            StatusEvent::InBlock(block)
            | StatusEvent::Finalized(block)
            | StatusEvent::FinalityTimeout(block)
            | StatusEvent::Retracted(block) => Some(block),
            _ => None,
        }
    }
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.block() {
            Some(block) => write!(f, "{} ({})", self.label(), block),
            None => f.write_str(self.label()),
        }
    }
}

/// An event emitted on the ledger while executing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Runtime module that emitted the event.
    pub section: String,
    /// Event name within the section.
    pub method: String,
    /// Positional event payload.
    #[serde(default)]
    pub data: Vec<Value>,
}

impl ChainEvent {
    pub fn new(section: impl Into<String>, method: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            section: section.into(),
            method: method.into(),
            data,
        }
    }

    pub fn is(&self, section: &str, method: &str) -> bool {
        self.section == section && self.method == method
    }
}

/// One notification on a status subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: StatusEvent,
    /// Events emitted by the operation, as known at this notification.
    #[serde(default)]
    pub events: Vec<ChainEvent>,
}

impl StatusUpdate {
    pub fn new(status: StatusEvent) -> Self {
        Self {
            status,
            events: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: Vec<ChainEvent>) -> Self {
        self.events = events;
        self
    }
}

/// The successful result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    /// Label of the submitted operation.
    pub label: String,
    /// Status that resolved the submission.
    pub status: StatusEvent,
    /// Block the operation was included in.
    pub block: Option<BlockHash>,
    /// Events emitted by the operation.
    pub events: Vec<ChainEvent>,
}

impl OperationOutcome {
    pub(crate) fn from_update(label: &str, update: StatusUpdate) -> Self {
        Self {
            label: label.to_string(),
            block: update.status.block().cloned(),
            status: update.status,
            events: update.events,
        }
    }

    /// Find the first emitted event matching `section.method`.
    pub fn find_event(&self, section: &str, method: &str) -> Option<&ChainEvent> {
        self.events.iter().find(|event| event.is(section, method))
    }
}
