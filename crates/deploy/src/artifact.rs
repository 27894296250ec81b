//! Contract artifacts produced by the contract toolchain.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{CodeHash, CodeKind, serde_hex};

/// A compiled contract bundle: code blob plus the metadata needed to call it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractArtifact {
    pub source: ContractSource,
    #[serde(default)]
    pub spec: ContractSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSource {
    pub hash: CodeHash,
    #[serde(with = "serde_hex")]
    pub wasm: Vec<u8>,
    #[serde(default)]
    pub kind: CodeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    #[serde(default)]
    pub constructors: Vec<SelectorSpec>,
    #[serde(default)]
    pub messages: Vec<SelectorSpec>,
}

/// A callable entry point: human label plus its 4-byte selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSpec {
    pub label: String,
    pub selector: String,
}

impl SelectorSpec {
    /// Decode the `0x`-prefixed selector into its 4 bytes.
    pub fn selector_bytes(&self) -> Result<[u8; 4]> {
        let bytes = hex::decode(self.selector.trim_start_matches("0x"))
            .with_context(|| format!("Selector of `{}` is not valid hex", self.label))?;
        bytes.try_into().map_err(|bytes: Vec<u8>| {
            anyhow::anyhow!(
                "Selector of `{}` must be 4 bytes, got {}",
                self.label,
                bytes.len()
            )
        })
    }
}

impl ContractArtifact {
    /// Load an artifact from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let artifact = Self::from_json(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            code_hash = %artifact.source.hash,
            kind = %artifact.source.kind,
            "Contract artifact loaded"
        );
        Ok(artifact)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Invalid contract artifact JSON")
    }

    pub fn code_hash(&self) -> &CodeHash {
        &self.source.hash
    }

    pub fn kind(&self) -> &CodeKind {
        &self.source.kind
    }

    pub fn constructor(&self, label: &str) -> Option<&SelectorSpec> {
        self.spec.constructors.iter().find(|c| c.label == label)
    }

    pub fn message(&self, label: &str) -> Option<&SelectorSpec> {
        self.spec.messages.iter().find(|m| m.label == label)
    }
}
