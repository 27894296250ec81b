//! Call-data encoding seam.

use std::collections::HashMap;

use anyhow::Result;
use serde_json::Value;

use crate::artifact::{ContractArtifact, SelectorSpec};

/// Turns a constructor or message invocation into opaque call-data bytes.
pub trait CallDataEncoder: Send + Sync {
    fn encode_constructor(&self, constructor: &str, args: &[Value]) -> Result<Vec<u8>>;

    fn encode_message(&self, message: &str, args: &[Value]) -> Result<Vec<u8>>;
}

/// Encoder for argument-less entry points: the call data is the bare selector.
///
/// Entry points taking arguments need a full ABI encoder plugged in through
/// [`CallDataEncoder`].
#[derive(Debug, Clone, Default)]
pub struct SelectorEncoder {
    constructors: HashMap<String, [u8; 4]>,
    messages: HashMap<String, [u8; 4]>,
}

impl SelectorEncoder {
    pub fn from_artifact(artifact: &ContractArtifact) -> Result<Self> {
        Ok(Self {
            constructors: selectors(&artifact.spec.constructors)?,
            messages: selectors(&artifact.spec.messages)?,
        })
    }

    fn encode(
        table: &HashMap<String, [u8; 4]>,
        what: &str,
        name: &str,
        args: &[Value],
    ) -> Result<Vec<u8>> {
        let selector = table
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown {} `{}`", what, name))?;

        if !args.is_empty() {
            anyhow::bail!(
                "Selector encoding cannot carry the {} argument(s) of {} `{}`",
                args.len(),
                what,
                name
            );
        }

        Ok(selector.to_vec())
    }
}

fn selectors(specs: &[SelectorSpec]) -> Result<HashMap<String, [u8; 4]>> {
    specs
        .iter()
        .map(|spec| Ok((spec.label.clone(), spec.selector_bytes()?)))
        .collect()
}

impl CallDataEncoder for SelectorEncoder {
    fn encode_constructor(&self, constructor: &str, args: &[Value]) -> Result<Vec<u8>> {
        Self::encode(&self.constructors, "constructor", constructor, args)
    }

    fn encode_message(&self, message: &str, args: &[Value]) -> Result<Vec<u8>> {
        Self::encode(&self.messages, "message", message, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> ContractArtifact {
        ContractArtifact::from_json(
            r#"{
                "source": { "hash": "0x01", "wasm": "0x00" },
                "spec": {
                    "constructors": [{ "label": "default", "selector": "0xed4b9d1b" }],
                    "messages": [{ "label": "get", "selector": "0x2f865bd9" }]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_encodes_selector() {
        let encoder = SelectorEncoder::from_artifact(&artifact()).unwrap();
        assert_eq!(
            encoder.encode_constructor("default", &[]).unwrap(),
            vec![0xed, 0x4b, 0x9d, 0x1b]
        );
        assert_eq!(
            encoder.encode_message("get", &[]).unwrap(),
            vec![0x2f, 0x86, 0x5b, 0xd9]
        );
    }

    #[test]
    fn test_rejects_unknown_and_arguments() {
        let encoder = SelectorEncoder::from_artifact(&artifact()).unwrap();
        assert!(encoder.encode_constructor("new", &[]).is_err());
        assert!(
            encoder
                .encode_constructor("default", &[Value::from(true)])
                .is_err()
        );
    }
}
