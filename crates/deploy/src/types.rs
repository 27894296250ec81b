//! Identifiers and small value types shared across the deployment flow.

use std::{fmt, ops::RangeInclusive, str::FromStr};

use derive_more::Display;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Native token amount on the ledger.
pub type Balance = u128;

macro_rules! hex_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a hex string. A missing `0x` prefix is added.
            pub fn new(value: impl Into<String>) -> Self {
                let value = value.into();
                if value.starts_with("0x") {
                    Self(value)
                } else {
                    Self(format!("0x{}", value))
                }
            }

            /// Build the identifier from raw bytes.
            pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
                Self(format!("0x{}", hex::encode(bytes)))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

hex_identifier!(
    /// Identifier of an execution cluster.
    ClusterId
);
hex_identifier!(
    /// Identifier of a contract instance inside a cluster.
    ContractId
);
hex_identifier!(
    /// Hash of an uploaded code blob.
    CodeHash
);
hex_identifier!(
    /// Hash of a ledger block.
    BlockHash
);
hex_identifier!(
    /// Hash of a submitted operation.
    TxHash
);
hex_identifier!(
    /// Ledger account identifier derived from a signer's public key.
    AccountId
);
hex_identifier!(
    /// Contract public key published by the cluster key registry.
    PublicKey
);

/// The kind of code blob a contract artifact carries.
///
/// Unknown kinds are kept verbatim so they can be reported instead of rejected while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CodeKind {
    #[default]
    InkCode,
    SidevmCode,
    Other(String),
}

impl CodeKind {
    /// The code type understood by the execution cluster, if this kind has one.
    pub fn code_type(&self) -> Option<CodeType> {
        match self {
            CodeKind::InkCode => Some(CodeType::Ink),
            CodeKind::SidevmCode => Some(CodeType::Sidevm),
            CodeKind::Other(_) => None,
        }
    }
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeKind::InkCode => f.write_str("InkCode"),
            CodeKind::SidevmCode => f.write_str("SidevmCode"),
            CodeKind::Other(kind) => f.write_str(kind),
        }
    }
}

impl FromStr for CodeKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "InkCode" => CodeKind::InkCode,
            "SidevmCode" => CodeKind::SidevmCode,
            other => CodeKind::Other(other.to_string()),
        })
    }
}

impl From<String> for CodeKind {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<CodeKind> for String {
    fn from(value: CodeKind) -> Self {
        value.to_string()
    }
}

/// Code type as registered by the cluster's system contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum CodeType {
    Ink,
    Sidevm,
}

/// Instantiation salt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Salt {
    /// A number, rendered as a `0x`-prefixed lowercase hex literal.
    Number(u64),
    /// A literal passed through unchanged.
    Literal(String),
}

impl Salt {
    /// Range random salts are drawn from.
    pub const RANDOM_RANGE: RangeInclusive<u64> = 1_000_000_000..=9_999_999_999;

    /// Draw a random numeric salt.
    pub fn random() -> Self {
        Salt::Number(rand::rng().random_range(Self::RANDOM_RANGE))
    }

    /// Render the salt the way the ledger expects it.
    pub fn to_literal(&self) -> String {
        match self {
            Salt::Number(value) => format!("0x{:x}", value),
            Salt::Literal(value) => value.clone(),
        }
    }
}

impl From<u64> for Salt {
    fn from(value: u64) -> Self {
        Salt::Number(value)
    }
}

impl From<&str> for Salt {
    fn from(value: &str) -> Self {
        Salt::Literal(value.to_string())
    }
}

/// Serde helpers for `0x`-prefixed hex byte strings.
pub(crate) mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: &str = Deserialize::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
