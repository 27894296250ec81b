//! Signers and the development keyring.

use std::{collections::BTreeMap, fmt, sync::Arc};

use anyhow::Context;
use k256::ecdsa::{Signature, SigningKey, signature::Signer as _};
use sha2::{Digest, Sha256};

use crate::{config::AccountsConfig, error::DeployError, types::AccountId};

/// An account key able to sign operation payloads.
pub trait Signer: Send + Sync + fmt::Debug {
    /// Ledger account this signer signs for.
    fn account_id(&self) -> &AccountId;

    /// Sign a payload, returning the raw signature bytes.
    fn sign(&self, payload: &[u8]) -> Vec<u8>;
}

/// A secp256k1 signer derived from a development URI such as `//Alice`.
///
/// The secret key is the SHA-256 digest of the URI. Only meant for local networks.
pub struct DevSigner {
    uri: String,
    account_id: AccountId,
    signing_key: SigningKey,
}

impl DevSigner {
    pub fn from_uri(uri: &str) -> Result<Self, anyhow::Error> {
        let secret: [u8; 32] = Sha256::digest(uri.as_bytes()).into();
        let signing_key = SigningKey::from_bytes(&secret.into())
            .with_context(|| format!("Dev URI `{}` does not yield a valid secp256k1 key", uri))?;

        // Compressed SEC1 point: 33 bytes.
        let public_key = signing_key.verifying_key().to_encoded_point(true);
        let account_id = AccountId::from_bytes(public_key.as_bytes());

        Ok(Self {
            uri: uri.to_string(),
            account_id,
            signing_key,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl fmt::Debug for DevSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevSigner")
            .field("uri", &self.uri)
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

impl Signer for DevSigner {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(payload);
        signature.to_bytes().to_vec()
    }
}

/// Reference to the account an operation is sent from.
#[derive(Debug, Clone)]
pub enum AccountRef {
    /// An account registered in the keyring.
    ByName(String),
    /// A signer supplied directly by the caller.
    ByKey(Arc<dyn Signer>),
}

impl From<&str> for AccountRef {
    fn from(name: &str) -> Self {
        AccountRef::ByName(name.to_string())
    }
}

impl From<String> for AccountRef {
    fn from(name: String) -> Self {
        AccountRef::ByName(name)
    }
}

impl From<Arc<dyn Signer>> for AccountRef {
    fn from(signer: Arc<dyn Signer>) -> Self {
        AccountRef::ByKey(signer)
    }
}

/// Named signers available to a network context.
#[derive(Debug, Clone)]
pub struct Keyring {
    signers: BTreeMap<String, Arc<dyn Signer>>,
    default_account: String,
}

impl Keyring {
    pub fn new(default_account: impl Into<String>) -> Self {
        Self {
            signers: BTreeMap::new(),
            default_account: default_account.into(),
        }
    }

    /// Build the keyring from configured dev URIs.
    pub fn from_config(config: &AccountsConfig) -> Result<Self, anyhow::Error> {
        let mut keyring = Self::new(config.su_account.clone());
        for (name, uri) in &config.keyrings {
            let signer = DevSigner::from_uri(uri)
                .with_context(|| format!("Failed to derive account `{}`", name))?;
            keyring.insert(name.clone(), Arc::new(signer));
        }

        if !keyring.signers.contains_key(&keyring.default_account) {
            anyhow::bail!(
                "Default account `{}` is not part of the configured keyrings",
                keyring.default_account
            );
        }

        Ok(keyring)
    }

    pub fn insert(&mut self, name: impl Into<String>, signer: Arc<dyn Signer>) {
        self.signers.insert(name.into(), signer);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Signer>> {
        self.signers.get(name).cloned()
    }

    pub fn default_account(&self) -> &str {
        &self.default_account
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Signer>)> {
        self.signers.iter().map(|(name, signer)| (name.as_str(), signer))
    }

    /// Resolve an account reference, falling back to the default account.
    pub fn resolve(&self, account: Option<&AccountRef>) -> Result<Arc<dyn Signer>, DeployError> {
        match account {
            Some(AccountRef::ByKey(signer)) => Ok(signer.clone()),
            Some(AccountRef::ByName(name)) => self
                .get(name)
                .ok_or_else(|| DeployError::UnknownAccount(name.clone())),
            None => self
                .get(&self.default_account)
                .ok_or_else(|| DeployError::UnknownAccount(self.default_account.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use k256::ecdsa::{VerifyingKey, signature::Verifier};

    use super::*;

    #[test]
    fn test_dev_signer_is_deterministic() {
        let a = DevSigner::from_uri("//Alice").unwrap();
        let b = DevSigner::from_uri("//Alice").unwrap();
        let bob = DevSigner::from_uri("//Bob").unwrap();

        assert_eq!(a.account_id(), b.account_id());
        assert_ne!(a.account_id(), bob.account_id());
        // 0x + 33 bytes hex
        assert_eq!(a.account_id().as_str().len(), 2 + 66);
    }

    #[test]
    fn test_dev_signer_signature_verifies() {
        let signer = DevSigner::from_uri("//Alice").unwrap();
        let payload = b"upload code";
        let signature = Signature::from_slice(&signer.sign(payload)).unwrap();

        let account = hex::decode(signer.account_id().as_str().trim_start_matches("0x")).unwrap();
        let verifying_key = VerifyingKey::from_sec1_bytes(&account).unwrap();
        assert!(verifying_key.verify(payload, &signature).is_ok());
    }

    #[test]
    fn test_resolve_accounts() {
        let keyring = Keyring::from_config(&AccountsConfig::default()).unwrap();
        let alice = keyring.get("alice").unwrap();

        let default = keyring.resolve(None).unwrap();
        assert_eq!(default.account_id(), alice.account_id());

        let bob = keyring.resolve(Some(&AccountRef::from("bob"))).unwrap();
        assert_ne!(bob.account_id(), alice.account_id());

        let custom: Arc<dyn Signer> = Arc::new(DevSigner::from_uri("//Custom").unwrap());
        let resolved = keyring.resolve(Some(&AccountRef::from(custom.clone()))).unwrap();
        assert_eq!(resolved.account_id(), custom.account_id());

        let err = keyring.resolve(Some(&AccountRef::from("mallory"))).unwrap_err();
        assert!(matches!(err, DeployError::UnknownAccount(name) if name == "mallory"));
    }

    #[test]
    fn test_missing_default_account_is_rejected() {
        let mut config = AccountsConfig::default();
        config.su_account = "root".to_string();
        assert!(Keyring::from_config(&config).is_err());
    }
}
