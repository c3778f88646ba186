//! Opaque credential handles.
//!
//! Nothing in `forge-core` or `forge-orchestrator` ever sees a plaintext
//! IPMI/BMC password: they hold a [`CredentialRef`] and resolve it through a
//! [`SecretResolver`] only at the point an SSH/IPMI/Redfish call is made.
//! This keeps plaintext out of `Workflow.context` and therefore out of
//! whatever `StateStore` snapshots that context.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CredentialRef(pub Uuid);

impl CredentialRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CredentialRef {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("credential {0} not found")]
    NotFound(CredentialRef),
    #[error("vault error: {0}")]
    Vault(#[from] vaultrs::error::ClientError),
}

/// Resolves an opaque [`CredentialRef`] to the plaintext it stands for.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, credential_ref: CredentialRef) -> Result<Credential, SecretsError>;

    /// Stores a new credential and returns the handle that should be
    /// persisted in its place.
    async fn store(&self, credential: Credential) -> Result<CredentialRef, SecretsError>;
}

/// A [`SecretResolver`] backed by a HashiCorp Vault KV mount, addressed by
/// `{mount}/{credential_ref}`. This is the production implementation; it
/// never caches plaintext beyond the lifetime of a single `resolve` call.
pub struct VaultSecretResolver {
    client: vaultrs::client::VaultClient,
    mount: String,
}

impl VaultSecretResolver {
    pub fn new(client: vaultrs::client::VaultClient, mount: impl Into<String>) -> Self {
        Self {
            client,
            mount: mount.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct VaultCredential {
    username: String,
    password: String,
}

#[async_trait]
impl SecretResolver for VaultSecretResolver {
    async fn resolve(&self, credential_ref: CredentialRef) -> Result<Credential, SecretsError> {
        let path = credential_ref.to_string();
        let secret: VaultCredential =
            vaultrs::kv2::read(&self.client, &self.mount, &path).await?;
        Ok(Credential {
            username: secret.username,
            password: secret.password,
        })
    }

    async fn store(&self, credential: Credential) -> Result<CredentialRef, SecretsError> {
        let credential_ref = CredentialRef::new();
        let path = credential_ref.to_string();
        vaultrs::kv2::set(
            &self.client,
            &self.mount,
            &path,
            &VaultCredential {
                username: credential.username,
                password: credential.password,
            },
        )
        .await?;
        Ok(credential_ref)
    }
}

/// An in-memory [`SecretResolver`] for tests and local development.
#[derive(Default)]
pub struct InMemorySecretResolver {
    store: RwLock<HashMap<CredentialRef, (String, String)>>,
}

impl InMemorySecretResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretResolver for InMemorySecretResolver {
    async fn resolve(&self, credential_ref: CredentialRef) -> Result<Credential, SecretsError> {
        self.store
            .read()
            .expect("lock poisoned")
            .get(&credential_ref)
            .map(|(username, password)| Credential {
                username: username.clone(),
                password: password.clone(),
            })
            .ok_or(SecretsError::NotFound(credential_ref))
    }

    async fn store(&self, credential: Credential) -> Result<CredentialRef, SecretsError> {
        let credential_ref = CredentialRef::new();
        self.store
            .write()
            .expect("lock poisoned")
            .insert(credential_ref, (credential.username, credential.password));
        Ok(credential_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_in_memory_resolver() {
        let resolver = InMemorySecretResolver::new();
        let credential_ref = resolver
            .store(Credential {
                username: "ADMIN".to_string(),
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();

        let resolved = resolver.resolve(credential_ref).await.unwrap();
        assert_eq!(resolved.username, "ADMIN");
        assert_eq!(resolved.password, "hunter2");
    }

    #[tokio::test]
    async fn unknown_ref_is_not_found() {
        let resolver = InMemorySecretResolver::new();
        let err = resolver.resolve(CredentialRef::new()).await.unwrap_err();
        assert!(matches!(err, SecretsError::NotFound(_)));
    }
}
