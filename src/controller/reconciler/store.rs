//! # Secret Store
//!
//! Fetch and update access to Secrets, abstracted so the reconciliation core can
//! run against the API server or an in-memory map.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, PostParams};
use kube::Client;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("secret has no {0}")]
    MissingMetadata(&'static str),
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// Read and replace access to Secrets
#[async_trait]
pub trait SecretStore: Send + Sync + fmt::Debug {
    /// Fetch a Secret. `Ok(None)` when it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    /// Replace the stored Secret with `secret`
    async fn update(&self, secret: &Secret) -> Result<(), StoreError>;
}

/// Store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn update(&self, secret: &Secret) -> Result<(), StoreError> {
        let name = secret
            .metadata
            .name
            .as_deref()
            .ok_or(StoreError::MissingMetadata("name"))?;
        let namespace = secret
            .metadata
            .namespace
            .as_deref()
            .ok_or(StoreError::MissingMetadata("namespace"))?;

        // Full replace; a stale resourceVersion makes the API server reject the write
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.replace(name, &PostParams::default(), secret).await?;
        Ok(())
    }
}

/// In-memory store keyed by `namespace/name`.
///
/// Counts update calls and can be switched to reject updates.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<HashMap<String, Secret>>,
    update_calls: Mutex<usize>,
    fail_updates: Mutex<bool>,
}

impl InMemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a Secret without counting an update
    pub fn insert(&self, secret: Secret) -> Result<(), StoreError> {
        let key = key_of(&secret)?;
        self.lock_secrets()?.insert(key, secret);
        Ok(())
    }

    /// Current stored copy of a Secret
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.lock_secrets()
            .ok()
            .and_then(|secrets| secrets.get(&format!("{namespace}/{name}")).cloned())
    }

    /// Delete a Secret, as if removed from the cluster
    pub fn remove(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.lock_secrets()
            .ok()
            .and_then(|mut secrets| secrets.remove(&format!("{namespace}/{name}")))
    }

    /// Number of `update` calls, failed ones included
    pub fn update_calls(&self) -> usize {
        self.update_calls.lock().map(|calls| *calls).unwrap_or(0)
    }

    /// Make subsequent updates fail with [`StoreError::Unavailable`]
    pub fn set_fail_updates(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_updates.lock() {
            *flag = fail;
        }
    }

    fn lock_secrets(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Secret>>, StoreError> {
        self.secrets
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self
            .lock_secrets()?
            .get(&format!("{namespace}/{name}"))
            .cloned())
    }

    async fn update(&self, secret: &Secret) -> Result<(), StoreError> {
        if let Ok(mut calls) = self.update_calls.lock() {
            *calls += 1;
        }
        if self.fail_updates.lock().is_ok_and(|flag| *flag) {
            return Err(StoreError::Unavailable("updates disabled".to_string()));
        }

        let key = key_of(secret)?;
        let mut secrets = self.lock_secrets()?;
        if !secrets.contains_key(&key) {
            return Err(StoreError::Unavailable(format!("secret {key} not found")));
        }
        secrets.insert(key, secret.clone());
        Ok(())
    }
}

fn key_of(secret: &Secret) -> Result<String, StoreError> {
    let name = secret
        .metadata
        .name
        .as_deref()
        .ok_or(StoreError::MissingMetadata("name"))?;
    let namespace = secret
        .metadata
        .namespace
        .as_deref()
        .ok_or(StoreError::MissingMetadata("namespace"))?;
    Ok(format!("{namespace}/{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn secret(name: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        }
    }

    #[tokio::test]
    async fn test_get_missing_secret_is_none() {
        let store = InMemorySecretStore::new();
        assert!(store.get("default", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_and_counts() {
        let store = InMemorySecretStore::new();
        store.insert(secret("db")).unwrap();

        let mut updated = secret("db");
        updated.string_data = Some([("k".to_string(), "v".to_string())].into());
        store.update(&updated).await.unwrap();

        assert_eq!(store.update_calls(), 1);
        assert_eq!(store.secret("default", "db"), Some(updated));
    }

    #[tokio::test]
    async fn test_failing_updates() {
        let store = InMemorySecretStore::new();
        store.insert(secret("db")).unwrap();
        store.set_fail_updates(true);

        let result = store.update(&secret("db")).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.update_calls(), 1);
    }

    #[test]
    fn test_insert_requires_namespace() {
        let mut s = secret("db");
        s.metadata.namespace = None;
        assert!(matches!(
            InMemorySecretStore::new().insert(s),
            Err(StoreError::MissingMetadata("namespace"))
        ));
    }
}
