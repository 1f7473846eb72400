//! Local key file + network registry backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ocistow_core::error::{Result, StowError};
use ocistow_core::{Context, StowConfig};

use super::Backend;
use crate::oci::{CredentialStore, OciRegistry, Registry, TransportOptions};
use crate::signing::{LocalKeySigner, Signer};

/// Signs with a PKCS#8 key on disk and talks to real registries.
pub struct LocalKeyBackend {
    key_path: Option<PathBuf>,
    registry: Arc<OciRegistry>,
}

impl LocalKeyBackend {
    pub fn new(key_path: Option<PathBuf>, options: TransportOptions) -> Self {
        Self {
            key_path,
            registry: Arc::new(OciRegistry::new(options)),
        }
    }

    /// Build from configuration. The credential store defaults to
    /// `~/.ocistow/auth/credentials.json`.
    ///
    /// Signing without a key fails here, before any registry traffic.
    pub fn from_config(config: &StowConfig) -> Result<Self> {
        if config.sign && config.key_path.is_none() {
            return Err(StowError::Discovery(
                "signing is enabled but no key_path is configured".to_string(),
            ));
        }
        let credentials = match &config.credentials_path {
            Some(path) => Some(CredentialStore::new(path)),
            None => match CredentialStore::default_path() {
                Ok(store) => Some(store),
                Err(e) => {
                    tracing::warn!(error = %e, "No credential store, using environment credentials");
                    None
                }
            },
        };
        let options = TransportOptions {
            insecure_registries: config.insecure_registries.clone(),
            credentials,
        };
        Ok(Self::new(config.key_path.clone(), options))
    }

    pub fn key_path(&self) -> Option<&Path> {
        self.key_path.as_deref()
    }
}

#[async_trait]
impl Backend for LocalKeyBackend {
    async fn signer(&self, ctx: &Context) -> Result<Arc<dyn Signer>> {
        let path = self
            .key_path
            .clone()
            .ok_or_else(|| StowError::Discovery("no signing key configured".to_string()))?;

        let signer = ctx
            .run("load signing key", async move {
                tokio::task::spawn_blocking(move || LocalKeySigner::from_file(&path))
                    .await
                    .map_err(|e| StowError::Discovery(format!("key loader task failed: {}", e)))?
            })
            .await?;
        tracing::debug!(request_id = ctx.request_id(), "Signing key loaded");
        Ok(Arc::new(signer))
    }

    fn registry(&self, _ctx: &Context) -> Arc<dyn Registry> {
        self.registry.clone()
    }
}
