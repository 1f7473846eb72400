//! In-process backend for tests and dry runs.

use std::sync::Arc;

use async_trait::async_trait;
use ocistow_core::error::{Result, StowError};
use ocistow_core::Context;

use super::Backend;
use crate::oci::{MemoryRegistry, Registry};
use crate::signing::{LocalKeySigner, Signer};

/// [`MemoryRegistry`] plus an ephemeral key.
pub struct MemoryBackend {
    registry: Arc<MemoryRegistry>,
    signer: Option<Arc<LocalKeySigner>>,
}

impl MemoryBackend {
    /// A fresh registry and a freshly generated key.
    pub fn new() -> Result<Self> {
        Ok(Self {
            registry: Arc::new(MemoryRegistry::new()),
            signer: Some(Arc::new(LocalKeySigner::generate()?)),
        })
    }

    /// Share an existing registry, e.g. to sign with a second key.
    pub fn with_registry(registry: Arc<MemoryRegistry>) -> Result<Self> {
        Ok(Self {
            registry,
            signer: Some(Arc::new(LocalKeySigner::generate()?)),
        })
    }

    /// A backend whose key cannot be found.
    pub fn without_signer() -> Self {
        Self {
            registry: Arc::new(MemoryRegistry::new()),
            signer: None,
        }
    }

    pub fn memory_registry(&self) -> Arc<MemoryRegistry> {
        self.registry.clone()
    }

    pub fn local_signer(&self) -> Option<Arc<LocalKeySigner>> {
        self.signer.clone()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn signer(&self, _ctx: &Context) -> Result<Arc<dyn Signer>> {
        match &self.signer {
            Some(signer) => Ok(signer.clone() as Arc<dyn Signer>),
            None => Err(StowError::Discovery("no signing key available".to_string())),
        }
    }

    fn registry(&self, _ctx: &Context) -> Arc<dyn Registry> {
        self.registry.clone()
    }
}
