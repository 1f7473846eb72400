//! Backend - the signer and registry transport a request runs against.
//!
//! The orchestrators never depend on a particular key technology or
//! registry: they ask the backend for both, per request context.

mod local;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use ocistow_core::error::Result;
use ocistow_core::Context;

use crate::oci::Registry;
use crate::signing::Signer;

pub use local::LocalKeyBackend;
pub use memory::MemoryBackend;

/// Supplies a signer and a registry handle for a request.
///
/// Implementations must be safe for concurrent reuse across requests.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The signer bound to the configured key. Failure here is a discovery
    /// error: nothing has been read or written yet.
    async fn signer(&self, ctx: &Context) -> Result<Arc<dyn Signer>>;

    /// Registry handle carrying this backend's transport options.
    fn registry(&self, ctx: &Context) -> Arc<dyn Registry>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn signer(&self, ctx: &Context) -> Result<Arc<dyn Signer>> {
        (**self).signer(ctx).await
    }

    fn registry(&self, ctx: &Context) -> Arc<dyn Registry> {
        (**self).registry(ctx)
    }
}
