//! The Copy and Sign operations, and the middleware chain around them.

mod middleware;
mod sign;
mod stow;

use async_trait::async_trait;
use ocistow_core::error::Result;
use ocistow_core::{Annotations, Context};

pub use middleware::{
    logging, tracing_spans, LoggingMiddleware, ServiceBuilder, ServiceMiddleware,
    TracingMiddleware,
};
pub use stow::StowService;

/// Copy an image between registries and sign it at its destination.
#[async_trait]
pub trait Service: Send + Sync {
    /// Copy `src` to `dst`, stamping `annotations` onto the config labels
    /// and the manifest annotations of the written image.
    async fn copy(
        &self,
        ctx: &Context,
        src: &str,
        dst: &str,
        annotations: &Annotations,
    ) -> Result<()>;

    /// Sign every entity at `dst`, embedding `annotations` in the payload.
    async fn sign(&self, ctx: &Context, dst: &str, annotations: &Annotations) -> Result<()>;
}

#[async_trait]
impl<S: Service + ?Sized> Service for Box<S> {
    async fn copy(
        &self,
        ctx: &Context,
        src: &str,
        dst: &str,
        annotations: &Annotations,
    ) -> Result<()> {
        (**self).copy(ctx, src, dst, annotations).await
    }

    async fn sign(&self, ctx: &Context, dst: &str, annotations: &Annotations) -> Result<()> {
        (**self).sign(ctx, dst, annotations).await
    }
}
