//! StowService - Copy and Sign against a [`Backend`].

use std::time::Instant;

use async_trait::async_trait;
use ocistow_core::error::{Result, ResultExt};
use ocistow_core::{Annotations, Context};

use super::sign::SignVisitor;
use super::Service;
use crate::backend::Backend;
use crate::oci::ImageReference;
use crate::signing::{walk, DupeDetector, SignedEntity};

/// The core [`Service`]: no logging or tracing decoration of its own.
pub struct StowService<B> {
    backend: B,
}

impl<B: Backend> StowService<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: Backend> Service for StowService<B> {
    async fn copy(
        &self,
        ctx: &Context,
        src: &str,
        dst: &str,
        annotations: &Annotations,
    ) -> Result<()> {
        let src_ref = ImageReference::parse(src)
            .with_context(|| format!("parsing source reference {:?}", src))?;
        let dst_ref = ImageReference::parse(dst)
            .with_context(|| format!("parsing destination reference {:?}", dst))?;

        let registry = self.backend.registry(ctx);
        let start = Instant::now();

        // Index fan-out is not performed: one platform manifest is copied.
        let (image, digest) = ctx
            .run("fetch source image", registry.pull_image(&src_ref))
            .await
            .with_context(|| format!("fetching {:?}", src))?;
        tracing::debug!(
            src = %src_ref,
            digest = %digest,
            layers = image.layers.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Source image fetched"
        );

        let image = image
            .with_labels(annotations)
            .context("mutating config")?
            .with_manifest_annotations(annotations);

        ctx.run("push destination image", registry.push_image(&dst_ref, &image))
            .await
            .with_context(|| format!("writing destination image {:?}", dst_ref.full_reference()))?;

        tracing::debug!(
            dst = %dst_ref,
            digest = %image.manifest_digest()?,
            "Destination image written"
        );
        Ok(())
    }

    async fn sign(&self, ctx: &Context, dst: &str, annotations: &Annotations) -> Result<()> {
        let dst_ref = ImageReference::parse(dst)
            .with_context(|| format!("parsing destination reference {:?}", dst))?;

        // Signer discovery errors are never downgraded.
        let signer = self
            .backend
            .signer(ctx)
            .await
            .context("discovering signing key")?;
        let dd = DupeDetector::new(signer.clone());

        let registry = self.backend.registry(ctx);
        let entity = SignedEntity::discover(ctx, registry.as_ref(), &dst_ref)
            .await
            .context("discovering existing signed entities")?;

        let mut visitor = SignVisitor::new(registry, signer, dd, annotations);
        walk(ctx, &entity, &mut visitor)
            .await
            .context("writing signatures")?;

        tracing::debug!(
            dst = %dst_ref,
            visited = visitor.visited(),
            published = visitor.published(),
            "Signing complete"
        );
        Ok(())
    }
}
