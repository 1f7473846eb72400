use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use ocistow_core::error::{Result, ResultExt, StowError};
use ocistow_core::{Annotations, Context};

use crate::oci::Registry;
use crate::signing::{DupeDetector, Signature, SignedEntity, Signer, SimpleSigningPayload, Visitor};

/// Signs each visited entity and publishes its updated signature set.
pub(super) struct SignVisitor<'a> {
    registry: Arc<dyn Registry>,
    signer: Arc<dyn Signer>,
    dd: DupeDetector,
    annotations: &'a Annotations,
    visited: usize,
    published: usize,
}

impl<'a> SignVisitor<'a> {
    pub(super) fn new(
        registry: Arc<dyn Registry>,
        signer: Arc<dyn Signer>,
        dd: DupeDetector,
        annotations: &'a Annotations,
    ) -> Self {
        Self {
            registry,
            signer,
            dd,
            annotations,
            visited: 0,
            published: 0,
        }
    }

    pub(super) fn visited(&self) -> usize {
        self.visited
    }

    pub(super) fn published(&self) -> usize {
        self.published
    }
}

#[async_trait]
impl<'a> Visitor for SignVisitor<'a> {
    async fn visit(&mut self, ctx: &Context, entity: &SignedEntity) -> Result<()> {
        self.visited += 1;
        let digest = entity.digest();
        if digest.is_empty() {
            return Err(StowError::Attachment(format!(
                "entity {} has no digest",
                entity.reference()
            )));
        }

        let payload = SimpleSigningPayload::new(
            &entity.reference().identity(),
            digest,
            self.annotations,
        )
        .to_bytes()?;

        let raw = self.signer.sign(ctx, &payload).await?;
        let b64 = base64::engine::general_purpose::STANDARD.encode(raw);
        let signature = Signature::new(payload, b64)?;

        let (updated, changed) = entity.attach(signature, &self.dd);
        if !changed {
            tracing::debug!(digest, "Signature already attached, nothing to publish");
            return Ok(());
        }

        let sig_ref = updated.signature_reference()?;
        let image = updated.signature_image()?;
        ctx.run("publish signatures", self.registry.push_image(&sig_ref, &image))
            .await
            .with_context(|| format!("publishing {}", sig_ref))?;
        self.published += 1;

        tracing::info!(
            digest,
            signatures = updated.signatures().len(),
            reference = %sig_ref,
            "Signature published"
        );
        Ok(())
    }
}
