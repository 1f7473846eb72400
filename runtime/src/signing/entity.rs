//! Signed entities: an image or index together with the signatures attached
//! to it, and the depth-first walk over them.
//!
//! Signatures for a manifest with digest `sha256:<hex>` live in the same
//! repository under the tag `sha256-<hex>.sig`, as an image whose layers are
//! the signed payloads.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use oci_distribution::manifest::OciManifest;
use ocistow_core::error::{Result, ResultExt};
use ocistow_core::Context;

use super::dedup::DupeDetector;
use super::signature::Signature;
use crate::oci::{ImageContent, ImageReference, LayerBlob, Registry};

/// A single-platform image and its signatures.
#[derive(Debug, Clone)]
pub struct SignedImage {
    reference: ImageReference,
    signatures: Vec<Signature>,
}

/// An image index, its signatures and its children in manifest order.
#[derive(Debug, Clone)]
pub struct SignedIndex {
    reference: ImageReference,
    signatures: Vec<Signature>,
    children: Vec<SignedEntity>,
}

#[derive(Debug, Clone)]
pub enum SignedEntity {
    Image(SignedImage),
    Index(SignedIndex),
}

impl SignedEntity {
    /// Read the entity tree at `reference` and every signature already
    /// published for each node.
    pub fn discover<'a>(
        ctx: &'a Context,
        registry: &'a dyn Registry,
        reference: &'a ImageReference,
    ) -> BoxFuture<'a, Result<SignedEntity>> {
        async move {
            let (manifest, digest) = ctx
                .run("fetch manifest", registry.pull_manifest(reference))
                .await
                .with_context(|| format!("fetching {}", reference))?;
            let pinned = reference.with_digest(&digest)?;
            let signatures = read_signatures(ctx, registry, &pinned).await?;

            match manifest {
                OciManifest::Image(_) => Ok(SignedEntity::Image(SignedImage {
                    reference: pinned,
                    signatures,
                })),
                OciManifest::ImageIndex(index) => {
                    let mut children = Vec::with_capacity(index.manifests.len());
                    for entry in &index.manifests {
                        let child = pinned.with_digest(&entry.digest)?;
                        children.push(SignedEntity::discover(ctx, registry, &child).await?);
                    }
                    Ok(SignedEntity::Index(SignedIndex {
                        reference: pinned,
                        signatures,
                        children,
                    }))
                }
            }
        }
        .boxed()
    }

    /// Digest-pinned reference to this entity.
    pub fn reference(&self) -> &ImageReference {
        match self {
            SignedEntity::Image(image) => &image.reference,
            SignedEntity::Index(index) => &index.reference,
        }
    }

    pub fn digest(&self) -> &str {
        self.reference().digest.as_deref().unwrap_or_default()
    }

    pub fn signatures(&self) -> &[Signature] {
        match self {
            SignedEntity::Image(image) => &image.signatures,
            SignedEntity::Index(index) => &index.signatures,
        }
    }

    pub fn children(&self) -> &[SignedEntity] {
        match self {
            SignedEntity::Image(_) => &[],
            SignedEntity::Index(index) => &index.children,
        }
    }

    /// Where this entity's signatures are published.
    pub fn signature_reference(&self) -> Result<ImageReference> {
        self.reference().signature_reference(self.digest())
    }

    /// A copy of this entity with `signature` attached, and whether the
    /// signature set changed. An equivalent existing signature wins.
    pub fn attach(&self, signature: Signature, dd: &DupeDetector) -> (SignedEntity, bool) {
        if let Some(existing) = dd.find_duplicate(self.signatures(), &signature) {
            tracing::debug!(
                digest = self.digest(),
                signature = existing.base64_signature(),
                "Equivalent signature already attached"
            );
            return (self.clone(), false);
        }

        let mut updated = self.clone();
        match &mut updated {
            SignedEntity::Image(image) => image.signatures.push(signature),
            SignedEntity::Index(index) => index.signatures.push(signature),
        }
        (updated, true)
    }

    /// The signature image: one simple-signing layer per signature.
    pub fn signature_image(&self) -> Result<ImageContent> {
        let layers: Vec<LayerBlob> = self.signatures().iter().map(Signature::to_layer).collect();
        let diff_ids: Vec<String> = layers
            .iter()
            .map(|l| crate::oci::sha256_digest(&l.data))
            .collect();
        let config = serde_json::json!({
            "architecture": "",
            "os": "",
            "config": {},
            "rootfs": {"type": "layers", "diff_ids": diff_ids},
        });
        Ok(ImageContent::assemble(serde_json::to_vec(&config)?, layers))
    }
}

/// Signatures published for `pinned`, empty if none exist yet.
async fn read_signatures(
    ctx: &Context,
    registry: &dyn Registry,
    pinned: &ImageReference,
) -> Result<Vec<Signature>> {
    let sig_ref = pinned.signature_reference(pinned.digest.as_deref().unwrap_or_default())?;

    let manifest = match ctx
        .run("fetch signatures", registry.pull_image_manifest(&sig_ref))
        .await
    {
        Ok((manifest, _)) => manifest,
        Err(e) if e.is_not_found() => return Ok(Vec::new()),
        Err(e) => return Err(e.context(format!("fetching signatures {}", sig_ref))),
    };

    let mut signatures = Vec::with_capacity(manifest.layers.len());
    for layer in &manifest.layers {
        let data = ctx
            .run("fetch signature layer", registry.pull_blob(&sig_ref, layer))
            .await
            .with_context(|| format!("fetching signatures {}", sig_ref))?;
        signatures.push(Signature::from_layer(layer, data)?);
    }
    tracing::debug!(reference = %sig_ref, count = signatures.len(), "Existing signatures");
    Ok(signatures)
}

/// Per-node callback for [`walk`].
#[async_trait]
pub trait Visitor: Send {
    async fn visit(&mut self, ctx: &Context, entity: &SignedEntity) -> Result<()>;
}

/// Depth-first pre-order walk: a node is visited before its children, and
/// children in index order. Stops at the first error.
pub fn walk<'a, V>(
    ctx: &'a Context,
    entity: &'a SignedEntity,
    visitor: &'a mut V,
) -> BoxFuture<'a, Result<()>>
where
    V: Visitor + ?Sized,
{
    async move {
        visitor.visit(ctx, entity).await?;
        for child in entity.children() {
            walk(ctx, child, &mut *visitor).await?;
        }
        Ok(())
    }
    .boxed()
}
