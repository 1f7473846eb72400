//! In-process registry.
//!
//! Holds manifests, tags and blobs per repository behind a lock and counts
//! reads and writes, so callers can assert that nothing touched the network
//! path (or that a second signing run published nothing).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use oci_distribution::manifest::{OciDescriptor, OciImageIndex, OciImageManifest, OciManifest};
use ocistow_core::error::{Result, StowError};
use parking_lot::RwLock;

use super::image::{sha256_digest, ImageContent};
use super::reference::ImageReference;
use super::registry::{linux_platform_resolver, Registry};

#[derive(Default)]
struct Repository {
    tags: HashMap<String, String>,
    manifests: HashMap<String, OciManifest>,
    blobs: HashMap<String, Vec<u8>>,
}

/// [`Registry`] kept entirely in memory.
#[derive(Default)]
pub struct MemoryRegistry {
    repositories: RwLock<HashMap<String, Repository>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    read_only: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of manifest and blob reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of images or indexes pushed so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Reject every subsequent push.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Store an index manifest and tag it. Every child must already exist in
    /// the same repository.
    pub fn push_index(&self, reference: &ImageReference, index: OciImageIndex) -> Result<String> {
        self.check_writable(reference)?;
        let bytes = serde_json::to_vec(&index)?;
        let digest = sha256_digest(&bytes);

        let mut repos = self.repositories.write();
        let repo = repos.entry(reference.repository_reference()).or_default();
        for child in &index.manifests {
            if !repo.manifests.contains_key(&child.digest) {
                return Err(StowError::NotFound {
                    reference: format!("{}@{}", reference.repository_reference(), child.digest),
                });
            }
        }
        repo.manifests
            .insert(digest.clone(), OciManifest::ImageIndex(index));
        if let Some(tag) = &reference.tag {
            repo.tags.insert(tag.clone(), digest.clone());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(digest)
    }

    /// Digest a reference currently resolves to, if any. Not counted as a read.
    pub fn resolve(&self, reference: &ImageReference) -> Option<String> {
        let repos = self.repositories.read();
        let repo = repos.get(&reference.repository_reference())?;
        resolve_in(repo, reference)
    }

    /// Tags in a repository, sorted.
    pub fn tags(&self, repository: &str) -> Vec<String> {
        let repos = self.repositories.read();
        let mut tags: Vec<String> = repos
            .get(repository)
            .map(|r| r.tags.keys().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    fn check_writable(&self, reference: &ImageReference) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StowError::Registry {
                reference: reference.to_string(),
                operation: "push".to_string(),
                message: "registry is read-only".to_string(),
            });
        }
        Ok(())
    }

    fn lookup(&self, reference: &ImageReference) -> Result<(OciManifest, String)> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let not_found = || StowError::NotFound {
            reference: reference.to_string(),
        };

        let repos = self.repositories.read();
        let repo = repos
            .get(&reference.repository_reference())
            .ok_or_else(not_found)?;
        let digest = resolve_in(repo, reference).ok_or_else(not_found)?;
        let manifest = repo.manifests.get(&digest).ok_or_else(not_found)?;
        Ok((manifest.clone(), digest))
    }
}

fn resolve_in(repo: &Repository, reference: &ImageReference) -> Option<String> {
    match (&reference.digest, &reference.tag) {
        (Some(digest), _) => repo.manifests.contains_key(digest).then(|| digest.clone()),
        (None, Some(tag)) => repo.tags.get(tag).cloned(),
        (None, None) => None,
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn pull_manifest(&self, reference: &ImageReference) -> Result<(OciManifest, String)> {
        self.lookup(reference)
    }

    async fn pull_image_manifest(
        &self,
        reference: &ImageReference,
    ) -> Result<(OciImageManifest, String)> {
        match self.lookup(reference)? {
            (OciManifest::Image(manifest), digest) => Ok((manifest, digest)),
            (OciManifest::ImageIndex(index), _) => {
                let digest = linux_platform_resolver(&index.manifests).ok_or_else(|| {
                    StowError::Registry {
                        reference: reference.to_string(),
                        operation: "pull image manifest".to_string(),
                        message: "no manifest in index matches this platform".to_string(),
                    }
                })?;
                match self.lookup(&reference.with_digest(&digest)?)? {
                    (OciManifest::Image(manifest), digest) => Ok((manifest, digest)),
                    (OciManifest::ImageIndex(_), _) => Err(StowError::Registry {
                        reference: reference.to_string(),
                        operation: "pull image manifest".to_string(),
                        message: "nested index is not a platform image".to_string(),
                    }),
                }
            }
        }
    }

    async fn pull_blob(
        &self,
        reference: &ImageReference,
        descriptor: &OciDescriptor,
    ) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let repos = self.repositories.read();
        repos
            .get(&reference.repository_reference())
            .and_then(|repo| repo.blobs.get(&descriptor.digest))
            .cloned()
            .ok_or_else(|| StowError::NotFound {
                reference: format!("{}@{}", reference.repository_reference(), descriptor.digest),
            })
    }

    async fn push_image(&self, reference: &ImageReference, image: &ImageContent) -> Result<()> {
        self.check_writable(reference)?;
        let digest = image.manifest_digest()?;
        if let Some(pinned) = &reference.digest {
            if *pinned != digest {
                return Err(StowError::Registry {
                    reference: reference.to_string(),
                    operation: "push".to_string(),
                    message: format!("manifest digest {digest} does not match"),
                });
            }
        }

        let mut repos = self.repositories.write();
        let repo = repos.entry(reference.repository_reference()).or_default();
        repo.blobs
            .insert(image.config_digest().to_string(), image.config.clone());
        for (descriptor, data) in image.manifest.layers.iter().zip(&image.layers) {
            repo.blobs.insert(descriptor.digest.clone(), data.clone());
        }
        repo.manifests
            .insert(digest.clone(), OciManifest::Image(image.manifest.clone()));
        if let Some(tag) = &reference.tag {
            repo.tags.insert(tag.clone(), digest);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
