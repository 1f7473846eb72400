//! Registry capability and its `oci-distribution` implementation.
//!
//! Orchestrators only see the [`Registry`] trait. [`OciRegistry`] talks to
//! real registries; [`super::memory::MemoryRegistry`] keeps everything in
//! process for tests and dry runs.

use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, ClientProtocol, Config, ImageLayer};
use oci_distribution::errors::{OciDistributionError, OciErrorCode};
use oci_distribution::manifest::{ImageIndexEntry, OciDescriptor, OciImageManifest, OciManifest};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};
use ocistow_core::error::{Result, StowError};

use super::credentials::CredentialStore;
use super::image::ImageContent;
use super::reference::ImageReference;

/// Registry I/O used by the Copy and Sign orchestrators.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch a manifest as stored: an image manifest or an index.
    async fn pull_manifest(&self, reference: &ImageReference) -> Result<(OciManifest, String)>;

    /// Fetch an image manifest, resolving an index to a single platform.
    async fn pull_image_manifest(
        &self,
        reference: &ImageReference,
    ) -> Result<(OciImageManifest, String)>;

    async fn pull_blob(
        &self,
        reference: &ImageReference,
        descriptor: &OciDescriptor,
    ) -> Result<Vec<u8>>;

    /// Push every blob of `image` and then its manifest to `reference`.
    async fn push_image(&self, reference: &ImageReference, image: &ImageContent) -> Result<()>;

    /// Fetch a single-platform image with its config and layer blobs.
    async fn pull_image(&self, reference: &ImageReference) -> Result<(ImageContent, String)> {
        let (manifest, digest) = self.pull_image_manifest(reference).await?;
        let config = self.pull_blob(reference, &manifest.config).await?;
        let mut layers = Vec::with_capacity(manifest.layers.len());
        for layer in &manifest.layers {
            tracing::debug!(digest = %layer.digest, size = layer.size, "Pulling layer");
            layers.push(self.pull_blob(reference, layer).await?);
        }
        Ok((ImageContent::new(manifest, config, layers)?, digest))
    }
}

/// Authentication credentials for a container registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// `REGISTRY_USERNAME` / `REGISTRY_PASSWORD`, else anonymous.
    pub fn from_env() -> Self {
        match (
            std::env::var("REGISTRY_USERNAME").ok(),
            std::env::var("REGISTRY_PASSWORD").ok(),
        ) {
            (Some(u), Some(p)) => Self::basic(u, p),
            _ => Self::anonymous(),
        }
    }

    /// Credential store first, then environment, then anonymous.
    pub fn resolve(registry: &str, store: Option<&CredentialStore>) -> Self {
        if let Some(store) = store {
            match store.lookup(registry) {
                Ok(Some(login)) => return Self::basic(login.username, login.password),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(registry, error = %e, "Ignoring unreadable credential store")
                }
            }
        }
        Self::from_env()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }

    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Options applied uniformly to every registry call made through a backend.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Hosts spoken to over plain HTTP.
    pub insecure_registries: Vec<String>,
    /// Where per-registry credentials are looked up.
    pub credentials: Option<CredentialStore>,
}

impl TransportOptions {
    /// Configured insecure hosts plus those marked insecure at login.
    pub fn plain_http_registries(&self) -> Vec<String> {
        let mut hosts = self.insecure_registries.clone();
        if let Some(store) = &self.credentials {
            match store.insecure_registries() {
                Ok(saved) => hosts.extend(saved),
                Err(e) => tracing::warn!(error = %e, "Ignoring unreadable credential store"),
            }
        }
        hosts.sort();
        hosts.dedup();
        hosts
    }
}

/// [`Registry`] backed by the `oci-distribution` client.
pub struct OciRegistry {
    client: Client,
    options: TransportOptions,
}

impl OciRegistry {
    pub fn new(options: TransportOptions) -> Self {
        let plain_http = options.plain_http_registries();
        let protocol = if plain_http.is_empty() {
            ClientProtocol::Https
        } else {
            tracing::debug!(registries = ?plain_http, "Using plain HTTP for some registries");
            ClientProtocol::HttpsExcept(plain_http)
        };
        let config = ClientConfig {
            protocol,
            platform_resolver: Some(Box::new(linux_platform_resolver)),
            ..Default::default()
        };
        Self {
            client: Client::new(config),
            options,
        }
    }

    fn auth_for(&self, reference: &ImageReference) -> OciRegistryAuth {
        RegistryAuth::resolve(&reference.registry, self.options.credentials.as_ref()).to_oci_auth()
    }
}

#[async_trait]
impl Registry for OciRegistry {
    async fn pull_manifest(&self, reference: &ImageReference) -> Result<(OciManifest, String)> {
        let oci_ref = to_oci_reference(reference)?;
        self.client
            .pull_manifest(&oci_ref, &self.auth_for(reference))
            .await
            .map_err(|e| map_oci_error(reference, "pull manifest", e))
    }

    async fn pull_image_manifest(
        &self,
        reference: &ImageReference,
    ) -> Result<(OciImageManifest, String)> {
        let oci_ref = to_oci_reference(reference)?;
        self.client
            .pull_image_manifest(&oci_ref, &self.auth_for(reference))
            .await
            .map_err(|e| map_oci_error(reference, "pull image manifest", e))
    }

    async fn pull_blob(
        &self,
        reference: &ImageReference,
        descriptor: &OciDescriptor,
    ) -> Result<Vec<u8>> {
        let oci_ref = to_oci_reference(reference)?;
        // Blob endpoints need a token for the repository first.
        self.client
            .auth(
                &oci_ref,
                &self.auth_for(reference),
                oci_distribution::RegistryOperation::Pull,
            )
            .await
            .map_err(|e| map_oci_error(reference, "authenticate", e))?;

        let mut data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(&oci_ref, descriptor, &mut data)
            .await
            .map_err(|e| map_oci_error(reference, &format!("pull blob {}", descriptor.digest), e))?;
        Ok(data)
    }

    async fn push_image(&self, reference: &ImageReference, image: &ImageContent) -> Result<()> {
        let oci_ref = to_oci_reference(reference)?;

        let layers: Vec<ImageLayer> = image
            .manifest
            .layers
            .iter()
            .zip(&image.layers)
            .map(|(desc, data)| {
                ImageLayer::new(data.clone(), desc.media_type.clone(), desc.annotations.clone())
            })
            .collect();
        let config = Config::new(
            image.config.clone(),
            image.manifest.config.media_type.clone(),
            None,
        );

        let response = self
            .client
            .push(
                &oci_ref,
                &layers,
                config,
                &self.auth_for(reference),
                Some(image.manifest.clone()),
            )
            .await
            .map_err(|e| map_oci_error(reference, "push", e))?;

        tracing::debug!(
            reference = %reference,
            manifest_url = %response.manifest_url,
            "Manifest pushed"
        );
        Ok(())
    }
}

/// Convert an ImageReference to an oci-distribution Reference.
fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
    let ref_str = reference.full_reference();
    ref_str
        .parse::<Reference>()
        .map_err(|e| StowError::InvalidReference {
            reference: ref_str,
            reason: e.to_string(),
        })
}

/// Translate a client error, keeping "manifest/repository unknown" distinct.
fn map_oci_error(
    reference: &ImageReference,
    operation: &str,
    err: OciDistributionError,
) -> StowError {
    let not_found = match &err {
        OciDistributionError::ImageManifestNotFoundError(_) => true,
        OciDistributionError::RegistryError { envelope, .. } => envelope.errors.iter().any(|e| {
            matches!(
                e.code,
                OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown | OciErrorCode::BlobUnknown
            )
        }),
        OciDistributionError::ServerError { code, .. } => *code == 404,
        _ => false,
    };

    if not_found {
        StowError::NotFound {
            reference: reference.to_string(),
        }
    } else {
        StowError::Registry {
            reference: reference.to_string(),
            operation: operation.to_string(),
            message: err.to_string(),
        }
    }
}

/// Select the linux image matching the host architecture from an index.
pub(crate) fn linux_platform_resolver(manifests: &[ImageIndexEntry]) -> Option<String> {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };

    manifests
        .iter()
        .find(|entry| {
            entry
                .platform
                .as_ref()
                .map_or(false, |p| p.os == "linux" && p.architecture == arch)
        })
        .map(|entry| entry.digest.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::credentials::RegistryLogin;

    #[test]
    fn test_registry_auth_anonymous() {
        let auth = RegistryAuth::anonymous();
        assert!(auth.is_anonymous());
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Anonymous));
    }

    #[test]
    fn test_registry_auth_basic() {
        let auth = RegistryAuth::basic("user", "pass");
        assert!(!auth.is_anonymous());
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Basic(_, _)));
    }

    #[test]
    fn test_resolve_prefers_credential_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        store
            .login("registry.example", RegistryLogin::new("ci", "token"))
            .unwrap();

        let auth = RegistryAuth::resolve("registry.example", Some(&store));
        assert_eq!(auth, RegistryAuth::basic("ci", "token"));
    }

    #[test]
    fn test_plain_http_merges_config_and_logins() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        store
            .login("localhost:5000", RegistryLogin::new("dev", "dev").insecure(true))
            .unwrap();
        store
            .login("ghcr.io", RegistryLogin::new("ci", "token"))
            .unwrap();

        let options = TransportOptions {
            insecure_registries: vec!["registry.lan".to_string(), "localhost:5000".to_string()],
            credentials: Some(store),
        };
        assert_eq!(
            options.plain_http_registries(),
            vec!["localhost:5000".to_string(), "registry.lan".to_string()]
        );
        assert!(TransportOptions::default().plain_http_registries().is_empty());
    }

    #[test]
    fn test_to_oci_reference_with_tag() {
        let r = ImageReference::parse("ghcr.io/org/app:v0.1.0").unwrap();
        let oci_ref = to_oci_reference(&r).unwrap();
        assert_eq!(oci_ref.registry(), "ghcr.io");
        assert_eq!(oci_ref.repository(), "org/app");
        assert_eq!(oci_ref.tag(), Some("v0.1.0"));
    }

    #[test]
    fn test_to_oci_reference_with_digest() {
        let r = ImageReference::parse(
            "ghcr.io/org/app@sha256:abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890",
        )
        .unwrap();
        let oci_ref = to_oci_reference(&r).unwrap();
        assert!(oci_ref.digest().unwrap().starts_with("sha256:"));
    }

    #[test]
    fn test_map_manifest_not_found() {
        let r = ImageReference::parse("registry.example/b:v1").unwrap();
        let err = map_oci_error(
            &r,
            "pull manifest",
            OciDistributionError::ImageManifestNotFoundError("gone".to_string()),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_map_other_error_keeps_operation() {
        let r = ImageReference::parse("registry.example/b:v1").unwrap();
        let err = map_oci_error(&r, "push", OciDistributionError::PushNoDataError);
        match err {
            StowError::Registry { reference, operation, .. } => {
                assert_eq!(reference, "registry.example/b:v1");
                assert_eq!(operation, "push");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
