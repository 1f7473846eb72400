//! In-memory image content: manifest, config blob and layer blobs.
//!
//! The Copy orchestrator fetches one of these, derives a mutated copy (config
//! labels + manifest annotations) and pushes it. The fetched value is never
//! mutated in place so its digests stay meaningful for diagnostics.

use std::collections::HashMap;

use oci_distribution::manifest::{OciDescriptor, OciImageManifest};
use ocistow_core::error::{Result, StowError};
use ocistow_core::Annotations;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// OCI image manifest media type.
pub const OCI_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// OCI image index media type.
pub const OCI_INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";

/// OCI image config media type.
pub const OCI_CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";

/// `sha256:<hex>` digest of `data`.
pub fn sha256_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

/// A layer blob together with the descriptor fields it will be pushed with.
#[derive(Debug, Clone)]
pub struct LayerBlob {
    pub data: Vec<u8>,
    pub media_type: String,
    pub annotations: Option<HashMap<String, String>>,
}

impl LayerBlob {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
            annotations: None,
        }
    }

    pub fn with_annotations(mut self, annotations: HashMap<String, String>) -> Self {
        self.annotations = Some(annotations);
        self
    }

    fn descriptor(&self) -> OciDescriptor {
        OciDescriptor {
            media_type: self.media_type.clone(),
            digest: sha256_digest(&self.data),
            size: self.data.len() as i64,
            annotations: self.annotations.clone(),
            ..Default::default()
        }
    }
}

/// A single-platform image held in memory.
///
/// `layers[i]` is the blob described by `manifest.layers[i]`.
#[derive(Debug, Clone)]
pub struct ImageContent {
    pub manifest: OciImageManifest,
    pub config: Vec<u8>,
    pub layers: Vec<Vec<u8>>,
}

impl ImageContent {
    pub fn new(manifest: OciImageManifest, config: Vec<u8>, layers: Vec<Vec<u8>>) -> Result<Self> {
        if manifest.layers.len() != layers.len() {
            return Err(StowError::Serialization(format!(
                "manifest lists {} layers but {} blobs were supplied",
                manifest.layers.len(),
                layers.len()
            )));
        }
        Ok(Self {
            manifest,
            config,
            layers,
        })
    }

    /// Assemble an OCI image from a config blob and layer blobs, computing
    /// every descriptor.
    pub fn assemble(config: Vec<u8>, layers: Vec<LayerBlob>) -> Self {
        let config_descriptor = OciDescriptor {
            media_type: OCI_CONFIG_MEDIA_TYPE.to_string(),
            digest: sha256_digest(&config),
            size: config.len() as i64,
            ..Default::default()
        };
        let manifest = OciImageManifest {
            schema_version: 2,
            media_type: Some(OCI_MANIFEST_MEDIA_TYPE.to_string()),
            config: config_descriptor,
            layers: layers.iter().map(LayerBlob::descriptor).collect(),
            annotations: None,
            ..Default::default()
        };
        Self {
            manifest,
            config,
            layers: layers.into_iter().map(|l| l.data).collect(),
        }
    }

    /// Parse the config blob as generic JSON so unknown fields survive a
    /// mutation round trip.
    pub fn config_json(&self) -> Result<Value> {
        let value: Value = serde_json::from_slice(&self.config)?;
        if !value.is_object() {
            return Err(StowError::Serialization(
                "image config is not a JSON object".to_string(),
            ));
        }
        Ok(value)
    }

    /// Legacy container-config labels (`config.Labels`).
    pub fn labels(&self) -> Result<HashMap<String, String>> {
        let config = self.config_json()?;
        match config.get("config").and_then(|c| c.get("Labels")) {
            None | Some(Value::Null) => Ok(HashMap::new()),
            Some(labels) => Ok(serde_json::from_value(labels.clone())?),
        }
    }

    /// Manifest-level annotations.
    pub fn manifest_annotations(&self) -> HashMap<String, String> {
        self.manifest.annotations.clone().unwrap_or_default()
    }

    /// A copy with `annotations` merged into the config labels.
    ///
    /// Same-keyed labels are overwritten and unrelated labels kept. The
    /// config descriptor in the manifest is updated to the new blob.
    pub fn with_labels(&self, annotations: &Annotations) -> Result<Self> {
        let mut config = self.config_json()?;
        let root = config
            .as_object_mut()
            .ok_or_else(|| StowError::Serialization("image config is not a JSON object".to_string()))?;

        let container_config = root
            .entry("config")
            .or_insert_with(|| Value::Object(Default::default()));
        if container_config.is_null() {
            *container_config = Value::Object(Default::default());
        }
        let container_config = container_config.as_object_mut().ok_or_else(|| {
            StowError::Serialization("image config field 'config' is not an object".to_string())
        })?;

        let mut labels: HashMap<String, String> = match container_config.get("Labels") {
            None | Some(Value::Null) => HashMap::with_capacity(annotations.len()),
            Some(existing) => serde_json::from_value(existing.clone())?,
        };
        annotations.merge_into(&mut labels);
        container_config.insert("Labels".to_string(), serde_json::to_value(&labels)?);

        let config_bytes = serde_json::to_vec(&config)?;
        let mut manifest = self.manifest.clone();
        manifest.config.digest = sha256_digest(&config_bytes);
        manifest.config.size = config_bytes.len() as i64;

        Ok(Self {
            manifest,
            config: config_bytes,
            layers: self.layers.clone(),
        })
    }

    /// Merge `annotations` into the manifest annotations.
    pub fn with_manifest_annotations(mut self, annotations: &Annotations) -> Self {
        if annotations.is_empty() {
            return self;
        }
        let mut merged = self.manifest.annotations.take().unwrap_or_default();
        annotations.merge_into(&mut merged);
        self.manifest.annotations = Some(merged);
        self
    }

    pub fn config_digest(&self) -> &str {
        &self.manifest.config.digest
    }

    /// Canonical manifest bytes as this crate serializes them.
    pub fn manifest_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.manifest)?)
    }

    pub fn manifest_digest(&self) -> Result<String> {
        Ok(sha256_digest(&self.manifest_bytes()?))
    }
}
