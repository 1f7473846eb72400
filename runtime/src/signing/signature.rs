//! Detached signature objects and their registry layer encoding.

use std::collections::HashMap;

use base64::Engine;
use oci_distribution::manifest::OciDescriptor;
use ocistow_core::error::{Result, StowError};

use super::payload::SimpleSigningPayload;
use crate::oci::LayerBlob;

/// Media type of a signature layer (the payload bytes).
pub const SIMPLE_SIGNING_MEDIA_TYPE: &str = "application/vnd.dev.cosign.simplesigning.v1+json";

/// Layer annotation holding the base64 signature.
pub const SIGNATURE_ANNOTATION: &str = "dev.cosignproject.cosign/signature";

/// A payload and the base64 signature over it.
///
/// Two signatures are equal iff both the payload bytes and the base64 text
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    payload: Vec<u8>,
    base64_signature: String,
}

impl Signature {
    pub fn new(payload: Vec<u8>, base64_signature: impl Into<String>) -> Result<Self> {
        let base64_signature = base64_signature.into();
        if payload.is_empty() {
            return Err(StowError::Attachment("signature payload is empty".to_string()));
        }
        if base64_signature.is_empty() {
            return Err(StowError::Attachment("signature is empty".to_string()));
        }
        base64::engine::general_purpose::STANDARD
            .decode(&base64_signature)
            .map_err(|e| StowError::Attachment(format!("signature is not valid base64: {}", e)))?;
        Ok(Self {
            payload,
            base64_signature,
        })
    }

    /// Wrap raw signature bytes.
    pub fn from_raw(payload: Vec<u8>, signature: &[u8]) -> Result<Self> {
        Self::new(
            payload,
            base64::engine::general_purpose::STANDARD.encode(signature),
        )
    }

    /// Rebuild a signature from a stored layer and its descriptor.
    pub fn from_layer(descriptor: &OciDescriptor, data: Vec<u8>) -> Result<Self> {
        let signature = descriptor
            .annotations
            .as_ref()
            .and_then(|a| a.get(SIGNATURE_ANNOTATION))
            .ok_or_else(|| {
                StowError::Attachment(format!(
                    "layer {} has no '{}' annotation",
                    descriptor.digest, SIGNATURE_ANNOTATION
                ))
            })?;
        Self::new(data, signature.clone())
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn base64_signature(&self) -> &str {
        &self.base64_signature
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.base64_signature)
            .map_err(|e| StowError::Attachment(format!("signature is not valid base64: {}", e)))
    }

    pub fn simple_signing(&self) -> Result<SimpleSigningPayload> {
        SimpleSigningPayload::from_bytes(&self.payload)
    }

    /// The layer this signature is stored as.
    pub fn to_layer(&self) -> LayerBlob {
        let mut annotations = HashMap::with_capacity(1);
        annotations.insert(
            SIGNATURE_ANNOTATION.to_string(),
            self.base64_signature.clone(),
        );
        LayerBlob::new(self.payload.clone(), SIMPLE_SIGNING_MEDIA_TYPE).with_annotations(annotations)
    }
}
