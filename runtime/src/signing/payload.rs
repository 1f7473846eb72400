//! Simple-signing payload: the exact bytes that get signed.

use std::collections::BTreeMap;

use ocistow_core::error::Result;
use ocistow_core::Annotations;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type discriminator carried in every payload.
pub const SIMPLE_SIGNING_TYPE: &str = "cosign container image signature";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleSigningPayload {
    pub critical: Critical,
    /// Caller annotations, widened to JSON values.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub optional: BTreeMap<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critical {
    pub identity: Identity,
    pub image: Image,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "docker-reference")]
    pub docker_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "docker-manifest-digest")]
    pub docker_manifest_digest: String,
}

impl SimpleSigningPayload {
    /// Payload binding `repository@digest` and the annotation set.
    pub fn new(repository: &str, digest: &str, annotations: &Annotations) -> Self {
        Self {
            critical: Critical {
                identity: Identity {
                    docker_reference: repository.to_string(),
                },
                image: Image {
                    docker_manifest_digest: digest.to_string(),
                },
                kind: SIMPLE_SIGNING_TYPE.to_string(),
            },
            optional: annotations.to_json_values(),
        }
    }

    /// Canonical encoding: fields in declaration order, annotations sorted.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn digest(&self) -> &str {
        &self.critical.image.docker_manifest_digest
    }
}
