//! Request adapter shared by the command-line and handler front-ends.
//!
//! A front-end builds a deadline-bound [`Context`], then calls [`stow`],
//! which runs Copy and then Sign as enabled and reports the first failure.

use ocistow_core::error::{Result, ResultExt};
use ocistow_core::{Annotations, Context, StowConfig};
use serde::{Deserialize, Deserializer, Serialize};

use crate::service::Service;

/// A single copy-and-sign request, as received by the handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StowRequest {
    #[serde(rename = "SrcImageRef", default)]
    pub src_image_ref: String,
    #[serde(rename = "DstImageRef")]
    pub dst_image_ref: String,
    #[serde(rename = "Annotations", default, deserialize_with = "null_as_empty")]
    pub annotations: Annotations,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Annotations, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl StowRequest {
    pub fn new(src: impl Into<String>, dst: impl Into<String>, annotations: Annotations) -> Self {
        Self {
            src_image_ref: src.into(),
            dst_image_ref: dst.into(),
            annotations,
        }
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Which stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StowFlags {
    pub copy: bool,
    pub sign: bool,
}

impl Default for StowFlags {
    fn default() -> Self {
        Self {
            copy: true,
            sign: true,
        }
    }
}

impl From<&StowConfig> for StowFlags {
    fn from(config: &StowConfig) -> Self {
        Self {
            copy: config.copy,
            sign: config.sign,
        }
    }
}

/// Copy then Sign, each only when enabled. Stops at the first failure.
pub async fn stow(
    ctx: &Context,
    service: &dyn Service,
    flags: StowFlags,
    request: &StowRequest,
) -> Result<()> {
    tracing::debug!(
        request_id = ctx.request_id(),
        src = %request.src_image_ref,
        dst = %request.dst_image_ref,
        copy = flags.copy,
        sign = flags.sign,
        "Handling stow request"
    );

    if flags.copy {
        service
            .copy(
                ctx,
                &request.src_image_ref,
                &request.dst_image_ref,
                &request.annotations,
            )
            .await
            .context("failed copy")?;
    }

    if flags.sign {
        service
            .sign(ctx, &request.dst_image_ref, &request.annotations)
            .await
            .context("failed sign")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_field_names() {
        let request: StowRequest = serde_json::from_str(
            r#"{"SrcImageRef":"registry.example/a:latest","DstImageRef":"registry.example/b:v1","Annotations":{"env":"prod"}}"#,
        )
        .unwrap();
        assert_eq!(request.src_image_ref, "registry.example/a:latest");
        assert_eq!(request.dst_image_ref, "registry.example/b:v1");
        assert_eq!(request.annotations.get("env"), Some("prod"));
    }

    #[test]
    fn test_request_null_annotations() {
        let request = StowRequest::from_json(
            br#"{"SrcImageRef":"a","DstImageRef":"b","Annotations":null}"#,
        )
        .unwrap();
        assert!(request.annotations.is_empty());
    }

    #[test]
    fn test_request_missing_destination() {
        assert!(StowRequest::from_json(br#"{"SrcImageRef":"a"}"#).is_err());
    }

    #[test]
    fn test_flags_from_config() {
        let config = StowConfig {
            copy: false,
            ..Default::default()
        };
        let flags = StowFlags::from(&config);
        assert!(!flags.copy);
        assert!(flags.sign);
    }
}
