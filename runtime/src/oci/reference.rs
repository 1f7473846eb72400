//! OCI image reference validation and parsing.
//!
//! Text is first gated by the OCI name grammar (alphanumerics joined by
//! `[-._:@+]` or `--`, path-segmented by `/`); only a full match proceeds to
//! the registry-aware split into registry, repository and tag/digest.

use std::str::FromStr;

use ocistow_core::error::{Result, StowError};
use once_cell::sync::Lazy;
use regex::Regex;

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Host Docker Hub repositories are named under in signature identities.
const DOCKER_HUB_IDENTITY_HOST: &str = "index.docker.io";

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

static OCI_REFERENCE_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([A-Za-z0-9]+(([-._:@+]|--)[A-Za-z0-9]+)*)(/([A-Za-z0-9]+(([-._:@+]|--)[A-Za-z0-9]+)*))*$",
    )
    .expect("OCI reference grammar must compile")
});

/// Parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "registry.example:5000")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "org/app")
    pub repository: String,
    /// Tag (e.g., "latest", "v1")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Validate and parse an image reference string.
    ///
    /// Supports formats:
    /// - `nginx` → docker.io/library/nginx:latest
    /// - `nginx:1.25` → docker.io/library/nginx:1.25
    /// - `ghcr.io/org/image:tag` → ghcr.io/org/image:tag
    /// - `ghcr.io/org/image@sha256:abc...` → ghcr.io/org/image@sha256:abc...
    ///
    /// Anything that does not fully match the OCI name grammar is rejected
    /// before splitting; no partial reference is ever returned.
    pub fn parse(reference: &str) -> Result<Self> {
        if reference.is_empty() {
            return Err(invalid(reference, "empty image reference"));
        }
        if !OCI_REFERENCE_GRAMMAR.is_match(reference) {
            return Err(invalid(reference, "does not match the OCI name grammar"));
        }

        // Split off digest first (@ separator)
        let (name_tag, digest) = if let Some(at_pos) = reference.rfind('@') {
            let digest_part = &reference[at_pos + 1..];
            validate_digest(reference, digest_part)?;
            (&reference[..at_pos], Some(digest_part.to_string()))
        } else {
            (reference, None)
        };

        // Split tag on the last colon after the last slash
        let (name, tag) = if let Some(slash_pos) = name_tag.rfind('/') {
            let after_slash = &name_tag[slash_pos + 1..];
            match after_slash.rfind(':') {
                Some(colon_pos) => (
                    &name_tag[..slash_pos + 1 + colon_pos],
                    Some(after_slash[colon_pos + 1..].to_string()),
                ),
                None => (name_tag, None),
            }
        } else if let Some(colon_pos) = name_tag.rfind(':') {
            // Without a slash there is no registry, so the colon starts a tag
            (&name_tag[..colon_pos], Some(name_tag[colon_pos + 1..].to_string()))
        } else {
            (name_tag, None)
        };

        if let Some(ref t) = tag {
            validate_tag(reference, t)?;
        }

        let (registry, repository) = split_registry_repository(reference, name)?;

        // Apply default tag if no tag and no digest
        let tag = if tag.is_none() && digest.is_none() {
            Some(DEFAULT_TAG.to_string())
        } else {
            tag
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = self.repository_reference();
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }

    /// `registry/repository`, without tag or digest.
    pub fn repository_reference(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Repository name as recorded in a signature's `docker-reference`.
    ///
    /// Docker Hub repositories use `index.docker.io`, matching cosign.
    pub fn identity(&self) -> String {
        let host = match self.registry.as_str() {
            DEFAULT_REGISTRY | DOCKER_HUB_IDENTITY_HOST => DOCKER_HUB_IDENTITY_HOST,
            other => other,
        };
        format!("{}/{}", host, self.repository)
    }

    /// The same repository pinned to `digest`.
    pub fn with_digest(&self, digest: &str) -> Result<Self> {
        validate_digest(digest, digest)?;
        Ok(Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: None,
            digest: Some(digest.to_string()),
        })
    }

    /// The conventional signature location for `digest` in this repository:
    /// tag `<algorithm>-<hex>.sig`.
    pub fn signature_reference(&self, digest: &str) -> Result<Self> {
        validate_digest(digest, digest)?;
        Ok(Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: Some(format!("{}.sig", digest.replace(':', "-"))),
            digest: None,
        })
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

impl FromStr for ImageReference {
    type Err = StowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn invalid(reference: &str, reason: impl Into<String>) -> StowError {
    StowError::InvalidReference {
        reference: reference.to_string(),
        reason: reason.into(),
    }
}

fn validate_digest(reference: &str, digest: &str) -> Result<()> {
    let (algorithm, encoded) = digest.split_once(':').ok_or_else(|| {
        invalid(reference, "invalid digest format: expected algorithm:hex")
    })?;
    let expected_len = match algorithm {
        "sha256" => 64,
        "sha512" => 128,
        _ => {
            return Err(invalid(
                reference,
                format!("unsupported digest algorithm '{}'", algorithm),
            ))
        }
    };
    if encoded.len() != expected_len
        || !encoded.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return Err(invalid(reference, format!("invalid digest '{}'", digest)));
    }
    Ok(())
}

fn validate_tag(reference: &str, tag: &str) -> Result<()> {
    if tag.is_empty() || tag.len() > 128 || tag.contains('/') {
        return Err(invalid(reference, format!("invalid tag '{}'", tag)));
    }
    Ok(())
}

/// Split a name into registry and repository components.
///
/// The first path component is a registry when it contains a dot or colon,
/// or is `localhost`.
fn split_registry_repository(reference: &str, name: &str) -> Result<(String, String)> {
    let (registry, repository) = match name.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (first.to_string(), rest.to_string())
        }
        Some(_) => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        // Single name like "nginx" → "library/nginx" on Docker Hub
        None => (DEFAULT_REGISTRY.to_string(), format!("library/{}", name)),
    };

    if repository.is_empty() {
        return Err(invalid(reference, "empty repository"));
    }
    if repository.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid(reference, "repository must be lowercase"));
    }
    Ok((registry, repository))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";

    #[test]
    fn test_parse_simple_name() {
        let r = ImageReference::parse("nginx").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.tag, Some("latest".to_string()));
        assert_eq!(r.digest, None);
    }

    #[test]
    fn test_parse_name_with_tag() {
        let r = ImageReference::parse("nginx:1.25").unwrap();
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.tag, Some("1.25".to_string()));
    }

    #[test]
    fn test_parse_user_repo() {
        let r = ImageReference::parse("myuser/myimage").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "myuser/myimage");
        assert_eq!(r.tag, Some("latest".to_string()));
    }

    #[test]
    fn test_parse_custom_registry() {
        let r = ImageReference::parse("registry.example/b:v1").unwrap();
        assert_eq!(r.registry, "registry.example");
        assert_eq!(r.repository, "b");
        assert_eq!(r.tag, Some("v1".to_string()));
    }

    #[test]
    fn test_parse_digest_only() {
        let r = ImageReference::parse(&format!("ghcr.io/org/app@{}", DIGEST)).unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.repository, "org/app");
        assert_eq!(r.tag, None);
        assert_eq!(r.digest.as_deref(), Some(DIGEST));
    }

    #[test]
    fn test_parse_tag_and_digest() {
        let r = ImageReference::parse(&format!("ghcr.io/org/app:v0.1.0@{}", DIGEST)).unwrap();
        assert_eq!(r.tag, Some("v0.1.0".to_string()));
        assert_eq!(r.digest.as_deref(), Some(DIGEST));
    }

    #[test]
    fn test_parse_localhost_registry() {
        let r = ImageReference::parse("localhost/myimage:test").unwrap();
        assert_eq!(r.registry, "localhost");
        assert_eq!(r.repository, "myimage");
    }

    #[test]
    fn test_parse_registry_with_port() {
        let r = ImageReference::parse("localhost:5000/team/app").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "team/app");
        assert_eq!(r.tag, Some("latest".to_string()));
    }

    #[test]
    fn test_parse_deep_repository_path() {
        let r = ImageReference::parse("ghcr.io/org/sub/image:v1").unwrap();
        assert_eq!(r.repository, "org/sub/image");
    }

    #[test]
    fn test_parse_double_dash_separator() {
        let r = ImageReference::parse("ghcr.io/org/my--app:v1").unwrap();
        assert_eq!(r.repository, "org/my--app");
    }

    #[test]
    fn test_reject_empty() {
        assert!(matches!(
            ImageReference::parse(""),
            Err(StowError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_reject_spaces_and_punctuation() {
        for bad in ["not a valid ref!!", " nginx", "nginx ", "ghcr.io/org/app:v1!"] {
            let err = ImageReference::parse(bad).unwrap_err();
            assert!(
                matches!(err, StowError::InvalidReference { .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_reject_invalid_separators() {
        for bad in ["a..b", "a//b", "/a", "a/", "a:", "a---b", "a@@b"] {
            assert!(ImageReference::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_reject_invalid_digest() {
        assert!(ImageReference::parse("nginx@invaliddigest").is_err());
        assert!(ImageReference::parse("nginx@sha256:xyz").is_err());
        // Truncated, uppercase and unknown-algorithm digests.
        assert!(ImageReference::parse("nginx@sha256:abc").is_err());
        let upper = format!("sha256:{}", DIGEST[7..].to_uppercase());
        assert!(ImageReference::parse(&format!("nginx@{upper}")).is_err());
        assert!(ImageReference::parse(&format!("nginx@md5:{}", &DIGEST[7..39])).is_err());
    }

    #[test]
    fn test_reject_uppercase_repository() {
        assert!(ImageReference::parse("ghcr.io/Org/App:v1").is_err());
    }

    #[test]
    fn test_numeric_tag_without_registry() {
        let r = ImageReference::parse("nginx:1").unwrap();
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.tag, Some("1".to_string()));
    }

    #[test]
    fn test_round_trip() {
        for text in [
            "nginx",
            "registry.example/a:latest",
            "registry.example/b:v1",
            "localhost:5000/team/app:1.0",
            "ghcr.io/org/sub/image:v1",
            "ghcr.io/org/app:v1@sha256:abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890",
        ] {
            let parsed = ImageReference::parse(text).unwrap();
            let reparsed = ImageReference::parse(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed, "round trip of {text}");
        }
        let digest_ref = format!("ghcr.io/org/app@{}", DIGEST);
        let parsed = ImageReference::parse(&digest_ref).unwrap();
        assert_eq!(parsed.to_string(), digest_ref);
    }

    #[test]
    fn test_display() {
        let r = ImageReference::parse("nginx:1.25").unwrap();
        assert_eq!(format!("{}", r), "docker.io/library/nginx:1.25");
    }

    #[test]
    fn test_from_str() {
        let r: ImageReference = "ghcr.io/org/app:v1".parse().unwrap();
        assert_eq!(r.repository_reference(), "ghcr.io/org/app");
    }

    #[test]
    fn test_identity_normalizes_docker_hub() {
        let hub = ImageReference::parse("nginx:1.25").unwrap();
        assert_eq!(hub.identity(), "index.docker.io/library/nginx");
        let explicit = ImageReference::parse("index.docker.io/team/app:v1").unwrap();
        assert_eq!(explicit.identity(), "index.docker.io/team/app");
        let other = ImageReference::parse("ghcr.io/org/app:v1").unwrap();
        assert_eq!(other.identity(), "ghcr.io/org/app");
    }

    #[test]
    fn test_with_digest() {
        let r = ImageReference::parse("registry.example/b:v1").unwrap();
        let pinned = r.with_digest(DIGEST).unwrap();
        assert_eq!(pinned.tag, None);
        assert_eq!(pinned.to_string(), format!("registry.example/b@{}", DIGEST));
    }

    #[test]
    fn test_signature_reference() {
        let r = ImageReference::parse("registry.example/b:v1").unwrap();
        let sig = r.signature_reference(DIGEST).unwrap();
        assert_eq!(
            sig.to_string(),
            "registry.example/b:sha256-abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890.sig"
        );
    }

    #[test]
    fn test_signature_reference_rejects_bad_digest() {
        let r = ImageReference::parse("registry.example/b:v1").unwrap();
        assert!(r.signature_reference("latest").is_err());
        assert!(r.signature_reference("sha256:abcdef").is_err());
        assert!(r.with_digest("sha256:ABCDEF1234567890abcdef1234567890abcdef1234567890abcdef1234567890").is_err());
    }

    #[test]
    fn test_accepts_sha512_digest() {
        let digest = format!("sha512:{}", "0f".repeat(64));
        let r = ImageReference::parse(&format!("ghcr.io/org/app@{}", digest)).unwrap();
        assert_eq!(r.digest.as_deref(), Some(digest.as_str()));
    }
}
