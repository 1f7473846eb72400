use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StowError};

/// ocistow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StowConfig {
    /// Debug logging
    pub debug: bool,

    /// Whether to copy the image
    pub copy: bool,

    /// Whether to sign the image
    pub sign: bool,

    /// PKCS#8 private key used for signing
    pub key_path: Option<PathBuf>,

    /// Registry hosts spoken to over plain HTTP
    pub insecure_registries: Vec<String>,

    /// Deadline for a whole Copy+Sign request, in seconds
    pub timeout_secs: u64,

    /// Registry credential store location (defaults to ~/.ocistow/auth/credentials.json)
    pub credentials_path: Option<PathBuf>,
}

impl Default for StowConfig {
    fn default() -> Self {
        Self {
            debug: false,
            copy: true,
            sign: true,
            key_path: None,
            insecure_registries: Vec::new(),
            timeout_secs: 15 * 60,
            credentials_path: None,
        }
    }
}

impl StowConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            StowError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: StowConfig = serde_yaml::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(StowError::Config("timeout_secs must be greater than 0".to_string()));
        }
        if self.insecure_registries.iter().any(|r| r.trim().is_empty()) {
            return Err(StowError::Config("insecure_registries contains an empty host".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_insecure(&self, registry: &str) -> bool {
        self.insecure_registries.iter().any(|r| r == registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StowConfig::default();
        assert!(config.copy);
        assert!(config.sign);
        assert!(!config.debug);
        assert_eq!(config.timeout(), Duration::from_secs(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sign: false\nkey_path: /keys/cosign.key\ninsecure_registries: [\"localhost:5000\"]").unwrap();

        let config = StowConfig::from_file(file.path()).unwrap();
        assert!(config.copy);
        assert!(!config.sign);
        assert_eq!(config.key_path, Some(PathBuf::from("/keys/cosign.key")));
        assert!(config.is_insecure("localhost:5000"));
        assert!(!config.is_insecure("ghcr.io"));
        assert_eq!(config.timeout_secs, 900);
    }

    #[test]
    fn test_from_file_missing() {
        let err = StowConfig::from_file("/nonexistent/ocistow.yaml").unwrap_err();
        assert!(matches!(err, StowError::Config(_)));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "copy: [not, a, bool").unwrap();
        let err = StowConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, StowError::Serialization(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = StowConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(StowError::Config(_))));
    }

    #[test]
    fn test_empty_insecure_host_rejected() {
        let config = StowConfig {
            insecure_registries: vec![" ".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
