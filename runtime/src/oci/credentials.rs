//! Registry logins saved by `ocistow login`.
//!
//! One JSON file (default `~/.ocistow/auth/credentials.json`) maps a
//! registry host to its login. A login may also mark the host as plain
//! HTTP, which the transport merges with the configured insecure hosts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ocistow_core::error::{Result, StowError};
use serde::{Deserialize, Serialize};

/// Saved login for one registry host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLogin {
    pub username: String,
    pub password: String,
    /// Reach this host over plain HTTP.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insecure: bool,
}

impl RegistryLogin {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            insecure: false,
        }
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LoginFile {
    #[serde(default)]
    logins: BTreeMap<String, RegistryLogin>,
}

/// Handle on the login file. Every call reads the file afresh.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store at `~/.ocistow/auth/credentials.json`.
    pub fn default_path() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            StowError::Config("cannot determine home directory for credential store".to_string())
        })?;
        Ok(Self::new(home.join(".ocistow").join("auth").join("credentials.json")))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save `login` for `host`, replacing any previous one.
    pub fn login(&self, host: &str, login: RegistryLogin) -> Result<()> {
        let mut file = self.read()?;
        file.logins.insert(canonical_host(host), login);
        self.write(&file)
    }

    pub fn lookup(&self, host: &str) -> Result<Option<RegistryLogin>> {
        Ok(self.read()?.logins.remove(&canonical_host(host)))
    }

    /// Forget `host`. Returns false when nothing was saved for it.
    pub fn logout(&self, host: &str) -> Result<bool> {
        let mut file = self.read()?;
        if file.logins.remove(&canonical_host(host)).is_none() {
            return Ok(false);
        }
        self.write(&file)?;
        Ok(true)
    }

    /// Hosts whose login asks for plain HTTP.
    pub fn insecure_registries(&self) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .logins
            .into_iter()
            .filter(|(_, login)| login.insecure)
            .map(|(host, _)| host)
            .collect())
    }

    fn read(&self) -> Result<LoginFile> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LoginFile::default()),
            Err(e) => {
                return Err(StowError::Config(format!(
                    "reading credential store {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        serde_json::from_slice(&data).map_err(|e| {
            StowError::Config(format!(
                "parsing credential store {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Replace the file atomically; owner-only on unix since it holds
    /// passwords.
    fn write(&self, file: &LoginFile) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let staged = self.path.with_extension("json.tmp");
        std::fs::write(&staged, serde_json::to_vec_pretty(file)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&staged, &self.path)?;
        Ok(())
    }
}

/// Lowercased host; Docker Hub aliases collapse to `index.docker.io`.
fn canonical_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    match host.as_str() {
        "docker.io" | "registry-1.docker.io" => "index.docker.io".to_string(),
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join("auth").join("credentials.json"))
    }

    #[test]
    fn test_login_then_lookup() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .login("registry.example", RegistryLogin::new("ci", "s3cret"))
            .unwrap();
        assert_eq!(
            store.lookup("Registry.Example").unwrap(),
            Some(RegistryLogin::new("ci", "s3cret"))
        );
        assert_eq!(store.lookup("ghcr.io").unwrap(), None);
    }

    #[test]
    fn test_lookup_without_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store_in(&dir).lookup("ghcr.io").unwrap(), None);
        assert!(store_in(&dir).insecure_registries().unwrap().is_empty());
    }

    #[test]
    fn test_relogin_replaces_and_logout_forgets() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.login("ghcr.io", RegistryLogin::new("user1", "pass1")).unwrap();
        store.login("ghcr.io", RegistryLogin::new("user2", "pass2")).unwrap();
        assert_eq!(store.lookup("ghcr.io").unwrap().unwrap().username, "user2");

        assert!(store.logout("ghcr.io").unwrap());
        assert!(!store.logout("ghcr.io").unwrap());
        assert_eq!(store.lookup("ghcr.io").unwrap(), None);
    }

    #[test]
    fn test_insecure_logins_listed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .login("localhost:5000", RegistryLogin::new("dev", "dev").insecure(true))
            .unwrap();
        store.login("ghcr.io", RegistryLogin::new("ci", "token")).unwrap();
        assert_eq!(store.insecure_registries().unwrap(), vec!["localhost:5000"]);

        // The flag is omitted from the file for secure hosts.
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.matches("\"insecure\"").count(), 1);
    }

    #[test]
    fn test_docker_hub_aliases_share_a_login() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.login("docker.io", RegistryLogin::new("user", "pass")).unwrap();
        assert!(store.lookup("index.docker.io").unwrap().is_some());
        assert!(store.lookup("REGISTRY-1.docker.io").unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.login("ghcr.io", RegistryLogin::new("ci", "token")).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.lookup("ghcr.io"), Err(StowError::Config(_))));
    }
}
