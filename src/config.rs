use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `config.json`.
///
/// Keys are camelCase on disk. Multi-word keys also accept their all-lowercase
/// spelling, which is what environment overrides produce
/// (`BRANCH_MANAGER_REPOSITORYPATH`, `BRANCH_MANAGER_CACHE__TTLSECS`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Repository the service operates on
    #[serde(alias = "repositorypath")]
    pub repository_path: String,
    /// Link shown in the UI header
    #[serde(alias = "headerlink")]
    pub header_link: String,
    /// Base URL the UI uses to reach this API
    #[serde(alias = "apibaseurl")]
    pub api_base_url: String,
    /// Path prefix the UI is mounted under
    #[serde(alias = "basepath")]
    pub base_path: String,
    /// Remote whose branches are listed and tracked
    pub remote: String,
    /// Branches cleanup never deletes; listed first, in this order
    #[serde(alias = "protectedbranches")]
    pub protected_branches: Vec<String>,
    pub port: u16,
    /// Directory with the built UI, served with an index.html fallback
    #[serde(alias = "staticdir", skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
    /// Minimum seconds between background fetches (0 disables them)
    #[serde(alias = "backgroundupdatesecs")]
    pub background_update_secs: u64,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Command cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// TTL in seconds for cached ref listings (default: 300)
    #[serde(alias = "ttlsecs")]
    pub ttl_secs: u64,
    /// TTL in seconds for `git status` (default: 10)
    #[serde(alias = "statusttlsecs")]
    pub status_ttl_secs: u64,
    /// Interval in seconds between sweeps of expired entries (default: 60)
    #[serde(alias = "sweepsecs")]
    pub sweep_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,     // 5 minutes
            status_ttl_secs: 10,
            sweep_secs: 60,    // 1 minute
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for log files; logs go to stderr when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository_path: ".".to_string(),
            header_link: String::new(),
            api_base_url: "http://localhost:3001/".to_string(),
            base_path: "/".to_string(),
            remote: "origin".to_string(),
            protected_branches: vec![
                "main".to_string(),
                "master".to_string(),
                "develop".to_string(),
            ],
            port: crate::rest::DEFAULT_PORT,
            static_dir: None,
            background_update_secs: 900, // 15 minutes
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// The subset of the configuration the browser UI may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub header_link: String,
    pub api_base_url: String,
    pub base_path: String,
}

impl Config {
    /// Default config file location, relative to the working directory
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// Write the default configuration to `path` unless a file is already
    /// there. Returns whether the file was created.
    pub fn ensure_file(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Config::default()
            .save(path)
            .context("Failed to create default config file")?;
        Ok(true)
    }

    /// Load configuration from `path`, writing the defaults there first if
    /// the file does not exist. Environment variables prefixed with
    /// `BRANCH_MANAGER_` override file values.
    pub fn load(path: &Path) -> Result<Self> {
        Self::ensure_file(path)?;

        let config = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()).format(config::FileFormat::Json))
            .add_source(
                config::Environment::with_prefix("BRANCH_MANAGER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to the repository
    pub fn repository_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.repository_path);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get the static UI directory, if configured
    pub fn static_path(&self) -> Option<PathBuf> {
        self.static_dir.as_ref().map(PathBuf::from)
    }

    pub fn public(&self) -> PublicConfig {
        PublicConfig {
            header_link: self.header_link.clone(),
            api_base_url: self.api_base_url.clone(),
            base_path: self.base_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, PoisonError};
    use tempfile::TempDir;

    /// Environment overrides are process-global; every test that loads a
    /// file holds this so overrides from one test never leak into another.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.repository_path, ".");
        assert_eq!(config.remote, "origin");
        assert_eq!(config.protected_branches, vec!["main", "master", "develop"]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.background_update_secs, 900);
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let _env = env_guard();
        let config = Config::load(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.base_path, "/");
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["repositoryPath"], ".");
        assert_eq!(written["apiBaseUrl"], "http://localhost:3001/");
        assert!(written.get("staticDir").is_none());
    }

    #[test]
    fn test_load_existing_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "repositoryPath": "/srv/repo",
                "headerLink": "https://git.example.com/",
                "protectedBranches": ["trunk"],
                "port": 8080
            }"#,
        )
        .unwrap();

        let _env = env_guard();
        let config = Config::load(&path).unwrap();

        assert_eq!(config.repository_path, "/srv/repo");
        assert_eq!(config.header_link, "https://git.example.com/");
        assert_eq!(config.protected_branches, vec!["trunk"]);
        assert_eq!(config.port, 8080);
        // Unspecified keys fall back to defaults
        assert_eq!(config.remote, "origin");
        assert_eq!(config.cache.status_ttl_secs, 10);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let _env = env_guard();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_ensure_file_reports_creation_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        assert!(Config::ensure_file(&path).unwrap());
        assert!(!Config::ensure_file(&path).unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "repositoryPath": "/srv/repo", "port": 8080 }"#).unwrap();

        let _env = env_guard();
        std::env::set_var("BRANCH_MANAGER_REPOSITORYPATH", "/from/env");
        std::env::set_var("BRANCH_MANAGER_CACHE__TTLSECS", "42");
        let loaded = Config::load(&path);
        std::env::remove_var("BRANCH_MANAGER_REPOSITORYPATH");
        std::env::remove_var("BRANCH_MANAGER_CACHE__TTLSECS");

        let config = loaded.unwrap();
        assert_eq!(config.repository_path, "/from/env");
        assert_eq!(config.cache.ttl_secs, 42);
        // Keys not overridden keep their file or default values
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache.status_ttl_secs, 10);
    }

    #[test]
    fn test_repository_path_resolution() {
        let mut config = Config::default();
        config.repository_path = "/abs/repo".to_string();
        assert_eq!(config.repository_path(), PathBuf::from("/abs/repo"));

        config.repository_path = "relative".to_string();
        assert!(config.repository_path().is_absolute());
        assert!(config.repository_path().ends_with("relative"));
    }

    #[test]
    fn test_public_config_omits_server_settings() {
        let mut config = Config::default();
        config.header_link = "https://git.example.com/".to_string();

        let json = serde_json::to_value(config.public()).unwrap();

        assert_eq!(json["headerLink"], "https://git.example.com/");
        assert_eq!(json["basePath"], "/");
        assert!(json.get("repositoryPath").is_none());
    }
}
