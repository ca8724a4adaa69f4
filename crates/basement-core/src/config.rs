//! Client configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/basement/config.toml)
//! 3. Environment variables (BASEMENT_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::ViewSpec;
use crate::transcoder;

/// Environment variable prefix
const ENV_PREFIX: &str = "BASEMENT";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Store host to connect to
    #[serde(default = "default_host")]
    pub host: String,

    /// Bucket holding the documents
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Bucket password
    #[serde(default)]
    pub password: String,

    /// User name (defaults to the bucket name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Keep the store across connections (the memory store writes a
    /// snapshot to `data_dir`)
    #[serde(default)]
    pub persist: bool,

    /// Connect when the client is created
    #[serde(default = "default_connect")]
    pub connect: bool,

    /// Name of the default transcoder
    #[serde(default = "default_transcoder")]
    pub transcoder: String,

    /// Deployment environment label (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Directory for local store data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Views defined on the local store
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            bucket: default_bucket(),
            password: String::new(),
            user: None,
            persist: false,
            connect: default_connect(),
            transcoder: default_transcoder(),
            environment: None,
            data_dir: default_data_dir(),
            views: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (BASEMENT_HOST, BASEMENT_BUCKET, ...)
    /// 2. Config file (~/.config/basement/config.toml or BASEMENT_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a CLI-provided path, or the default location
    pub fn load_with_cli_override(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_var("HOST") {
            self.host = val;
        }
        if let Some(val) = env_var("BUCKET") {
            self.bucket = val;
        }
        if let Some(val) = env_var("PASSWORD") {
            self.password = val;
        }
        // Empty string clears it
        if let Some(val) = env_var("USER") {
            self.user = if val.is_empty() { None } else { Some(val) };
        }
        if let Some(val) = env_var("PERSIST") {
            self.persist = parse_flag(&val);
        }
        if let Some(val) = env_var("CONNECT") {
            self.connect = parse_flag(&val);
        }
        if let Some(val) = env_var("TRANSCODER") {
            self.transcoder = val;
        }
        if let Some(val) = env_var("ENVIRONMENT") {
            self.environment = if val.is_empty() { None } else { Some(val) };
        }
        if let Some(val) = env_var("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Set a scalar field by name, as `config set` does
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "host" => self.host = value.to_string(),
            "bucket" => self.bucket = value.to_string(),
            "password" => self.password = value.to_string(),
            "user" => self.user = (!value.is_empty()).then(|| value.to_string()),
            "persist" => self.persist = parse_bool(name, value)?,
            "connect" => self.connect = parse_bool(name, value)?,
            "transcoder" => self.transcoder = value.to_string(),
            "environment" => self.environment = (!value.is_empty()).then(|| value.to_string()),
            "data_dir" => self.data_dir = PathBuf::from(value),
            other => bail!(
                "Unknown config key '{}'. Valid keys: host, bucket, password, user, \
                 persist, connect, transcoder, environment, data_dir",
                other
            ),
        }
        Ok(())
    }

    /// User to authenticate as: `user`, or the bucket name when unset
    pub fn effective_user(&self) -> &str {
        self.user.as_deref().unwrap_or(&self.bucket)
    }

    /// Get the config file path
    ///
    /// Can be overridden with BASEMENT_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_var("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("basement")
            .join("config.toml")
    }

    /// Get the path to the local store snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => bail!("Invalid value '{}' for '{}': expected true or false", value, name),
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_bucket() -> String {
    "default".to_string()
}

fn default_connect() -> bool {
    true
}

fn default_transcoder() -> String {
    transcoder::JSON.to_string()
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("basement")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "BASEMENT_HOST",
        "BASEMENT_BUCKET",
        "BASEMENT_PASSWORD",
        "BASEMENT_USER",
        "BASEMENT_PERSIST",
        "BASEMENT_CONNECT",
        "BASEMENT_TRANSCODER",
        "BASEMENT_ENVIRONMENT",
        "BASEMENT_DATA_DIR",
        "BASEMENT_CONFIG",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.bucket, "default");
        assert_eq!(config.password, "");
        assert!(config.user.is_none());
        assert!(!config.persist);
        assert!(config.connect);
        assert_eq!(config.transcoder, "json");
        assert!(config.environment.is_none());
        assert!(config.data_dir.ends_with("basement"));
        assert!(config.views.is_empty());
    }

    #[test]
    fn test_effective_user() {
        let mut config = Config::default();
        assert_eq!(config.effective_user(), "default");

        config.user = Some("admin".to_string());
        assert_eq!(config.effective_user(), "admin");
    }

    #[test]
    fn test_snapshot_path() {
        let config = Config {
            data_dir: PathBuf::from("/data/basement"),
            ..Config::default()
        };
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/data/basement/store.json")
        );
    }

    #[test]
    fn test_env_overrides() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("BASEMENT_HOST", "db.example.com");
        env::set_var("BASEMENT_BUCKET", "users");
        env::set_var("BASEMENT_PERSIST", "1");
        env::set_var("BASEMENT_CONNECT", "false");
        env::set_var("BASEMENT_TRANSCODER", "serialize");
        env::set_var("BASEMENT_DATA_DIR", "/tmp/basement-test");
        config.apply_env_overrides();

        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.bucket, "users");
        assert!(config.persist);
        assert!(!config.connect);
        assert_eq!(config.transcoder, "serialize");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/basement-test"));
    }

    #[test]
    fn test_env_override_user() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("BASEMENT_USER", "admin");
        config.apply_env_overrides();
        assert_eq!(config.user, Some("admin".to_string()));

        // Empty string clears it
        env::set_var("BASEMENT_USER", "");
        config.apply_env_overrides();
        assert!(config.user.is_none());
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            host = "10.0.0.5"
            bucket = "users"
            transcoder = "serialize"
            environment = "staging"

            [[views]]
            design = "users"
            name = "by_age"
            key_field = "age"
            reduce = "_count"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.bucket, "users");
        assert_eq!(config.transcoder, "serialize");
        assert_eq!(config.environment.as_deref(), Some("staging"));
        assert!(config.connect);
        assert_eq!(config.views.len(), 1);
        assert_eq!(config.views[0].reduce.as_deref(), Some("_count"));
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "host = [").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set_field("host", "db1").unwrap();
        config.set_field("persist", "yes").unwrap();
        config.set_field("user", "reader").unwrap();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_set_field_errors() {
        let mut config = Config::default();
        assert!(config.set_field("persist", "maybe").is_err());
        assert!(config.set_field("nope", "x").is_err());

        config.set_field("user", "").unwrap();
        assert!(config.user.is_none());
    }
}
