//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/rollcall/config.toml)
//! 3. Environment variables (ROLLCALL_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::roster::{DuplicatePolicy, UpdatePolicy};

/// Environment variable prefix
const ENV_PREFIX: &str = "ROLLCALL";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL serving /api/users/
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Push channel base URL, when it differs from server_url
    #[serde(default)]
    pub event_url: Option<String>,

    /// Handling of updates for ids not in the list
    #[serde(default)]
    pub update_policy: UpdatePolicy,

    /// Handling of adds for ids already in the list
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Reload the snapshot after the push channel reconnects
    #[serde(default = "default_true")]
    pub resync_on_reconnect: bool,

    /// Events buffered between the channel and the roster
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Snapshot request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// First reconnect delay in seconds
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial_secs: u64,

    /// Upper bound on the reconnect delay in seconds
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            event_url: None,
            update_policy: UpdatePolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
            resync_on_reconnect: true,
            event_buffer: default_event_buffer(),
            request_timeout_secs: default_request_timeout(),
            reconnect_initial_secs: default_reconnect_initial(),
            reconnect_max_secs: default_reconnect_max(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (ROLLCALL_SERVER_URL, ROLLCALL_EVENT_URL, ...)
    /// 2. Config file (~/.config/rollcall/config.toml or ROLLCALL_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
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

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // ROLLCALL_SERVER_URL
        if let Ok(val) = std::env::var(format!("{}_SERVER_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.server_url = val;
            }
        }

        // ROLLCALL_EVENT_URL
        if let Ok(val) = std::env::var(format!("{}_EVENT_URL", ENV_PREFIX)) {
            self.event_url = if val.is_empty() { None } else { Some(val) };
        }

        // ROLLCALL_RESYNC_ON_RECONNECT
        if let Ok(val) = std::env::var(format!("{}_RESYNC_ON_RECONNECT", ENV_PREFIX)) {
            self.resync_on_reconnect = val.eq_ignore_ascii_case("true") || val == "1";
        }

        // ROLLCALL_UPDATE_POLICY
        if let Ok(val) = std::env::var(format!("{}_UPDATE_POLICY", ENV_PREFIX)) {
            match val.parse() {
                Ok(policy) => self.update_policy = policy,
                Err(e) => warn!("Ignoring {}_UPDATE_POLICY: {}", ENV_PREFIX, e),
            }
        }

        // ROLLCALL_DUPLICATE_POLICY
        if let Ok(val) = std::env::var(format!("{}_DUPLICATE_POLICY", ENV_PREFIX)) {
            match val.parse() {
                Ok(policy) => self.duplicate_policy = policy,
                Err(e) => warn!("Ignoring {}_DUPLICATE_POLICY: {}", ENV_PREFIX, e),
            }
        }
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with ROLLCALL_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rollcall")
            .join("config.toml")
    }

    /// URL of the snapshot endpoint
    pub fn users_url(&self) -> String {
        format!("{}/api/users/", self.server_url.trim_end_matches('/'))
    }

    /// Base URL of the push channel
    pub fn event_base_url(&self) -> &str {
        self.event_url.as_deref().unwrap_or(&self.server_url)
    }

    /// Snapshot request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// First reconnect delay
    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_initial_secs.max(1))
    }

    /// Upper bound on the reconnect delay
    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_secs.max(self.reconnect_initial_secs).max(1))
    }
}

fn default_server_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_true() -> bool {
    true
}

fn default_event_buffer() -> usize {
    256
}

fn default_request_timeout() -> u64 {
    10
}

fn default_reconnect_initial() -> u64 {
    1
}

fn default_reconnect_max() -> u64 {
    30
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
        "ROLLCALL_SERVER_URL",
        "ROLLCALL_EVENT_URL",
        "ROLLCALL_RESYNC_ON_RECONNECT",
        "ROLLCALL_UPDATE_POLICY",
        "ROLLCALL_DUPLICATE_POLICY",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server_url, "http://localhost:3000");
        assert!(config.event_url.is_none());
        assert!(config.resync_on_reconnect);
        assert_eq!(config.update_policy, UpdatePolicy::Ignore);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Keep);
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn test_urls() {
        let mut config = Config::default();
        config.server_url = "https://crud.example.com/".to_string();

        assert_eq!(config.users_url(), "https://crud.example.com/api/users/");
        assert_eq!(config.event_base_url(), "https://crud.example.com/");

        config.event_url = Some("wss://push.example.com".to_string());
        assert_eq!(config.event_base_url(), "wss://push.example.com");
    }

    #[test]
    fn test_reconnect_delays_are_sane() {
        let mut config = Config::default();
        config.reconnect_initial_secs = 0;
        config.reconnect_max_secs = 0;

        assert_eq!(config.reconnect_initial_delay(), Duration::from_secs(1));
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_override_server_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("ROLLCALL_SERVER_URL", "http://10.0.0.5:8080");
        config.apply_env_overrides();

        assert_eq!(config.server_url, "http://10.0.0.5:8080");
    }

    #[test]
    fn test_env_override_event_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("ROLLCALL_EVENT_URL", "ws://localhost:4000");
        config.apply_env_overrides();
        assert_eq!(config.event_url, Some("ws://localhost:4000".to_string()));

        // Empty string clears it
        env::set_var("ROLLCALL_EVENT_URL", "");
        config.apply_env_overrides();
        assert!(config.event_url.is_none());
    }

    #[test]
    fn test_env_override_policies() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("ROLLCALL_UPDATE_POLICY", "reject");
        env::set_var("ROLLCALL_DUPLICATE_POLICY", "replace");
        env::set_var("ROLLCALL_RESYNC_ON_RECONNECT", "false");
        config.apply_env_overrides();

        assert_eq!(config.update_policy, UpdatePolicy::Reject);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
        assert!(!config.resync_on_reconnect);

        // Invalid values leave the current setting alone
        env::set_var("ROLLCALL_UPDATE_POLICY", "bogus");
        config.apply_env_overrides();
        assert_eq!(config.update_policy, UpdatePolicy::Reject);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            server_url = "http://api.local"
            update_policy = "append"
            resync_on_reconnect = false
            event_buffer = 16
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.server_url, "http://api.local");
        assert_eq!(config.update_policy, UpdatePolicy::Append);
        assert!(!config.resync_on_reconnect);
        assert_eq!(config.event_buffer, 16);
        // Unset keys fall back to defaults
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.server_url, "http://localhost:3000");
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.server_url = "http://saved.example".to_string();
        config.duplicate_policy = DuplicatePolicy::Replace;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.server_url, "http://saved.example");
        assert_eq!(loaded.duplicate_policy, DuplicatePolicy::Replace);
    }
}
