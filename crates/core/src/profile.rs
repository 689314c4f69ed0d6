//! Profile management
//!
//! Profiles are named XNAT servers with the credentials used to reach them.
//! When no `default` profile is configured, the legacy pyxnat `xnat.cfg`
//! JSON file is used in its place.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Name of the profile used when none is requested
pub const DEFAULT_PROFILE: &str = "default";

/// Environment variable naming a legacy configuration file
pub const LEGACY_CONFIG_ENV: &str = "XNAT_CFG";

/// Legacy configuration file name
const LEGACY_CONFIG_FILE: &str = "xnat.cfg";

/// Retry configuration for a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Timeout configuration for a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    // Large image files take a while.
    300000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// A named XNAT server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique name for this profile
    pub name: String,

    /// XNAT server URL, e.g. `https://central.xnat.org`
    pub server: String,

    /// Login user
    pub user: String,

    /// Login password
    pub password: String,

    /// Allow insecure TLS connections
    #[serde(default)]
    pub insecure: bool,

    /// Retry configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Timeout configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

impl Profile {
    /// Create a new profile with required fields
    pub fn new(
        name: impl Into<String>,
        server: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            user: user.into(),
            password: password.into(),
            insecure: false,
            retry: None,
            timeout: None,
        }
    }

    /// Parse and check the server URL
    pub fn server_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "XNAT server must be an http or https URL: {}",
                self.server
            )));
        }
        Ok(url)
    }

    /// Get the effective retry configuration
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Get the effective timeout configuration
    pub fn timeout_config(&self) -> TimeoutConfig {
        self.timeout.clone().unwrap_or_default()
    }
}

/// Legacy pyxnat configuration file content
#[derive(Debug, Deserialize)]
struct LegacyConfig {
    server: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    password: String,
}

/// Candidate legacy configuration files, in precedence order
pub fn legacy_config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(env) = std::env::var_os(LEGACY_CONFIG_ENV).filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(env));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(LEGACY_CONFIG_FILE));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".xnat").join(LEGACY_CONFIG_FILE));
        candidates.push(home.join(LEGACY_CONFIG_FILE));
    }
    candidates.push(Path::new("/etc").join(LEGACY_CONFIG_FILE));
    candidates
}

/// Load the first existing legacy configuration file as the default profile
pub fn load_legacy_profile(candidates: &[PathBuf]) -> Result<Option<Profile>> {
    let Some(path) = candidates.iter().find(|p| p.is_file()) else {
        return Ok(None);
    };
    tracing::debug!(path = %path.display(), "Loading legacy XNAT configuration");
    let content = std::fs::read_to_string(path)?;
    let legacy: LegacyConfig = serde_json::from_str(&content)?;
    Ok(Some(Profile::new(
        DEFAULT_PROFILE,
        legacy.server,
        legacy.user,
        legacy.password,
    )))
}

/// Manager for profile operations
pub struct ProfileManager {
    config_manager: ConfigManager,
}

impl ProfileManager {
    /// Create a new ProfileManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create a new ProfileManager using the default config location
    pub fn new() -> Result<Self> {
        let config_manager = ConfigManager::new()?;
        Ok(Self { config_manager })
    }

    /// List all configured profiles
    pub fn list(&self) -> Result<Vec<Profile>> {
        let config = self.config_manager.load()?;
        Ok(config.profiles)
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Result<Profile> {
        let config = self.config_manager.load()?;
        config
            .profiles
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// Get a profile, falling back to the legacy file for the default profile
    pub fn resolve(&self, name: &str) -> Result<Profile> {
        self.resolve_with(name, &legacy_config_candidates())
    }

    fn resolve_with(&self, name: &str, legacy: &[PathBuf]) -> Result<Profile> {
        match self.get(name) {
            Err(Error::ProfileNotFound(_)) if name == DEFAULT_PROFILE => {
                load_legacy_profile(legacy)?
                    .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
            }
            other => other,
        }
    }

    /// Add or update a profile
    pub fn set(&self, profile: Profile) -> Result<()> {
        profile.server_url()?;
        let mut config = self.config_manager.load()?;

        config.profiles.retain(|p| p.name != profile.name);
        config.profiles.push(profile);

        self.config_manager.save(&config)
    }

    /// Remove a profile
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let original_len = config.profiles.len();

        config.profiles.retain(|p| p.name != name);

        if config.profiles.len() == original_len {
            return Err(Error::ProfileNotFound(name.to_string()));
        }

        self.config_manager.save(&config)
    }

    /// Check if a profile exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        let config = self.config_manager.load()?;
        Ok(config.profiles.iter().any(|p| p.name == name))
    }
}
