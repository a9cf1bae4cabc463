use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::env_vars::{expand_env_vars, has_env_reference};
use crate::constants::{
    DEFAULT_BASE_PATH, DEFAULT_SESSION_TIMEOUT_MS, OPTION_COMPRESSION, OPTION_KNOWN_HOSTS_FILE,
    OPTION_STRICT_HOST_KEY_CHECKING, SFTP_DEFAULT_PORT, SFTP_PROTOCOL,
};
use crate::error::UploadError;
use crate::security::scrub_path;

fn default_port() -> u16 {
    SFTP_DEFAULT_PORT
}

fn default_protocol() -> String {
    SFTP_PROTOCOL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

/// How the session authenticates.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    Password {
        password: String,
    },
    PrivateKey {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"<REDACTED>")
                .finish(),
            Credential::PrivateKey { path, passphrase } => f
                .debug_struct("PrivateKey")
                .field("path", &scrub_path(&path.to_string_lossy()))
                .field("passphrase", &passphrase.as_ref().map(|_| "<REDACTED>"))
                .finish(),
        }
    }
}

/// Per-session tuning: timeout and free-form key/value options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSettings {
    /// Bounds TCP connect, handshake and every blocking SFTP call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let mut options = BTreeMap::new();
        options.insert(OPTION_STRICT_HOST_KEY_CHECKING.to_string(), "no".to_string());
        Self {
            timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            options,
        }
    }
}

impl SessionSettings {
    fn flag(&self, key: &str) -> Option<bool> {
        self.options
            .get(key)
            .map(|value| matches!(value.trim().to_lowercase().as_str(), "yes" | "true" | "on" | "1"))
    }

    /// `StrictHostKeyChecking`, off unless explicitly enabled.
    pub fn strict_host_key_checking(&self) -> bool {
        self.flag(OPTION_STRICT_HOST_KEY_CHECKING).unwrap_or(false)
    }

    /// `Compression`, off unless explicitly enabled.
    pub fn compression(&self) -> bool {
        self.flag(OPTION_COMPRESSION).unwrap_or(false)
    }

    /// Option keys this crate does not act on.
    pub fn unrecognised_options(&self) -> Vec<&str> {
        self.options
            .keys()
            .map(String::as_str)
            .filter(|key| {
                ![
                    OPTION_STRICT_HOST_KEY_CHECKING,
                    OPTION_KNOWN_HOSTS_FILE,
                    OPTION_COMPRESSION,
                ]
                .contains(key)
            })
            .collect()
    }

    /// `KnownHostsFile`, falling back to `~/.ssh/known_hosts`.
    pub fn known_hosts_file(&self) -> Option<PathBuf> {
        if let Some(path) = self.options.get(OPTION_KNOWN_HOSTS_FILE) {
            return Some(PathBuf::from(path));
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".ssh").join("known_hosts"))
    }
}

/// Image recompression switches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSettings {
    /// Recompress uploads that sniff as images
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scale dimensions by the quality factor as well as re-encoding
    #[serde(default = "default_true")]
    pub scale: bool,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: true,
        }
    }
}

/// Connection and layout settings for the remote file store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SftpConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    /// Sub-channel opened on the session; only `sftp` is supported
    #[serde(default = "default_protocol")]
    pub protocol: String,

    pub credential: Credential,

    /// Root directory every logical path is placed under
    #[serde(default)]
    pub base_path: String,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub image: ImageSettings,
}

impl Default for SftpConfig {
    fn default() -> Self {
        Self {
            host: "sftp.example.com".to_string(),
            port: SFTP_DEFAULT_PORT,
            username: "uploader".to_string(),
            protocol: SFTP_PROTOCOL.to_string(),
            credential: Credential::Password {
                password: "${SFTP_PASSWORD}".to_string(),
            },
            base_path: DEFAULT_BASE_PATH.to_string(),
            session: SessionSettings::default(),
            image: ImageSettings::default(),
        }
    }
}

impl SftpConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: SftpConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Create a template configuration YAML file
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        SftpConfig::default().save_to_yaml_file(path)
    }

    /// Expand `${VAR}` references in secrets and paths
    pub fn process_environment_variables(&mut self) {
        self.base_path = expand_env_vars(&self.base_path);
        match &mut self.credential {
            Credential::Password { password } => {
                *password = expand_env_vars(password);
            }
            Credential::PrivateKey { path, passphrase } => {
                *path = PathBuf::from(expand_env_vars(&path.to_string_lossy()));
                if let Some(phrase) = passphrase {
                    *phrase = expand_env_vars(phrase);
                }
            }
        }
    }

    /// Check the fields a connection attempt depends on.
    pub fn validate(&self) -> std::result::Result<(), UploadError> {
        if self.host.trim().is_empty() {
            return Err(UploadError::Config("host must not be empty".into()));
        }
        if self.username.trim().is_empty() {
            return Err(UploadError::Config("username must not be empty".into()));
        }
        if self.port == 0 {
            return Err(UploadError::Config("port must be non-zero".into()));
        }
        if !self.protocol.eq_ignore_ascii_case(SFTP_PROTOCOL) {
            return Err(UploadError::Config(format!(
                "unsupported protocol '{}', only '{}' is available",
                self.protocol, SFTP_PROTOCOL
            )));
        }
        if self.session.timeout_ms == 0 || self.session.timeout_ms > u32::MAX as u64 {
            return Err(UploadError::Config(format!(
                "session timeout must be between 1 and {} ms",
                u32::MAX
            )));
        }
        match &self.credential {
            Credential::Password { password } if has_env_reference(password) => {
                return Err(UploadError::Config(
                    "password still references an environment variable; call process_environment_variables first".into(),
                ));
            }
            Credential::PrivateKey { path, .. } if path.as_os_str().is_empty() => {
                return Err(UploadError::Config("private key path must not be empty".into()));
            }
            _ => {}
        }
        Ok(())
    }

    /// `user@host:port`, for log lines.
    pub fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Load the configuration at `config_path`, creating a template if missing.
///
/// With no path the built-in defaults are used. Environment references are
/// expanded in every case.
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<SftpConfig> {
    let mut config = match config_path {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            SftpConfig::from_yaml_file(path)?
        }
        Some(path) => {
            info!(
                "Configuration file {} not found, writing a template",
                path.display()
            );
            SftpConfig::create_default_config_file(path)?;
            SftpConfig::default()
        }
        None => {
            debug!("No configuration file given, using defaults");
            SftpConfig::default()
        }
    };

    config.process_environment_variables();
    Ok(config)
}
