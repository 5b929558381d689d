//! TOML configuration file loading
//!
//! Supports `~/.config/hostpanel/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.
//! A missing file is created with the defaults written out so operators have
//! something to edit.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Verbose logging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Plugin configuration
    #[serde(default)]
    pub plugins: PluginsFileConfig,

    /// Login accounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserFileConfig>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ServerFileConfig {
    /// Address to bind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port to listen on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Path of the per-plugin settings document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_file: Option<String>,

    /// Badge color shown next to the host name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_badge_color: Option<String>,

    /// Lifetime of a login session in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_lifetime_secs: Option<u64>,

    /// Directory with the web UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
}

/// Plugin configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PluginsFileConfig {
    /// Built-in plugin kinds to start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Vec<String>>,

    /// Directory scanned for `plugin.json` manifests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// A login account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFileConfig {
    /// Login name
    pub name: String,

    /// Hex-encoded SHA-256 digest of the password
    pub password_sha256: String,
}

impl ConfigFile {
    /// File contents written when no config exists yet
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            debug: Some(false),
            server: ServerFileConfig {
                host: Some(super::DEFAULT_HOST.to_string()),
                port: Some(super::DEFAULT_PORT),
                settings_file: Some(super::DEFAULT_SETTINGS_FILE.to_string()),
                host_badge_color: Some(super::DEFAULT_BADGE_COLOR.to_string()),
                token_lifetime_secs: Some(super::DEFAULT_TOKEN_LIFETIME_SECS),
                static_dir: None,
            },
            plugins: PluginsFileConfig {
                enabled: Some(super::default_plugins()),
                dir: None,
            },
            users: Vec::new(),
        }
    }
}

/// Load the TOML config file, creating it with defaults when missing
///
/// # Errors
///
/// Returns error if the file cannot be read, parsed, or created
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        let defaults = ConfigFile::with_defaults();
        save_config_file(path, &defaults)?;
        tracing::info!(path = %path.display(), "created default config file");
        return Ok(defaults);
    }

    let content = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");

    Ok(config)
}

/// Write a config file, creating parent directories as needed
///
/// # Errors
///
/// Returns error if serialization or the write fails
pub fn save_config_file(path: &Path, config: &ConfigFile) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| crate::Error::Config(format!("failed to encode config: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;

    Ok(())
}

/// Return the config file path: `~/.config/hostpanel/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("hostpanel").join("config.toml"))
}
