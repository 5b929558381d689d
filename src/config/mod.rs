//! Configuration management for hostpanel

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default settings document path
pub const DEFAULT_SETTINGS_FILE: &str = "./settings.json";

/// Default host badge color
pub const DEFAULT_BADGE_COLOR: &str = "#ffffff";

/// Default session lifetime (3 hours)
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3 * 60 * 60;

/// Built-in plugin kinds started when the config does not name any
#[must_use]
pub fn default_plugins() -> Vec<String> {
    vec!["system".to_string(), "heartbeat".to_string()]
}

/// Hostpanel configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Verbose logging
    pub debug: bool,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Path of the per-plugin settings document
    pub settings_file: PathBuf,

    /// Lifetime of a login session
    pub token_lifetime: Duration,

    /// Built-in plugin kinds to start
    pub plugins: Vec<String>,

    /// Directory scanned for plugin manifests
    pub plugin_dir: Option<PathBuf>,

    /// Login accounts
    pub users: Vec<UserConfig>,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Badge color shown next to the host name
    pub host_badge_color: String,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,
}

/// A login account
#[derive(Debug, Clone)]
pub struct UserConfig {
    /// Login name
    pub name: String,

    /// Hex-encoded SHA-256 digest of the password
    pub password_sha256: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(file::ConfigFile::default())
    }
}

impl Config {
    /// Load configuration from `path`, or the default location when `None`
    ///
    /// # Errors
    ///
    /// Returns error if no config location is known, or the file is malformed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => file::config_file_path()
                .ok_or_else(|| Error::Config("cannot determine config directory".to_string()))?,
        };

        let fc = file::load_config_file(&path)?;
        let config = Self::from_file(fc);
        config.validate()?;

        Ok(config)
    }

    /// Resolve a parsed config file (env > toml > default)
    #[must_use]
    pub fn from_file(fc: file::ConfigFile) -> Self {
        let server = ServerConfig {
            host: std::env::var("HOSTPANEL_HOST")
                .ok()
                .or(fc.server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: std::env::var("HOSTPANEL_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            host_badge_color: fc
                .server
                .host_badge_color
                .unwrap_or_else(|| DEFAULT_BADGE_COLOR.to_string()),
            static_dir: std::env::var("HOSTPANEL_STATIC_DIR")
                .ok()
                .or(fc.server.static_dir)
                .map(PathBuf::from),
        };

        let settings_file = std::env::var("HOSTPANEL_SETTINGS_FILE")
            .ok()
            .or(fc.server.settings_file)
            .map_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE), PathBuf::from);

        let plugin_dir = std::env::var("HOSTPANEL_PLUGIN_DIR")
            .ok()
            .or(fc.plugins.dir)
            .map(PathBuf::from);

        let users = fc
            .users
            .into_iter()
            .map(|u| UserConfig {
                name: u.name,
                password_sha256: u.password_sha256.to_ascii_lowercase(),
            })
            .collect();

        Self {
            debug: fc.debug.unwrap_or(false),
            server,
            settings_file,
            token_lifetime: Duration::from_secs(
                fc.server
                    .token_lifetime_secs
                    .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
            ),
            plugins: fc.plugins.enabled.unwrap_or_else(default_plugins),
            plugin_dir,
            users,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.token_lifetime.is_zero() {
            return Err(Error::Config(
                "token_lifetime_secs must be greater than zero".to_string(),
            ));
        }

        for user in &self.users {
            if user.name.is_empty() {
                return Err(Error::Config("user with empty name".to_string()));
            }
            if user.password_sha256.len() != 64
                || !user.password_sha256.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(Error::Config(format!(
                    "user {}: password_sha256 must be 64 hex characters",
                    user.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = Config::from_file(file::ConfigFile::default());
        assert_eq!(config.server.host_badge_color, DEFAULT_BADGE_COLOR);
        assert_eq!(config.token_lifetime, Duration::from_secs(10_800));
        assert_eq!(config.plugins, default_plugins());
        assert!(config.users.is_empty());
    }

    #[test]
    fn load_rejects_bad_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[[users]]\nname = \"admin\"\npassword_sha256 = \"nothex\"\n",
        )
        .unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_rejects_zero_lifetime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\ntoken_lifetime_secs = 0\n").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn load_reads_plugin_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[plugins]\nenabled = [\"system\"]\ndir = \"/opt/panel/plugins\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.plugins, vec!["system".to_string()]);
        assert_eq!(config.plugin_dir, Some(PathBuf::from("/opt/panel/plugins")));
    }
}
