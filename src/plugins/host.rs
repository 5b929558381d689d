//! Host power control and build metadata exposed to plugins

use std::process::Command;

/// Build metadata reported by `version()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// Crate version
    pub version: String,

    /// Source commit, `unknown` when not stamped at build time
    pub commit: String,
}

impl BuildInfo {
    /// Metadata of the running binary
    #[must_use]
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: option_env!("HOSTPANEL_COMMIT")
                .unwrap_or("unknown")
                .to_string(),
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}

/// Power operations on the host machine
pub trait HostControl: Send + Sync + std::fmt::Debug {
    /// Power the host off
    ///
    /// # Errors
    ///
    /// Returns the OS error unchanged
    fn power_off(&self) -> std::io::Result<()>;

    /// Reboot the host
    ///
    /// # Errors
    ///
    /// Returns the OS error unchanged
    fn reboot(&self) -> std::io::Result<()>;
}

/// Host control through `systemctl`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl SystemHost {
    fn systemctl(verb: &str) -> std::io::Result<()> {
        tracing::warn!(verb, "requesting host power change");

        let output = Command::new("systemctl").arg(verb).output()?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(std::io::Error::other(format!(
            "systemctl {verb} failed: {}",
            stderr.trim()
        )))
    }
}

impl HostControl for SystemHost {
    fn power_off(&self) -> std::io::Result<()> {
        Self::systemctl("poweroff")
    }

    fn reboot(&self) -> std::io::Result<()> {
        Self::systemctl("reboot")
    }
}
