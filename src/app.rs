//! Application orchestration
//!
//! Wires settings, sessions, dispatcher, plugin runtime and the HTTP server
//! together, then runs until a signal or a plugin requests exit.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::api::ApiServerBuilder;
use crate::config::Config;
use crate::events::Dispatcher;
use crate::plugins::{
    BuildInfo, HostControl, Plugin, PluginCatalog, PluginRuntime, Services, SystemHost,
};
use crate::security::PasswordAuthenticator;
use crate::session::SessionManager;
use crate::settings::SettingsStore;
use crate::{Error, Result};

/// The running panel
pub struct App {
    config: Config,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    host: Arc<dyn HostControl>,
}

impl App {
    /// Create an app over `config` that controls the real host
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_host(config, Arc::new(SystemHost))
    }

    /// Create an app with a custom host power controller
    #[must_use]
    pub fn with_host(config: Config, host: Arc<dyn HostControl>) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            host,
        }
    }

    /// Root shutdown token; cancelling it stops the app
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until interrupted or asked to exit
    ///
    /// # Errors
    ///
    /// Returns error if the settings file cannot be read or the session
    /// lifetime is out of range
    pub async fn run(self) -> Result<()> {
        let settings = Arc::new(SettingsStore::load(&self.config.settings_file)?);
        tracing::info!(path = %settings.path().display(), "settings loaded");

        let lifetime = chrono::Duration::from_std(self.config.token_lifetime)
            .map_err(|e| Error::Config(format!("invalid token lifetime: {e}")))?;
        let sessions = Arc::new(SessionManager::with_system_clock(
            self.shutdown.clone(),
            lifetime,
        ));

        let services = Services {
            dispatcher: Dispatcher::new(Arc::clone(&sessions)),
            settings,
            shutdown: self.shutdown.clone(),
            tracker: self.tracker.clone(),
            build: BuildInfo::current(),
            host: Arc::clone(&self.host),
        };
        let runtime = Arc::new(PluginRuntime::new(services, PluginCatalog::with_builtins()));

        let plugins = self.collect_plugins(&runtime);
        if let Err(e) = runtime.init_plugins(plugins) {
            tracing::error!(error = %e, "failed to start plugins");
            self.shutdown.cancel();
        } else {
            tracing::info!(count = runtime.len(), "plugins started");
        }

        self.spawn_signal_handler();

        let server = ApiServerBuilder::new(
            sessions,
            runtime,
            Arc::new(PasswordAuthenticator::new(self.config.users.clone())),
        )
        .host(self.config.server.host.clone())
        .port(self.config.server.port)
        .host_badge_color(self.config.server.host_badge_color.clone())
        .static_dir(self.config.server.static_dir.clone())
        .shutdown(self.shutdown.clone())
        .build();

        let shutdown = self.shutdown.clone();
        self.tracker.spawn(async move {
            if let Err(e) = server.run().await {
                tracing::error!(error = %e, "API server failed");
                shutdown.cancel();
            }
        });

        self.shutdown.cancelled().await;
        tracing::info!("shutting down");

        self.tracker.close();
        self.tracker.wait().await;

        tracing::info!("shutdown complete");
        Ok(())
    }

    /// Configured built-ins followed by manifests from the plugin directory
    ///
    /// A plugin whose id is already taken is logged and left out; the rest
    /// still start.
    fn collect_plugins(&self, runtime: &PluginRuntime) -> Vec<Arc<dyn Plugin>> {
        let mut candidates: Vec<Arc<dyn Plugin>> = self
            .config
            .plugins
            .iter()
            .filter_map(|kind| match runtime.catalog().builtin(kind) {
                Ok(plugin) => Some(plugin),
                Err(e) => {
                    tracing::warn!(kind = %kind, error = %e, "skipping built-in plugin");
                    None
                }
            })
            .collect();

        if let Some(dir) = &self.config.plugin_dir {
            candidates.extend(runtime.load_external_plugins(dir));
        }

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|plugin| {
                let id = plugin.id();
                if runtime.plugin_by_id(id).is_some() || !seen.insert(id.to_string()) {
                    tracing::warn!(plugin = %id, "skipping plugin with duplicate id");
                    return false;
                }
                true
            })
            .collect()
    }

    /// Cancel the root token on SIGINT or SIGTERM
    fn spawn_signal_handler(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = wait_for_signal() => {
                    tracing::info!("shutdown signal received");
                    shutdown.cancel();
                }
                () = shutdown.cancelled() => {}
            }
        });
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
