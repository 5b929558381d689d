//! Plugin registration and lifecycle
//!
//! ```text
//! Registered ──► Running ──► Stopped
//!                   └──────► Crashed(reason)
//! ```
//!
//! There is no restart: a plugin whose `run` returns, errors or panics stays
//! registered in its final state.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};

use super::api::PluginApi;
use super::capability::{Capability, Services};
use super::catalog::PluginCatalog;
use super::discovery::discover_plugins;
use super::Plugin;
use crate::{Error, Result};

/// Lifecycle state of a registered plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginState {
    /// Known but not started
    Registered,
    /// `run` is executing
    Running,
    /// `run` returned cleanly
    Stopped,
    /// `run` returned an error or panicked
    Crashed(String),
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Crashed(reason) => write!(f, "crashed ({reason})"),
        }
    }
}

struct Registration {
    plugin: Arc<dyn Plugin>,
    api: Arc<dyn PluginApi>,
    state: Arc<Mutex<PluginState>>,
}

/// Owns every registered plugin and its task
pub struct PluginRuntime {
    services: Services,
    catalog: PluginCatalog,
    registrations: RwLock<Vec<Registration>>,
}

impl std::fmt::Debug for PluginRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self
            .registrations
            .read()
            .iter()
            .map(|r| r.plugin.id().to_string())
            .collect();
        f.debug_struct("PluginRuntime")
            .field("plugins", &ids)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl PluginRuntime {
    /// Create a runtime over shared services
    #[must_use]
    pub fn new(services: Services, catalog: PluginCatalog) -> Self {
        Self {
            services,
            catalog,
            registrations: RwLock::new(Vec::new()),
        }
    }

    /// Services handed to each capability
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Catalog used for built-ins and manifests
    #[must_use]
    pub const fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Register `plugins` and start each on its own tracked task
    ///
    /// Returns as soon as the tasks are spawned. Failures inside `run` are
    /// logged and recorded, never propagated.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicatePlugin` if an id repeats or is already
    /// registered; nothing is started in that case
    pub fn init_plugins(&self, plugins: Vec<Arc<dyn Plugin>>) -> Result<()> {
        let mut registrations = self.registrations.write();

        let mut seen: HashSet<String> = registrations
            .iter()
            .map(|r| r.plugin.id().to_string())
            .collect();
        for plugin in &plugins {
            if !seen.insert(plugin.id().to_string()) {
                return Err(Error::DuplicatePlugin(plugin.id().to_string()));
            }
        }

        for plugin in plugins {
            let api: Arc<dyn PluginApi> =
                Arc::new(Capability::new(plugin.id(), self.services.clone()));
            let state = Arc::new(Mutex::new(PluginState::Registered));

            self.start(&plugin, &api, &state);
            registrations.push(Registration { plugin, api, state });
        }

        Ok(())
    }

    fn start(&self, plugin: &Arc<dyn Plugin>, api: &Arc<dyn PluginApi>, state: &Arc<Mutex<PluginState>>) {
        let plugin = Arc::clone(plugin);
        let api = Arc::clone(api);
        let state = Arc::clone(state);
        let cancel = self.services.shutdown.child_token();

        *state.lock() = PluginState::Running;
        tracing::info!(plugin = plugin.id(), "starting plugin");

        self.services.tracker.spawn(async move {
            let outcome = AssertUnwindSafe(plugin.run(cancel, api)).catch_unwind().await;

            let next = match outcome {
                Ok(Ok(())) => {
                    tracing::info!(plugin = plugin.id(), "plugin stopped");
                    PluginState::Stopped
                }
                Ok(Err(e)) => {
                    tracing::error!(plugin = plugin.id(), error = %format!("{e:#}"), "plugin failed");
                    PluginState::Crashed(format!("{e:#}"))
                }
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    tracing::error!(plugin = plugin.id(), reason = %reason, "plugin panicked");
                    PluginState::Crashed(reason)
                }
            };
            *state.lock() = next;
        });
    }

    /// Build plugins from the manifests found in `dir`
    ///
    /// Manifests that fail to parse, name an unknown kind, or fail to build
    /// are logged and skipped. The returned plugins are not yet started.
    #[must_use]
    pub fn load_external_plugins(&self, dir: &Path) -> Vec<Arc<dyn Plugin>> {
        discover_plugins(dir)
            .into_iter()
            .filter_map(|(path, manifest)| match self.catalog.create(&manifest) {
                Ok(plugin) => {
                    tracing::info!(plugin = %manifest.id, kind = %manifest.kind, "loaded plugin");
                    Some(plugin)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping plugin");
                    None
                }
            })
            .collect()
    }

    /// Registered plugin with `id`
    #[must_use]
    pub fn plugin_by_id(&self, id: &str) -> Option<Arc<dyn Plugin>> {
        self.registrations
            .read()
            .iter()
            .find(|r| r.plugin.id() == id)
            .map(|r| Arc::clone(&r.plugin))
    }

    /// Capability bound to plugin `id`
    #[must_use]
    pub fn api_for(&self, id: &str) -> Option<Arc<dyn PluginApi>> {
        self.registrations
            .read()
            .iter()
            .find(|r| r.plugin.id() == id)
            .map(|r| Arc::clone(&r.api))
    }

    /// All registered plugins in registration order
    #[must_use]
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.registrations
            .read()
            .iter()
            .map(|r| Arc::clone(&r.plugin))
            .collect()
    }

    /// Lifecycle state of plugin `id`
    #[must_use]
    pub fn state(&self, id: &str) -> Option<PluginState> {
        self.registrations
            .read()
            .iter()
            .find(|r| r.plugin.id() == id)
            .map(|r| r.state.lock().clone())
    }

    /// Number of registered plugins
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    /// Whether no plugins are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::plugins::capability::tests::{FakeHost, services};
    use crate::plugins::manifest::MANIFEST_FILE;
    use crate::plugins::{ActionMap, Page};

    enum Behavior {
        WaitForCancel,
        Fail,
        Panic,
    }

    struct TestPlugin {
        id: String,
        behavior: Behavior,
    }

    impl TestPlugin {
        fn new(id: &str, behavior: Behavior) -> Arc<dyn Plugin> {
            Arc::new(Self {
                id: id.to_string(),
                behavior,
            })
        }
    }

    #[async_trait]
    impl Plugin for TestPlugin {
        fn id(&self) -> &str {
            &self.id
        }

        fn title(&self) -> &str {
            "Test"
        }

        fn icon(&self) -> &str {
            "bug"
        }

        async fn run(&self, cancel: CancellationToken, _api: Arc<dyn PluginApi>) -> anyhow::Result<()> {
            match self.behavior {
                Behavior::WaitForCancel => {
                    cancel.cancelled().await;
                    Ok(())
                }
                Behavior::Fail => anyhow::bail!("device missing"),
                Behavior::Panic => panic!("bad state"),
            }
        }

        fn actions(&self) -> ActionMap {
            ActionMap::new()
        }

        fn render(&self, _args: &[String]) -> Page {
            Page::new("Test")
        }
    }

    fn runtime(dir: &Path) -> PluginRuntime {
        PluginRuntime::new(
            services(dir, Arc::new(FakeHost::default())),
            PluginCatalog::with_builtins(),
        )
    }

    async fn settle(runtime: &PluginRuntime, id: &str) -> PluginState {
        for _ in 0..100 {
            let state = runtime.state(id).unwrap();
            if state != PluginState::Running {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        runtime.state(id).unwrap()
    }

    #[tokio::test]
    async fn failing_plugin_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path());

        runtime
            .init_plugins(vec![
                TestPlugin::new("good", Behavior::WaitForCancel),
                TestPlugin::new("bad", Behavior::Fail),
                TestPlugin::new("worse", Behavior::Panic),
            ])
            .unwrap();

        assert_eq!(
            settle(&runtime, "bad").await,
            PluginState::Crashed("device missing".to_string())
        );
        assert_eq!(
            settle(&runtime, "worse").await,
            PluginState::Crashed("bad state".to_string())
        );
        assert_eq!(runtime.state("good"), Some(PluginState::Running));
        assert!(runtime.plugin_by_id("bad").is_some());
        assert!(runtime.api_for("bad").is_some());

        let ids: Vec<String> = runtime.plugins().iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["good", "bad", "worse"]);
    }

    #[tokio::test]
    async fn cancellation_stops_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path());
        runtime
            .init_plugins(vec![TestPlugin::new("good", Behavior::WaitForCancel)])
            .unwrap();

        runtime.services().shutdown.cancel();
        runtime.services().tracker.close();
        runtime.services().tracker.wait().await;

        assert_eq!(runtime.state("good"), Some(PluginState::Stopped));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path());

        let err = runtime
            .init_plugins(vec![
                TestPlugin::new("a", Behavior::WaitForCancel),
                TestPlugin::new("a", Behavior::WaitForCancel),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePlugin(id) if id == "a"));
        assert!(runtime.is_empty());

        runtime
            .init_plugins(vec![TestPlugin::new("a", Behavior::WaitForCancel)])
            .unwrap();
        assert!(matches!(
            runtime.init_plugins(vec![TestPlugin::new("a", Behavior::Fail)]),
            Err(Error::DuplicatePlugin(_))
        ));
        assert_eq!(runtime.len(), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(dir.path());
        assert!(runtime.plugin_by_id("missing").is_none());
        assert!(runtime.state("missing").is_none());
    }

    #[tokio::test]
    async fn external_plugins_skip_bad_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("plugins");
        for (name, body) in [
            ("a-ok", r#"{"id": "beat-2", "kind": "heartbeat"}"#),
            ("b-unknown", r#"{"id": "dns", "kind": "dns"}"#),
            ("c-broken", "{"),
        ] {
            std::fs::create_dir_all(plugin_dir.join(name)).unwrap();
            std::fs::write(plugin_dir.join(name).join(MANIFEST_FILE), body).unwrap();
        }

        let runtime = runtime(dir.path());
        let loaded = runtime.load_external_plugins(&plugin_dir);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), "beat-2");

        assert!(runtime.load_external_plugins(&dir.path().join("missing")).is_empty());
    }
}
