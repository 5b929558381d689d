//! Per-plugin implementation of [`PluginApi`]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::value::RawValue;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;

use super::api::PluginApi;
use super::host::{BuildInfo, HostControl};
use crate::Result;
use crate::events::{Dispatcher, Frame};
use crate::settings::SettingsStore;

/// Process-wide services shared by every capability
#[derive(Debug, Clone)]
pub struct Services {
    /// Event fan-out
    pub dispatcher: Dispatcher,

    /// Settings persistence
    pub settings: Arc<SettingsStore>,

    /// Root shutdown token
    pub shutdown: CancellationToken,

    /// Tracks work that must finish before the process exits
    pub tracker: TaskTracker,

    /// Build metadata
    pub build: BuildInfo,

    /// Host power control
    pub host: Arc<dyn HostControl>,
}

/// Capability bound to one plugin id
///
/// Immutable after construction.
#[derive(Debug)]
pub struct Capability {
    module_id: String,
    services: Services,
}

impl Capability {
    /// Bind `services` to `module_id`
    #[must_use]
    pub fn new(module_id: impl Into<String>, services: Services) -> Self {
        Self {
            module_id: module_id.into(),
            services,
        }
    }
}

#[async_trait]
impl PluginApi for Capability {
    fn module_id(&self) -> &str {
        &self.module_id
    }

    fn save_raw_config(&self, blob: Box<RawValue>) -> Result<()> {
        self.services.settings.set(&self.module_id, blob);
        self.services.settings.persist()
    }

    fn raw_config(&self) -> Option<Box<RawValue>> {
        self.services.settings.get(&self.module_id)
    }

    async fn send_frame(&self, frame: Frame, args: Vec<String>) -> bool {
        self.services
            .dispatcher
            .dispatch_frame(frame, &self.module_id, &args)
            .await
    }

    async fn broadcast_frame(&self, frame: Frame) -> bool {
        self.services.dispatcher.dispatch_frame(frame, "", &[]).await
    }

    fn shutdown_guard(&self) -> TaskTrackerToken {
        self.services.tracker.token()
    }

    fn exit(&self) {
        tracing::info!(module = %self.module_id, "plugin requested exit");
        self.services.shutdown.cancel();
    }

    fn shutdown(&self) -> Result<()> {
        tracing::info!(module = %self.module_id, "plugin requested power off");
        Ok(self.services.host.power_off()?)
    }

    fn restart(&self) -> Result<()> {
        tracing::info!(module = %self.module_id, "plugin requested reboot");
        Ok(self.services.host.reboot()?)
    }

    fn version(&self) -> BuildInfo {
        self.services.build.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Duration;
    use serde::{Deserialize, Serialize};
    use tokio::sync::mpsc;

    use super::*;
    use crate::Error;
    use crate::plugins::ui::ProgressUpdate;
    use crate::session::SessionManager;

    #[derive(Debug, Default)]
    pub(crate) struct FakeHost {
        pub(crate) power_offs: AtomicUsize,
        pub(crate) fail: bool,
    }

    impl HostControl for FakeHost {
        fn power_off(&self) -> std::io::Result<()> {
            self.power_offs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
            }
            Ok(())
        }

        fn reboot(&self) -> std::io::Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
        }
    }

    pub(crate) fn services(dir: &std::path::Path, host: Arc<dyn HostControl>) -> Services {
        let shutdown = CancellationToken::new();
        let sessions = Arc::new(SessionManager::with_system_clock(
            shutdown.clone(),
            Duration::hours(1),
        ));
        Services {
            dispatcher: Dispatcher::new(sessions),
            settings: Arc::new(SettingsStore::load(dir.join("settings.json")).unwrap()),
            shutdown,
            tracker: TaskTracker::new(),
            build: BuildInfo {
                version: "1.2.3".to_string(),
                commit: "abc".to_string(),
            },
            host,
        }
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Settings {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let api: Arc<dyn PluginApi> = Arc::new(Capability::new(
            "demo",
            services(dir.path(), Arc::new(FakeHost::default())),
        ));

        let mut loaded = Settings {
            name: "default".to_string(),
            count: 1,
        };
        api.load_config(&mut loaded).unwrap();
        assert_eq!(loaded.name, "default");

        let saved = Settings {
            name: "x".to_string(),
            count: 9,
        };
        api.save_config(&saved).unwrap();

        let mut reloaded = Settings::default();
        api.load_config(&mut reloaded).unwrap();
        assert_eq!(reloaded, saved);

        let on_disk = SettingsStore::load(dir.path().join("settings.json")).unwrap();
        assert!(on_disk.get("demo").is_some());
    }

    #[tokio::test]
    async fn load_config_reports_bad_blob() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path(), Arc::new(FakeHost::default()));
        services
            .settings
            .set("demo", RawValue::from_string("[1,2]".to_string()).unwrap());
        let api: Arc<dyn PluginApi> = Arc::new(Capability::new("demo", services));

        let mut out = Settings::default();
        assert!(matches!(
            api.load_config(&mut out),
            Err(Error::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn send_update_is_scoped_to_module() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path(), Arc::new(FakeHost::default()));
        let sessions = Arc::clone(services.dispatcher.sessions());
        let api: Arc<dyn PluginApi> = Arc::new(Capability::new("demo", services));

        assert!(!api.send_update(&ProgressUpdate::new("bar", 3), &[]).await);

        let session = sessions.new_session("admin");
        let (tx, mut rx) = mpsc::channel(4);
        let client = session.new_client("127.0.0.1:1".parse().unwrap(), tx);
        client.set_location("demo", Vec::new());

        assert!(api.send_update(&ProgressUpdate::new("bar", 3), &[]).await);
        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "update",
                "options": {"id": "bar", "element": "progress", "data": {"value": 3}}
            })
        );

        client.set_location("other", Vec::new());
        assert!(!api.reload(&[]).await);
        assert!(api.broadcast(&serde_json::json!({"type": "reload"})).await);
    }

    #[tokio::test]
    async fn exit_cancels_root() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path(), Arc::new(FakeHost::default()));
        let root = services.shutdown.clone();
        let api: Arc<dyn PluginApi> = Arc::new(Capability::new("demo", services));

        api.exit();
        assert!(root.is_cancelled());
    }

    #[tokio::test]
    async fn host_errors_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost {
            fail: true,
            ..FakeHost::default()
        });
        let api: Arc<dyn PluginApi> = Arc::new(Capability::new(
            "demo",
            services(dir.path(), Arc::clone(&host) as Arc<dyn HostControl>),
        ));

        match api.shutdown() {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(host.power_offs.load(Ordering::SeqCst), 1);
        assert!(api.restart().is_err());
        assert_eq!(api.version().commit, "abc");
    }

    #[tokio::test]
    async fn safe_run_holds_tracker_slot() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path(), Arc::new(FakeHost::default()));
        let tracker = services.tracker.clone();
        let api: Arc<dyn PluginApi> = Arc::new(Capability::new("demo", services));

        let seen = api.safe_run(|| tracker.len());
        assert_eq!(seen, 1);
        assert_eq!(tracker.len(), 0);

        let seen = api.safe_run_async(async { tracker.len() }).await;
        assert_eq!(seen, 1);
        assert!(tracker.is_empty());
    }
}
