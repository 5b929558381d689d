//! Periodic progress ticker
//!
//! Advances a progress bar on every tick and pushes the new value to clients
//! viewing the plugin. Interval and on/off state are persisted settings.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::not_running;
use crate::plugins::api::PluginApi;
use crate::plugins::manifest::PluginManifest;
use crate::plugins::ui::{self, ActionResult, Page, ProgressUpdate};
use crate::plugins::{ActionMap, Plugin, action};

/// Id of the progress element updated on each tick
pub const PROGRESS_ID: &str = "heartbeat-progress";

const STEP: u32 = 10;
const MAX: u32 = 100;

/// Persisted heartbeat settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HeartbeatSettings {
    /// Seconds between ticks
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Whether ticks are sent
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_interval() -> u64 {
    5
}

const fn default_enabled() -> bool {
    true
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            enabled: default_enabled(),
        }
    }
}

#[derive(Deserialize)]
struct IntervalRequest {
    value: u64,
}

struct Shared {
    settings: Mutex<HeartbeatSettings>,
    value: AtomicU32,
    changed: Notify,
    api: OnceLock<Arc<dyn PluginApi>>,
    // Held from the snapshot until the write lands so saves stay in order
    save: Mutex<()>,
}

impl Shared {
    /// Apply `change`, persist, and wake the ticker
    fn update(&self, change: impl FnOnce(&mut HeartbeatSettings)) -> ActionResult {
        let Some(api) = self.api.get() else {
            return not_running();
        };

        let _save = self.save.lock();
        let settings = {
            let mut settings = self.settings.lock();
            change(&mut settings);
            *settings
        };
        self.changed.notify_one();

        match api.save_config(&settings) {
            Ok(()) => ActionResult::reload(),
            Err(e) => ActionResult::error(e),
        }
    }
}

/// Sends a progress update every few seconds
pub struct HeartbeatPlugin {
    id: String,
    title: String,
    icon: String,
    shared: Arc<Shared>,
}

impl HeartbeatPlugin {
    /// Catalog kind
    pub const KIND: &'static str = "heartbeat";

    /// Build from a manifest; `options` holds default settings
    ///
    /// # Errors
    ///
    /// Returns error if `options` is not a valid settings object
    pub fn from_manifest(manifest: &PluginManifest) -> anyhow::Result<Self> {
        let defaults = if manifest.options.is_null() {
            HeartbeatSettings::default()
        } else {
            serde_json::from_value(manifest.options.clone())?
        };
        if defaults.interval_secs == 0 {
            anyhow::bail!("interval-secs must be at least 1");
        }

        Ok(Self {
            id: manifest.id.clone(),
            title: manifest.title.clone().unwrap_or_else(|| "Heartbeat".to_string()),
            icon: manifest.icon.clone().unwrap_or_else(|| "heart".to_string()),
            shared: Arc::new(Shared {
                settings: Mutex::new(defaults),
                value: AtomicU32::new(0),
                changed: Notify::new(),
                api: OnceLock::new(),
                save: Mutex::new(()),
            }),
        })
    }

    /// Current settings
    #[must_use]
    pub fn settings(&self) -> HeartbeatSettings {
        *self.shared.settings.lock()
    }

    /// Current progress value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.shared.value.load(Ordering::Relaxed)
    }

    async fn tick(&self, api: &Arc<dyn PluginApi>) {
        let next = (self.value() + STEP) % (MAX + STEP);
        self.shared.value.store(next, Ordering::Relaxed);

        let delivered = api.send_update(&ProgressUpdate::new(PROGRESS_ID, next), &[]).await;
        tracing::trace!(plugin = %self.id, value = next, delivered, "heartbeat");
    }
}

#[async_trait]
impl Plugin for HeartbeatPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn icon(&self) -> &str {
        &self.icon
    }

    async fn run(&self, cancel: CancellationToken, api: Arc<dyn PluginApi>) -> anyhow::Result<()> {
        let mut settings = self.settings();
        api.load_config(&mut settings)?;
        settings.interval_secs = settings.interval_secs.max(1);
        *self.shared.settings.lock() = settings;

        if self.shared.api.set(Arc::clone(&api)).is_err() {
            anyhow::bail!("plugin {} started twice", self.id);
        }
        tracing::debug!(plugin = %self.id, ?settings, "heartbeat started");

        loop {
            let HeartbeatSettings {
                interval_secs,
                enabled,
            } = self.settings();

            tokio::select! {
                () = cancel.cancelled() => break,
                () = self.shared.changed.notified() => {}
                () = tokio::time::sleep(Duration::from_secs(interval_secs)) => {
                    if enabled {
                        self.tick(&api).await;
                    }
                }
            }
        }

        Ok(())
    }

    fn actions(&self) -> ActionMap {
        let mut actions = ActionMap::new();

        let shared = Arc::clone(&self.shared);
        actions.insert(
            "set-interval".to_string(),
            action(move |args, body| {
                let shared = Arc::clone(&shared);
                async move {
                    let interval = match parse_interval(&args, &body) {
                        Ok(interval) => interval,
                        Err(e) => return ActionResult::error(e),
                    };
                    shared.update(|s| s.interval_secs = interval)
                }
            }),
        );

        let shared = Arc::clone(&self.shared);
        actions.insert(
            "toggle".to_string(),
            action(move |_args, _body| {
                let shared = Arc::clone(&shared);
                async move { shared.update(|s| s.enabled = !s.enabled) }
            }),
        );

        actions
    }

    fn render(&self, _args: &[String]) -> Page {
        let settings = self.settings();
        let toggle = if settings.enabled { "Pause" } else { "Resume" };

        Page::new(&self.title)
            .with(ui::header("Heartbeat"))
            .with(ui::progress(PROGRESS_ID, self.value(), MAX))
            .with(ui::field("Interval:", &format!("{}s", settings.interval_secs)))
            .with(ui::field(
                "Enabled:",
                if settings.enabled { "yes" } else { "no" },
            ))
            .with(ui::button(toggle, "toggle", &[], "primary"))
    }
}

/// Interval from the JSON body `{"value": n}`, or else the first arg
fn parse_interval(args: &[String], body: &[u8]) -> Result<u64, String> {
    let interval = if body.is_empty() {
        args.first()
            .ok_or_else(|| "missing interval".to_string())?
            .parse::<u64>()
            .map_err(|e| format!("invalid interval: {e}"))?
    } else {
        serde_json::from_slice::<IntervalRequest>(body)
            .map_err(|e| format!("invalid request: {e}"))?
            .value
    };

    if interval == 0 {
        return Err("interval must be at least 1 second".to_string());
    }
    Ok(interval)
}
