//! Host overview and power actions

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ApiSlot, not_running};
use crate::plugins::api::PluginApi;
use crate::plugins::manifest::PluginManifest;
use crate::plugins::ui::{self, ActionResult, Page};
use crate::plugins::{ActionHandler, ActionMap, Plugin, action};

/// Shows build and host details; exits, reboots or powers off on request
pub struct SystemPlugin {
    id: String,
    title: String,
    icon: String,
    started: Instant,
    api: ApiSlot,
}

impl SystemPlugin {
    /// Catalog kind
    pub const KIND: &'static str = "system";

    /// Build from a manifest
    #[must_use]
    pub fn from_manifest(manifest: &PluginManifest) -> Self {
        Self {
            id: manifest.id.clone(),
            title: manifest.title.clone().unwrap_or_else(|| "System".to_string()),
            icon: manifest.icon.clone().unwrap_or_else(|| "gear".to_string()),
            started: Instant::now(),
            api: Arc::new(OnceLock::new()),
        }
    }

    fn power_action(&self, op: fn(&(dyn PluginApi + 'static)) -> crate::Result<()>) -> ActionHandler {
        let slot = Arc::clone(&self.api);
        action(move |_args, _body| {
            let api = slot.get().cloned();
            async move {
                let Some(api) = api else {
                    return not_running();
                };
                match op(api.as_ref()) {
                    Ok(()) => ActionResult::reload(),
                    Err(e) => ActionResult::error(e),
                }
            }
        })
    }
}

#[async_trait]
impl Plugin for SystemPlugin {
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
        if self.api.set(api).is_err() {
            anyhow::bail!("plugin {} started twice", self.id);
        }
        cancel.cancelled().await;
        Ok(())
    }

    fn actions(&self) -> ActionMap {
        let mut actions = ActionMap::new();

        let slot = Arc::clone(&self.api);
        actions.insert(
            "exit".to_string(),
            action(move |_args, _body| {
                let api = slot.get().cloned();
                async move {
                    let Some(api) = api else {
                        return not_running();
                    };
                    api.exit();
                    ActionResult::alert("Stopping", "hostpanel is shutting down")
                }
            }),
        );
        actions.insert("restart".to_string(), self.power_action(PluginApi::restart));
        actions.insert("shutdown".to_string(), self.power_action(PluginApi::shutdown));

        actions
    }

    fn render(&self, _args: &[String]) -> Page {
        let host = hostname::get().map_or_else(
            |_| "unknown".to_string(),
            |h| h.to_string_lossy().into_owned(),
        );
        let (version, commit) = self.api.get().map_or_else(Default::default, |api| {
            let build = api.version();
            (build.version, build.commit)
        });
        let uptime = self.started.elapsed().as_secs();

        Page::new(&self.title)
            .with(ui::header("Main"))
            .with(ui::field("Host name:", &host))
            .with(ui::field("Version:", &version))
            .with(ui::field("Commit:", &commit))
            .with(ui::field("PID:", &std::process::id().to_string()))
            .with(ui::field(
                "Uptime:",
                &format!("{}h {}m {}s", uptime / 3600, uptime / 60 % 60, uptime % 60),
            ))
            .with(ui::button("Stop", "exit", &[], "danger"))
            .with(ui::header("Power"))
            .with(ui::button("Restart", "restart", &[], "warning"))
            .with(ui::button("Shutdown", "shutdown", &[], "danger"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::capability::tests::{FakeHost, services};
    use crate::plugins::capability::Capability;

    #[tokio::test]
    async fn actions_before_run_report_not_running() {
        let plugin = SystemPlugin::from_manifest(&PluginManifest::builtin("system"));
        let exit = plugin.actions().remove("exit").unwrap();

        assert_eq!(exit(Vec::new(), Vec::new()).await, not_running());
    }

    #[tokio::test]
    async fn render_and_power_actions() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::default());
        let services = services(dir.path(), Arc::clone(&host) as Arc<dyn crate::plugins::HostControl>);
        let root = services.shutdown.clone();
        let api: Arc<dyn PluginApi> = Arc::new(Capability::new("system", services));

        let plugin = Arc::new(SystemPlugin::from_manifest(&PluginManifest::builtin("system")));
        let task = tokio::spawn({
            let plugin = Arc::clone(&plugin);
            let cancel = root.child_token();
            async move { plugin.run(cancel, api).await }
        });
        while plugin.api.get().is_none() {
            tokio::task::yield_now().await;
        }

        let page = plugin.render(&[]);
        assert_eq!(page.title, "System");
        let text = serde_json::to_string(&page).unwrap();
        assert!(text.contains("1.2.3"));

        let actions = plugin.actions();
        assert_eq!(actions["shutdown"](Vec::new(), Vec::new()).await, ActionResult::reload());
        assert!(matches!(
            actions["restart"](Vec::new(), Vec::new()).await,
            ActionResult::Alert { .. }
        ));

        actions["exit"](Vec::new(), Vec::new()).await;
        assert!(root.is_cancelled());
        task.await.unwrap().unwrap();
    }
}
