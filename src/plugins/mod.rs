//! Plugin contract and runtime
//!
//! A plugin is an independently running unit with a stable id. The
//! [`PluginRuntime`] starts each one on its own task and hands it a
//! [`PluginApi`] bound to that id: the only way a plugin reaches settings,
//! the event bus, or process control.
//!
//! Plugins are compiled in and listed in a [`PluginCatalog`] by kind. Extra
//! instances are described by `plugin.json` manifests found in the plugin
//! directory.

pub mod api;
pub mod builtin;
pub mod capability;
pub mod catalog;
pub mod discovery;
pub mod host;
pub mod manifest;
pub mod runtime;
pub mod ui;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

pub use api::PluginApi;
pub use capability::{Capability, Services};
pub use catalog::{PluginCatalog, PluginFactory};
pub use discovery::discover_plugins;
pub use host::{BuildInfo, HostControl, SystemHost};
pub use manifest::PluginManifest;
pub use runtime::{PluginRuntime, PluginState};
pub use ui::{ActionResult, Page, ProgressUpdate, Update};

/// Handler for one plugin command: `(args, request body) -> result`
pub type ActionHandler = Arc<dyn Fn(Vec<String>, Vec<u8>) -> BoxFuture<'static, ActionResult> + Send + Sync>;

/// Command name to handler
pub type ActionMap = HashMap<String, ActionHandler>;

/// Wrap an async closure as an [`ActionHandler`]
#[must_use]
pub fn action<F, Fut>(f: F) -> ActionHandler
where
    F: Fn(Vec<String>, Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
    Arc::new(move |args, body| f(args, body).boxed())
}

/// Contract every plugin implements
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable, unique id; also the settings key and event module
    fn id(&self) -> &str;

    /// Menu title
    fn title(&self) -> &str;

    /// Menu icon name
    fn icon(&self) -> &str;

    /// Run for the plugin's lifetime, returning once `cancel` fires
    ///
    /// # Errors
    ///
    /// An error is logged by the runtime; the plugin is not restarted
    async fn run(&self, cancel: CancellationToken, api: Arc<dyn PluginApi>) -> anyhow::Result<()>;

    /// Commands accepted by the action endpoint
    fn actions(&self) -> ActionMap;

    /// Render the view for `args`
    fn render(&self, args: &[String]) -> Page;
}
