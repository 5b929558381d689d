//! The capability surface a plugin uses to reach the rest of the process
//!
//! [`PluginApi`] is object-safe and carries raw operations; the typed
//! helpers (`save_config`, `send_update`, `safe_run`, ...) are inherent
//! methods on `dyn PluginApi` layered on top.

use std::future::Future;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use tokio_util::task::task_tracker::TaskTrackerToken;

use super::host::BuildInfo;
use super::ui::Update;
use crate::Result;
use crate::events::{self, Envelope, Frame, UpdateOptions};

/// Operations available to one plugin
#[async_trait]
pub trait PluginApi: Send + Sync {
    /// Id of the plugin this capability is bound to
    fn module_id(&self) -> &str;

    /// Store and persist the plugin's settings blob
    ///
    /// # Errors
    ///
    /// Returns error if the settings file cannot be written
    fn save_raw_config(&self, blob: Box<RawValue>) -> Result<()>;

    /// Current settings blob, if one was ever saved
    fn raw_config(&self) -> Option<Box<RawValue>>;

    /// Deliver a frame to clients viewing this plugin
    async fn send_frame(&self, frame: Frame, args: Vec<String>) -> bool;

    /// Deliver a frame to every client
    async fn broadcast_frame(&self, frame: Frame) -> bool;

    /// Slot in the shutdown tracker, released on drop
    fn shutdown_guard(&self) -> TaskTrackerToken;

    /// Request a cooperative shutdown of the whole process
    fn exit(&self);

    /// Power the host off
    ///
    /// # Errors
    ///
    /// Returns the OS error unchanged
    fn shutdown(&self) -> Result<()>;

    /// Reboot the host
    ///
    /// # Errors
    ///
    /// Returns the OS error unchanged
    fn restart(&self) -> Result<()>;

    /// Build metadata
    fn version(&self) -> BuildInfo;
}

impl dyn PluginApi {
    /// Serialize `value` as this plugin's settings and persist it
    ///
    /// # Errors
    ///
    /// Returns the serialization error, or else the persistence error
    pub fn save_config<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let blob = serde_json::value::to_raw_value(value)?;
        self.save_raw_config(blob)
    }

    /// Decode this plugin's settings into `out`
    ///
    /// Leaves `out` untouched when nothing has been saved yet, so callers
    /// fill it with defaults first.
    ///
    /// # Errors
    ///
    /// Returns error if the stored blob does not decode into `T`
    pub fn load_config<T: DeserializeOwned>(&self, out: &mut T) -> Result<()> {
        if let Some(blob) = self.raw_config() {
            *out = serde_json::from_str(blob.get())?;
        }
        Ok(())
    }

    /// Send an arbitrary payload to clients viewing this plugin
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T, args: &[String]) -> BoxFuture<'_, bool> {
        match events::encode(payload) {
            Some(frame) => self.send_frame(frame, args.to_vec()),
            None => futures::future::ready(false).boxed(),
        }
    }

    /// Send an `update` event for one element
    ///
    /// Resolves to whether at least one client received it.
    pub fn send_update<U: Update>(&self, update: &U, args: &[String]) -> BoxFuture<'_, bool> {
        let data = match serde_json::to_value(update) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(module = self.module_id(), error = %e, "failed to encode update");
                return futures::future::ready(false).boxed();
            }
        };

        let envelope = Envelope::update(UpdateOptions {
            id: update.element_id().to_string(),
            element: update.element_kind().to_string(),
            data,
        });
        self.send(&envelope, args)
    }

    /// Tell clients viewing this plugin to refresh
    pub fn reload(&self, args: &[String]) -> BoxFuture<'_, bool> {
        self.send(&Envelope::reload(), args)
    }

    /// Send an arbitrary payload to every client
    pub fn broadcast<T: Serialize + ?Sized>(&self, payload: &T) -> BoxFuture<'_, bool> {
        match events::encode(payload) {
            Some(frame) => self.broadcast_frame(frame),
            None => futures::future::ready(false).boxed(),
        }
    }

    /// Run `f` while holding a shutdown slot
    pub fn safe_run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.shutdown_guard();
        f()
    }

    /// Await `fut` while holding a shutdown slot
    pub fn safe_run_async<F: Future>(&self, fut: F) -> impl Future<Output = F::Output> + use<F> {
        let guard = self.shutdown_guard();
        async move {
            let out = fut.await;
            drop(guard);
            out
        }
    }
}
