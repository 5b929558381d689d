//! Plugins compiled into the binary

pub mod heartbeat;
pub mod system;

use std::sync::{Arc, OnceLock};

pub use heartbeat::{HeartbeatPlugin, HeartbeatSettings};
pub use system::SystemPlugin;

use super::api::PluginApi;
use super::ui::ActionResult;

/// Capability slot filled when the plugin starts running
type ApiSlot = Arc<OnceLock<Arc<dyn PluginApi>>>;

fn not_running() -> ActionResult {
    ActionResult::error("plugin is not running")
}
