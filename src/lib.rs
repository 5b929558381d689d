//! Hostpanel - web control panel core for a single host
//!
//! This library provides the runtime behind the panel:
//! - Plugins running on their own tasks behind a per-plugin capability
//! - Persistent per-plugin settings
//! - Login sessions with expiring tokens
//! - WebSocket clients tracked by the page they are viewing
//! - Event fan-out from plugins to those clients
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              HTTP / WebSocket (axum)                 │
//! │   login  │  main  │  render  │  action  │  /ws      │
//! └──────────┬──────────────────────────────┬───────────┘
//!            │                              │
//! ┌──────────▼──────────┐        ┌──────────▼───────────┐
//! │    Plugin runtime   │        │   Session registry   │
//! │  plugins + api      │        │  sessions → clients  │
//! └──────────┬──────────┘        └──────────▲───────────┘
//!            │                              │
//! ┌──────────▼──────────┐        ┌──────────┴───────────┐
//! │   Settings store    │        │   Event dispatcher   │
//! │   settings.json     │        │   fan-out by module  │
//! └─────────────────────┘        └──────────────────────┘
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod plugins;
pub mod security;
pub mod session;
pub mod settings;

pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
pub use events::Dispatcher;
pub use plugins::{Plugin, PluginApi, PluginCatalog, PluginRuntime};
pub use session::{Session, SessionManager};
pub use settings::SettingsStore;
