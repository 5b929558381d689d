//! WebSocket clients attached to a session

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::Session;
use crate::events::Frame;

/// The view a client currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Plugin id, empty before the first navigation message
    #[serde(default)]
    pub module: String,

    /// Argument path inside the plugin
    #[serde(default)]
    pub args: Vec<String>,
}

/// A live connection registered with a session
#[derive(Debug)]
pub(crate) struct Client {
    pub(crate) id: Uuid,
    pub(crate) tx: mpsc::Sender<Frame>,
    pub(crate) location: Location,
}

/// Handle held by a connection's read loop
///
/// Dropping the handle detaches the client from its session.
#[derive(Debug)]
pub struct ClientHandle {
    id: Uuid,
    addr: SocketAddr,
    session: Arc<Session>,
}

impl ClientHandle {
    pub(crate) const fn new(id: Uuid, addr: SocketAddr, session: Arc<Session>) -> Self {
        Self { id, addr, session }
    }

    /// Client id
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Remote address of the connection
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Owning session
    #[must_use]
    pub const fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Record the module and args the client navigated to
    pub fn set_location(&self, module: impl Into<String>, args: Vec<String>) {
        self.session.set_location(
            self.id,
            Location {
                module: module.into(),
                args,
            },
        );
    }

    /// Last location the client reported
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        self.session.location(self.id)
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.session.remove_client(self.id);
    }
}
