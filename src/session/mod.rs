//! Login sessions and their WebSocket clients
//!
//! A [`Session`] is created on login and identified by an opaque bearer
//! token. It is valid over the half-open window `[valid_from, valid_to)`
//! and owns a cancellation token that is a child of the process root: it
//! fires at `valid_to`, on logout, or on shutdown, and every connection
//! attached to the session closes when it does.
//!
//! ```text
//! SessionManager ──► Session ──► [Client { location: (module, args), tx }]
//!        │               │
//!        │               └── CancellationToken (child of root, deadline valid_to)
//!        └── token → Arc<Session>
//! ```

pub mod client;
pub mod clock;
pub mod manager;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use client::{ClientHandle, Location};
pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::SessionManager;

use crate::events::Frame;
use client::Client;

/// A logged-in user's time-bounded authorization
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    token: String,
    user_name: String,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    cancel: CancellationToken,
    clients: Mutex<Vec<Client>>,
}

impl Session {
    pub(crate) fn new(
        token: String,
        user_name: String,
        valid_from: DateTime<Utc>,
        valid_to: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            user_name,
            valid_from,
            valid_to,
            cancel,
            clients: Mutex::new(Vec::new()),
        }
    }

    /// Session id
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Bearer token
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Owning user
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Start of the validity window
    #[must_use]
    pub const fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    /// End of the validity window (exclusive)
    #[must_use]
    pub const fn valid_to(&self) -> DateTime<Utc> {
        self.valid_to
    }

    /// Token cancelled when the session ends
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether `now` falls inside `[valid_from, valid_to)`
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now < self.valid_to
    }

    /// Attach a connection; the returned handle detaches it on drop
    pub fn new_client(self: &Arc<Self>, addr: SocketAddr, tx: mpsc::Sender<Frame>) -> ClientHandle {
        let id = Uuid::new_v4();
        self.clients.lock().push(Client {
            id,
            tx,
            location: Location::default(),
        });
        tracing::debug!(session = %self.id, client = %id, %addr, "client attached");

        ClientHandle::new(id, addr, Arc::clone(self))
    }

    /// Detach a connection, returning whether it was present
    pub fn remove_client(&self, id: Uuid) -> bool {
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|c| c.id != id);
        let removed = clients.len() != before;
        drop(clients);

        if removed {
            tracing::debug!(session = %self.id, client = %id, "client detached");
        }
        removed
    }

    /// Number of attached connections
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    pub(crate) fn set_location(&self, id: Uuid, location: Location) {
        if let Some(client) = self.clients.lock().iter_mut().find(|c| c.id == id) {
            tracing::trace!(client = %id, module = %location.module, args = ?location.args, "location set");
            client.location = location;
        }
    }

    pub(crate) fn location(&self, id: Uuid) -> Option<Location> {
        self.clients
            .lock()
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.location.clone())
    }

    /// Senders of clients viewing `module`, or of every client when empty
    pub(crate) fn collect_targets(&self, module: &str, out: &mut Vec<mpsc::Sender<Frame>>) {
        let clients = self.clients.lock();
        out.extend(
            clients
                .iter()
                .filter(|c| module.is_empty() || c.location.module == module)
                .map(|c| c.tx.clone()),
        );
    }
}
