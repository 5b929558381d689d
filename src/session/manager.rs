//! Session registry keyed by bearer token

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Clock, Session, SystemClock};
use crate::events::Frame;
use crate::security::generate_token;

/// Creates, validates and ends login sessions
#[derive(Debug)]
pub struct SessionManager {
    root: CancellationToken,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    /// Create a registry whose sessions hang off `root` and live for `lifetime`
    #[must_use]
    pub fn new(root: CancellationToken, lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            root,
            lifetime,
            clock,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registry using the wall clock
    #[must_use]
    pub fn with_system_clock(root: CancellationToken, lifetime: Duration) -> Self {
        Self::new(root, lifetime, Arc::new(SystemClock))
    }

    /// Fixed lifetime of new sessions
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Start a session for `user_name`
    ///
    /// Must be called inside a Tokio runtime: a watcher task cancels the
    /// session's token once the lifetime elapses.
    pub fn new_session(&self, user_name: impl Into<String>) -> Arc<Session> {
        let now = self.clock.now();
        let cancel = self.root.child_token();
        let session = Arc::new(Session::new(
            generate_token(),
            user_name.into(),
            now,
            now + self.lifetime,
            cancel.clone(),
        ));

        let deadline = self.lifetime.to_std().unwrap_or_default();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(deadline) => cancel.cancel(),
                () = cancel.cancelled() => {}
            }
        });

        self.sessions
            .write()
            .insert(session.token().to_string(), Arc::clone(&session));
        tracing::info!(
            session = %session.id(),
            user = session.user_name(),
            valid_to = %session.valid_to(),
            "session created"
        );

        session
    }

    /// Look up a live session
    ///
    /// A session found outside its validity window, or already cancelled, is
    /// evicted and `None` is returned.
    #[must_use]
    pub fn session_by_token(&self, token: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().get(token).cloned()?;

        if session.is_valid_at(self.clock.now()) && !session.cancellation().is_cancelled() {
            return Some(session);
        }

        self.evict(&session);
        tracing::debug!(session = %session.id(), "session expired");
        None
    }

    /// End the session for `token` (logout), returning whether it existed
    pub fn end_session(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token);
        removed.is_some_and(|session| {
            session.cancellation().cancel();
            tracing::info!(session = %session.id(), user = session.user_name(), "session ended");
            true
        })
    }

    /// Number of registered sessions, expired ones included until looked up
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no sessions are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Senders of every client across live sessions viewing `module`
    ///
    /// All locks are released before this returns.
    pub(crate) fn targets(&self, module: &str) -> Vec<mpsc::Sender<Frame>> {
        let sessions = self.sessions.read();
        let mut out = Vec::new();
        for session in sessions.values() {
            if session.cancellation().is_cancelled() {
                continue;
            }
            session.collect_targets(module, &mut out);
        }
        out
    }

    fn evict(&self, session: &Arc<Session>) {
        let mut sessions = self.sessions.write();
        if sessions
            .get(session.token())
            .is_some_and(|s| Arc::ptr_eq(s, session))
        {
            sessions.remove(session.token());
        }
        drop(sessions);
        session.cancellation().cancel();
    }
}
