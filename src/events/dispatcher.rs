//! Fan-out of encoded events to matching clients

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use super::{Frame, encode};
use crate::session::SessionManager;

/// Routes events to clients across every session
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sessions: Arc<SessionManager>,
}

impl Dispatcher {
    /// Create a dispatcher over `sessions`
    #[must_use]
    pub const fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Session registry this dispatcher reads
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Encode `payload` once and deliver it to clients viewing `module`
    ///
    /// An empty `module` reaches every client. Returns whether at least one
    /// client accepted the frame.
    pub async fn dispatch<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        module: &str,
        args: &[String],
    ) -> bool {
        match encode(payload) {
            Some(frame) => self.dispatch_frame(frame, module, args).await,
            None => false,
        }
    }

    /// Deliver an already-encoded frame
    ///
    /// `args` is carried for the plugin's own targeting and is not matched
    /// here. Sends run concurrently and this waits for all of them; failed
    /// sends are dropped.
    pub async fn dispatch_frame(&self, frame: Frame, module: &str, args: &[String]) -> bool {
        let targets = self.sessions.targets(module);
        if targets.is_empty() {
            tracing::trace!(module, "no clients for event");
            return false;
        }

        let sends = targets.iter().map(|tx| tx.send(Arc::clone(&frame)));
        let results = join_all(sends).await;
        let delivered = results.iter().filter(|r| r.is_ok()).count();

        tracing::debug!(
            module,
            ?args,
            targets = results.len(),
            delivered,
            "event dispatched"
        );

        delivered > 0
    }
}
