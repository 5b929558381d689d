//! Live events pushed from plugins to browser clients
//!
//! Every outbound WebSocket frame is an [`Envelope`] `{type, options?}`.
//! Delivery is best-effort: a frame that cannot be handed to a client's
//! writer is dropped, and separate dispatches carry no ordering guarantee.

pub mod dispatcher;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use dispatcher::Dispatcher;

/// An encoded JSON frame, shared between all recipients of one dispatch
pub type Frame = Arc<str>;

/// Event type telling clients to refresh their current view
pub const RELOAD: &str = "reload";

/// Event type carrying a partial element update
pub const UPDATE: &str = "update";

/// Outbound event wrapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Event type
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-specific payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<T>,
}

impl Envelope<()> {
    /// `{"type":"reload"}`
    #[must_use]
    pub fn reload() -> Self {
        Self {
            kind: RELOAD.to_string(),
            options: None,
        }
    }
}

impl Envelope<UpdateOptions> {
    /// `{"type":"update","options":{...}}`
    #[must_use]
    pub fn update(options: UpdateOptions) -> Self {
        Self {
            kind: UPDATE.to_string(),
            options: Some(options),
        }
    }
}

/// Payload of an `update` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// Id of the page element to update
    pub id: String,

    /// Kind of element being updated
    pub element: String,

    /// Element-specific data
    pub data: serde_json::Value,
}

/// Encode a payload into a frame, logging failures
pub(crate) fn encode<T: Serialize + ?Sized>(payload: &T) -> Option<Frame> {
    match serde_json::to_string(payload) {
        Ok(s) => Some(Frame::from(s)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode event");
            None
        }
    }
}
