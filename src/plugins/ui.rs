//! Values plugins hand to the front end
//!
//! The widget tree itself is opaque here: a [`Page`] is a title plus a list
//! of JSON elements `{type, options}`. A few element constructors cover what
//! the built-in plugins render.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Element kind of a progress bar
pub const PROGRESS: &str = "progress";

/// A rendered plugin view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page title
    pub title: String,

    /// Top-level elements in display order
    #[serde(default)]
    pub elements: Vec<Value>,
}

impl Page {
    /// Empty page with a title
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            elements: Vec::new(),
        }
    }

    /// Append an element
    #[must_use]
    pub fn with(mut self, element: Value) -> Self {
        self.elements.push(element);
        self
    }
}

/// Generic `{type, options}` element
#[must_use]
pub fn element(kind: &str, options: Value) -> Value {
    json!({ "type": kind, "options": options })
}

/// Section header
#[must_use]
pub fn header(text: &str) -> Value {
    element("header", json!({ "text": text }))
}

/// `title: value` line
#[must_use]
pub fn field(title: &str, value: &str) -> Value {
    element(
        "element-list",
        json!({
            "mode": "line",
            "elements": [
                element("label", json!({ "text": title, "strong": true })),
                element("label", json!({ "text": value })),
            ],
        }),
    )
}

/// Button that posts `cmd` with `args` to the plugin's action endpoint
#[must_use]
pub fn button(title: &str, cmd: &str, args: &[&str], style: &str) -> Value {
    element(
        "button",
        json!({
            "title": { "text": title },
            "style": style,
            "action": { "cmd": cmd, "args": args },
        }),
    )
}

/// Progress bar, updatable by id through [`ProgressUpdate`]
#[must_use]
pub fn progress(id: &str, value: u32, max: u32) -> Value {
    element(PROGRESS, json!({ "id": id, "value": value, "max": max }))
}

/// Response to a plugin action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "kebab-case")]
pub enum ActionResult {
    /// Re-render the current view
    Reload {
        /// Fade the view while reloading
        #[serde(default)]
        fade: bool,
    },

    /// Pop up a message
    Alert {
        /// Alert title
        title: String,
        /// Alert body
        text: String,
    },

    /// Navigate to other args within the same plugin
    SetArgs {
        /// New argument path
        args: Vec<String>,
        /// Fade the view while navigating
        #[serde(default)]
        fade: bool,
    },

    /// Open a modal dialog
    Modal {
        /// Dialog title
        title: Value,
        /// Dialog body elements
        content: Vec<Value>,
        /// Dialog buttons
        #[serde(default)]
        actions: Vec<Value>,
    },

    /// Replace a single element in place
    PartUpdate {
        /// Id of the element to replace
        id: String,
        /// Replacement element
        element: Value,
    },
}

impl ActionResult {
    /// Reload with fade
    #[must_use]
    pub const fn reload() -> Self {
        Self::Reload { fade: true }
    }

    /// Alert with a title and text
    #[must_use]
    pub fn alert(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Alert {
            title: title.into(),
            text: text.into(),
        }
    }

    /// Alert titled "Error" carrying `err`'s message
    #[must_use]
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self::alert("Error", err.to_string())
    }

    /// Navigate to `args`
    #[must_use]
    pub const fn set_args(args: Vec<String>, fade: bool) -> Self {
        Self::SetArgs { args, fade }
    }

    /// Modal with an info title
    #[must_use]
    pub fn modal(title: &str, content: Vec<Value>, actions: Vec<Value>) -> Self {
        Self::Modal {
            title: json!({ "text": title, "icon": "info-circle" }),
            content,
            actions,
        }
    }

    /// Replace element `id`
    #[must_use]
    pub fn part_update(id: impl Into<String>, element: Value) -> Self {
        Self::PartUpdate {
            id: id.into(),
            element,
        }
    }
}

/// Partial update of one rendered element, pushed over the event bus
pub trait Update: Serialize {
    /// Id of the element being updated
    fn element_id(&self) -> &str;

    /// Kind of the element being updated
    fn element_kind(&self) -> &str;
}

/// New value for a progress bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(skip)]
    id: String,

    /// Current value
    pub value: u32,
}

impl ProgressUpdate {
    /// Update for progress bar `id`
    #[must_use]
    pub fn new(id: impl Into<String>, value: u32) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

impl Update for ProgressUpdate {
    fn element_id(&self) -> &str {
        &self.id
    }

    fn element_kind(&self) -> &str {
        PROGRESS
    }
}
