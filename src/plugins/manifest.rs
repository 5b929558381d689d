//! Plugin manifest format (`plugin.json`)

use serde::{Deserialize, Serialize};

/// Manifest file name looked up in each plugin directory
pub const MANIFEST_FILE: &str = "plugin.json";

/// Describes one plugin instance to build from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin identifier, also its settings key (e.g. "heartbeat-fast")
    pub id: String,
    /// Catalog entry that builds this plugin (e.g. "heartbeat")
    pub kind: String,
    /// Menu title override
    #[serde(default)]
    pub title: Option<String>,
    /// Menu icon override
    #[serde(default)]
    pub icon: Option<String>,
    /// Kind-specific construction options
    #[serde(default)]
    pub options: serde_json::Value,
}

impl PluginManifest {
    /// Manifest for a built-in whose id is its kind
    #[must_use]
    pub fn builtin(kind: &str) -> Self {
        Self {
            id: kind.to_string(),
            kind: kind.to_string(),
            title: None,
            icon: None,
            options: serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_manifest() {
        let json = r#"{
            "id": "beat-fast",
            "kind": "heartbeat",
            "title": "Fast beat",
            "options": {"interval-secs": 1}
        }"#;

        let manifest: PluginManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.id, "beat-fast");
        assert_eq!(manifest.kind, "heartbeat");
        assert_eq!(manifest.title.as_deref(), Some("Fast beat"));
        assert!(manifest.icon.is_none());
        assert_eq!(manifest.options["interval-secs"], 1);
    }

    #[test]
    fn deserialize_minimal_manifest() {
        let manifest: PluginManifest =
            serde_json::from_str(r#"{"id": "sys", "kind": "system"}"#).unwrap();
        assert!(manifest.options.is_null());
    }

    #[test]
    fn missing_kind_is_rejected() {
        assert!(serde_json::from_str::<PluginManifest>(r#"{"id": "x"}"#).is_err());
    }

    #[test]
    fn builtin_uses_kind_as_id() {
        let manifest = PluginManifest::builtin("system");
        assert_eq!(manifest.id, "system");
        assert_eq!(manifest.kind, "system");
    }
}
