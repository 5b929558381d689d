//! Plugin discovery - scan a directory for `plugin.json` manifests

use std::path::{Path, PathBuf};

use super::manifest::{MANIFEST_FILE, PluginManifest};

/// Scan `dir` for manifests
///
/// Looks for `plugin.json` in immediate subdirectories, in name order.
/// Returns `(directory, manifest)` pairs for each valid manifest; unreadable
/// or malformed ones are logged and skipped.
#[must_use]
pub fn discover_plugins(dir: &Path) -> Vec<(PathBuf, PluginManifest)> {
    if !dir.is_dir() {
        tracing::debug!(path = %dir.display(), "plugin directory does not exist, skipping");
        return Vec::new();
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(path = %dir.display(), "failed to read plugin directory");
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    paths.sort();

    let mut results = Vec::new();
    for path in paths {
        let manifest_path = path.join(MANIFEST_FILE);
        if let Some(manifest) = load_manifest(&manifest_path) {
            tracing::debug!(
                plugin_id = %manifest.id,
                kind = %manifest.kind,
                path = %path.display(),
                "discovered plugin"
            );
            results.push((path, manifest));
        }
    }

    results
}

/// Load and parse a single manifest file
fn load_manifest(path: &Path) -> Option<PluginManifest> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read plugin manifest");
            return None;
        }
    };

    match serde_json::from_str::<PluginManifest>(&content) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse plugin manifest"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(root: &Path, name: &str, content: &str) -> PathBuf {
        let plugin_dir = root.join(name);
        std::fs::create_dir(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join(MANIFEST_FILE), content).unwrap();
        plugin_dir
    }

    #[test]
    fn discover_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_plugins(dir.path()).is_empty());
    }

    #[test]
    fn discover_valid_plugins_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let b = write_manifest(dir.path(), "b", r#"{"id": "beat", "kind": "heartbeat"}"#);
        let a = write_manifest(dir.path(), "a", r#"{"id": "sys", "kind": "system"}"#);

        let results = discover_plugins(dir.path());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, a);
        assert_eq!(results[0].1.id, "sys");
        assert_eq!(results[1].0, b);
    }

    #[test]
    fn skip_invalid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "bad", "not valid json");
        write_manifest(dir.path(), "good", r#"{"id": "ok", "kind": "system"}"#);

        let results = discover_plugins(dir.path());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.id, "ok");
    }

    #[test]
    fn skip_dir_without_manifest_and_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        std::fs::write(dir.path().join("stray.json"), "{}").unwrap();

        assert!(discover_plugins(dir.path()).is_empty());
    }

    #[test]
    fn skip_nonexistent_dir() {
        assert!(discover_plugins(Path::new("/nonexistent/path")).is_empty());
    }
}
