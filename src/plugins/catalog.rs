//! Compiled-in plugin factories keyed by kind

use std::collections::BTreeMap;
use std::sync::Arc;

use super::Plugin;
use super::builtin::{HeartbeatPlugin, SystemPlugin};
use super::manifest::PluginManifest;
use crate::{Error, Result};

/// Builds a plugin instance from its manifest
pub type PluginFactory = Arc<dyn Fn(&PluginManifest) -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync>;

/// Registry of plugin kinds this binary can build
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: BTreeMap<String, PluginFactory>,
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl PluginCatalog {
    /// Empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in kinds registered
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(SystemPlugin::KIND, |m| {
            Ok(Arc::new(SystemPlugin::from_manifest(m)) as Arc<dyn Plugin>)
        });
        catalog.register(HeartbeatPlugin::KIND, |m| {
            Ok(Arc::new(HeartbeatPlugin::from_manifest(m)?) as Arc<dyn Plugin>)
        });
        catalog
    }

    /// Register (or replace) the factory for `kind`
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&PluginManifest) -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    /// Known kinds, sorted
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the plugin a manifest describes
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown kind, `Error::Plugin` for a
    /// failing factory
    pub fn create(&self, manifest: &PluginManifest) -> Result<Arc<dyn Plugin>> {
        let factory = self
            .factories
            .get(&manifest.kind)
            .ok_or_else(|| Error::NotFound(format!("plugin kind {}", manifest.kind)))?;

        let plugin = factory(manifest)
            .map_err(|e| Error::Plugin(format!("failed to build {}: {e:#}", manifest.id)))?;

        if plugin.id() != manifest.id {
            return Err(Error::Plugin(format!(
                "plugin kind {} built id {} instead of {}",
                manifest.kind,
                plugin.id(),
                manifest.id
            )));
        }

        Ok(plugin)
    }

    /// Build a built-in by kind, using the kind as its id
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown kind
    pub fn builtin(&self, kind: &str) -> Result<Arc<dyn Plugin>> {
        self.create(&PluginManifest::builtin(kind))
    }
}
