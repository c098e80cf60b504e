use serde::{Deserialize, Serialize};

use crate::{CommandDescriptor, PluginRecord};

/// Cached command metadata for a single plugin.
///
/// Written once when a plugin is installed or linked, and read back at
/// startup so commands can be resolved without loading any implementation.
///
/// # Examples
///
/// ```
/// use command_runtime_core::*;
///
/// let plugin = PluginRecord::new("root", PluginType::Core)
///     .with_command(CommandDescriptor::new("hello"));
/// let manifest = PluginManifest::new("1.2.0", "2024-01-15T10:30:00Z", plugin);
///
/// assert_eq!(manifest.command_count(), 1);
/// assert!(manifest.checksum.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Manifest contract version (populated from
    /// [`MANIFEST_CONTRACT_VERSION`](crate::MANIFEST_CONTRACT_VERSION)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Version of the plugin that produced this manifest.
    pub version: String,
    /// ISO-8601 timestamp of manifest creation.
    pub generated_at: String,
    /// SHA-256 hex digest of the command list, if sealed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub plugin: PluginRecord,
}

impl PluginManifest {
    pub fn new(
        version: impl Into<String>,
        generated_at: impl Into<String>,
        plugin: PluginRecord,
    ) -> Self {
        Self {
            schema_version: Some(crate::MANIFEST_CONTRACT_VERSION.to_string()),
            version: version.into(),
            generated_at: generated_at.into(),
            checksum: None,
            plugin,
        }
    }

    pub fn command_count(&self) -> usize {
        self.plugin.commands.len()
    }

    pub fn commands(&self) -> &[CommandDescriptor] {
        &self.plugin.commands
    }
}

/// Several plugin manifests in one file, in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Bundle format version (semver string).
    pub version: String,
    /// ISO-8601 timestamp for bundle creation.
    pub generated_at: String,
    pub manifests: Vec<PluginManifest>,
}

impl ManifestBundle {
    pub fn new(version: impl Into<String>, generated_at: impl Into<String>) -> Self {
        Self {
            schema_version: Some(crate::MANIFEST_CONTRACT_VERSION.to_string()),
            version: version.into(),
            generated_at: generated_at.into(),
            manifests: Vec::new(),
        }
    }

    pub fn manifest_count(&self) -> usize {
        self.manifests.len()
    }
}
