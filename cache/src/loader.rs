//! Manifest cache loading with builder pattern and fallback chains.
//!
//! [`ManifestCache`] holds the cached metadata of every discovered plugin in
//! discovery order, which is the order non-core plugins keep when they tie
//! on a command id.
//!
//! ```no_run
//! use command_runtime_cache::ManifestCache;
//!
//! // One manifest per file, ordered by file name
//! let cache = ManifestCache::from_dir("manifests/").unwrap();
//!
//! // A single bundle file
//! let cache = ManifestCache::from_bundle("manifests.json").unwrap();
//!
//! // First source that loads wins
//! let cache = ManifestCache::builder()
//!     .from_dir("manifests/")
//!     .from_bundle("manifests.json")
//!     .build()
//!     .unwrap();
//! println!("{} plugins", cache.len());
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use command_runtime_core::{
    CommandDescriptor, ManifestBundle, PluginManifest, PluginRecord,
};
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::manifest::{load_manifest, now_rfc3339, verify_manifest};

/// Where a [`ManifestCache`] was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheSource {
    /// A directory of per-plugin manifest files.
    Directory(PathBuf),
    /// A single [`ManifestBundle`] file.
    Bundle(PathBuf),
    /// Manifests handed over in memory.
    Memory,
    /// A fallback chain of several sources.
    Multiple(Vec<CacheSource>),
}

/// Cached plugin manifests in discovery order.
#[derive(Debug, Clone)]
pub struct ManifestCache {
    manifests: Vec<PluginManifest>,
    source: CacheSource,
}

impl ManifestCache {
    pub fn builder() -> CacheBuilder {
        CacheBuilder::new()
    }

    /// Loads every `*.json` manifest in a directory, sorted by file name.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable, unparsable or invalid manifest.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        files.retain(|f| f.extension().and_then(|e| e.to_str()) == Some("json"));
        files.sort();

        let manifests = files
            .iter()
            .map(load_manifest)
            .collect::<Result<Vec<_>>>()?;

        debug!(path = %path.display(), plugins = manifests.len(), "Loaded manifest directory");
        Ok(Self {
            manifests,
            source: CacheSource::Directory(path.to_path_buf()),
        })
    }

    /// Loads a [`ManifestBundle`] file, keeping its manifest order.
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let bundle: ManifestBundle = serde_json::from_reader(BufReader::new(file))?;

        let mut manifests = bundle.manifests;
        for manifest in &mut manifests {
            manifest.plugin.stamp_commands();
            verify_manifest(manifest)?;
        }

        debug!(path = %path.display(), plugins = manifests.len(), "Loaded manifest bundle");
        Ok(Self {
            manifests,
            source: CacheSource::Bundle(path.to_path_buf()),
        })
    }

    /// Wraps already-built manifests after verifying them.
    pub fn from_manifests(mut manifests: Vec<PluginManifest>) -> Result<Self> {
        for manifest in &mut manifests {
            manifest.plugin.stamp_commands();
            verify_manifest(manifest)?;
        }
        Ok(Self {
            manifests,
            source: CacheSource::Memory,
        })
    }

    /// Writes every manifest into one bundle file.
    pub fn save_bundle(&self, path: impl AsRef<Path>, version: &str) -> Result<()> {
        let mut bundle = ManifestBundle::new(version, now_rfc3339());
        bundle.manifests = self.manifests.clone();
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &bundle)?;
        Ok(())
    }

    pub fn manifests(&self) -> &[PluginManifest] {
        &self.manifests
    }

    /// Plugin records in discovery order, ready for indexing.
    pub fn plugins(&self) -> Vec<PluginRecord> {
        self.manifests.iter().map(|m| m.plugin.clone()).collect()
    }

    /// Looks up a manifest by plugin name or alias.
    pub fn get(&self, plugin: &str) -> Option<&PluginManifest> {
        self.manifests
            .iter()
            .find(|m| m.plugin.name == plugin || m.plugin.alias == plugin)
    }

    /// Every command of every plugin, in discovery order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.manifests.iter().flat_map(|m| m.commands().iter())
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    pub fn source(&self) -> &CacheSource {
        &self.source
    }
}

/// Builds a [`ManifestCache`] from the first source that loads.
///
/// If every source fails, [`CacheError::NoSourcesAvailable`] is returned.
#[derive(Debug, Default)]
pub struct CacheBuilder {
    sources: Vec<CacheSource>,
}

impl CacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(CacheSource::Directory(path.into()));
        self
    }

    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(CacheSource::Bundle(path.into()));
        self
    }

    pub fn build(self) -> Result<ManifestCache> {
        for source in &self.sources {
            let result = match source {
                CacheSource::Directory(path) => ManifestCache::from_dir(path),
                CacheSource::Bundle(path) => ManifestCache::from_bundle(path),
                CacheSource::Memory | CacheSource::Multiple(_) => continue,
            };
            match result {
                Ok(mut cache) => {
                    cache.source = CacheSource::Multiple(self.sources.clone());
                    return Ok(cache);
                }
                Err(e) => warn!(source = ?source, error = %e, "Manifest source failed"),
            }
        }
        Err(CacheError::NoSourcesAvailable)
    }
}

#[cfg(test)]
mod tests {
    use command_runtime_core::PluginType;

    use super::*;
    use crate::manifest::{generate_manifest, save_manifest};

    fn manifest(name: &str, ids: &[&str]) -> PluginManifest {
        let plugin = ids.iter().fold(PluginRecord::new(name, PluginType::User), |p, id| {
            p.with_command(CommandDescriptor::new(id))
        });
        generate_manifest(plugin, "1.0.0").unwrap()
    }

    #[test]
    fn test_from_dir_sorts_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        save_manifest(&manifest("zeta", &["z"]), dir.path().join("2-zeta.json")).unwrap();
        save_manifest(&manifest("alpha", &["a"]), dir.path().join("1-alpha.json")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let cache = ManifestCache::from_dir(dir.path()).unwrap();
        let names: Vec<String> = cache.plugins().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(cache.source(), &CacheSource::Directory(dir.path().to_path_buf()));
    }

    #[test]
    fn test_from_manifests_stamps_commands() {
        let mut raw = manifest("p", &["x"]);
        raw.plugin.commands[0].plugin_name = None;
        let cache = ManifestCache::from_manifests(vec![raw]).unwrap();
        assert_eq!(
            cache.commands().next().unwrap().plugin_name.as_deref(),
            Some("p")
        );
    }

    #[test]
    fn test_builder_all_fail() {
        let result = ManifestCache::builder()
            .from_dir("/nonexistent/dir/")
            .from_bundle("/nonexistent/bundle.json")
            .build();
        assert!(matches!(result, Err(CacheError::NoSourcesAvailable)));
    }
}
