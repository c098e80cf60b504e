//! Reading, writing and sealing plugin manifests.
//!
//! A manifest is sealed by recording the SHA-256 of its command list. A
//! sealed manifest whose commands were edited afterwards fails
//! [`verify_manifest`], which is how a stale or hand-edited cache is caught
//! before it reaches the index.
//!
//! # Examples
//!
//! ```no_run
//! use command_runtime_cache::{generate_manifest, load_manifest, save_manifest};
//! use command_runtime_core::{CommandDescriptor, PluginRecord, PluginType};
//!
//! let plugin = PluginRecord::new("mycli", PluginType::Core)
//!     .with_command(CommandDescriptor::new("hello"));
//! let manifest = generate_manifest(plugin, "1.0.0").unwrap();
//!
//! save_manifest(&manifest, "mycli.manifest.json").unwrap();
//! let loaded = load_manifest("mycli.manifest.json").unwrap();
//! assert_eq!(loaded.checksum, manifest.checksum);
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use command_runtime_core::{CommandDescriptor, PluginManifest, PluginRecord, validate_plugin};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{CacheError, Result};

/// SHA-256 hex digest of the canonical JSON of a command list.
pub fn commands_checksum(commands: &[CommandDescriptor]) -> Result<String> {
    let bytes = serde_json::to_vec(commands)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Records the current checksum on the manifest.
pub fn seal_manifest(manifest: &mut PluginManifest) -> Result<()> {
    manifest.checksum = Some(commands_checksum(manifest.commands())?);
    Ok(())
}

/// Checks the recorded checksum and the command descriptors.
///
/// An unsealed manifest only gets the descriptor checks.
///
/// # Errors
///
/// [`CacheError::InvalidChecksum`] on a checksum mismatch, or
/// [`CacheError::InvalidManifest`] if a command fails authoring validation.
pub fn verify_manifest(manifest: &PluginManifest) -> Result<()> {
    let plugin = &manifest.plugin.name;
    if let Some(expected) = &manifest.checksum {
        let actual = commands_checksum(manifest.commands())?;
        if &actual != expected {
            return Err(CacheError::InvalidChecksum {
                plugin: plugin.clone(),
                expected: expected.clone(),
                actual,
            });
        }
    }

    let errors = validate_plugin(&manifest.plugin);
    if !errors.is_empty() {
        let reason = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(CacheError::InvalidManifest {
            plugin: plugin.clone(),
            reason,
        });
    }
    Ok(())
}

/// Builds a sealed manifest stamped with the current time.
pub fn generate_manifest(mut plugin: PluginRecord, version: &str) -> Result<PluginManifest> {
    plugin.stamp_commands();
    let mut manifest = PluginManifest::new(version, now_rfc3339(), plugin);
    seal_manifest(&mut manifest)?;
    Ok(manifest)
}

/// Loads one manifest, stamps plugin identity onto its commands and verifies
/// it.
///
/// # Errors
///
/// I/O and JSON errors, plus everything [`verify_manifest`] reports.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<PluginManifest> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let mut manifest: PluginManifest = serde_json::from_reader(BufReader::new(file))?;
    manifest.plugin.stamp_commands();
    verify_manifest(&manifest)?;
    debug!(
        path = %path.display(),
        plugin = %manifest.plugin.name,
        commands = manifest.command_count(),
        "Loaded manifest"
    );
    Ok(manifest)
}

/// Saves a manifest as pretty-printed JSON.
pub fn save_manifest(manifest: &PluginManifest, path: impl AsRef<Path>) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), manifest)?;
    Ok(())
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
