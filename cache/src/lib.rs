//! Cached command metadata and runtime configuration.
//!
//! Plugins ship a [`PluginManifest`](command_runtime_core::PluginManifest)
//! describing their commands so the root program can index and resolve
//! commands without loading any implementation. This crate reads and writes
//! those manifests, seals them with a SHA-256 checksum, collects them into a
//! [`ManifestCache`] and loads the [`RuntimeConfig`] that drives resolution
//! and dispatch.
//!
//! # Quick start
//!
//! ```no_run
//! use command_runtime_cache::{ManifestCache, RuntimeConfig};
//!
//! let config = RuntimeConfig::load("mycli.yml").unwrap();
//! let cache = ManifestCache::builder()
//!     .from_dir("manifests/")
//!     .from_bundle("manifests.json")
//!     .build()
//!     .unwrap();
//! println!("{}: {} plugins", config.bin, cache.len());
//! ```

mod config;
mod error;
mod loader;
mod manifest;

pub use config::RuntimeConfig;
pub use error::{CacheError, Result};
pub use loader::{CacheBuilder, CacheSource, ManifestCache};
pub use manifest::{
    commands_checksum, generate_manifest, load_manifest, save_manifest, seal_manifest,
    verify_manifest,
};
