//! Core descriptor types, manifest packages and the shared error taxonomy.
//!
//! This crate defines the data a plugin contributes to a command-line
//! program and the error type every other crate in the workspace raises:
//!
//! - [`CommandDescriptor`]: a command's id, aliases, flags and args.
//! - [`FlagDescriptor`] / [`ArgDescriptor`]: the declared input schema.
//! - [`PluginRecord`]: a plugin, its provenance class and its commands.
//! - [`PluginManifest`] / [`ManifestBundle`]: cached command metadata.
//! - [`CliError`] / [`ErrorKind`] / [`ExitCodes`]: kind-tagged errors with
//!   overridable process exit codes.
//!
//! Authoring validation ([`validate_command`], [`validate_plugin`]) catches
//! malformed descriptors before they are indexed.
//!
//! # Example
//!
//! ```
//! use command_runtime_core::*;
//!
//! let plugin = PluginRecord::new("mycli", PluginType::Core).with_command(
//!     CommandDescriptor::new("deploy:app")
//!         .with_flag(FlagDescriptor::boolean("force").with_char('f'))
//!         .with_arg(ArgDescriptor::required("name")),
//! );
//!
//! assert_eq!(plugin.find_command("deploy:app").unwrap().args.len(), 1);
//! assert!(validate_plugin(&plugin).is_empty());
//! ```

mod error;
mod package;
mod types;
mod validate;

pub use error::{CliError, ErrorKind, ExitCodes, Result};
pub use package::{ManifestBundle, PluginManifest};
pub use types::*;
pub use validate::{SchemaError, validate_command, validate_plugin};
