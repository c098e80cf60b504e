//! Runtime configuration of the root program.
//!
//! Read from YAML (`.yml`/`.yaml`) or JSON (anything else), chosen by file
//! extension.
//!
//! # Example YAML
//!
//! ```yaml
//! bin: mycli
//! plugins:
//!   - "@mycli/plugin-help"
//!   - "@mycli/plugin-plugins"
//! flexible_taxonomy: true
//! topic_separator: " "
//! exit_codes:
//!   requiredArgs: 105
//!   unexpectedArgs: 106
//! hook_timeout_ms: 10000
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use command_runtime_core::ExitCodes;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CacheError, Result};

fn default_separator() -> char {
    ':'
}

/// Settings threaded through index construction and dispatch.
///
/// # Examples
///
/// ```
/// use command_runtime_cache::RuntimeConfig;
///
/// let config: RuntimeConfig = serde_yaml::from_str("bin: mycli\nflexible_taxonomy: true\n").unwrap();
/// assert_eq!(config.bin, "mycli");
/// assert!(config.flexible_taxonomy);
/// assert_eq!(config.topic_separator, ':');
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root program name.
    pub bin: String,
    /// Core plugins in declaration order; earlier wins ties.
    pub plugins: Vec<String>,
    /// Resolve any order-preserving subset of topic segments.
    pub flexible_taxonomy: bool,
    /// `:` or a space.
    #[serde(default = "default_separator")]
    pub topic_separator: char,
    /// Per-kind exit-code overrides keyed by kind name.
    pub exit_codes: ExitCodes,
    /// Default per-handler hook timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_timeout_ms: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bin: String::new(),
            plugins: Vec::new(),
            flexible_taxonomy: false,
            topic_separator: default_separator(),
            exit_codes: ExitCodes::default(),
            hook_timeout_ms: None,
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    )
}

impl RuntimeConfig {
    /// Loads and checks a configuration file.
    ///
    /// # Errors
    ///
    /// I/O and parse errors, or [`CacheError::InvalidConfig`] for an
    /// unsupported topic separator.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(std::fs::File::open(path)?);
        let config: Self = if is_yaml(path) {
            serde_yaml::from_reader(reader)?
        } else {
            serde_json::from_reader(reader)?
        };
        config.check()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let writer = BufWriter::new(std::fs::File::create(path)?);
        if is_yaml(path) {
            serde_yaml::to_writer(writer, self)?;
        } else {
            serde_json::to_writer_pretty(writer, self)?;
        }
        Ok(())
    }

    /// Rejects values the runtime cannot honor. Unknown exit-code keys are
    /// only logged.
    pub fn check(&self) -> Result<()> {
        if !matches!(self.topic_separator, ':' | ' ') {
            return Err(CacheError::InvalidConfig(format!(
                "topic_separator must be ':' or ' ', got {:?}",
                self.topic_separator
            )));
        }
        let unknown = self.exit_codes.unknown_keys();
        if !unknown.is_empty() {
            warn!(keys = ?unknown, "Ignoring unknown exit code kinds");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use command_runtime_core::ErrorKind;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.topic_separator, ':');
        assert!(!config.flexible_taxonomy);
        assert!(config.exit_codes.is_empty());
        config.check().unwrap();
    }

    #[test]
    fn test_exit_codes_deserialize() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"exit_codes": {"requiredArgs": 105}}"#).unwrap();
        assert_eq!(config.exit_codes.exit_for(ErrorKind::RequiredArgs), 105);
        assert_eq!(config.exit_codes.exit_for(ErrorKind::UnexpectedArgs), 2);
    }

    #[test]
    fn test_bad_separator() {
        let config = RuntimeConfig {
            topic_separator: '/',
            ..Default::default()
        };
        assert!(matches!(config.check(), Err(CacheError::InvalidConfig(_))));
    }
}
