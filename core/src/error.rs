//! Kind-tagged runtime errors and the exit-code override table.
//!
//! Every error the parser, validator, index and dispatcher surface is a
//! [`CliError`] carrying its [`ErrorKind`], a stable machine-readable `code`
//! and the process `exit` code. The exit code is looked up in an
//! [`ExitCodes`] table when the error is built, so the CLI boundary never
//! has to classify errors itself.
//!
//! # Examples
//!
//! ```
//! use command_runtime_core::{CliError, ErrorKind, ExitCodes};
//!
//! let codes = ExitCodes::new().with(ErrorKind::RequiredArgs, 105);
//! let err = CliError::new(ErrorKind::RequiredArgs, "Missing 1 required arg", &codes);
//! assert_eq!(err.exit, 105);
//! assert_eq!(err.code, "REQUIRED_ARGS");
//!
//! let err = CliError::new(ErrorKind::RequiredArgs, "Missing 1 required arg", &ExitCodes::new());
//! assert_eq!(err.exit, 2);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy shared across the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The command schema itself is malformed (required arg after optional).
    InvalidArgsSpec,
    /// One or more required positional args have no value.
    RequiredArgs,
    /// More positional args than declared under strict mode.
    UnexpectedArgs,
    /// A required flag has no value.
    RequiredFlag,
    /// A flag value is not in the flag's `options`.
    FlagInvalidOption,
    /// An arg value is not in the arg's `options`.
    ArgInvalidOption,
    /// dependsOn / exclusive / exactlyOne / relationship violations.
    FailedFlagValidation,
    /// An unrecognized `--flag` was supplied.
    NonExistentFlag,
    /// An option flag appeared last with no value after it.
    FlagValueMissing,
    /// A non-`multiple` option flag was supplied twice.
    FlagRepeated,
    /// A flag or arg `parse` function rejected its input.
    FailedParse,
    /// No command resolves for the typed id.
    CommandNotFound,
    /// The command implementation could not be loaded.
    ModuleLoad,
    /// A hook handler did not finish within its timeout.
    HookTimeout,
    /// Anything else.
    Runtime,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 15] = [
        Self::InvalidArgsSpec,
        Self::RequiredArgs,
        Self::UnexpectedArgs,
        Self::RequiredFlag,
        Self::FlagInvalidOption,
        Self::ArgInvalidOption,
        Self::FailedFlagValidation,
        Self::NonExistentFlag,
        Self::FlagValueMissing,
        Self::FlagRepeated,
        Self::FailedParse,
        Self::CommandNotFound,
        Self::ModuleLoad,
        Self::HookTimeout,
        Self::Runtime,
    ];

    /// camelCase name used as the key in [`ExitCodes`].
    pub fn name(self) -> &'static str {
        match self {
            Self::InvalidArgsSpec => "invalidArgsSpec",
            Self::RequiredArgs => "requiredArgs",
            Self::UnexpectedArgs => "unexpectedArgs",
            Self::RequiredFlag => "requiredFlag",
            Self::FlagInvalidOption => "flagInvalidOption",
            Self::ArgInvalidOption => "argInvalidOption",
            Self::FailedFlagValidation => "failedFlagValidation",
            Self::NonExistentFlag => "nonExistentFlag",
            Self::FlagValueMissing => "flagValueMissing",
            Self::FlagRepeated => "flagRepeated",
            Self::FailedParse => "failedParse",
            Self::CommandNotFound => "commandNotFound",
            Self::ModuleLoad => "moduleLoad",
            Self::HookTimeout => "hookTimeout",
            Self::Runtime => "runtime",
        }
    }

    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidArgsSpec => "INVALID_ARGS_SPEC",
            Self::RequiredArgs => "REQUIRED_ARGS",
            Self::UnexpectedArgs => "UNEXPECTED_ARGS",
            Self::RequiredFlag => "REQUIRED_FLAG",
            Self::FlagInvalidOption => "FLAG_INVALID_OPTION",
            Self::ArgInvalidOption => "ARG_INVALID_OPTION",
            Self::FailedFlagValidation => "FAILED_FLAG_VALIDATION",
            Self::NonExistentFlag => "NONEXISTENT_FLAG",
            Self::FlagValueMissing => "FLAG_VALUE_MISSING",
            Self::FlagRepeated => "FLAG_REPEATED",
            Self::FailedParse => "FAILED_PARSE",
            Self::CommandNotFound => "COMMAND_NOT_FOUND",
            Self::ModuleLoad => "MODULE_LOAD",
            Self::HookTimeout => "HOOK_TIMEOUT",
            Self::Runtime => "RUNTIME",
        }
    }

    /// Exit code used when no override is configured.
    pub fn default_exit(self) -> i32 {
        match self {
            Self::CommandNotFound | Self::ModuleLoad | Self::HookTimeout | Self::Runtime => 1,
            _ => 2,
        }
    }

    /// Looks a kind up by its camelCase name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Host-level exit-code overrides keyed by [`ErrorKind::name`].
///
/// Unknown keys are kept (a host may configure kinds this crate does not
/// raise) and simply never match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExitCodes(HashMap<String, i32>);

impl ExitCodes {
    /// Empty table; every kind uses its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override.
    pub fn with(mut self, kind: ErrorKind, exit: i32) -> Self {
        self.0.insert(kind.name().to_string(), exit);
        self
    }

    /// Adds an override by raw kind name.
    pub fn insert(&mut self, name: impl Into<String>, exit: i32) {
        self.0.insert(name.into(), exit);
    }

    /// Exit code for `kind`: the override if present, else the default.
    pub fn exit_for(&self, kind: ErrorKind) -> i32 {
        self.0
            .get(kind.name())
            .copied()
            .unwrap_or_else(|| kind.default_exit())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Override keys that do not name a known kind.
    pub fn unknown_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .0
            .keys()
            .map(String::as_str)
            .filter(|k| ErrorKind::from_name(k).is_none())
            .collect();
        keys.sort_unstable();
        keys
    }
}

/// Structured error surfaced to the CLI boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CliError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: String,
    pub exit: i32,
}

impl CliError {
    /// Builds an error, consulting `exit_codes` for the exit code.
    pub fn new(kind: ErrorKind, message: impl Into<String>, exit_codes: &ExitCodes) -> Self {
        Self {
            kind,
            message: message.into(),
            code: kind.code().to_string(),
            exit: exit_codes.exit_for(kind),
        }
    }

    /// Builds an error with the kind's default exit code.
    pub fn with_default_exit(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, &ExitCodes::default())
    }

    /// Uncategorized runtime error (exit 1 unless overridden).
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::with_default_exit(ErrorKind::Runtime, message)
    }

    /// Re-applies an override table, e.g. when an error produced by a
    /// plugin crosses into the dispatcher.
    pub fn reexit(mut self, exit_codes: &ExitCodes) -> Self {
        self.exit = exit_codes.exit_for(self.kind);
        self
    }
}

/// Convenience alias for results with [`CliError`].
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_exit_codes() {
        assert_eq!(ErrorKind::RequiredArgs.default_exit(), 2);
        assert_eq!(ErrorKind::FailedFlagValidation.default_exit(), 2);
        assert_eq!(ErrorKind::CommandNotFound.default_exit(), 1);
        assert_eq!(ErrorKind::Runtime.default_exit(), 1);
    }

    #[test]
    fn test_names_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_exit_codes_deserialize_from_map() {
        let codes: ExitCodes =
            serde_json::from_str(r#"{"requiredArgs": 105, "unexpectedArgs": 106, "bogus": 9}"#)
                .unwrap();
        assert_eq!(codes.exit_for(ErrorKind::RequiredArgs), 105);
        assert_eq!(codes.exit_for(ErrorKind::UnexpectedArgs), 106);
        assert_eq!(codes.exit_for(ErrorKind::RequiredFlag), 2);
        assert_eq!(codes.unknown_keys(), vec!["bogus"]);
    }

    #[test]
    fn test_reexit_applies_override() {
        let err = CliError::runtime("boom");
        assert_eq!(err.exit, 1);
        let err = err.reexit(&ExitCodes::new().with(ErrorKind::Runtime, 70));
        assert_eq!(err.exit, 70);
        assert_eq!(err.to_string(), "boom");
    }
}
