//! Authoring-time validation of descriptors.
//!
//! Catches malformed command metadata (duplicate flags, bad short names,
//! references to undeclared flags, required args after optional ones)
//! before it reaches the index or the parser.
//!
//! # Examples
//!
//! ```
//! use command_runtime_core::*;
//!
//! let cmd = CommandDescriptor::new("deploy")
//!     .with_flag(FlagDescriptor::boolean("force").with_char('f'));
//! assert!(validate_command(&cmd).is_empty());
//!
//! // Invalid: required arg declared after an optional one
//! let bad = CommandDescriptor::new("deploy")
//!     .with_arg(ArgDescriptor::optional("env"))
//!     .with_arg(ArgDescriptor::required("app"));
//! assert!(!validate_command(&bad).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{CommandDescriptor, FlagKind, PluginRecord};

/// Descriptor validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Command id is empty or has an empty segment.
    #[error("invalid command id: {0:?}")]
    InvalidCommandId(String),
    /// A plugin declares the same id or alias twice.
    #[error("duplicate command in plugin {plugin}: {id}")]
    DuplicateCommand { plugin: String, id: String },
    /// A flag has an empty name.
    #[error("flag name cannot be empty in {0}")]
    EmptyFlagName(String),
    /// Flag map key and flag name disagree.
    #[error("flag key {key} does not match flag name {name}")]
    FlagKeyMismatch { key: String, name: String },
    /// Two flags in one command share a long name or char.
    #[error("duplicate flag in {command}: {flag}")]
    DuplicateFlag { command: String, flag: String },
    /// `allow_no` on an option flag, or `options` on a boolean flag.
    #[error("flag --{0} mixes boolean and option settings")]
    FlagKindMismatch(String),
    /// A relationship names a flag the command does not declare.
    #[error("flag --{flag} references unknown flag --{target}")]
    UnknownFlagReference { flag: String, target: String },
    /// A required arg follows an optional one.
    #[error("required arg {0} follows an optional arg")]
    RequiredArgAfterOptional(String),
    /// Two args share a name.
    #[error("duplicate arg in {command}: {arg}")]
    DuplicateArg { command: String, arg: String },
}

/// Validates every command of a plugin and rejects duplicate ids.
///
/// Stops at the first failing command, like [`validate_command`].
pub fn validate_plugin(plugin: &PluginRecord) -> Vec<SchemaError> {
    let mut errors = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for command in &plugin.commands {
        for id in command.ids() {
            if !seen.insert(id) {
                errors.push(SchemaError::DuplicateCommand {
                    plugin: plugin.name.clone(),
                    id: id.to_string(),
                });
                return errors;
            }
        }
        errors.extend(validate_command(command));
        if !errors.is_empty() {
            return errors;
        }
    }

    errors
}

/// Validates a single command descriptor, returning at the first problem.
pub fn validate_command(command: &CommandDescriptor) -> Vec<SchemaError> {
    let mut errors = Vec::new();

    for id in command.ids() {
        if id.trim().is_empty() || id.split(':').any(|s| s.trim().is_empty()) {
            errors.push(SchemaError::InvalidCommandId(id.to_string()));
            return errors;
        }
    }

    errors.extend(validate_flags(command));
    if !errors.is_empty() {
        return errors;
    }

    errors.extend(validate_args(command));
    errors
}

fn validate_flags(command: &CommandDescriptor) -> Vec<SchemaError> {
    let mut errors = Vec::new();
    let mut long_seen: HashSet<&str> = HashSet::new();
    let mut short_seen: HashSet<char> = HashSet::new();

    for (key, flag) in &command.flags {
        if flag.name.trim().is_empty() {
            errors.push(SchemaError::EmptyFlagName(command.id.clone()));
            return errors;
        }
        if key != &flag.name {
            errors.push(SchemaError::FlagKeyMismatch {
                key: key.clone(),
                name: flag.name.clone(),
            });
            return errors;
        }
        for long in flag.long_names() {
            if !long_seen.insert(long) {
                errors.push(SchemaError::DuplicateFlag {
                    command: command.id.clone(),
                    flag: format!("--{long}"),
                });
                return errors;
            }
        }
        for short in flag.short_names() {
            if !short_seen.insert(short) {
                errors.push(SchemaError::DuplicateFlag {
                    command: command.id.clone(),
                    flag: format!("-{short}"),
                });
                return errors;
            }
        }
        let mismatched = match flag.kind {
            FlagKind::Boolean => flag.options.is_some() || flag.multiple,
            FlagKind::Option => flag.allow_no,
        };
        if mismatched {
            errors.push(SchemaError::FlagKindMismatch(flag.name.clone()));
            return errors;
        }

        let references = flag
            .exclusive
            .iter()
            .chain(&flag.depends_on)
            .chain(&flag.exactly_one)
            .chain(flag.relationships.iter().flat_map(|r| &r.flags));
        for target in references {
            if !command.flags.contains_key(target) {
                errors.push(SchemaError::UnknownFlagReference {
                    flag: flag.name.clone(),
                    target: target.clone(),
                });
                return errors;
            }
        }
    }

    errors
}

fn validate_args(command: &CommandDescriptor) -> Vec<SchemaError> {
    let mut errors = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut has_optional = false;

    for arg in &command.args {
        if !seen.insert(arg.name.as_str()) {
            errors.push(SchemaError::DuplicateArg {
                command: command.id.clone(),
                arg: arg.name.clone(),
            });
            return errors;
        }
        if !arg.required {
            has_optional = true;
        } else if has_optional {
            errors.push(SchemaError::RequiredArgAfterOptional(arg.name.clone()));
            return errors;
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use crate::{ArgDescriptor, FlagDescriptor, PluginType};

    use super::*;

    #[test]
    fn test_validate_plugin_rejects_duplicate_alias() {
        let plugin = PluginRecord::new("root", PluginType::Core)
            .with_command(CommandDescriptor::new("foo:bar"))
            .with_command(CommandDescriptor::new("baz").with_alias("foo:bar"));

        let errors = validate_plugin(&plugin);
        assert_eq!(
            errors,
            vec![SchemaError::DuplicateCommand {
                plugin: "root".to_string(),
                id: "foo:bar".to_string(),
            }]
        );
    }

    #[test]
    fn test_validate_command_rejects_empty_segment() {
        let errors = validate_command(&CommandDescriptor::new("foo::bar"));
        assert_eq!(
            errors,
            vec![SchemaError::InvalidCommandId("foo::bar".to_string())]
        );
    }

    #[test]
    fn test_validate_command_rejects_duplicate_char() {
        let cmd = CommandDescriptor::new("x")
            .with_flag(FlagDescriptor::boolean("all").with_char('a'))
            .with_flag(FlagDescriptor::boolean("append").with_char('a'));
        assert_eq!(
            validate_command(&cmd),
            vec![SchemaError::DuplicateFlag {
                command: "x".to_string(),
                flag: "-a".to_string(),
            }]
        );
    }

    #[test]
    fn test_validate_command_rejects_allow_no_on_option() {
        let cmd = CommandDescriptor::new("x").with_flag(FlagDescriptor::option("name").allow_no());
        assert_eq!(
            validate_command(&cmd),
            vec![SchemaError::FlagKindMismatch("name".to_string())]
        );
    }

    #[test]
    fn test_validate_command_rejects_unknown_reference() {
        let cmd = CommandDescriptor::new("x")
            .with_flag(FlagDescriptor::boolean("a").exclusive_with(["b"]));
        assert_eq!(
            validate_command(&cmd),
            vec![SchemaError::UnknownFlagReference {
                flag: "a".to_string(),
                target: "b".to_string(),
            }]
        );
    }

    #[test]
    fn test_validate_command_rejects_required_after_optional() {
        let cmd = CommandDescriptor::new("x")
            .with_arg(ArgDescriptor::optional("one"))
            .with_arg(ArgDescriptor::required("two"));
        assert_eq!(
            validate_command(&cmd),
            vec![SchemaError::RequiredArgAfterOptional("two".to_string())]
        );
    }

    #[test]
    fn test_validate_command_accepts_valid_command() {
        let cmd = CommandDescriptor::new("deploy:app")
            .with_alias("app:deploy")
            .with_flag(FlagDescriptor::option("region").with_char('r').required())
            .with_flag(FlagDescriptor::boolean("dry-run").exclusive_with(["region"]))
            .with_arg(ArgDescriptor::required("name"))
            .with_arg(ArgDescriptor::optional("tag"));
        assert!(validate_command(&cmd).is_empty());
    }
}
