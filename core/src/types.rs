//! Descriptor type definitions for commands contributed by plugins.
//!
//! This module defines the metadata a plugin publishes about each of its
//! commands. The types are designed for serialization with [`serde`] so a
//! plugin's command list can be cached as JSON and reloaded without
//! loading any command implementation.
//!
//! Descriptors are immutable once a plugin's manifest has been parsed.
//! Function-valued behaviour (custom `parse`, computed defaults, relationship
//! predicates) lives in the parser crate's runtime input schema, not here.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version of the manifest contract (semver).
///
/// Embedded in every [`ManifestBundle`](crate::ManifestBundle) and
/// [`PluginManifest`](crate::PluginManifest) to track compatibility.
pub const MANIFEST_CONTRACT_VERSION: &str = "1.0.0";

/// Provenance class of a plugin.
///
/// Core plugins ship with the root program and always outrank the other
/// classes when two plugins provide the same command.
///
/// # Examples
///
/// ```
/// use command_runtime_core::PluginType;
///
/// assert_eq!(PluginType::default(), PluginType::Core);
/// assert!(PluginType::Core.is_core());
/// assert!(!PluginType::Link.is_core());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    /// Declared by the root program (the default).
    #[default]
    Core,
    /// Installed by the user.
    User,
    /// Linked from a local checkout.
    Link,
    /// Loaded from the root program's dev dependencies.
    Dev,
}

impl PluginType {
    /// Returns `true` for [`PluginType::Core`].
    pub fn is_core(self) -> bool {
        self == Self::Core
    }

    /// Lowercase name as it appears in manifests.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::User => "user",
            Self::Link => "link",
            Self::Dev => "dev",
        }
    }
}

/// Whether a flag takes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    /// Presence flag; consumes no value token.
    #[default]
    Boolean,
    /// Takes a value from the next token or after `=`.
    Option,
}

/// Relationship type between an owner flag and a list of other flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    /// Every active flag must be present.
    All,
    /// At least one active flag must be present.
    Some,
    /// No active flag may be present.
    None,
}

/// A relationship as recorded in a manifest.
///
/// Manifests only carry flag names; conditional (`when`) entries are a
/// runtime concern of the parser crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Relationship type.
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    /// Names of the related flags.
    pub flags: Vec<String>,
}

impl Relationship {
    /// Creates a relationship over the given flag names.
    pub fn new<I, S>(kind: RelationshipKind, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            flags: flags.into_iter().map(Into::into).collect(),
        }
    }
}

/// Descriptor for a named flag.
///
/// Use [`boolean`](FlagDescriptor::boolean) or
/// [`option`](FlagDescriptor::option) and chain builder methods.
///
/// # Examples
///
/// ```
/// use command_runtime_core::{FlagDescriptor, FlagKind};
///
/// let force = FlagDescriptor::boolean("force").with_char('f').allow_no();
/// assert_eq!(force.kind, FlagKind::Boolean);
/// assert_eq!(force.usage(), "-f, --[no-]force");
///
/// let format = FlagDescriptor::option("format").with_options(["json", "yaml"]);
/// assert_eq!(format.usage(), "--format=<option>");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagDescriptor {
    /// Long name, without leading dashes.
    pub name: String,
    /// `boolean` or `option`.
    #[serde(rename = "type")]
    pub kind: FlagKind,
    /// Single-letter alias (`-c`).
    #[serde(rename = "char", skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    /// Additional long names.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Additional single-letter names.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub char_aliases: Vec<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub multiple: bool,
    /// Splits each supplied value of a `multiple` option.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    /// Static default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Closed set of legal values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Environment variable consulted when no value was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclusive: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exactly_one: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
    /// Enables `--no-<name>` negation. Boolean flags only.
    pub allow_no: bool,
    pub hidden: bool,
}

impl FlagDescriptor {
    /// Creates a boolean flag.
    pub fn boolean(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FlagKind::Boolean,
            ..Default::default()
        }
    }

    /// Creates a flag that takes a value.
    pub fn option(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FlagKind::Option,
            ..Default::default()
        }
    }

    pub fn with_char(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn with_char_alias(mut self, short: char) -> Self {
        self.char_aliases.push(short);
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Marks the flag as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the flag as accepting multiple occurrences.
    pub fn allow_multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_env(mut self, var: &str) -> Self {
        self.env = Some(var.to_string());
        self
    }

    pub fn exclusive_with<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusive.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn depends_on<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn exactly_one<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exactly_one.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Enables `--no-<name>`.
    pub fn allow_no(mut self) -> Self {
        self.allow_no = true;
        self
    }

    /// Returns `true` for option flags.
    pub fn takes_value(&self) -> bool {
        self.kind == FlagKind::Option
    }

    /// Every name this flag answers to as `--<name>`.
    pub fn long_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Every name this flag answers to as `-<c>`.
    pub fn short_names(&self) -> impl Iterator<Item = char> + '_ {
        self.short.into_iter().chain(self.char_aliases.iter().copied())
    }

    /// Usage string used in error messages (e.g. `-o, --output=<value>`).
    pub fn usage(&self) -> String {
        let long = if self.kind == FlagKind::Boolean && self.allow_no {
            format!("--[no-]{}", self.name)
        } else {
            format!("--{}", self.name)
        };
        let mut usage = match self.short {
            Some(c) => format!("-{c}, {long}"),
            None => long,
        };
        if self.kind == FlagKind::Option {
            if self.options.is_some() {
                usage.push_str("=<option>");
            } else {
                usage.push_str("=<value>");
            }
        }
        usage
    }
}

/// Descriptor for a positional argument. Order within a command is
/// significant.
///
/// # Examples
///
/// ```
/// use command_runtime_core::ArgDescriptor;
///
/// let file = ArgDescriptor::required("file");
/// assert!(file.required);
///
/// let mode = ArgDescriptor::optional("mode").with_options(["fast", "slow"]);
/// assert!(!mode.required);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Never fill this arg from piped stdin.
    pub ignore_stdin: bool,
    pub hidden: bool,
}

impl ArgDescriptor {
    /// Creates a required positional argument.
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: true,
            ..Default::default()
        }
    }

    /// Creates an optional positional argument.
    pub fn optional(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn ignore_stdin(mut self) -> Self {
        self.ignore_stdin = true;
        self
    }
}

fn default_strict() -> bool {
    true
}

/// Metadata for one command as contributed by a plugin.
///
/// `plugin_name`, `plugin_alias` and `plugin_type` are stamped by
/// [`PluginRecord::with_command`] so a descriptor can always be traced back
/// to its owner.
///
/// # Examples
///
/// ```
/// use command_runtime_core::*;
///
/// let cmd = CommandDescriptor::new("deploy:app")
///     .with_alias("app:deploy")
///     .with_flag(FlagDescriptor::option("region").with_char('r'))
///     .with_arg(ArgDescriptor::required("name"));
///
/// assert_eq!(cmd.segments(), vec!["deploy", "app"]);
/// assert_eq!(cmd.ids().collect::<Vec<_>>(), vec!["deploy:app", "app:deploy"]);
/// assert!(cmd.flag("region").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Colon-delimited topic path.
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub plugin_name: Option<String>,
    #[serde(default)]
    pub plugin_alias: Option<String>,
    #[serde(default)]
    pub plugin_type: Option<PluginType>,
    /// Reject positional arguments beyond the declared ones.
    #[serde(default = "default_strict")]
    pub strict: bool,
    #[serde(default)]
    pub hidden: bool,
    /// Flags keyed by name, in declaration order.
    #[serde(default)]
    pub flags: IndexMap<String, FlagDescriptor>,
    /// Positional arguments in order.
    #[serde(default)]
    pub args: Vec<ArgDescriptor>,
    /// Order-preserving segment combinations of the id and aliases
    /// (populated only in flexible-taxonomy mode).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permutations: Vec<String>,
}

impl CommandDescriptor {
    /// Creates a descriptor with the given id; `strict` defaults to `true`.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            aliases: Vec::new(),
            description: None,
            plugin_name: None,
            plugin_alias: None,
            plugin_type: None,
            strict: true,
            hidden: false,
            flags: IndexMap::new(),
            args: Vec::new(),
            permutations: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Adds a flag, replacing any previous flag with the same name.
    pub fn with_flag(mut self, flag: FlagDescriptor) -> Self {
        self.flags.insert(flag.name.clone(), flag);
        self
    }

    pub fn with_arg(mut self, arg: ArgDescriptor) -> Self {
        self.args.push(arg);
        self
    }

    /// Disables strict positional checking.
    pub fn non_strict(mut self) -> Self {
        self.strict = false;
        self
    }

    /// Colon-split segments of the id.
    pub fn segments(&self) -> Vec<&str> {
        self.id.split(':').collect()
    }

    /// The id followed by every alias.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Finds a declared flag by name.
    pub fn flag(&self, name: &str) -> Option<&FlagDescriptor> {
        self.flags.get(name)
    }

    /// Returns `true` if the owning plugin is a core plugin.
    pub fn is_core(&self) -> bool {
        self.plugin_type.is_some_and(PluginType::is_core)
    }
}

/// A plugin and the commands it contributes.
///
/// # Examples
///
/// ```
/// use command_runtime_core::*;
///
/// let plugin = PluginRecord::new("@acme/plugin-deploy", PluginType::User)
///     .with_alias("deploy")
///     .with_command(CommandDescriptor::new("deploy:app"));
///
/// let cmd = &plugin.commands[0];
/// assert_eq!(cmd.plugin_name.as_deref(), Some("@acme/plugin-deploy"));
/// assert_eq!(cmd.plugin_alias.as_deref(), Some("deploy"));
/// assert_eq!(cmd.plugin_type, Some(PluginType::User));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub name: String,
    /// Name under which the root program lists this plugin. Defaults to
    /// `name`.
    #[serde(default)]
    pub alias: String,
    #[serde(rename = "type", default)]
    pub plugin_type: PluginType,
    #[serde(default)]
    pub commands: Vec<CommandDescriptor>,
}

impl PluginRecord {
    pub fn new(name: &str, plugin_type: PluginType) -> Self {
        Self {
            name: name.to_string(),
            alias: name.to_string(),
            plugin_type,
            commands: Vec::new(),
        }
    }

    /// Sets the alias and re-stamps already added commands.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = alias.to_string();
        self.stamp_commands();
        self
    }

    /// Adds a command, stamping it with this plugin's identity.
    pub fn with_command(mut self, mut command: CommandDescriptor) -> Self {
        self.stamp(&mut command);
        self.commands.push(command);
        self
    }

    /// Stamps plugin identity onto every command.
    ///
    /// Manifests loaded from disk may omit the per-command plugin fields;
    /// loaders call this after deserializing. An empty alias falls back to
    /// the plugin name.
    pub fn stamp_commands(&mut self) {
        if self.alias.is_empty() {
            self.alias = self.name.clone();
        }
        let mut commands = std::mem::take(&mut self.commands);
        for command in &mut commands {
            self.stamp(command);
        }
        self.commands = commands;
    }

    fn stamp(&self, command: &mut CommandDescriptor) {
        command.plugin_name = Some(self.name.clone());
        command.plugin_alias = Some(if self.alias.is_empty() {
            self.name.clone()
        } else {
            self.alias.clone()
        });
        command.plugin_type = Some(self.plugin_type);
    }

    /// Finds a command by exact id or alias.
    pub fn find_command(&self, id: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|c| c.ids().any(|i| i == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_usage_strings() {
        assert_eq!(FlagDescriptor::boolean("verbose").usage(), "--verbose");
        assert_eq!(
            FlagDescriptor::option("output").with_char('o').usage(),
            "-o, --output=<value>"
        );
        assert_eq!(
            FlagDescriptor::boolean("color").allow_no().usage(),
            "--[no-]color"
        );
    }

    #[test]
    fn test_flag_names_include_aliases() {
        let flag = FlagDescriptor::option("target")
            .with_char('t')
            .with_alias("dest")
            .with_char_alias('d');
        assert_eq!(flag.long_names().collect::<Vec<_>>(), vec!["target", "dest"]);
        assert_eq!(flag.short_names().collect::<Vec<_>>(), vec!['t', 'd']);
    }

    #[test]
    fn test_descriptor_deserializes_with_defaults() {
        let json = r#"{
            "id": "foo:bar",
            "flags": {
                "force": {"name": "force", "type": "boolean", "char": "f"},
                "name": {"name": "name", "type": "option", "options": ["a", "b"]}
            },
            "args": [{"name": "file", "required": true}]
        }"#;
        let cmd: CommandDescriptor = serde_json::from_str(json).unwrap();
        assert!(cmd.strict);
        assert_eq!(cmd.flags.keys().collect::<Vec<_>>(), vec!["force", "name"]);
        assert_eq!(cmd.flag("force").unwrap().short, Some('f'));
        assert_eq!(cmd.flag("name").unwrap().kind, FlagKind::Option);
        assert!(cmd.args[0].required);
    }

    #[test]
    fn test_plugin_alias_restamps_commands() {
        let plugin = PluginRecord::new("@acme/plugin-a", PluginType::Link)
            .with_command(CommandDescriptor::new("a"))
            .with_alias("a-plugin");
        assert_eq!(plugin.commands[0].plugin_alias.as_deref(), Some("a-plugin"));
        assert!(!plugin.commands[0].is_core());
    }

    #[test]
    fn test_find_command_by_alias() {
        let plugin = PluginRecord::new("root", PluginType::Core)
            .with_command(CommandDescriptor::new("foo:bar").with_alias("fb"));
        assert_eq!(plugin.find_command("fb").unwrap().id, "foo:bar");
        assert!(plugin.find_command("bar").is_none());
    }
}
