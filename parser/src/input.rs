//! Runtime input schema: descriptors plus the function-valued hooks a
//! command attaches to them.
//!
//! A [`CommandDescriptor`] is plain data that can be cached; an
//! [`InputSchema`] wraps the same flag and arg descriptors together with
//! optional asynchronous `parse`, `default` and relationship `when`
//! functions. [`InputSchema::from_descriptor`] builds a function-free schema
//! so cached metadata can be parsed against directly.
//!
//! # Examples
//!
//! ```
//! use command_runtime_core::{ArgDescriptor, FlagDescriptor};
//! use command_runtime_parser::{Arg, Flag, FnError, InputSchema};
//! use serde_json::json;
//!
//! let input = InputSchema::new()
//!     .flag(Flag::new(FlagDescriptor::option("count")).parse_with(|v, _| async move {
//!         let n: i64 = v.parse()?;
//!         Ok::<_, FnError>(json!(n))
//!     }))
//!     .arg(Arg::new(ArgDescriptor::required("file")));
//!
//! assert!(input.strict);
//! assert_eq!(input.flags.len(), 1);
//! ```

use std::future::Future;
use std::sync::Arc;

use command_runtime_core::{
    ArgDescriptor, CommandDescriptor, FlagDescriptor, RelationshipKind,
};
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Error type returned by user-supplied functions.
pub type FnError = Box<dyn std::error::Error + Send + Sync>;

/// Converts a raw string into a typed value.
pub type ParseFn =
    Arc<dyn Fn(String, ParseContext) -> BoxFuture<'static, Result<Value, FnError>> + Send + Sync>;

/// Computes a default. `Ok(None)` means "no default after all".
pub type DefaultFn = Arc<
    dyn Fn(ParseContext) -> BoxFuture<'static, Result<Option<Value>, FnError>> + Send + Sync,
>;

/// Decides whether a related flag participates in a relationship.
pub type WhenFn = Arc<dyn Fn(ParseContext) -> BoxFuture<'static, bool> + Send + Sync>;

/// Values visible to `parse`, `default` and `when` functions.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Flags resolved so far.
    pub flags: Map<String, Value>,
    /// Args resolved so far.
    pub args: Map<String, Value>,
    /// The schema's opaque context object.
    pub context: Value,
}

impl ParseContext {
    /// Looks up a resolved flag.
    pub fn flag(&self, name: &str) -> Option<&Value> {
        self.flags.get(name)
    }

    /// Returns `true` if the flag resolved to JSON `true`.
    pub fn is_set(&self, name: &str) -> bool {
        self.flags.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

fn boxed_parse<F, Fut>(f: F) -> ParseFn
where
    F: Fn(String, ParseContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, FnError>> + Send + 'static,
{
    Arc::new(move |raw, ctx| Box::pin(f(raw, ctx)))
}

fn boxed_default<F, Fut>(f: F) -> DefaultFn
where
    F: Fn(ParseContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>, FnError>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// One entry of a runtime relationship.
#[derive(Clone)]
pub struct Related {
    pub name: String,
    pub when: Option<WhenFn>,
}

impl Related {
    /// An entry that is always active.
    pub fn flag(name: &str) -> Self {
        Self {
            name: name.to_string(),
            when: None,
        }
    }

    /// An entry that is active only when `when` resolves to `true`.
    pub fn when<F, Fut>(name: &str, when: F) -> Self
    where
        F: Fn(ParseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            when: Some(Arc::new(move |ctx| Box::pin(when(ctx)))),
        }
    }
}

impl From<&str> for Related {
    fn from(name: &str) -> Self {
        Self::flag(name)
    }
}

impl std::fmt::Debug for Related {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Related")
            .field("name", &self.name)
            .field("conditional", &self.when.is_some())
            .finish()
    }
}

/// A relationship with optional per-entry predicates.
#[derive(Debug, Clone)]
pub struct FlagRelationship {
    pub kind: RelationshipKind,
    pub flags: Vec<Related>,
}

/// A declared flag plus its runtime functions.
#[derive(Clone)]
pub struct Flag {
    pub descriptor: FlagDescriptor,
    pub parse: Option<ParseFn>,
    pub default_fn: Option<DefaultFn>,
    pub relationships: Vec<FlagRelationship>,
}

impl Flag {
    /// Wraps a descriptor. Its name-only relationships become
    /// unconditional runtime relationships.
    pub fn new(descriptor: FlagDescriptor) -> Self {
        let relationships = descriptor
            .relationships
            .iter()
            .map(|r| FlagRelationship {
                kind: r.kind,
                flags: r.flags.iter().map(|n| Related::flag(n)).collect(),
            })
            .collect();
        Self {
            descriptor,
            parse: None,
            default_fn: None,
            relationships,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Attaches an asynchronous `parse` function.
    pub fn parse_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, ParseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FnError>> + Send + 'static,
    {
        self.parse = Some(boxed_parse(f));
        self
    }

    /// Attaches a computed default.
    pub fn default_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ParseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, FnError>> + Send + 'static,
    {
        self.default_fn = Some(boxed_default(f));
        self
    }

    /// Adds a relationship whose entries may carry predicates.
    pub fn relationship<I, R>(mut self, kind: RelationshipKind, flags: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Related>,
    {
        self.relationships.push(FlagRelationship {
            kind,
            flags: flags.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub(crate) fn has_default(&self) -> bool {
        self.default_fn.is_some() || self.descriptor.default.is_some()
    }
}

impl From<FlagDescriptor> for Flag {
    fn from(descriptor: FlagDescriptor) -> Self {
        Self::new(descriptor)
    }
}

impl std::fmt::Debug for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flag")
            .field("descriptor", &self.descriptor)
            .field("parse", &self.parse.is_some())
            .field("default_fn", &self.default_fn.is_some())
            .field("relationships", &self.relationships)
            .finish()
    }
}

/// A declared positional argument plus its runtime functions.
#[derive(Clone)]
pub struct Arg {
    pub descriptor: ArgDescriptor,
    pub parse: Option<ParseFn>,
    pub default_fn: Option<DefaultFn>,
}

impl Arg {
    pub fn new(descriptor: ArgDescriptor) -> Self {
        Self {
            descriptor,
            parse: None,
            default_fn: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn parse_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, ParseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FnError>> + Send + 'static,
    {
        self.parse = Some(boxed_parse(f));
        self
    }

    pub fn default_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ParseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, FnError>> + Send + 'static,
    {
        self.default_fn = Some(boxed_default(f));
        self
    }
}

impl From<ArgDescriptor> for Arg {
    fn from(descriptor: ArgDescriptor) -> Self {
        Self::new(descriptor)
    }
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arg")
            .field("descriptor", &self.descriptor)
            .field("parse", &self.parse.is_some())
            .field("default_fn", &self.default_fn.is_some())
            .finish()
    }
}

/// Everything the parser and validator need to know about one command's
/// input.
#[derive(Debug, Clone)]
pub struct InputSchema {
    /// Flags in declaration order.
    pub flags: IndexMap<String, Flag>,
    /// Positional args in order.
    pub args: Vec<Arg>,
    /// Reject unknown flags and surplus positional args.
    pub strict: bool,
    /// Treat a literal `--` as the end of flag parsing.
    pub double_dash_separator: bool,
    /// Opaque value handed to every function through [`ParseContext`].
    pub context: Value,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSchema {
    pub fn new() -> Self {
        Self {
            flags: IndexMap::new(),
            args: Vec::new(),
            strict: true,
            double_dash_separator: true,
            context: Value::Null,
        }
    }

    /// Builds a function-free schema from cached metadata.
    pub fn from_descriptor(command: &CommandDescriptor) -> Self {
        Self {
            flags: command
                .flags
                .values()
                .map(|f| (f.name.clone(), Flag::new(f.clone())))
                .collect(),
            args: command.args.iter().cloned().map(Arg::new).collect(),
            strict: command.strict,
            ..Self::new()
        }
    }

    /// Adds a flag, replacing any previous flag with the same name.
    pub fn flag(mut self, flag: impl Into<Flag>) -> Self {
        let flag = flag.into();
        self.flags.insert(flag.name().to_string(), flag);
        self
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn double_dash_separator(mut self, enabled: bool) -> Self {
        self.double_dash_separator = enabled;
        self
    }

    pub fn context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Resolves a long name or long alias to the flag's canonical name.
    pub(crate) fn find_long(&self, name: &str) -> Option<&str> {
        if let Some(flag) = self.flags.get(name) {
            return Some(flag.name());
        }
        self.flags
            .values()
            .find(|f| f.descriptor.aliases.iter().any(|a| a == name))
            .map(Flag::name)
    }

    /// Resolves a char or char alias to the flag's canonical name.
    pub(crate) fn find_short(&self, short: char) -> Option<&str> {
        self.flags
            .values()
            .find(|f| f.descriptor.short_names().any(|c| c == short))
            .map(Flag::name)
    }

    /// Names of option flags that accept multiple values.
    pub(crate) fn multiple_flag_names(&self) -> Vec<&str> {
        self.flags
            .values()
            .filter(|f| f.descriptor.takes_value() && f.descriptor.multiple)
            .map(Flag::name)
            .collect()
    }
}
