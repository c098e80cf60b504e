//! Parse results.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// A raw token as classified by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Token {
    /// Input for a flag. For booleans `input` is the literal flag token and
    /// `negated` records `--no-` polarity.
    Flag {
        flag: String,
        input: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        negated: bool,
    },
    /// A positional token; `arg` is `None` past the declared args.
    Arg { arg: Option<String>, input: String },
}

impl Token {
    pub fn input(&self) -> &str {
        match self {
            Self::Flag { input, .. } | Self::Arg { input, .. } => input,
        }
    }

    pub(crate) fn is_flag(&self, name: &str) -> bool {
        matches!(self, Self::Flag { flag, .. } if flag == name)
    }
}

/// How a value came to be.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValueMetadata {
    pub set_from_default: bool,
}

/// Provenance of resolved values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub flags: IndexMap<String, ValueMetadata>,
    pub args: IndexMap<String, ValueMetadata>,
}

impl Metadata {
    pub fn flag_from_default(&self, name: &str) -> bool {
        self.flags.get(name).is_some_and(|m| m.set_from_default)
    }

    pub fn arg_from_default(&self, name: &str) -> bool {
        self.args.get(name).is_some_and(|m| m.set_from_default)
    }
}

/// Structured output of [`Parser::parse`](crate::Parser::parse).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseOutput {
    pub args: Map<String, Value>,
    pub flags: Map<String, Value>,
    /// Positional values in input order, declared args first.
    pub argv: Vec<Value>,
    pub raw: Vec<Token>,
    pub metadata: Metadata,
    /// Dash-prefixed tokens that matched no declared flag.
    pub non_existent_flags: Vec<String>,
}

impl ParseOutput {
    /// `true` if the flag has a non-null value, defaulted or not.
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.get(name).is_some_and(|v| !v.is_null())
    }

    /// `true` if the flag has a value that did not come from a default.
    pub fn has_explicit_flag(&self, name: &str) -> bool {
        self.has_flag(name) && !self.metadata.flag_from_default(name)
    }

    pub fn has_arg(&self, name: &str) -> bool {
        self.args.get(name).is_some_and(|v| !v.is_null())
    }
}
