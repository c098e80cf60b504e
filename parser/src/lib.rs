//! Flag and argument parsing for plugin commands.
//!
//! Parsing happens in two phases:
//!
//! 1. [`Parser::parse`] scans the token list, resolves values against an
//!    [`InputSchema`] (env fallbacks, stdin, defaults, `parse` functions)
//!    and returns a [`ParseOutput`].
//! 2. [`validate`] runs the cross-field checks (required, exclusive,
//!    `depends_on`, `exactly_one`, relationships) on that output.
//!
//! Both phases raise [`command_runtime_core::CliError`] tagged with an
//! [`ErrorKind`](command_runtime_core::ErrorKind) and an exit code taken
//! from an injected [`ExitCodes`](command_runtime_core::ExitCodes) table.
//!
//! # Example
//!
//! ```
//! use command_runtime_core::{ErrorKind, FlagDescriptor};
//! use command_runtime_parser::{InputSchema, Parser, Validator};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let input = InputSchema::new()
//!     .flag(FlagDescriptor::option("region").required());
//!
//! let out = Parser::new(&input).without_stdin().parse::<&str>(&[]).await.unwrap();
//! let err = Validator::new(&input, &out).run().await.unwrap_err();
//! assert_eq!(err.kind, ErrorKind::RequiredFlag);
//! assert_eq!(err.exit, 2);
//! # });
//! ```

mod input;
mod output;
mod parse;
mod scan;
mod source;
mod validate;

pub use input::{
    Arg, DefaultFn, Flag, FlagRelationship, FnError, InputSchema, ParseContext, ParseFn, Related,
    WhenFn,
};
pub use output::{Metadata, ParseOutput, Token, ValueMetadata};
pub use parse::{Parser, parse};
pub use source::{
    DEFAULT_STDIN_TIMEOUT, EnvSource, NoStdin, ProcessEnv, ProcessStdin, StaticStdin, StdinSource,
};
pub use validate::{Validator, validate};
