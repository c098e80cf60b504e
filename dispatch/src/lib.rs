//! Command dispatch and the plugin hook runner.
//!
//! [`Dispatcher`] ties the other crates together: it indexes every plugin's
//! commands, resolves the typed id, loads the implementation through the
//! owning [`Plugin`], parses and validates argv against the command's
//! [`InputSchema`](command_runtime_parser::InputSchema), and runs the
//! lifecycle hooks around the command body.
//!
//! Hook failures are returned as data in a [`HookOutcome`] and only logged
//! by the pipeline. A failing command body aborts the pipeline before
//! `postrun`.

mod dispatcher;
mod hooks;
mod plugin;

pub use dispatcher::Dispatcher;
pub use hooks::{
    HookEvent, HookFailure, HookFn, HookInvocation, HookOutcome, HookRegistry, HookSuccess, hook_fn,
};
pub use plugin::{Command, Plugin, StaticPlugin};
