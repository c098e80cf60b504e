//! The seams plugins and commands implement.

use std::sync::Arc;

use async_trait::async_trait;
use command_runtime_core::{CliError, ErrorKind, PluginRecord, Result};
use command_runtime_parser::{InputSchema, ParseOutput};
use indexmap::IndexMap;
use serde_json::Value;

use crate::hooks::{HookEvent, HookFn, HookInvocation, hook_fn};

/// A loaded command implementation.
#[async_trait]
pub trait Command: Send + Sync {
    /// Runtime input schema, including any `parse`/`default` functions.
    fn input(&self) -> InputSchema;

    /// Executes the command with parsed and validated input.
    async fn run(&self, parsed: ParseOutput) -> Result<Value>;
}

/// A discovered plugin: its cached metadata plus the ability to load
/// command implementations.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn record(&self) -> &PluginRecord;

    fn name(&self) -> &str {
        &self.record().name
    }

    /// Hook handlers this plugin contributes, in registration order.
    fn hooks(&self) -> Vec<(HookEvent, HookFn)> {
        Vec::new()
    }

    /// Loads the implementation of command `id`.
    ///
    /// # Errors
    ///
    /// Implementations should report [`ErrorKind::ModuleLoad`]; the
    /// dispatcher wraps any other kind.
    async fn load_command(&self, id: &str) -> Result<Arc<dyn Command>>;
}

/// A plugin whose commands and hooks are supplied in memory.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use command_runtime_core::{PluginRecord, PluginType};
/// use command_runtime_dispatch::{HookEvent, Plugin, StaticPlugin};
/// use serde_json::Value;
///
/// let plugin = StaticPlugin::new(PluginRecord::new("mycli", PluginType::Core))
///     .hook(HookEvent::Init, |_| async { Ok(Value::Null) });
/// assert_eq!(plugin.name(), "mycli");
/// assert_eq!(plugin.hooks().len(), 1);
/// ```
#[derive(Clone)]
pub struct StaticPlugin {
    record: PluginRecord,
    commands: IndexMap<String, Arc<dyn Command>>,
    hooks: Vec<(HookEvent, HookFn)>,
}

impl StaticPlugin {
    pub fn new(record: PluginRecord) -> Self {
        Self {
            record,
            commands: IndexMap::new(),
            hooks: Vec::new(),
        }
    }

    /// Supplies the implementation of command `id`.
    pub fn command(mut self, id: &str, command: impl Command + 'static) -> Self {
        self.commands.insert(id.to_string(), Arc::new(command));
        self
    }

    pub fn hook<F, Fut>(mut self, event: HookEvent, f: F) -> Self
    where
        F: Fn(HookInvocation) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        self.hooks.push((event, hook_fn(f)));
        self
    }
}

impl std::fmt::Debug for StaticPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPlugin")
            .field("name", &self.record.name)
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[async_trait]
impl Plugin for StaticPlugin {
    fn record(&self) -> &PluginRecord {
        &self.record
    }

    fn hooks(&self) -> Vec<(HookEvent, HookFn)> {
        self.hooks.clone()
    }

    async fn load_command(&self, id: &str) -> Result<Arc<dyn Command>> {
        self.commands.get(id).cloned().ok_or_else(|| {
            CliError::with_default_exit(
                ErrorKind::ModuleLoad,
                format!("no implementation for command {id} in plugin {}", self.record.name),
            )
        })
    }
}
