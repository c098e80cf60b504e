//! Plugins backed only by cached manifests.
//!
//! Without the plugins' real implementations the best a command can do is
//! report what it would have received, so every command echoes its parsed
//! input.

use std::sync::Arc;

use async_trait::async_trait;
use command_runtime_core::{CliError, CommandDescriptor, ErrorKind, PluginRecord, Result};
use command_runtime_dispatch::{Command, Plugin};
use command_runtime_parser::{InputSchema, ParseOutput};
use serde_json::Value;

pub struct ManifestPlugin {
    record: PluginRecord,
}

impl ManifestPlugin {
    pub fn new(record: PluginRecord) -> Self {
        Self { record }
    }
}

#[async_trait]
impl Plugin for ManifestPlugin {
    fn record(&self) -> &PluginRecord {
        &self.record
    }

    async fn load_command(&self, id: &str) -> Result<Arc<dyn Command>> {
        let descriptor = self.record.find_command(id).ok_or_else(|| {
            CliError::with_default_exit(
                ErrorKind::ModuleLoad,
                format!("command {id} is not in the manifest of {}", self.record.name),
            )
        })?;
        Ok(Arc::new(EchoCommand {
            descriptor: descriptor.clone(),
        }))
    }
}

struct EchoCommand {
    descriptor: CommandDescriptor,
}

#[async_trait]
impl Command for EchoCommand {
    fn input(&self) -> InputSchema {
        InputSchema::from_descriptor(&self.descriptor)
    }

    async fn run(&self, parsed: ParseOutput) -> Result<Value> {
        serde_json::to_value(&parsed).map_err(|e| CliError::runtime(e.to_string()))
    }
}
