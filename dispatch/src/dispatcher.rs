//! The command pipeline.
//!
//! `init` → resolve → load → `prerun` → parse + validate → run → `postrun`.
//! An id that does not resolve goes to `command_not_found` instead. Under
//! flexible taxonomy a partial id matching several commands goes to
//! `command_incomplete` with the matches.

use std::sync::Arc;
use std::time::Duration;

use command_runtime_cache::RuntimeConfig;
use command_runtime_core::{CliError, CommandDescriptor, ErrorKind, Result};
use command_runtime_index::{CommandIndex, IndexOptions};
use command_runtime_parser::{
    EnvSource, NoStdin, Parser, ProcessEnv, ProcessStdin, StdinSource, Validator,
};
use indexmap::{IndexMap, IndexSet};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::hooks::{HookEvent, HookOutcome, HookRegistry};
use crate::plugin::{Command, Plugin};

/// Resolves and runs commands across a set of loaded plugins.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use command_runtime_cache::RuntimeConfig;
/// use command_runtime_core::{CommandDescriptor, FlagDescriptor, PluginRecord, PluginType, Result};
/// use command_runtime_dispatch::{Command, Dispatcher, StaticPlugin};
/// use command_runtime_parser::{InputSchema, ParseOutput};
/// use serde_json::{Value, json};
///
/// struct Hello;
///
/// #[async_trait]
/// impl Command for Hello {
///     fn input(&self) -> InputSchema {
///         InputSchema::new().flag(FlagDescriptor::option("name").with_default("world"))
///     }
///
///     async fn run(&self, parsed: ParseOutput) -> Result<Value> {
///         Ok(json!(format!("hello {}", parsed.flags["name"].as_str().unwrap_or_default())))
///     }
/// }
///
/// # tokio_test_block(async {
/// let record = PluginRecord::new("mycli", PluginType::Core)
///     .with_command(CommandDescriptor::new("hello"));
/// let plugin = StaticPlugin::new(record).command("hello", Hello);
///
/// let dispatcher = Dispatcher::new(RuntimeConfig::default(), vec![plugin])
///     .unwrap()
///     .without_stdin();
/// let result = dispatcher.run_command("hello", &["--name", "rust"]).await.unwrap();
/// assert_eq!(result, json!("hello rust"));
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(f)
/// # }
/// ```
pub struct Dispatcher {
    config: RuntimeConfig,
    index: CommandIndex,
    plugins: IndexMap<String, Arc<dyn Plugin>>,
    hooks: HookRegistry,
    env: Arc<dyn EnvSource>,
    stdin: Arc<dyn StdinSource>,
}

impl Dispatcher {
    /// Indexes the plugins' commands and collects their hooks.
    ///
    /// Plugin order is discovery order.
    ///
    /// # Errors
    ///
    /// A [`ErrorKind::Runtime`] error if the index cannot be built.
    pub fn new<P>(config: RuntimeConfig, plugins: Vec<P>) -> Result<Self>
    where
        P: Plugin + 'static,
    {
        let plugins = plugins
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn Plugin>)
            .collect();
        Self::from_plugins(config, plugins)
    }

    pub fn from_plugins(config: RuntimeConfig, plugins: Vec<Arc<dyn Plugin>>) -> Result<Self> {
        let options = IndexOptions::default()
            .core_plugins(config.plugins.iter().cloned())
            .flexible_taxonomy(config.flexible_taxonomy)
            .topic_separator(config.topic_separator)
            .exit_codes(config.exit_codes.clone());
        let records: Vec<_> = plugins.iter().map(|p| p.record().clone()).collect();
        let index = CommandIndex::build(&records, options).map_err(|e| {
            CliError::new(ErrorKind::Runtime, e.to_string(), &config.exit_codes)
        })?;

        let mut hooks = HookRegistry::new();
        for plugin in &plugins {
            for (event, handler) in plugin.hooks() {
                hooks.register_fn(plugin.name(), event, handler);
            }
        }

        info!(
            plugins = plugins.len(),
            commands = index.ids().len(),
            "Dispatcher ready"
        );
        Ok(Self {
            config,
            index,
            plugins: plugins
                .into_iter()
                .map(|p| (p.name().to_string(), p))
                .collect(),
            hooks,
            env: Arc::new(ProcessEnv),
            stdin: Arc::new(ProcessStdin::default()),
        })
    }

    pub fn env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn stdin(mut self, stdin: impl StdinSource + 'static) -> Self {
        self.stdin = Arc::new(stdin);
        self
    }

    pub fn without_stdin(self) -> Self {
        self.stdin(NoStdin)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn index(&self) -> &CommandIndex {
        &self.index
    }

    /// Registry for hooks added outside of any plugin's own list.
    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// Runs `event` with the configured default timeout.
    pub async fn run_hook(&self, event: HookEvent, payload: Value) -> HookOutcome {
        let timeout = self.config.hook_timeout_ms.map(Duration::from_millis);
        self.run_hook_with_timeout(event, payload, timeout).await
    }

    pub async fn run_hook_with_timeout(
        &self,
        event: HookEvent,
        payload: Value,
        timeout: Option<Duration>,
    ) -> HookOutcome {
        let outcome = self.hooks.run(&event, payload, timeout).await;
        for failure in &outcome.failures {
            warn!(event = %event, plugin = %failure.plugin, error = %failure.error, "Hook failed");
        }
        outcome
    }

    /// Resolves `id` and runs it with `argv`.
    ///
    /// # Errors
    ///
    /// Not-found handling as described in the module docs, then
    /// [`ErrorKind::ModuleLoad`], any parse or validation error, or the
    /// command's own error. Every error carries the configured exit code.
    pub async fn run_command<S: AsRef<str>>(&self, id: &str, argv: &[S]) -> Result<Value> {
        let argv: Vec<&str> = argv.iter().map(AsRef::as_ref).collect();
        let exit_codes = &self.config.exit_codes;

        self.run_hook(HookEvent::Init, json!({ "id": id, "argv": argv }))
            .await;

        let descriptor = match self.resolve(id, &argv) {
            Resolution::Found(descriptor) => descriptor,
            Resolution::Incomplete(matches) => {
                debug!(id, matches = matches.len(), "Command incomplete");
                let payload = json!({ "id": id, "argv": argv, "matches": matches });
                let not_found = CliError::new(
                    ErrorKind::CommandNotFound,
                    format!("command {id} not found"),
                    exit_codes,
                );
                return self
                    .fall_back(HookEvent::CommandIncomplete, payload, not_found)
                    .await;
            }
            Resolution::NotFound(not_found) => {
                let payload = json!({ "id": id, "argv": argv });
                return self
                    .fall_back(HookEvent::CommandNotFound, payload, not_found)
                    .await;
            }
        };

        let command = self.load(descriptor).await?;

        self.run_hook(
            HookEvent::Prerun,
            json!({ "id": descriptor.id, "argv": argv }),
        )
        .await;

        let input = command.input();
        let parsed = Parser::new(&input)
            .exit_codes(exit_codes)
            .env(self.env.clone())
            .stdin(self.stdin.clone())
            .parse(&argv)
            .await?;
        Validator::new(&input, &parsed)
            .exit_codes(exit_codes)
            .run()
            .await?;

        let result = command
            .run(parsed)
            .await
            .map_err(|e| e.reexit(exit_codes))?;

        self.run_hook(
            HookEvent::Postrun,
            json!({ "id": descriptor.id, "argv": argv, "result": result }),
        )
        .await;
        Ok(result)
    }

    async fn load(&self, descriptor: &CommandDescriptor) -> Result<Arc<dyn Command>> {
        let exit_codes = &self.config.exit_codes;
        let owner = descriptor.plugin_name.as_deref().unwrap_or_default();
        let plugin = self.plugins.get(owner).ok_or_else(|| {
            CliError::new(
                ErrorKind::ModuleLoad,
                format!("plugin {owner} for command {} is not loaded", descriptor.id),
                exit_codes,
            )
        })?;

        debug!(id = %descriptor.id, plugin = owner, "Loading command");
        plugin.load_command(&descriptor.id).await.map_err(|e| {
            if e.kind == ErrorKind::ModuleLoad {
                e.reexit(exit_codes)
            } else {
                CliError::new(
                    ErrorKind::ModuleLoad,
                    format!("failed to load command {}: {}", descriptor.id, e.message),
                    exit_codes,
                )
            }
        })
    }

    /// A partial id that matches several distinct commands under flexible
    /// taxonomy is incomplete, unless the flags in argv narrow it to one.
    fn resolve(&self, id: &str, argv: &[&str]) -> Resolution<'_> {
        if self.config.flexible_taxonomy && !self.index.has_exact(id) {
            let candidates = self.index.candidates(id);
            let flags = flag_names(&candidates, argv);
            let mut matches = self.index.find_matches(id, &flags);
            match matches.len() {
                0 => {
                    let mut seen = IndexSet::new();
                    let distinct: Vec<_> = candidates
                        .into_iter()
                        .filter(|c| seen.insert(c.id.as_str()))
                        .collect();
                    if distinct.len() > 1 {
                        return Resolution::Incomplete(distinct);
                    }
                }
                1 => return Resolution::Found(matches.remove(0)),
                _ => return Resolution::Incomplete(matches),
            }
        }
        match self.index.find_required(id) {
            Ok(descriptor) => Resolution::Found(descriptor),
            Err(not_found) => Resolution::NotFound(not_found),
        }
    }

    /// First hook success, else first hook failure, else `not_found`.
    async fn fall_back(
        &self,
        event: HookEvent,
        payload: Value,
        not_found: CliError,
    ) -> Result<Value> {
        let outcome = self.run_hook(event, payload).await;
        if let Some(success) = outcome.successes.into_iter().next() {
            return Ok(success.result);
        }
        if let Some(failure) = outcome.failures.into_iter().next() {
            return Err(failure.error.reexit(&self.config.exit_codes));
        }
        Err(not_found)
    }
}

/// Flag names typed in `argv`, for narrowing a partial id.
///
/// Stops at `--`. `--no-x` counts as `x` when a candidate declares `x` with
/// `allow_no`, and a short cluster contributes chars up to the first one
/// naming an option, whose value is the rest of the token.
fn flag_names(candidates: &[&CommandDescriptor], argv: &[&str]) -> Vec<String> {
    let flags = move || candidates.iter().flat_map(|c| c.flags.values());
    let mut names = Vec::new();
    for token in argv.iter().take_while(|t| **t != "--") {
        if let Some(long) = token.strip_prefix("--") {
            let name = long.split('=').next().unwrap_or_default();
            let negated = name
                .strip_prefix("no-")
                .filter(|base| flags().any(|f| f.allow_no && f.long_names().any(|n| n == *base)));
            names.push(negated.unwrap_or(name).to_string());
        } else if let Some(cluster) = token.strip_prefix('-') {
            for ch in cluster.chars().take_while(|ch| *ch != '=') {
                names.push(ch.to_string());
                if flags().any(|f| f.takes_value() && f.short_names().any(|c| c == ch)) {
                    break;
                }
            }
        }
    }
    names.retain(|n| !n.is_empty());
    names
}

enum Resolution<'a> {
    Found(&'a CommandDescriptor),
    Incomplete(Vec<&'a CommandDescriptor>),
    NotFound(CliError),
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish()
    }
}
