//! Per-plugin hook registry and the concurrent hook runner.
//!
//! Handlers are registered per plugin and per event. Running an event fans
//! out across plugins concurrently; one plugin's handlers run one after
//! another in registration order. Every handler result lands in a
//! [`HookOutcome`], so a failing plugin never stops the others.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use command_runtime_dispatch::{HookEvent, HookRegistry};
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let mut hooks = HookRegistry::new();
//! hooks.register("plugin-a", HookEvent::Init, |inv| async move {
//!     Ok(json!({ "seen": inv.payload["id"] }))
//! });
//!
//! let outcome = hooks
//!     .run(&HookEvent::Init, json!({ "id": "deploy" }), Some(Duration::from_secs(1)))
//!     .await;
//! assert_eq!(outcome.successes[0].plugin, "plugin-a");
//! assert_eq!(outcome.successes[0].result, json!({ "seen": "deploy" }));
//! assert!(outcome.failures.is_empty());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(f)
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use command_runtime_core::{CliError, ErrorKind, Result};
use futures::future::{BoxFuture, join_all};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

/// Lifecycle events plus free-form custom events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookEvent {
    Init,
    Prerun,
    Postrun,
    CommandNotFound,
    /// A partial id matched several commands under flexible taxonomy.
    CommandIncomplete,
    Custom(String),
}

impl HookEvent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Init => "init",
            Self::Prerun => "prerun",
            Self::Postrun => "postrun",
            Self::CommandNotFound => "command_not_found",
            Self::CommandIncomplete => "command_incomplete",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for HookEvent {
    fn from(name: &str) -> Self {
        match name {
            "init" => Self::Init,
            "prerun" => Self::Prerun,
            "postrun" => Self::Postrun,
            "command_not_found" => Self::CommandNotFound,
            "command_incomplete" => Self::CommandIncomplete,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handler receives.
#[derive(Debug, Clone)]
pub struct HookInvocation {
    pub event: HookEvent,
    /// Name of the plugin the handler belongs to.
    pub plugin: String,
    pub payload: Value,
}

/// A registered hook handler.
pub type HookFn = Arc<dyn Fn(HookInvocation) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wraps an async closure as a [`HookFn`].
pub fn hook_fn<F, Fut>(f: F) -> HookFn
where
    F: Fn(HookInvocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |inv| Box::pin(f(inv)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct HookSuccess {
    pub plugin: String,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HookFailure {
    pub plugin: String,
    pub error: CliError,
}

/// Collected results of one event across every plugin.
///
/// Each plugin's entries keep that plugin's registration order; plugins
/// appear in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookOutcome {
    pub successes: Vec<HookSuccess>,
    pub failures: Vec<HookFailure>,
}

impl HookOutcome {
    /// `true` when no handler ran.
    pub fn is_empty(&self) -> bool {
        self.successes.is_empty() && self.failures.is_empty()
    }
}

/// Hook handlers keyed by plugin, then by event name.
#[derive(Clone, Default)]
pub struct HookRegistry {
    handlers: IndexMap<String, IndexMap<String, Vec<HookFn>>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: IndexMap<&str, IndexMap<&str, usize>> = self
            .handlers
            .iter()
            .map(|(plugin, events)| {
                let events = events.iter().map(|(e, h)| (e.as_str(), h.len())).collect();
                (plugin.as_str(), events)
            })
            .collect();
        f.debug_struct("HookRegistry").field("handlers", &counts).finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an async closure for `event` under `plugin`.
    pub fn register<F, Fut>(&mut self, plugin: &str, event: HookEvent, f: F)
    where
        F: Fn(HookInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.register_fn(plugin, event, hook_fn(f));
    }

    pub fn register_fn(&mut self, plugin: &str, event: HookEvent, handler: HookFn) {
        self.handlers
            .entry(plugin.to_string())
            .or_default()
            .entry(event.as_str().to_string())
            .or_default()
            .push(handler);
    }

    /// Number of handlers registered for `event` across all plugins.
    pub fn handler_count(&self, event: &HookEvent) -> usize {
        self.handlers
            .values()
            .filter_map(|events| events.get(event.as_str()))
            .map(Vec::len)
            .sum()
    }

    /// Plugins with at least one handler, in registration order.
    pub fn plugins(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Runs every handler registered for `event`.
    ///
    /// Plugins run concurrently. A handler that outlives `timeout` is
    /// recorded as a [`ErrorKind::HookTimeout`] failure and left running in
    /// the background. A handler that panics is recorded as a
    /// [`ErrorKind::Runtime`] failure.
    pub async fn run(&self, event: &HookEvent, payload: Value, timeout: Option<Duration>) -> HookOutcome {
        let runs: Vec<_> = self
            .handlers
            .iter()
            .filter_map(|(plugin, events)| {
                events
                    .get(event.as_str())
                    .map(|handlers| run_plugin(plugin, handlers, event, &payload, timeout))
            })
            .collect();
        debug!(event = %event, plugins = runs.len(), "Running hook");

        let mut outcome = HookOutcome::default();
        for (plugin, results) in join_all(runs).await {
            for result in results {
                match result {
                    Ok(result) => outcome.successes.push(HookSuccess {
                        plugin: plugin.clone(),
                        result,
                    }),
                    Err(error) => outcome.failures.push(HookFailure {
                        plugin: plugin.clone(),
                        error,
                    }),
                }
            }
        }
        outcome
    }
}

async fn run_plugin(
    plugin: &str,
    handlers: &[HookFn],
    event: &HookEvent,
    payload: &Value,
    timeout: Option<Duration>,
) -> (String, Vec<Result<Value>>) {
    let mut results = Vec::with_capacity(handlers.len());
    for handler in handlers {
        let fut = handler(HookInvocation {
            event: event.clone(),
            plugin: plugin.to_string(),
            payload: payload.clone(),
        });
        results.push(isolate(fut, timeout, plugin, event).await);
    }
    (plugin.to_string(), results)
}

/// Runs a handler as its own task so a panic stays a failure of this
/// plugin. With a limit, dropping the join handle on timeout detaches the
/// task instead of aborting it.
async fn isolate(
    fut: BoxFuture<'static, Result<Value>>,
    limit: Option<Duration>,
    plugin: &str,
    event: &HookEvent,
) -> Result<Value> {
    let handle = tokio::spawn(fut);
    let joined = match limit {
        None => handle.await,
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(event = %event, plugin, timeout_ms = limit.as_millis() as u64, "Hook timed out");
                return Err(CliError::with_default_exit(
                    ErrorKind::HookTimeout,
                    format!("{event} hook in {plugin} timed out after {}ms", limit.as_millis()),
                ));
            }
        },
    };
    joined.unwrap_or_else(|e| {
        Err(CliError::runtime(format!(
            "{event} hook in {plugin} panicked: {e}"
        )))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_event_names() {
        for event in [
            HookEvent::Init,
            HookEvent::Prerun,
            HookEvent::Postrun,
            HookEvent::CommandNotFound,
            HookEvent::CommandIncomplete,
            HookEvent::Custom("analytics".into()),
        ] {
            assert_eq!(HookEvent::from(event.as_str()), event);
        }
        assert_eq!(HookEvent::CommandNotFound.to_string(), "command_not_found");
    }

    #[test]
    fn test_handler_count() {
        let mut hooks = HookRegistry::new();
        hooks.register("a", HookEvent::Init, |_| async { Ok(Value::Null) });
        hooks.register("a", HookEvent::Init, |_| async { Ok(Value::Null) });
        hooks.register("b", HookEvent::Init, |_| async { Ok(Value::Null) });
        hooks.register("b", HookEvent::Postrun, |_| async { Ok(Value::Null) });

        assert_eq!(hooks.handler_count(&HookEvent::Init), 3);
        assert_eq!(hooks.handler_count(&HookEvent::Prerun), 0);
        assert_eq!(hooks.plugins().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unregistered_event_is_empty() {
        let mut hooks = HookRegistry::new();
        hooks.register("a", HookEvent::Init, |_| async { Ok(json!(1)) });
        let outcome = hooks.run(&HookEvent::Postrun, Value::Null, None).await;
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_handler_fails_only_its_plugin() {
        let mut hooks = HookRegistry::new();
        hooks.register("bad", HookEvent::Init, |inv| async move {
            if inv.event == HookEvent::Init {
                panic!("handler exploded");
            }
            Ok(Value::Null)
        });
        hooks.register("good", HookEvent::Init, |_| async { Ok(json!("ok")) });

        for timeout in [None, Some(Duration::from_secs(2))] {
            let outcome = hooks.run(&HookEvent::Init, Value::Null, timeout).await;
            assert_eq!(outcome.successes.len(), 1);
            assert_eq!(outcome.successes[0].plugin, "good");
            assert_eq!(outcome.failures.len(), 1);
            assert_eq!(outcome.failures[0].plugin, "bad");
            assert_eq!(outcome.failures[0].error.kind, ErrorKind::Runtime);
            assert!(outcome.failures[0].error.message.contains("panicked"));
        }
    }

    #[tokio::test]
    async fn test_invocation_carries_plugin_and_event() {
        let mut hooks = HookRegistry::new();
        hooks.register("plugin-a", HookEvent::Custom("sync".into()), |inv| async move {
            Ok(json!([inv.plugin, inv.event.as_str(), inv.payload]))
        });
        let outcome = hooks
            .run(&HookEvent::from("sync"), json!("x"), None)
            .await;
        assert_eq!(outcome.successes[0].result, json!(["plugin-a", "sync", "x"]));
    }
}
