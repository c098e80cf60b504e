//! Command resolution index.
//!
//! Built once from the plugin list, then read-only. Resolution goes
//! `command | commandAlias | comboCommand` → `command` → `pluginCommand`, and
//! ties between plugins that provide the same id are broken by
//! [`compare_priority`].

use std::cmp::Ordering;

use command_runtime_core::{
    CliError, CommandDescriptor, ErrorKind, ExitCodes, PluginRecord, Result,
};
use indexmap::IndexSet;
use tracing::{debug, info};

use crate::combinations::topic_combinations;
use crate::graph::{Graph, GraphError, NodeId, NodeKind};

/// Build and lookup options.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOptions {
    /// Register every order-preserving subset of each id's segments.
    pub flexible_taxonomy: bool,
    /// The root program's declared plugin list, highest priority first.
    pub core_plugins: Vec<String>,
    /// Separator users type between topics; normalized to `:` on lookup.
    pub topic_separator: char,
    /// Exit-code overrides for `CommandNotFound`.
    pub exit_codes: ExitCodes,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            flexible_taxonomy: false,
            core_plugins: Vec::new(),
            topic_separator: ':',
            exit_codes: ExitCodes::default(),
        }
    }
}

impl IndexOptions {
    pub fn flexible_taxonomy(mut self, enabled: bool) -> Self {
        self.flexible_taxonomy = enabled;
        self
    }

    pub fn core_plugins<I, S>(mut self, plugins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.core_plugins = plugins.into_iter().map(Into::into).collect();
        self
    }

    pub fn topic_separator(mut self, separator: char) -> Self {
        self.topic_separator = separator;
        self
    }

    pub fn exit_codes(mut self, exit_codes: ExitCodes) -> Self {
        self.exit_codes = exit_codes;
        self
    }
}

/// Orders two candidates for the same id; `Less` means `a` wins.
///
/// Core plugins rank by their position in `core_plugins` (a core plugin that
/// is not listed, such as the root program itself, ranks first). Core beats
/// non-core. Two non-core candidates compare equal; the index breaks that
/// tie by plugin discovery order.
pub fn compare_priority(
    core_plugins: &[String],
    a: &CommandDescriptor,
    b: &CommandDescriptor,
) -> Ordering {
    match (a.is_core(), b.is_core()) {
        (true, true) => {
            let rank = |c: &CommandDescriptor| {
                let alias = c.plugin_alias.as_deref().or(c.plugin_name.as_deref());
                alias.and_then(|alias| core_plugins.iter().position(|p| p == alias))
            };
            // `None` sorts before `Some`, so unlisted core plugins come first.
            rank(a).cmp(&rank(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// Lookup structure over every command of every plugin.
///
/// # Examples
///
/// ```
/// use command_runtime_core::{CommandDescriptor, PluginRecord, PluginType};
/// use command_runtime_index::{CommandIndex, IndexOptions};
///
/// let plugins = vec![
///     PluginRecord::new("mycli", PluginType::Core)
///         .with_command(CommandDescriptor::new("foo:bar").with_alias("fb")),
/// ];
/// let index = CommandIndex::build(&plugins, IndexOptions::default()).unwrap();
///
/// assert_eq!(index.find("fb").unwrap().id, "foo:bar");
/// assert!(index.find("bar").is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CommandIndex {
    graph: Graph,
    options: IndexOptions,
    /// Plugin names in the order they were first added.
    discovered: IndexSet<String>,
}

impl CommandIndex {
    /// Builds the index. Plugin order is discovery order.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] only on an internal structural violation.
    pub fn build(
        plugins: &[PluginRecord],
        options: IndexOptions,
    ) -> std::result::Result<Self, GraphError> {
        let mut index = Self {
            graph: Graph::new(),
            options,
            discovered: IndexSet::new(),
        };
        for plugin in plugins {
            index.add_plugin(plugin)?;
        }
        info!(
            plugins = plugins.len(),
            commands = index.graph.nodes_of(NodeKind::Command).count(),
            nodes = index.graph.node_count(),
            edges = index.graph.edge_count(),
            flexible_taxonomy = index.options.flexible_taxonomy,
            "Built command index"
        );
        Ok(index)
    }

    /// Adds one plugin's commands. Adding the same plugin again is a no-op.
    pub fn add_plugin(&mut self, plugin: &PluginRecord) -> std::result::Result<(), GraphError> {
        let plugin_node = self.graph.add_node(NodeKind::Plugin, &plugin.name, None);
        self.discovered.insert(plugin.name.clone());

        for command in &plugin.commands {
            let mut descriptor = command.clone();
            if self.options.flexible_taxonomy && descriptor.permutations.is_empty() {
                let mut combos = IndexSet::new();
                for id in command.ids() {
                    combos.extend(topic_combinations(id));
                }
                descriptor.permutations = combos.into_iter().collect();
            }

            let key = format!("{}#{}", plugin.name, command.id);
            let plugin_command =
                self.graph
                    .add_node(NodeKind::PluginCommand, &key, Some(descriptor.clone()));
            let command_node = self.graph.add_node(NodeKind::Command, &command.id, None);
            self.graph.add_edge(command_node, plugin_command)?;
            self.graph.add_edge(plugin_node, plugin_command)?;

            for alias in &command.aliases {
                let alias_node = self.graph.add_node(NodeKind::CommandAlias, alias, None);
                self.graph.add_edge(alias_node, command_node)?;
            }

            if self.options.flexible_taxonomy {
                for combo in &descriptor.permutations {
                    let combo_node = self.graph.add_node(NodeKind::ComboCommand, combo, None);
                    self.graph.add_edge(combo_node, command_node)?;
                }
            }

            for flag in command.flags.values() {
                let flag_node = self.graph.add_node(NodeKind::Flag, &flag.name, None);
                self.graph.add_edge(flag_node, command_node)?;
                let aliases = flag
                    .aliases
                    .iter()
                    .cloned()
                    .chain(flag.short_names().map(String::from));
                for alias in aliases {
                    let alias_node = self.graph.add_node(NodeKind::FlagAlias, &alias, None);
                    self.graph.add_edge(alias_node, flag_node)?;
                }
            }
        }

        debug!(plugin = %plugin.name, commands = plugin.commands.len(), "Indexed plugin");
        Ok(())
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Normalizes a typed id to the `:` form.
    pub fn normalize_id(&self, id: &str) -> String {
        let id = id.trim();
        if self.options.topic_separator == ':' {
            return id.to_string();
        }
        id.split(self.options.topic_separator)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// `command` nodes reachable from a typed id.
    fn command_nodes(&self, id: &str) -> IndexSet<NodeId> {
        let id = self.normalize_id(id);
        let mut nodes = IndexSet::new();
        if let Some(node) = self.graph.find(NodeKind::Command, &id) {
            nodes.insert(node);
        }
        if let Some(alias) = self.graph.find(NodeKind::CommandAlias, &id) {
            nodes.extend(self.graph.successors(alias, NodeKind::Command));
        }
        if self.options.flexible_taxonomy {
            if let Some(combo) = self.graph.find(NodeKind::ComboCommand, &id) {
                nodes.extend(self.graph.successors(combo, NodeKind::Command));
            }
        }
        nodes
    }

    /// `true` if the typed id is a command id or alias, not just a
    /// combination of topic segments.
    pub fn has_exact(&self, id: &str) -> bool {
        let id = self.normalize_id(id);
        self.graph.find(NodeKind::Command, &id).is_some()
            || self.graph.find(NodeKind::CommandAlias, &id).is_some()
    }

    /// Descriptors behind one `command` node, highest priority first.
    fn ranked(&self, command_node: NodeId) -> Vec<&CommandDescriptor> {
        let mut ranked: Vec<&CommandDescriptor> = self
            .graph
            .successors(command_node, NodeKind::PluginCommand)
            .filter_map(|n| self.graph.node(n).and_then(|node| node.command.as_ref()))
            .collect();
        ranked.sort_by(|a, b| self.compare(a, b));
        ranked
    }

    /// Plugin priority, then discovery order.
    fn compare(&self, a: &CommandDescriptor, b: &CommandDescriptor) -> Ordering {
        let discovery = |c: &CommandDescriptor| {
            c.plugin_name
                .as_deref()
                .and_then(|name| self.discovered.get_index_of(name))
        };
        compare_priority(&self.options.core_plugins, a, b)
            .then_with(|| discovery(a).cmp(&discovery(b)))
    }

    /// Every descriptor a typed id could mean, highest priority first.
    pub fn candidates(&self, id: &str) -> Vec<&CommandDescriptor> {
        let mut candidates: Vec<&CommandDescriptor> = self
            .command_nodes(id)
            .into_iter()
            .flat_map(|node| self.ranked(node))
            .collect();
        candidates.sort_by(|a, b| self.compare(a, b));
        candidates
    }

    /// Resolves a typed id to exactly one descriptor.
    pub fn find(&self, id: &str) -> Option<&CommandDescriptor> {
        let candidates = self.candidates(id);
        if candidates.len() > 1 {
            debug!(
                id,
                candidates = candidates.len(),
                winner = candidates[0].plugin_name.as_deref().unwrap_or_default(),
                "Resolved ambiguous command by plugin priority"
            );
        }
        candidates.into_iter().next()
    }

    /// Like [`find`](Self::find) but fails with `CommandNotFound`.
    pub fn find_required(&self, id: &str) -> Result<&CommandDescriptor> {
        self.find(id).ok_or_else(|| {
            CliError::new(
                ErrorKind::CommandNotFound,
                format!("command {id} not found"),
                &self.options.exit_codes,
            )
        })
    }

    /// Commands reachable from a partial id that declare every given flag.
    ///
    /// Flag names may be long names, aliases or chars, with or without
    /// leading dashes. Returns one descriptor per matching command id.
    pub fn find_matches<S: AsRef<str>>(
        &self,
        partial: &str,
        flags: &[S],
    ) -> Vec<&CommandDescriptor> {
        let flag_sets: Vec<IndexSet<NodeId>> = flags
            .iter()
            .map(|f| self.flag_nodes(f.as_ref().trim_start_matches('-')))
            .collect();

        self.command_nodes(partial)
            .into_iter()
            .filter(|&command| {
                let declared: IndexSet<NodeId> =
                    self.graph.predecessors(command, NodeKind::Flag).collect();
                flag_sets
                    .iter()
                    .all(|set| set.iter().any(|flag| declared.contains(flag)))
            })
            .filter_map(|command| self.ranked(command).into_iter().next())
            .collect()
    }

    fn flag_nodes(&self, name: &str) -> IndexSet<NodeId> {
        let mut nodes = IndexSet::new();
        if let Some(flag) = self.graph.find(NodeKind::Flag, name) {
            nodes.insert(flag);
        }
        if let Some(alias) = self.graph.find(NodeKind::FlagAlias, name) {
            nodes.extend(self.graph.successors(alias, NodeKind::Flag));
        }
        nodes
    }

    /// The winning descriptor of every command id, in insertion order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.graph
            .nodes_of(NodeKind::Command)
            .filter_map(|(id, _)| self.ranked(id).into_iter().next())
    }

    /// Every command id, alias and (in flexible mode) combination.
    pub fn ids(&self) -> Vec<&str> {
        let mut kinds = vec![NodeKind::Command, NodeKind::CommandAlias];
        if self.options.flexible_taxonomy {
            kinds.push(NodeKind::ComboCommand);
        }
        let mut ids: IndexSet<&str> = IndexSet::new();
        for kind in kinds {
            ids.extend(self.graph.nodes_of(kind).map(|(_, node)| node.key.as_str()));
        }
        ids.into_iter().collect()
    }
}
