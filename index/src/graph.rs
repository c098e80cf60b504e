//! Typed directed graph with a fixed edge whitelist.
//!
//! Nodes are keyed by `(kind, key)`; adding a node or edge that already
//! exists is a no-op, so building from the same input twice yields the same
//! graph.

use std::fmt;

use command_runtime_core::CommandDescriptor;
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

/// Node types of the resolution graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Command,
    CommandAlias,
    ComboCommand,
    Flag,
    FlagAlias,
    PluginCommand,
    Plugin,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::CommandAlias => "commandAlias",
            Self::ComboCommand => "comboCommand",
            Self::Flag => "flag",
            Self::FlagAlias => "flagAlias",
            Self::PluginCommand => "pluginCommand",
            Self::Plugin => "plugin",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only `(source, target)` pairs an edge may connect.
pub const LEGAL_EDGES: [(NodeKind, NodeKind); 6] = [
    (NodeKind::Command, NodeKind::PluginCommand),
    (NodeKind::CommandAlias, NodeKind::Command),
    (NodeKind::ComboCommand, NodeKind::Command),
    (NodeKind::Flag, NodeKind::Command),
    (NodeKind::FlagAlias, NodeKind::Flag),
    (NodeKind::Plugin, NodeKind::PluginCommand),
];

pub fn is_legal_edge(from: NodeKind, to: NodeKind) -> bool {
    LEGAL_EDGES.contains(&(from, to))
}

/// Structural errors. These indicate a bug in the caller, not bad input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("illegal edge {from} -> {to} ({from_key:?} -> {to_key:?})")]
    IllegalEdge {
        from: NodeKind,
        to: NodeKind,
        from_key: String,
        to_key: String,
    },

    #[error("unknown node id {0}")]
    UnknownNode(NodeId),
}

/// Index of a node in insertion order.
pub type NodeId = usize;

/// A graph node. Only `PluginCommand` nodes carry a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub key: String,
    pub command: Option<CommandDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: IndexMap<(NodeKind, String), Node>,
    outgoing: Vec<IndexSet<NodeId>>,
    incoming: Vec<IndexSet<NodeId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, or returns the existing node with the same kind and key.
    /// An existing node keeps its original descriptor.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        key: &str,
        command: Option<CommandDescriptor>,
    ) -> NodeId {
        if let Some(id) = self.find(kind, key) {
            return id;
        }
        let (id, _) = self.nodes.insert_full(
            (kind, key.to_string()),
            Node {
                kind,
                key: key.to_string(),
                command,
            },
        );
        self.outgoing.push(IndexSet::new());
        self.incoming.push(IndexSet::new());
        id
    }

    /// Adds a directed edge. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// [`GraphError::IllegalEdge`] if the kinds are not in [`LEGAL_EDGES`].
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<bool, GraphError> {
        let source = self.node(from).ok_or(GraphError::UnknownNode(from))?;
        let target = self.node(to).ok_or(GraphError::UnknownNode(to))?;
        if !is_legal_edge(source.kind, target.kind) {
            return Err(GraphError::IllegalEdge {
                from: source.kind,
                to: target.kind,
                from_key: source.key.clone(),
                to_key: target.key.clone(),
            });
        }
        let added = self.outgoing[from].insert(to);
        self.incoming[to].insert(from);
        Ok(added)
    }

    pub fn find(&self, kind: NodeKind, key: &str) -> Option<NodeId> {
        self.nodes.get_index_of(&(kind, key.to_string()))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get_index(id).map(|(_, node)| node)
    }

    /// Targets of `id`'s outgoing edges that have the given kind.
    pub fn successors(&self, id: NodeId, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbors(&self.outgoing, id, kind)
    }

    /// Sources of `id`'s incoming edges that have the given kind.
    pub fn predecessors(&self, id: NodeId, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbors(&self.incoming, id, kind)
    }

    fn neighbors<'g>(
        &'g self,
        adjacency: &'g [IndexSet<NodeId>],
        id: NodeId,
        kind: NodeKind,
    ) -> impl Iterator<Item = NodeId> + 'g {
        adjacency
            .get(id)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |n| self.node(*n).is_some_and(|node| node.kind == kind))
    }

    /// Nodes of one kind in insertion order.
    pub fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .values()
            .enumerate()
            .filter(move |(_, node)| node.kind == kind)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.iter().map(IndexSet::len).sum()
    }
}
