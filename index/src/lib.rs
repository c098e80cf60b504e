//! Command resolution for plugin-based command-line programs.
//!
//! [`CommandIndex`] maps whatever a user typed (an id, an alias, or with
//! flexible taxonomy any order-preserving subset of topic segments) to the
//! one command that should run, across every plugin that contributes
//! commands. It is backed by a typed [`Graph`] whose edge directions are
//! restricted to [`LEGAL_EDGES`].

mod combinations;
mod graph;
mod index;

pub use combinations::{combinations, combinations_of, topic_combinations};
pub use graph::{Graph, GraphError, LEGAL_EDGES, Node, NodeId, NodeKind, is_legal_edge};
pub use index::{CommandIndex, IndexOptions, compare_priority};
