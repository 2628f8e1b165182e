//! Defines the boundary between the reconciliation engine and the host's live
//! node graph.
//!
//! The engine never owns live nodes. It only holds the handles handed out by a
//! [`NodeGraph`] for the duration of a single pass, and asks the graph to do
//! every structural edit on its behalf.

pub mod memory;

use std::{fmt::Debug, hash::Hash};

use thiserror::Error;

pub use memory::{ComponentId, MemoryGraph, NodeId};

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node {node} does not exist")]
    NodeNotFound { node: String },

    #[error("component {component} does not exist")]
    ComponentNotFound { component: String },

    #[error("a {type_name} component cannot be attached to node {node}")]
    Rejected { node: String, type_name: String },

    #[error("parenting node {child} under {parent} would create a cycle")]
    WouldCycle { child: String, parent: String },

    #[error("the host refused the operation: {message}")]
    Host { message: String },
}

impl GraphError {
    pub(crate) fn node_not_found(node: impl Debug) -> Self {
        Self::NodeNotFound {
            node: format!("{:?}", node),
        }
    }

    pub(crate) fn component_not_found(component: impl Debug) -> Self {
        Self::ComponentNotFound {
            component: format!("{:?}", component),
        }
    }
}

/// The narrow interface the reconciliation engine needs into a host's scene
/// graph.
///
/// Handles are cheap copyable references. A handle to a node that has been
/// destroyed is not reused, and every operation on it fails with
/// [`GraphError::NodeNotFound`].
pub trait NodeGraph {
    type Node: Copy + Eq + Hash + Debug;
    type Component: Copy + Eq + Debug;

    fn contains(&self, node: Self::Node) -> bool;

    fn name(&self, node: Self::Node) -> Result<&str, GraphError>;

    fn parent(&self, node: Self::Node) -> Result<Option<Self::Node>, GraphError>;

    fn children(&self, node: Self::Node) -> Result<Vec<Self::Node>, GraphError>;

    /// Lists every component attached to the node, in attachment order.
    fn components(&self, node: Self::Node)
        -> Result<Vec<(String, Self::Component)>, GraphError>;

    fn serialize_component(&self, component: Self::Component) -> Result<String, GraphError>;

    /// Deep-copies a node and all of its descendants. The copy has no parent.
    fn instantiate(&mut self, node: Self::Node) -> Result<Self::Node, GraphError>;

    /// Creates a new node with no parent and no components.
    fn create_node(&mut self, name: &str) -> Result<Self::Node, GraphError>;

    /// Destroys a node along with all of its descendants.
    fn destroy_node(&mut self, node: Self::Node) -> Result<(), GraphError>;

    fn set_name(&mut self, node: Self::Node, name: &str) -> Result<(), GraphError>;

    fn set_parent(
        &mut self,
        node: Self::Node,
        parent: Option<Self::Node>,
    ) -> Result<(), GraphError>;

    /// Attaches a new, default-valued component. Hosts reject component types
    /// that cannot be freely added with [`GraphError::Rejected`].
    fn add_component(
        &mut self,
        node: Self::Node,
        type_name: &str,
    ) -> Result<Self::Component, GraphError>;

    fn destroy_component(&mut self, component: Self::Component) -> Result<(), GraphError>;

    fn deserialize_into(
        &mut self,
        component: Self::Component,
        payload: &str,
    ) -> Result<(), GraphError>;

    /// Replaces the contents of `original` with those of `working_copy` and
    /// disposes of the working copy. The `original` handle stays valid.
    fn commit_working_copy(
        &mut self,
        original: Self::Node,
        working_copy: Self::Node,
    ) -> Result<(), GraphError>;
}

/// Returns the components of one type attached to a node, in attachment order.
pub fn components_of_type<G: NodeGraph>(
    graph: &G,
    node: G::Node,
    type_name: &str,
) -> Result<Vec<G::Component>, GraphError> {
    Ok(graph
        .components(node)?
        .into_iter()
        .filter(|(component_type, _)| component_type == type_name)
        .map(|(_, component)| component)
        .collect())
}
