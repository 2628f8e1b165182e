//! Defines the structure of a node snapshot.

use std::collections::BTreeMap;

use crate::graph::{GraphError, NodeGraph};

use super::ComponentRules;

/// An immutable description of a named tree at one point in time.
///
/// A snapshot does not know its own name; names live in the `children` map of
/// the parent, which keeps them unique among siblings. Both maps are sorted,
/// so two snapshots compare equal exactly when their canonical text forms are
/// identical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    /// Child nodes, keyed by name.
    pub children: BTreeMap<String, NodeSnapshot>,

    /// Serialized component payloads, keyed by component type. A type may
    /// appear more than once on a node, so each type holds an ordered list.
    pub components: BTreeMap<String, Vec<String>>,
}

impl NodeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child(mut self, name: impl Into<String>, child: NodeSnapshot) -> Self {
        self.children.insert(name.into(), child);
        self
    }

    /// Appends a payload to the list of components of the given type.
    pub fn with_component(mut self, type_name: impl Into<String>, payload: impl Into<String>) -> Self {
        self.components
            .entry(type_name.into())
            .or_default()
            .push(payload.into());
        self
    }

    pub fn child(&self, name: &str) -> Option<&NodeSnapshot> {
        self.children.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.components.is_empty()
    }

    /// Walks a live hierarchy depth-first and captures it.
    ///
    /// The marker component is skipped everywhere. The root's placement
    /// component is skipped too, since where the tree sits is decided by
    /// whoever attaches it.
    pub fn from_live_tree<G: NodeGraph>(
        graph: &G,
        root: G::Node,
        rules: &ComponentRules,
    ) -> Result<NodeSnapshot, GraphError> {
        Self::from_live_node(graph, root, rules, true)
    }

    fn from_live_node<G: NodeGraph>(
        graph: &G,
        node: G::Node,
        rules: &ComponentRules,
        is_root: bool,
    ) -> Result<NodeSnapshot, GraphError> {
        let mut snapshot = NodeSnapshot::new();

        for (type_name, component) in graph.components(node)? {
            if rules.is_marker(&type_name) || (is_root && rules.is_transform(&type_name)) {
                continue;
            }

            let payload = graph.serialize_component(component)?;
            snapshot.components.entry(type_name).or_default().push(payload);
        }

        for child in graph.children(node)? {
            let name = graph.name(child)?.to_owned();
            let child_snapshot = Self::from_live_node(graph, child, rules, false)?;

            if snapshot.children.insert(name.clone(), child_snapshot).is_some() {
                log::warn!(
                    "Node {:?} has more than one child named '{}', only the last one is kept",
                    node,
                    name
                );
            }
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::graph::MemoryGraph;

    #[test]
    fn live_tree_skips_marker_and_root_transform() {
        let rules = ComponentRules::default();
        let mut graph = MemoryGraph::new();

        let root = graph.insert_node("Root", None).unwrap();
        graph.insert_component(root, "Transform", "root-pose").unwrap();
        graph.insert_component(root, "SyncMarker", "{}").unwrap();
        graph.insert_component(root, "Light", "warm").unwrap();

        let child = graph.insert_node("Child", Some(root)).unwrap();
        graph.insert_component(child, "Transform", "child-pose").unwrap();
        graph.insert_component(child, "SyncMarker", "{}").unwrap();
        graph.insert_component(child, "Collider", "a").unwrap();
        graph.insert_component(child, "Collider", "b").unwrap();

        let snapshot = NodeSnapshot::from_live_tree(&graph, root, &rules).unwrap();

        let expected = NodeSnapshot::new().with_component("Light", "warm").with_child(
            "Child",
            NodeSnapshot::new()
                .with_component("Transform", "child-pose")
                .with_component("Collider", "a")
                .with_component("Collider", "b"),
        );

        assert_eq!(snapshot, expected);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let first = NodeSnapshot::new()
            .with_child("B", NodeSnapshot::new())
            .with_child("A", NodeSnapshot::new())
            .with_component("Z", "1")
            .with_component("Y", "2");

        let second = NodeSnapshot::new()
            .with_component("Y", "2")
            .with_component("Z", "1")
            .with_child("A", NodeSnapshot::new())
            .with_child("B", NodeSnapshot::new());

        assert_eq!(first, second);
        assert_eq!(first.to_text(), second.to_text());
    }
}
