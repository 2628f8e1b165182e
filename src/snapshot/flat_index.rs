//! A flattened, name-keyed view of a tree that is built once per pass and
//! queried many times by the classifier.

use std::collections::BTreeMap;

use crate::{
    graph::{GraphError, NodeGraph},
    multimap::MultiMap,
};

use super::{ComponentRules, NodeSnapshot};

/// Maps every node name in a tree to its parent and its components.
///
/// Node names are assumed to be unique across the whole tree, not just among
/// siblings. When that doesn't hold, the node visited last wins and the
/// earlier one disappears from the index; nothing tries to tell them apart.
///
/// The root is always present under the empty name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    parents: BTreeMap<String, String>,
    components: MultiMap<String, String, String>,
}

impl FlatIndex {
    pub fn from_snapshot(snapshot: &NodeSnapshot) -> FlatIndex {
        let mut index = FlatIndex::default();
        index.insert_components("", snapshot);
        index.insert_children("", snapshot);
        index
    }

    pub fn from_graph<G: NodeGraph>(
        graph: &G,
        root: G::Node,
        rules: &ComponentRules,
    ) -> Result<FlatIndex, GraphError> {
        let snapshot = NodeSnapshot::from_live_tree(graph, root, rules)?;
        Ok(Self::from_snapshot(&snapshot))
    }

    fn insert_children(&mut self, parent: &str, snapshot: &NodeSnapshot) {
        for (name, child) in &snapshot.children {
            if self.contains(name) {
                log::warn!(
                    "Node name '{}' is used more than once, the node under '{}' replaces the earlier one",
                    name,
                    parent
                );
                self.components.remove(name.as_str());
            }

            self.parents.insert(name.clone(), parent.to_owned());
            self.insert_components(name, child);
            self.insert_children(name, child);
        }
    }

    fn insert_components(&mut self, name: &str, snapshot: &NodeSnapshot) {
        for (type_name, payloads) in &snapshot.components {
            self.components
                .set(name.to_owned(), type_name.clone(), payloads.clone());
        }
    }

    /// Whether the tree has a node with this name. The root always counts.
    pub fn contains(&self, name: &str) -> bool {
        name.is_empty() || self.parents.contains_key(name)
    }

    /// Returns the name of the node's parent. Unknown names and children of
    /// the root both report the empty name.
    pub fn parent_of(&self, name: &str) -> &str {
        self.parents.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn component_types_of(&self, name: &str) -> Vec<&str> {
        self.components
            .get_all(name)
            .map(|types| types.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn component_values_of(&self, name: &str, type_name: &str) -> &[String] {
        self.components.get(name, type_name)
    }

    /// All node names except the root, in sorted order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(String::as_str)
    }

    /// The number of nodes, not counting the root.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}
