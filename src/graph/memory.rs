//! An arena-backed node graph. It stands in for a host scene graph in the
//! command line tool and in tests.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::snapshot::NodeSnapshot;

use super::{GraphError, NodeGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentId(u64);

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    components: Vec<ComponentId>,
}

#[derive(Debug, Clone)]
struct ComponentData {
    node: NodeId,
    type_name: String,
    payload: String,
}

/// A forest of named nodes with typed, string-serialized components.
///
/// Every id handed out is unique for the lifetime of the graph, so a handle to
/// a destroyed node can never alias a newer one.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: HashMap<NodeId, NodeData>,
    components: HashMap<ComponentId, ComponentData>,

    /// Component types of which a node may carry at most one, like the
    /// different transform kinds of a scene graph. Adding a second member of
    /// this family to a node is rejected.
    exclusive_family: HashSet<String>,

    last_id: u64,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exclusive_family<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MemoryGraph {
            exclusive_family: types.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn insert_node(&mut self, name: &str, parent: Option<NodeId>) -> Result<NodeId, GraphError> {
        if let Some(parent) = parent {
            self.node(parent)?;
        }

        let id = NodeId(self.next_id());
        self.nodes.insert(
            id,
            NodeData {
                name: name.to_owned(),
                parent,
                children: Vec::new(),
                components: Vec::new(),
            },
        );

        if let Some(parent) = parent {
            self.node_mut(parent)?.children.push(id);
        }

        Ok(id)
    }

    /// Attaches a component with the given payload, bypassing the exclusive
    /// family check. Used to build fixtures.
    pub fn insert_component(
        &mut self,
        node: NodeId,
        type_name: &str,
        payload: &str,
    ) -> Result<ComponentId, GraphError> {
        self.node(node)?;

        let id = ComponentId(self.next_id());
        self.components.insert(
            id,
            ComponentData {
                node,
                type_name: type_name.to_owned(),
                payload: payload.to_owned(),
            },
        );
        self.node_mut(node)?.components.push(id);

        Ok(id)
    }

    /// Loads a snapshot as a new tree without a parent. Every component in the
    /// snapshot is kept.
    pub fn load_snapshot(&mut self, name: &str, snapshot: &NodeSnapshot) -> Result<NodeId, GraphError> {
        self.load_snapshot_under(name, snapshot, None)
    }

    fn load_snapshot_under(
        &mut self,
        name: &str,
        snapshot: &NodeSnapshot,
        parent: Option<NodeId>,
    ) -> Result<NodeId, GraphError> {
        let id = self.insert_node(name, parent)?;

        for (type_name, payloads) in &snapshot.components {
            for payload in payloads {
                self.insert_component(id, type_name, payload)?;
            }
        }

        for (child_name, child) in &snapshot.children {
            self.load_snapshot_under(child_name, child, Some(id))?;
        }

        Ok(id)
    }

    /// Captures a node and its descendants as a snapshot. Unlike
    /// [`NodeSnapshot::from_live_tree`], nothing is filtered out.
    pub fn to_snapshot(&self, node: NodeId) -> Result<NodeSnapshot, GraphError> {
        let data = self.node(node)?;
        let mut snapshot = NodeSnapshot::new();

        for component_id in &data.components {
            let component = self.component(*component_id)?;
            snapshot
                .components
                .entry(component.type_name.clone())
                .or_default()
                .push(component.payload.clone());
        }

        for child_id in &data.children {
            let child = self.node(*child_id)?;
            snapshot
                .children
                .insert(child.name.clone(), self.to_snapshot(*child_id)?);
        }

        Ok(snapshot)
    }

    /// Finds the first node with the given name among `root` and its
    /// descendants, searching depth-first.
    pub fn find(&self, root: NodeId, name: &str) -> Option<NodeId> {
        let data = self.nodes.get(&root)?;

        if data.name == name {
            return Some(root);
        }

        data.children.iter().find_map(|child| self.find(*child, name))
    }

    /// Whether `ancestor` appears anywhere on the parent chain of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(&node).and_then(|data| data.parent);

        while let Some(id) = current {
            if id == ancestor {
                return true;
            }

            current = self.nodes.get(&id).and_then(|data| data.parent);
        }

        false
    }

    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn node(&self, id: NodeId) -> Result<&NodeData, GraphError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| GraphError::node_not_found(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, GraphError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| GraphError::node_not_found(id))
    }

    fn component(&self, id: ComponentId) -> Result<&ComponentData, GraphError> {
        self.components
            .get(&id)
            .ok_or_else(|| GraphError::component_not_found(id))
    }

    fn copy_subtree(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<NodeId, GraphError> {
        let data = self.node(node)?.clone();
        let copy = self.insert_node(&data.name, parent)?;

        for component_id in &data.components {
            let component = self.component(*component_id)?.clone();
            self.insert_component(copy, &component.type_name, &component.payload)?;
        }

        for child in &data.children {
            self.copy_subtree(*child, Some(copy))?;
        }

        Ok(copy)
    }

    fn detach(&mut self, node: NodeId) -> Result<(), GraphError> {
        if let Some(parent) = self.node(node)?.parent {
            self.node_mut(parent)?.children.retain(|child| *child != node);
        }

        self.node_mut(node)?.parent = None;
        Ok(())
    }
}

impl NodeGraph for MemoryGraph {
    type Node = NodeId;
    type Component = ComponentId;

    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn name(&self, node: NodeId) -> Result<&str, GraphError> {
        Ok(&self.node(node)?.name)
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, GraphError> {
        Ok(self.node(node)?.parent)
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, GraphError> {
        Ok(self.node(node)?.children.clone())
    }

    fn components(&self, node: NodeId) -> Result<Vec<(String, ComponentId)>, GraphError> {
        self.node(node)?
            .components
            .iter()
            .map(|id| Ok((self.component(*id)?.type_name.clone(), *id)))
            .collect()
    }

    fn serialize_component(&self, component: ComponentId) -> Result<String, GraphError> {
        Ok(self.component(component)?.payload.clone())
    }

    fn instantiate(&mut self, node: NodeId) -> Result<NodeId, GraphError> {
        self.copy_subtree(node, None)
    }

    fn create_node(&mut self, name: &str) -> Result<NodeId, GraphError> {
        self.insert_node(name, None)
    }

    fn destroy_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.detach(node)?;

        let mut to_remove = vec![node];

        while let Some(id) = to_remove.pop() {
            if let Some(data) = self.nodes.remove(&id) {
                for component in data.components {
                    self.components.remove(&component);
                }

                to_remove.extend(data.children);
            }
        }

        Ok(())
    }

    fn set_name(&mut self, node: NodeId, name: &str) -> Result<(), GraphError> {
        self.node_mut(node)?.name = name.to_owned();
        Ok(())
    }

    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), GraphError> {
        self.node(node)?;

        if let Some(parent) = parent {
            self.node(parent)?;

            if parent == node || self.is_ancestor(node, parent) {
                return Err(GraphError::WouldCycle {
                    child: self.node(node)?.name.clone(),
                    parent: self.node(parent)?.name.clone(),
                });
            }
        }

        self.detach(node)?;

        if let Some(parent) = parent {
            self.node_mut(node)?.parent = Some(parent);
            self.node_mut(parent)?.children.push(node);
        }

        Ok(())
    }

    fn add_component(&mut self, node: NodeId, type_name: &str) -> Result<ComponentId, GraphError> {
        let data = self.node(node)?;

        if self.exclusive_family.contains(type_name) {
            let occupied = data.components.iter().any(|id| {
                self.components
                    .get(id)
                    .map_or(false, |component| {
                        self.exclusive_family.contains(&component.type_name)
                    })
            });

            if occupied {
                return Err(GraphError::Rejected {
                    node: data.name.clone(),
                    type_name: type_name.to_owned(),
                });
            }
        }

        self.insert_component(node, type_name, "")
    }

    fn destroy_component(&mut self, component: ComponentId) -> Result<(), GraphError> {
        let data = self
            .components
            .remove(&component)
            .ok_or_else(|| GraphError::component_not_found(component))?;

        if let Some(node) = self.nodes.get_mut(&data.node) {
            node.components.retain(|id| *id != component);
        }

        Ok(())
    }

    fn deserialize_into(&mut self, component: ComponentId, payload: &str) -> Result<(), GraphError> {
        let data = self
            .components
            .get_mut(&component)
            .ok_or_else(|| GraphError::component_not_found(component))?;

        data.payload = payload.to_owned();
        Ok(())
    }

    fn commit_working_copy(&mut self, original: NodeId, working_copy: NodeId) -> Result<(), GraphError> {
        if original == working_copy {
            return Ok(());
        }

        if self.is_ancestor(original, working_copy) {
            return Err(GraphError::Host {
                message: "a working copy cannot live inside the node it replaces".to_owned(),
            });
        }

        let working = self.node(working_copy)?.clone();

        for child in self.node(original)?.children.clone() {
            self.destroy_node(child)?;
        }

        let old_components = std::mem::take(&mut self.node_mut(original)?.components);
        for component in old_components {
            self.components.remove(&component);
        }

        for component in &working.components {
            if let Some(data) = self.components.get_mut(component) {
                data.node = original;
            }
        }

        for child in &working.children {
            self.node_mut(*child)?.parent = Some(original);
        }

        {
            let data = self.node_mut(original)?;
            data.name = working.name.clone();
            data.components = working.components.clone();
            data.children = working.children.clone();
        }

        if let Some(parent) = working.parent {
            self.node_mut(parent)?
                .children
                .retain(|child| *child != working_copy);
        }

        self.nodes.remove(&working_copy);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_graph() -> (MemoryGraph, NodeId) {
        let mut graph = MemoryGraph::with_exclusive_family(vec!["Transform", "RectTransform"]);
        let root = graph.insert_node("Root", None).unwrap();
        let a = graph.insert_node("A", Some(root)).unwrap();
        graph.insert_node("B", Some(a)).unwrap();
        graph.insert_component(a, "Transform", "{}").unwrap();

        (graph, root)
    }

    #[test]
    fn reparenting_under_descendant_is_a_cycle() {
        let (mut graph, root) = sample_graph();
        let a = graph.find(root, "A").unwrap();
        let b = graph.find(root, "B").unwrap();

        let result = graph.set_parent(a, Some(b));

        assert!(matches!(result, Err(GraphError::WouldCycle { .. })));
        assert_eq!(graph.parent(a).unwrap(), Some(root));
    }

    #[test]
    fn destroy_removes_descendants_and_components() {
        let (mut graph, root) = sample_graph();
        let a = graph.find(root, "A").unwrap();
        let b = graph.find(root, "B").unwrap();

        graph.destroy_node(a).unwrap();

        assert!(!graph.contains(a));
        assert!(!graph.contains(b));
        assert!(graph.children(root).unwrap().is_empty());
        assert!(graph.components.is_empty());
    }

    #[test]
    fn exclusive_family_rejects_second_member() {
        let (mut graph, root) = sample_graph();
        let a = graph.find(root, "A").unwrap();

        let result = graph.add_component(a, "RectTransform");
        assert!(matches!(result, Err(GraphError::Rejected { .. })));

        let b = graph.find(root, "B").unwrap();
        assert!(graph.add_component(b, "RectTransform").is_ok());
        assert!(graph.add_component(b, "Collider").is_ok());
    }

    #[test]
    fn instantiate_and_commit_round_trip() {
        let (mut graph, root) = sample_graph();
        let before = graph.to_snapshot(root).unwrap();

        let copy = graph.instantiate(root).unwrap();
        assert_eq!(graph.parent(copy).unwrap(), None);
        assert_eq!(graph.to_snapshot(copy).unwrap(), before);

        let copy_b = graph.find(copy, "B").unwrap();
        graph.set_name(copy_b, "Renamed").unwrap();

        graph.commit_working_copy(root, copy).unwrap();

        assert!(!graph.contains(copy));
        assert!(graph.find(root, "Renamed").is_some());
        assert!(graph.find(root, "B").is_none());
        assert_eq!(graph.name(root).unwrap(), "Root");
    }
}
