//! Defines the algorithm for applying a [`Classification`] to a live tree.

use std::collections::{HashMap, HashSet};

use crate::{
    error::ReconcileError,
    graph::{components_of_type, GraphError, NodeGraph},
};

use super::{Classification, ComponentRules, NameAliasTable};

/// Applies every edit in the classification to the tree under `root` and
/// returns the nodes that were changed.
///
/// Edits run in a fixed order: create, rename, reparent, destroy nodes,
/// destroy components, then write components. Renames come before
/// reparenting because reparenting targets use post-rename names.
///
/// If an edit fails, nodes created by this call that never got attached
/// anywhere are destroyed, and existing nodes left detached by a failed
/// reparenting are put back under `root`. Nothing is left outside the tree,
/// but everything else stays as it was at the point of failure, so callers
/// should only ever apply a classification to a copy they can throw away.
pub fn apply_classification<G: NodeGraph>(
    graph: &mut G,
    root: G::Node,
    classification: &Classification,
    aliases: &NameAliasTable,
    rules: &ComponentRules,
) -> Result<HashSet<G::Node>, ReconcileError> {
    let mut context = MutateContext::new(graph, root)?;

    match context.apply(graph, classification, aliases, rules) {
        Ok(()) => {
            let MutateContext { mut touched, .. } = context;
            touched.retain(|node| graph.contains(*node));
            Ok(touched)
        }
        Err(err) => {
            for node in context.created {
                if graph.contains(node) && matches!(graph.parent(node), Ok(None)) {
                    if let Err(cleanup_err) = graph.destroy_node(node) {
                        log::warn!("Could not clean up node {:?}: {}", node, cleanup_err);
                    }
                }
            }

            for node in context.detached {
                if graph.contains(node) && matches!(graph.parent(node), Ok(None)) {
                    if let Err(cleanup_err) = graph.set_parent(node, Some(context.root)) {
                        log::warn!("Could not reattach node {:?}: {}", node, cleanup_err);
                    }
                }
            }

            Err(err)
        }
    }
}

struct MutateContext<N> {
    root: N,

    /// Every live node by name. The root is stored under the empty name.
    by_name: HashMap<String, N>,

    created: Vec<N>,

    /// Nodes detached while reparenting, in case they need to be put back.
    detached: Vec<N>,

    touched: HashSet<N>,
}

impl<N: Copy + Eq + std::hash::Hash + std::fmt::Debug> MutateContext<N> {
    fn new<G: NodeGraph<Node = N>>(graph: &G, root: N) -> Result<Self, GraphError> {
        let mut by_name = HashMap::new();
        by_name.insert(String::new(), root);

        let mut to_visit = graph.children(root)?;

        while let Some(node) = to_visit.pop() {
            let name = graph.name(node)?.to_owned();

            if by_name.insert(name.clone(), node).is_some() {
                log::warn!("Node name '{}' is used more than once in the target", name);
            }

            to_visit.extend(graph.children(node)?);
        }

        Ok(MutateContext {
            root,
            by_name,
            created: Vec::new(),
            detached: Vec::new(),
            touched: HashSet::new(),
        })
    }

    /// Looks up a node by name, ignoring nodes that have already been
    /// destroyed along with an ancestor.
    fn live_node<G: NodeGraph<Node = N>>(&self, graph: &G, name: &str) -> Option<N> {
        self.by_name
            .get(name)
            .copied()
            .filter(|node| graph.contains(*node))
    }

    fn apply<G: NodeGraph<Node = N>>(
        &mut self,
        graph: &mut G,
        classification: &Classification,
        aliases: &NameAliasTable,
        rules: &ComponentRules,
    ) -> Result<(), ReconcileError> {
        self.create_nodes(graph, classification)?;
        self.rename_nodes(graph, classification, aliases)?;
        self.reparent_nodes(graph, classification)?;
        self.destroy_nodes(graph, classification)?;
        self.destroy_components(graph, classification)?;
        self.write_components(graph, classification, rules)?;

        Ok(())
    }

    fn create_nodes<G: NodeGraph<Node = N>>(
        &mut self,
        graph: &mut G,
        classification: &Classification,
    ) -> Result<(), ReconcileError> {
        for name in &classification.nodes_to_create {
            log::debug!("Creating '{}'", name);

            let node = graph.create_node(name)?;
            self.created.push(node);
            self.touched.insert(node);
            self.by_name.insert(name.clone(), node);
        }

        Ok(())
    }

    fn rename_nodes<G: NodeGraph<Node = N>>(
        &mut self,
        graph: &mut G,
        classification: &Classification,
        aliases: &NameAliasTable,
    ) -> Result<(), ReconcileError> {
        for new_name in &classification.nodes_to_rename {
            let old_name = aliases.target_name_for(new_name);

            let node = match self.by_name.remove(old_name) {
                Some(node) => node,
                None => {
                    log::warn!(
                        "Cannot rename '{}' to '{}': no node by that name",
                        old_name,
                        new_name
                    );
                    continue;
                }
            };

            log::debug!("Renaming '{}' to '{}'", old_name, new_name);

            graph.set_name(node, new_name)?;
            self.by_name.insert(new_name.clone(), node);
            self.touched.insert(node);
        }

        Ok(())
    }

    /// Detaches every moving node before attaching any of them, so that a
    /// permutation of parents (like two nodes swapping places) never passes
    /// through a state where a node is its own ancestor.
    fn reparent_nodes<G: NodeGraph<Node = N>>(
        &mut self,
        graph: &mut G,
        classification: &Classification,
    ) -> Result<(), ReconcileError> {
        let mut moves = Vec::new();

        for (child_name, parent_name) in &classification.reparentings {
            match self.by_name.get(child_name.as_str()) {
                Some(&node) => {
                    graph.set_parent(node, None)?;
                    self.detached.push(node);
                    moves.push((node, child_name, parent_name));
                }
                None => log::warn!("Cannot move '{}': no node by that name", child_name),
            }
        }

        for (node, child_name, parent_name) in moves {
            let parent = match self.by_name.get(parent_name.as_str()) {
                Some(&parent) => parent,
                None => {
                    log::warn!(
                        "Parent '{}' of '{}' does not exist, attaching to the root instead",
                        parent_name,
                        child_name
                    );
                    self.root
                }
            };

            graph.set_parent(node, Some(parent))?;
            self.touched.insert(node);
        }

        Ok(())
    }

    fn destroy_nodes<G: NodeGraph<Node = N>>(
        &mut self,
        graph: &mut G,
        classification: &Classification,
    ) -> Result<(), ReconcileError> {
        for name in &classification.nodes_to_destroy {
            match self.live_node(graph, name) {
                Some(node) => {
                    log::debug!("Destroying '{}'", name);
                    graph.destroy_node(node)?;
                }
                None => log::trace!("'{}' is already gone", name),
            }

            self.by_name.remove(name.as_str());
        }

        Ok(())
    }

    fn destroy_components<G: NodeGraph<Node = N>>(
        &mut self,
        graph: &mut G,
        classification: &Classification,
    ) -> Result<(), ReconcileError> {
        for (name, type_name, indexes) in classification.components_to_destroy.iter() {
            let node = match self.live_node(graph, name) {
                Some(node) => node,
                None => {
                    log::warn!("Cannot remove {} from '{}': no node by that name", type_name, name);
                    continue;
                }
            };

            // Positions refer to the list as it was before anything was
            // removed, so look all of them up first.
            let existing = components_of_type(graph, node, type_name)?;

            for &index in indexes {
                match existing.get(index) {
                    Some(&component) => {
                        log::debug!("Removing {} #{} from '{}'", type_name, index, name);
                        graph.destroy_component(component)?;
                        self.touched.insert(node);
                    }
                    None => log::trace!("{} #{} on '{}' is already gone", type_name, index, name),
                }
            }
        }

        Ok(())
    }

    fn write_components<G: NodeGraph<Node = N>>(
        &mut self,
        graph: &mut G,
        classification: &Classification,
        rules: &ComponentRules,
    ) -> Result<(), ReconcileError> {
        for (name, type_name, writes) in classification.components_to_update.iter() {
            let node = match self.live_node(graph, name) {
                Some(node) => node,
                None => {
                    log::warn!("Cannot write {} on '{}': no node by that name", type_name, name);
                    continue;
                }
            };

            let existing = components_of_type(graph, node, type_name)?;

            for write in writes {
                match existing.get(write.index) {
                    Some(&component) => {
                        log::debug!("Updating {} #{} on '{}'", type_name, write.index, name);
                        graph.deserialize_into(component, &write.payload)?;
                    }
                    None => {
                        log::debug!("Adding {} to '{}'", type_name, name);
                        attach_component(graph, node, name, type_name, &write.payload, rules)?;
                    }
                }

                self.touched.insert(node);
            }
        }

        Ok(())
    }
}

fn attach_component<G: NodeGraph>(
    graph: &mut G,
    node: G::Node,
    name: &str,
    type_name: &str,
    payload: &str,
    rules: &ComponentRules,
) -> Result<(), ReconcileError> {
    match graph.add_component(node, type_name) {
        Ok(component) => {
            graph.deserialize_into(component, payload)?;
            Ok(())
        }
        Err(err @ GraphError::Rejected { .. }) if rules.is_transform(type_name) => {
            // Some transforms can't be swapped for another kind; the node
            // keeps the one it has and only the placement fields change.
            let compatible = graph
                .components(node)?
                .into_iter()
                .find(|(existing_type, _)| rules.is_transform(existing_type));

            match compatible {
                Some((existing_type, component)) => {
                    log::debug!(
                        "'{}' keeps its {}, merging {} fields into it",
                        name,
                        existing_type,
                        type_name
                    );
                    merge_transform_fields(graph, component, name, payload, rules)
                }
                None => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn merge_transform_fields<G: NodeGraph>(
    graph: &mut G,
    component: G::Component,
    name: &str,
    payload: &str,
    rules: &ComponentRules,
) -> Result<(), ReconcileError> {
    let incoming: serde_json::Value = serde_json::from_str(payload)
        .map_err(|source| ReconcileError::malformed_transform(source, name))?;

    let incoming = incoming
        .as_object()
        .ok_or_else(|| ReconcileError::TransformNotAnObject {
            node: name.to_owned(),
        })?;

    let current_payload = graph.serialize_component(component)?;

    let mut current = if current_payload.trim().is_empty() {
        serde_json::Map::new()
    } else {
        match serde_json::from_str::<serde_json::Value>(&current_payload)
            .map_err(|source| ReconcileError::malformed_transform(source, name))?
        {
            serde_json::Value::Object(fields) => fields,
            _ => {
                return Err(ReconcileError::TransformNotAnObject {
                    node: name.to_owned(),
                })
            }
        }
    };

    for field in &rules.transform_fields {
        if let Some(value) = incoming.get(field) {
            current.insert(field.clone(), value.clone());
        }
    }

    let merged = serde_json::to_string(&current)
        .map_err(|source| ReconcileError::malformed_transform(source, name))?;

    graph.deserialize_into(component, &merged)?;

    Ok(())
}
