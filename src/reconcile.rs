//! Runs whole reconciliation passes against a [`NodeGraph`].
//!
//! A pass never edits the target in place. It works on a disposable copy and
//! only swaps it in once every edit has succeeded, so a failed pass leaves the
//! target exactly as it was.

use std::collections::HashSet;

use crate::{
    error::ReconcileError,
    graph::{components_of_type, NodeGraph},
    snapshot::{
        apply_classification, classify, Classification, ComponentRules, FlatIndex,
        NameAliasTable, NodeSnapshot,
    },
};

/// What a single pass did.
#[derive(Debug)]
pub struct PassReport<N> {
    pub classification: Classification,

    /// Nodes of the target that were created, renamed, moved, or had a
    /// component changed. Destroyed nodes aren't included.
    pub touched: HashSet<N>,

    /// False when the target was already up to date and nothing was written,
    /// not even the stored history.
    pub committed: bool,
}

/// Brings the tree under `target` up to date with the tree under `source`.
///
/// The previous pass's view of the source is read from the marker component
/// on `target`, and the new view is written back there once the pass
/// succeeds.
pub fn reconcile<G: NodeGraph>(
    graph: &mut G,
    target: G::Node,
    source: G::Node,
    aliases: &NameAliasTable,
    rules: &ComponentRules,
) -> Result<PassReport<G::Node>, ReconcileError> {
    log::trace!("Reading stored history");
    let history = read_history(graph, target, rules)?;

    log::trace!("Capturing source");
    let new_snapshot = capture_source(graph, source, rules)?;

    let classification = classify_against(graph, target, &history, &new_snapshot, aliases, rules)?;

    if classification.is_empty() && history == new_snapshot {
        log::info!("Target is already up to date");

        return Ok(PassReport {
            classification,
            touched: HashSet::new(),
            committed: false,
        });
    }

    log::trace!("Instantiating working copy");
    let working_copy = graph.instantiate(target)?;

    let result = apply_to_working_copy(
        graph,
        working_copy,
        &classification,
        &new_snapshot,
        aliases,
        rules,
    )
    .and_then(|touched| {
        log::trace!("Committing working copy");
        graph.commit_working_copy(target, working_copy)?;
        Ok(touched)
    });

    let mut touched = match result {
        Ok(touched) => touched,
        Err(err) => {
            if graph.contains(working_copy) {
                if let Err(cleanup_err) = graph.destroy_node(working_copy) {
                    log::warn!("Could not discard the working copy: {}", cleanup_err);
                }
            }

            return Err(err);
        }
    };

    if touched.remove(&working_copy) {
        touched.insert(target);
    }

    log::info!(
        "Applied {} edits: {} created, {} destroyed, {} renamed, {} moved",
        classification.edit_count(),
        classification.nodes_to_create.len(),
        classification.nodes_to_destroy.len(),
        classification.nodes_to_rename.len(),
        classification.reparentings.len(),
    );

    Ok(PassReport {
        classification,
        touched,
        committed: true,
    })
}

/// Computes the edits the next pass would make, without changing anything.
pub fn preview<G: NodeGraph>(
    graph: &G,
    target: G::Node,
    source: G::Node,
    aliases: &NameAliasTable,
    rules: &ComponentRules,
) -> Result<Classification, ReconcileError> {
    let history = read_history(graph, target, rules)?;
    let new_snapshot = capture_source(graph, source, rules)?;

    classify_against(graph, target, &history, &new_snapshot, aliases, rules)
}

/// Reads the source snapshot stored by the last successful pass. A target
/// without a marker, or with an empty one, has never been synced.
pub fn read_history<G: NodeGraph>(
    graph: &G,
    target: G::Node,
    rules: &ComponentRules,
) -> Result<NodeSnapshot, ReconcileError> {
    let marker = match components_of_type(graph, target, &rules.marker_type)?.first() {
        Some(&marker) => marker,
        None => return Ok(NodeSnapshot::new()),
    };

    let payload = graph.serialize_component(marker)?;

    if payload.trim().is_empty() {
        return Ok(NodeSnapshot::new());
    }

    NodeSnapshot::from_text(&payload).map_err(|source| ReconcileError::MalformedHistory { source })
}

/// Captures the source. It becomes the next history, so it has to survive
/// being written as text and read back.
fn capture_source<G: NodeGraph>(
    graph: &G,
    source: G::Node,
    rules: &ComponentRules,
) -> Result<NodeSnapshot, ReconcileError> {
    let snapshot = NodeSnapshot::from_live_tree(graph, source, rules)?;

    snapshot
        .check_representable()
        .map_err(|source| ReconcileError::UnrepresentableSource { source })?;

    Ok(snapshot)
}

fn classify_against<G: NodeGraph>(
    graph: &G,
    target: G::Node,
    history: &NodeSnapshot,
    new_snapshot: &NodeSnapshot,
    aliases: &NameAliasTable,
    rules: &ComponentRules,
) -> Result<Classification, ReconcileError> {
    let old_index = FlatIndex::from_snapshot(history);
    let new_index = FlatIndex::from_snapshot(new_snapshot);
    let target_index = FlatIndex::from_graph(graph, target, rules)?;

    log::trace!("Classifying");
    Ok(classify(&old_index, &new_index, &target_index, aliases, rules))
}

fn apply_to_working_copy<G: NodeGraph>(
    graph: &mut G,
    working_copy: G::Node,
    classification: &Classification,
    new_snapshot: &NodeSnapshot,
    aliases: &NameAliasTable,
    rules: &ComponentRules,
) -> Result<HashSet<G::Node>, ReconcileError> {
    log::trace!("Applying edits");
    let touched = apply_classification(graph, working_copy, classification, aliases, rules)?;

    log::trace!("Storing history");
    let marker = match components_of_type(graph, working_copy, &rules.marker_type)?.first() {
        Some(&marker) => marker,
        None => graph.add_component(working_copy, &rules.marker_type)?,
    };

    graph.deserialize_into(marker, &new_snapshot.to_text())?;

    Ok(touched)
}
