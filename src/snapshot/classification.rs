//! Defines the edit set produced by comparing two source snapshots against a
//! target.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::multimap::MultiMap;

/// One component payload to write, paired with the position among the
/// node's components of the same type that it was compared at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentWrite {
    pub index: usize,
    pub payload: String,
}

/// The minimal set of edits that brings a target up to date with a new
/// source.
///
/// Node names are given the way they will read once the edits are applied:
/// created and renamed nodes carry their new source name, everything else
/// keeps its target name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub nodes_to_create: BTreeSet<String>,
    pub nodes_to_destroy: BTreeSet<String>,

    /// Nodes to rename, named by their new source name. The current name is
    /// found through the alias table.
    pub nodes_to_rename: BTreeSet<String>,

    /// Maps a child to the parent it must end up under. The empty name is the
    /// root.
    pub reparentings: BTreeMap<String, String>,

    /// Positions of components to remove, per node and component type.
    pub components_to_destroy: MultiMap<String, String, usize>,

    /// Payloads to write, per node and component type.
    pub components_to_update: MultiMap<String, String, ComponentWrite>,
}

impl Classification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes_to_create.is_empty()
            && self.nodes_to_destroy.is_empty()
            && self.nodes_to_rename.is_empty()
            && self.reparentings.is_empty()
            && self.components_to_destroy.is_empty()
            && self.components_to_update.is_empty()
    }

    /// Counts every individual edit, for logging.
    pub fn edit_count(&self) -> usize {
        let component_edits: usize = self
            .components_to_destroy
            .iter()
            .map(|(_, _, indexes)| indexes.len())
            .chain(
                self.components_to_update
                    .iter()
                    .map(|(_, _, writes)| writes.len()),
            )
            .sum();

        self.nodes_to_create.len()
            + self.nodes_to_destroy.len()
            + self.nodes_to_rename.len()
            + self.reparentings.len()
            + component_edits
    }
}
