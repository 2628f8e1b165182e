//! This module defines the reconciliation engine.
//!
//! A target tree is kept in step with a source tree that some external tool
//! keeps regenerating. Rather than tracking what changed in the source as it
//! happens, every pass captures the source as a lightweight, immutable
//! snapshot and compares it three ways: against the snapshot captured on the
//! previous pass, and against the target as it is now. The comparison
//! produces a minimal set of edits, which is then applied to the target.
//!
//! Comparing against the previous snapshot is what lets local customizations
//! survive. Anything the source didn't change since last time is left alone
//! in the target, even if the target differs from the source there.

mod alias;
mod classification;
mod classify;
mod flat_index;
mod mutate;
mod node_snapshot;
mod rules;
mod text;

#[cfg(test)]
mod tests;

pub use alias::{NameAlias, NameAliasTable};
pub use classification::{Classification, ComponentWrite};
pub use classify::classify;
pub use flat_index::FlatIndex;
pub use mutate::apply_classification;
pub use node_snapshot::NodeSnapshot;
pub use rules::ComponentRules;
pub use text::{ParseError, UnrepresentableError, CHILD_MARKER, MAX_DEPTH};
