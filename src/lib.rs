//! Keeps a locally customized node tree in step with a source tree that is
//! regenerated from outside, without losing the local customizations.

pub mod cli;
pub mod graph;
pub mod project;
pub mod reconcile;
pub mod snapshot;

mod error;
mod multimap;

pub use crate::error::ReconcileError;
pub use crate::multimap::MultiMap;
