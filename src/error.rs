use thiserror::Error;

use crate::{
    graph::GraphError,
    snapshot::{ParseError, UnrepresentableError},
};

/// Everything that can abort a reconciliation pass. Whenever one of these is
/// returned, the original target has not been modified.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("the source history stored on the target is malformed")]
    MalformedHistory {
        #[source]
        source: ParseError,
    },

    #[error("the source cannot be stored as history")]
    UnrepresentableSource {
        #[source]
        source: UnrepresentableError,
    },

    #[error("transform payload for node '{node}' is not valid JSON")]
    MalformedTransform {
        node: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("transform payload for node '{node}' is not a JSON object")]
    TransformNotAnObject { node: String },

    #[error(transparent)]
    Graph {
        #[from]
        source: GraphError,
    },
}

impl ReconcileError {
    pub(crate) fn malformed_transform(source: serde_json::Error, node: impl Into<String>) -> Self {
        Self::MalformedTransform {
            node: node.into(),
            source,
        }
    }
}
