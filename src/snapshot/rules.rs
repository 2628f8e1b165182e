use serde::{Deserialize, Serialize};

/// Describes which component types get special treatment while capturing
/// snapshots and applying edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComponentRules {
    /// The component that marks a target and carries the text of the last
    /// source snapshot it was reconciled against. Never captured in snapshots.
    pub marker_type: String,

    /// The family of placement components. The root's placement is left out
    /// of snapshots, and nodes that change parent always get theirs rewritten.
    pub transform_types: Vec<String>,

    /// Fields copied out of a transform payload when the transform has to be
    /// merged into an existing component of a different family member.
    pub transform_fields: Vec<String>,
}

impl ComponentRules {
    pub fn is_marker(&self, type_name: &str) -> bool {
        self.marker_type == type_name
    }

    pub fn is_transform(&self, type_name: &str) -> bool {
        self.transform_types.iter().any(|name| name == type_name)
    }
}

impl Default for ComponentRules {
    fn default() -> Self {
        ComponentRules {
            marker_type: "SyncMarker".to_owned(),
            transform_types: vec!["Transform".to_owned(), "RectTransform".to_owned()],
            transform_fields: vec![
                "localPosition".to_owned(),
                "localRotation".to_owned(),
                "localScale".to_owned(),
            ],
        }
    }
}
