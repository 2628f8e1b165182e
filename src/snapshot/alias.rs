use serde::{Deserialize, Serialize};

/// Declares that a node called `source` in the exported scene is the node
/// called `target` in the customized hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAlias {
    pub source: String,
    pub target: String,
}

/// The user-maintained list of name aliases.
///
/// Meant to be a one-to-one mapping, but nothing enforces that: lookups use
/// the first matching entry, and fall back to the name they were given when
/// nothing matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameAliasTable {
    entries: Vec<NameAlias>,
}

impl NameAliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.entries.push(NameAlias {
            source: source.into(),
            target: target.into(),
        });
    }

    pub fn target_name_for<'a>(&'a self, source: &'a str) -> &'a str {
        self.entries
            .iter()
            .find(|alias| alias.source == source)
            .map(|alias| alias.target.as_str())
            .unwrap_or(source)
    }

    pub fn source_name_for<'a>(&'a self, target: &'a str) -> &'a str {
        self.entries
            .iter()
            .find(|alias| alias.target == target)
            .map(|alias| alias.source.as_str())
            .unwrap_or(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NameAlias> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>, T: Into<String>> FromIterator<(S, T)> for NameAliasTable {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        let mut table = NameAliasTable::new();

        for (source, target) in iter {
            table.push(source, target);
        }

        table
    }
}
