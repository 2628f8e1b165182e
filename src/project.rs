use std::{
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::{ComponentRules, NameAliasTable};

pub const PROJECT_FILENAME: &str = "scenesync.json";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("could not read project file {}", .path.display())]
    Io { source: io::Error, path: PathBuf },

    #[error("project file {} is not valid", .path.display())]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
}

/// Contains all of the configuration for one source scene and the target
/// scene it keeps in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// The name of the project, used in log output.
    pub name: String,

    /// Path to the exported scene, relative to the project file.
    pub source: PathBuf,

    /// Path to the locally customized scene, relative to the project file.
    pub target: PathBuf,

    /// Renames carried between the source's node names and the target's.
    #[serde(default, skip_serializing_if = "NameAliasTable::is_empty")]
    pub aliases: NameAliasTable,

    #[serde(flatten)]
    pub rules: ComponentRules,

    /// The path to the file that this project came from. Relative paths in
    /// the project are resolved against this file's folder.
    #[serde(skip)]
    pub file_location: PathBuf,
}

impl Project {
    /// Tells whether the given path describes a project.
    pub fn is_project_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name == PROJECT_FILENAME)
    }

    pub fn load_from_slice(
        contents: &[u8],
        project_file_location: &Path,
    ) -> Result<Self, ProjectError> {
        let mut project: Self = serde_json::from_slice(contents).map_err(|source| ProjectError::Json {
            source,
            path: project_file_location.to_owned(),
        })?;

        project.file_location = project_file_location.to_path_buf();

        Ok(project)
    }

    /// Loads the project file at exactly this path.
    pub fn load_exact(project_file_location: &Path) -> Result<Self, ProjectError> {
        let contents = fs_err::read(project_file_location).map_err(|source| ProjectError::Io {
            source,
            path: project_file_location.to_owned(),
        })?;

        Self::load_from_slice(&contents, project_file_location)
    }

    /// Loads a project from either a path to a project file or a path to a
    /// folder holding one.
    ///
    /// Returns `Ok(None)` when there's no project there at all.
    pub fn load_fuzzy(fuzzy_project_location: &Path) -> Result<Option<Self>, ProjectError> {
        if let Some(location) = Self::locate(fuzzy_project_location) {
            Ok(Some(Self::load_exact(&location)?))
        } else {
            Ok(None)
        }
    }

    fn locate(path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        let child_path = path.join(PROJECT_FILENAME);

        if child_path.is_file() {
            Some(child_path)
        } else {
            None
        }
    }

    pub fn folder_location(&self) -> &Path {
        self.file_location.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn source_path(&self) -> PathBuf {
        self.folder_location().join(&self.source)
    }

    pub fn target_path(&self) -> PathBuf {
        self.folder_location().join(&self.target)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fill_in_rules() {
        let contents = br#"{
            "name": "car",
            "source": "exported/car.scene",
            "target": "car.scene"
        }"#;

        let project =
            Project::load_from_slice(contents, Path::new("/work/car/scenesync.json")).unwrap();

        assert_eq!(project.name, "car");
        assert_eq!(project.rules, ComponentRules::default());
        assert!(project.aliases.is_empty());
        assert_eq!(project.folder_location(), Path::new("/work/car"));
        assert_eq!(
            project.source_path(),
            Path::new("/work/car/exported/car.scene")
        );
        assert_eq!(project.target_path(), Path::new("/work/car/car.scene"));
    }

    #[test]
    fn aliases_and_rules_are_configurable() {
        let contents = br#"{
            "name": "car",
            "source": "a.scene",
            "target": "b.scene",
            "aliases": [{ "source": "Wheel_FL", "target": "FrontLeftWheel" }],
            "markerType": "Provenance",
            "transformTypes": ["Placement"],
            "transformFields": ["offset"]
        }"#;

        let project = Project::load_from_slice(contents, Path::new("scenesync.json")).unwrap();

        assert_eq!(project.aliases.target_name_for("Wheel_FL"), "FrontLeftWheel");
        assert_eq!(project.rules.marker_type, "Provenance");
        assert!(project.rules.is_transform("Placement"));
        assert!(!project.rules.is_transform("Transform"));
        assert_eq!(project.rules.transform_fields, vec!["offset".to_owned()]);
    }

    #[test]
    fn malformed_project_reports_its_path() {
        let err = Project::load_from_slice(br#"{ "name": 5 }"#, Path::new("broken/scenesync.json"))
            .unwrap_err();

        assert!(err.to_string().contains("broken/scenesync.json"));
    }

    #[test]
    fn fuzzy_load_finds_project_in_folder() {
        let dir = tempfile::tempdir().unwrap();
        let contents = r#"{ "name": "x", "source": "s", "target": "t" }"#;
        fs_err::write(dir.path().join(PROJECT_FILENAME), contents).unwrap();

        let project = Project::load_fuzzy(dir.path()).unwrap().unwrap();
        assert_eq!(project.file_location, dir.path().join(PROJECT_FILENAME));

        let empty = tempfile::tempdir().unwrap();
        assert!(Project::load_fuzzy(empty.path()).unwrap().is_none());
    }
}
