//! Loads scene files into a graph the engine can work on, and writes them
//! back. A scene file holds one tree in snapshot text form, including every
//! component on its root.

use std::{io, path::Path};

use anyhow::{bail, Context};

use crate::{
    graph::{MemoryGraph, NodeId},
    project::Project,
    snapshot::NodeSnapshot,
};

use super::resolve_path;

pub(super) struct Scenes {
    pub graph: MemoryGraph,
    pub source: NodeId,
    pub target: NodeId,
}

pub(super) fn load_project(path: &Path) -> anyhow::Result<Project> {
    let base_path = resolve_path(path)?;

    match Project::load_fuzzy(&base_path)? {
        Some(project) => Ok(project),
        None => bail!(
            "no project file was found at {}. Expected a {} file or a folder containing one.",
            base_path.display(),
            crate::project::PROJECT_FILENAME
        ),
    }
}

pub(super) fn load_scenes(project: &Project) -> anyhow::Result<Scenes> {
    let source_path = project.source_path();
    let target_path = project.target_path();

    let source_snapshot = read_scene(&source_path)?
        .with_context(|| format!("source scene {} does not exist", source_path.display()))?;

    // A target that doesn't exist yet gets created by the first sync.
    let target_snapshot = match read_scene(&target_path)? {
        Some(snapshot) => snapshot,
        None => {
            log::info!(
                "{} does not exist yet, starting from an empty scene",
                target_path.display()
            );
            NodeSnapshot::new()
        }
    };

    let mut graph = MemoryGraph::with_exclusive_family(project.rules.transform_types.clone());
    let source = graph.load_snapshot(&project.name, &source_snapshot)?;
    let target = graph.load_snapshot(&project.name, &target_snapshot)?;

    Ok(Scenes {
        graph,
        source,
        target,
    })
}

pub(super) fn read_scene(path: &Path) -> anyhow::Result<Option<NodeSnapshot>> {
    let contents = match fs_err::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let snapshot = NodeSnapshot::from_text(&contents)
        .with_context(|| format!("scene file {} is malformed", path.display()))?;

    Ok(Some(snapshot))
}

pub(super) fn write_scene(path: &Path, snapshot: &NodeSnapshot) -> anyhow::Result<()> {
    let mut contents = snapshot.to_text();
    contents.push('\n');

    fs_err::write(path, contents)
        .with_context(|| format!("could not write scene file {}", path.display()))
}
