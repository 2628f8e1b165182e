use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::reconcile::reconcile;

use super::scene::{load_project, load_scenes, write_scene};

/// Brings the project's target scene up to date with its source scene.
#[derive(Debug, Parser)]
pub struct SyncCommand {
    /// Path to the project to sync. Defaults to the current directory.
    #[clap(default_value = "")]
    pub project: PathBuf,
}

impl SyncCommand {
    pub fn run(self) -> anyhow::Result<()> {
        let project = load_project(&self.project)?;
        log::debug!("Loaded project '{}'", project.name);

        let mut scenes = load_scenes(&project)?;

        let report = reconcile(
            &mut scenes.graph,
            scenes.target,
            scenes.source,
            &project.aliases,
            &project.rules,
        )
        .with_context(|| format!("could not sync project '{}'", project.name))?;

        if !report.committed {
            return Ok(());
        }

        let target = scenes.graph.to_snapshot(scenes.target)?;
        write_scene(&project.target_path(), &target)?;

        log::info!(
            "Updated {} ({} nodes touched)",
            project.target_path().display(),
            report.touched.len()
        );

        Ok(())
    }
}
