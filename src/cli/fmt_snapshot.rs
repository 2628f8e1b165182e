use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use super::{
    resolve_path,
    scene::{read_scene, write_scene},
};

/// Rewrite a scene file in canonical snapshot form.
#[derive(Debug, Parser)]
pub struct FmtSnapshotCommand {
    /// Path to the scene file to format.
    pub file: PathBuf,
}

impl FmtSnapshotCommand {
    pub fn run(self) -> anyhow::Result<()> {
        let path = resolve_path(&self.file)?;

        let snapshot = read_scene(&path)?
            .with_context(|| format!("{} does not exist", path.display()))?;

        write_scene(&path, &snapshot)?;

        Ok(())
    }
}
