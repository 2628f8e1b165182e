use std::{io::Write, path::PathBuf};

use clap::Parser;
use termcolor::{BufferWriter, Color, ColorSpec, WriteColor};

use crate::{reconcile::preview, snapshot::Classification};

use super::{
    scene::{load_project, load_scenes},
    ColorChoice, GlobalOptions,
};

/// Shows what the next sync would change, without changing anything.
#[derive(Debug, Parser)]
pub struct DiffCommand {
    /// Path to the project to inspect. Defaults to the current directory.
    #[clap(default_value = "")]
    pub project: PathBuf,

    /// Print the edits as JSON instead of a summary.
    #[clap(long)]
    pub json: bool,
}

impl DiffCommand {
    pub fn run(self, global: GlobalOptions) -> anyhow::Result<()> {
        let project = load_project(&self.project)?;
        let scenes = load_scenes(&project)?;

        let classification = preview(
            &scenes.graph,
            scenes.target,
            scenes.source,
            &project.aliases,
            &project.rules,
        )?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&classification)?);
        } else {
            show_summary(&classification, global.color)?;
        }

        Ok(())
    }
}

fn show_summary(classification: &Classification, color: ColorChoice) -> anyhow::Result<()> {
    let writer = BufferWriter::stdout(color.into());
    let mut buffer = writer.buffer();

    if classification.is_empty() {
        writeln!(&mut buffer, "Target is up to date.")?;
        writer.print(&buffer)?;
        return Ok(());
    }

    let added = ColorSpec::new().set_fg(Some(Color::Green)).clone();
    let removed = ColorSpec::new().set_fg(Some(Color::Red)).clone();
    let changed = ColorSpec::new().set_fg(Some(Color::Yellow)).clone();

    for name in &classification.nodes_to_create {
        print_line(&mut buffer, &added, "+", name)?;
    }

    for name in &classification.nodes_to_destroy {
        print_line(&mut buffer, &removed, "-", name)?;
    }

    for name in &classification.nodes_to_rename {
        print_line(&mut buffer, &changed, "~", &format!("{} (renamed)", name))?;
    }

    for (child, parent) in &classification.reparentings {
        let parent = if parent.is_empty() { "<root>" } else { parent };
        print_line(&mut buffer, &changed, ">", &format!("{} under {}", child, parent))?;
    }

    for (name, type_name, indexes) in classification.components_to_destroy.iter() {
        for index in indexes {
            print_line(&mut buffer, &removed, "-", &format!("{}.{}[{}]", name, type_name, index))?;
        }
    }

    for (name, type_name, writes) in classification.components_to_update.iter() {
        for write in writes {
            print_line(
                &mut buffer,
                &changed,
                "~",
                &format!("{}.{}[{}]", name, type_name, write.index),
            )?;
        }
    }

    buffer.set_color(&ColorSpec::new())?;
    writeln!(&mut buffer)?;
    writeln!(&mut buffer, "{} edits", classification.edit_count())?;

    writer.print(&buffer)?;

    Ok(())
}

fn print_line(
    buffer: &mut termcolor::Buffer,
    spec: &ColorSpec,
    sigil: &str,
    text: &str,
) -> anyhow::Result<()> {
    buffer.set_color(spec)?;
    write!(buffer, "{} ", sigil)?;
    buffer.set_color(&ColorSpec::new())?;
    writeln!(buffer, "{}", text)?;

    Ok(())
}
