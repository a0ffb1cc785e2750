//! List command - show the registered volumes and their mount state.

use anyhow::Result;
use clap::Args as ClapArgs;
use comfy_table::{Cell, Color, Table};
use tracing::instrument;

use encvol_core::{AppState, ProcessRunner, VolumeDefinition};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::list", skip_all)]
pub fn execute<R: ProcessRunner>(app: &AppState<R>, args: &Args) -> Result<()> {
    let volumes: Vec<&VolumeDefinition> = app.registry().iter().collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&volumes)?);
        return Ok(());
    }

    if volumes.is_empty() {
        eprintln!("No volumes registered.");
        eprintln!("Use 'encvol add <name> <encrypted-dir> <mount-dir>' to add one.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Mounted",
        "Name",
        "Encrypted path",
        "Mounted at",
        "Automount",
    ]);

    for volume in &volumes {
        let state = if volume.mounted {
            Cell::new("YES").fg(Color::Green)
        } else {
            Cell::new("NO").fg(Color::Blue)
        };
        table.add_row(vec![
            state,
            Cell::new(&volume.name),
            Cell::new(volume.encrypted_path.display()),
            Cell::new(volume.mount_path.display()),
            Cell::new(if volume.auto_mount { "YES" } else { "NO" }),
        ]);
    }

    println!("{table}");
    eprintln!();
    eprintln!("{}", app.status_line());
    Ok(())
}
