//! Settings command - show or change the global settings.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args as ClapArgs;
use comfy_table::Table;
use tracing::instrument;

use encvol_core::{AppState, ProcessRunner};

use super::{parse_flag, Context};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Path to the encfs binary
    #[arg(long, conflicts_with = "probe_encfs")]
    pub encfs_bin: Option<PathBuf>,

    /// Forget the configured encfs path and look in the usual places
    #[arg(long)]
    pub probe_encfs: bool,

    /// Path to the mount utility (lists active mounts)
    #[arg(long)]
    pub mount_bin: Option<PathBuf>,

    /// Path to the unmount utility
    #[arg(long)]
    pub umount_bin: Option<PathBuf>,

    /// Unmount volumes when a session ends
    #[arg(long, value_name = "BOOL", value_parser = parse_flag)]
    pub auto_unmount: Option<bool>,
}

impl Args {
    fn is_update(&self) -> bool {
        self.encfs_bin.is_some()
            || self.probe_encfs
            || self.mount_bin.is_some()
            || self.umount_bin.is_some()
            || self.auto_unmount.is_some()
    }
}

#[instrument(level = "info", name = "cmd::settings", skip_all)]
pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, args: &Args, ctx: &Context) -> Result<()> {
    if args.is_update() {
        let mut settings = app.settings().clone();
        if let Some(path) = &args.encfs_bin {
            settings.encfs_bin = Some(path.clone());
        }
        if args.probe_encfs {
            settings.encfs_bin = None;
        }
        if let Some(path) = &args.mount_bin {
            settings.mount_bin.clone_from(path);
        }
        if let Some(path) = &args.umount_bin {
            settings.umount_bin.clone_from(path);
        }
        if let Some(flag) = args.auto_unmount {
            settings.auto_unmount = flag;
        }
        app.update_settings(&settings)
            .context("Failed to save settings")?;
        ctx.note("Settings saved");
        for issue in app.config_issues() {
            eprintln!("Warning: {issue}");
        }
    }

    let settings = app.settings();
    let encfs = match (&settings.encfs_bin, settings.resolve_encfs()) {
        (Some(configured), _) => configured.display().to_string(),
        (None, Some(found)) => format!("{} (found)", found.display()),
        (None, None) => "(not found)".to_string(),
    };

    let mut table = Table::new();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["encfs".to_string(), encfs]);
    table.add_row(vec!["mount".to_string(), settings.mount_bin.display().to_string()]);
    table.add_row(vec!["umount".to_string(), settings.umount_bin.display().to_string()]);
    table.add_row(vec![
        "auto-unmount".to_string(),
        settings.auto_unmount.to_string(),
    ]);
    table.add_row(vec![
        "config file".to_string(),
        app.store().path().display().to_string(),
    ]);
    println!("{table}");
    Ok(())
}
