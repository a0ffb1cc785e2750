//! Edit command - change a volume's paths or flags.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use encvol_core::{AppState, ProcessRunner, VolumeUpdate};

use super::{parse_flag, Context};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name
    pub name: String,

    /// New encrypted source directory (not while mounted)
    #[arg(long)]
    pub enc_path: Option<PathBuf>,

    /// New mount directory (not while mounted)
    #[arg(long)]
    pub mount_path: Option<PathBuf>,

    /// Mount automatically at startup
    #[arg(long, value_name = "BOOL", value_parser = parse_flag)]
    pub automount: Option<bool>,

    /// Never unmount automatically on exit
    #[arg(long, value_name = "BOOL", value_parser = parse_flag)]
    pub prevent_auto_unmount: Option<bool>,

    /// The password is stored in the system keychain
    #[arg(long, value_name = "BOOL", value_parser = parse_flag)]
    pub password_saved: Option<bool>,
}

#[instrument(level = "info", name = "cmd::edit", skip_all, fields(name = %args.name))]
pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, args: &Args, ctx: &Context) -> Result<()> {
    let update = VolumeUpdate {
        encrypted_path: args.enc_path.clone(),
        mount_path: args.mount_path.clone(),
        auto_mount: args.automount,
        prevent_auto_unmount: args.prevent_auto_unmount,
        password_saved: args.password_saved,
    };
    if update == VolumeUpdate::default() {
        anyhow::bail!("Nothing to change; pass at least one option (see --help)");
    }

    app.select(&args.name)?;
    app.edit_selected(&update)
        .with_context(|| format!("Failed to edit volume '{}'", args.name))?;
    ctx.note(&format!("Updated volume '{}'", args.name));
    Ok(())
}
