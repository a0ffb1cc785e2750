//! Add command - register an existing encrypted folder.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use encvol_core::{AppState, ProcessRunner, VolumeDefinition};

use super::Context;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Unique volume name
    pub name: String,

    /// Encrypted source directory
    pub encrypted_path: PathBuf,

    /// Where the decrypted view is mounted
    pub mount_path: PathBuf,

    /// Mount automatically at startup
    #[arg(long)]
    pub automount: bool,

    /// Never unmount automatically on exit
    #[arg(long)]
    pub prevent_auto_unmount: bool,

    /// The password is stored in the system keychain
    #[arg(long)]
    pub password_saved: bool,
}

#[instrument(level = "info", name = "cmd::add", skip_all, fields(name = %args.name))]
pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, args: &Args, ctx: &Context) -> Result<()> {
    let mut volume = VolumeDefinition::new(
        args.name.clone(),
        args.encrypted_path.clone(),
        args.mount_path.clone(),
    );
    volume.auto_mount = args.automount;
    volume.prevent_auto_unmount = args.prevent_auto_unmount;
    volume.password_saved = args.password_saved;

    if !args.encrypted_path.is_dir() {
        tracing::warn!(
            "Encrypted path {} does not exist yet",
            args.encrypted_path.display()
        );
    }

    app.create_volume(&volume)
        .with_context(|| format!("Failed to add volume '{}'", args.name))?;
    ctx.note(&format!("Added volume '{}'", args.name));
    Ok(())
}
