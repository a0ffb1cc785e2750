//! Unmount command - unmount one volume after confirmation.
//!
//! The result is checked against the mount table; a busy volume (open files)
//! stays mounted and the command fails.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use encvol_core::{AppState, ProcessRunner, UnmountResult};

use super::{CommandFailure, Context};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name
    pub name: String,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[instrument(level = "info", name = "cmd::unmount", skip_all, fields(name = %args.name))]
pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, args: &Args, ctx: &Context) -> Result<()> {
    app.select(&args.name)?;
    match app.unmount_selected(&ctx.interaction(args.yes))? {
        UnmountResult::Unmounted => {
            ctx.note(&format!("Unmounted '{}'", args.name));
            Ok(())
        }
        UnmountResult::Declined => Err(CommandFailure::Declined.into()),
        UnmountResult::StillMounted => Err(CommandFailure::StillMounted(args.name.clone()).into()),
    }
}
