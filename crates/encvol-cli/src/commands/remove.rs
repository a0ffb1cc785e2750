//! Remove command - forget a volume.
//!
//! Only the definition is removed. A mounted volume stays mounted and no
//! data is touched.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use encvol_core::{AppState, ProcessRunner};

use super::{CommandFailure, Context};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name
    pub name: String,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[instrument(level = "info", name = "cmd::remove", skip_all, fields(name = %args.name))]
pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, args: &Args, ctx: &Context) -> Result<()> {
    app.select(&args.name)?;
    let still_mounted = app.selected().is_some_and(|v| v.mounted);

    if !app.remove_selected(&ctx.interaction(args.yes))? {
        return Err(CommandFailure::Declined.into());
    }

    ctx.note(&format!("Removed volume '{}'", args.name));
    if still_mounted {
        ctx.note("The volume is still mounted; unmount it manually when done.");
    }
    Ok(())
}
