//! Browse command - open a mounted volume in the file browser.

use anyhow::Result;
use clap::Args as ClapArgs;

use encvol_core::{AppState, ProcessRunner, SystemLauncher};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name
    pub name: String,
}

pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, args: &Args) -> Result<()> {
    app.select(&args.name)?;
    app.browse_selected(&SystemLauncher)?;
    Ok(())
}
