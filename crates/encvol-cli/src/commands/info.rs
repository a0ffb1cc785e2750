//! Info command - print `encfsctl info` for a volume.

use anyhow::Result;
use clap::Args as ClapArgs;

use encvol_core::{AppState, ProcessRunner};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name
    pub name: String,
}

pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, args: &Args) -> Result<()> {
    app.select(&args.name)?;
    println!("EncFS information for '{}'", args.name);
    println!();
    println!("{}", app.info_selected()?);
    Ok(())
}
