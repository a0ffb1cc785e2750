//! Status command - encfs readiness, configuration problems and counts.

use anyhow::Result;

use encvol_core::{AppState, ProcessRunner};

pub fn execute<R: ProcessRunner>(app: &AppState<R>) -> Result<()> {
    println!("{}", app.status_banner());
    for issue in app.config_issues() {
        println!("Warning: {issue}");
    }
    println!("Config: {}", app.store().path().display());
    println!("{}", app.status_line());
    Ok(())
}
