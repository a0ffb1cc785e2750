//! Autounmount command - unmount every mounted volume that is not exempt.

use anyhow::Result;
use tracing::instrument;

use encvol_core::{AppState, AutoUnmountReport, ProcessRunner};

use super::Context;

#[instrument(level = "info", name = "cmd::autounmount", skip_all)]
pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, ctx: &Context) -> Result<()> {
    let report = app.auto_unmount();
    summarize(&report, ctx);
    Ok(())
}

/// Print the report. Volumes that stay mounted are reported, not fatal.
pub fn summarize(report: &AutoUnmountReport, ctx: &Context) {
    for name in &report.unmounted {
        ctx.note(&format!("Unmounted '{name}'"));
    }
    for name in &report.exempt {
        ctx.note(&format!("Left '{name}' mounted (auto-unmount disabled)"));
    }
    for name in &report.still_mounted {
        eprintln!("Warning: '{name}' is still mounted (volume busy?)");
    }
}
