//! Automount command - mount every volume flagged for auto-mount.

use anyhow::Result;
use tracing::instrument;

use encvol_core::{AppState, AutoMountReport, ProcessRunner};

use super::{CommandFailure, Context};

#[instrument(level = "info", name = "cmd::automount", skip_all)]
pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, ctx: &Context) -> Result<()> {
    let report = app.auto_mount(&ctx.interaction(false), &ctx.credentials());
    summarize(&report, ctx)
}

/// Print the report; fails if any volume could not be mounted.
pub fn summarize(report: &AutoMountReport, ctx: &Context) -> Result<()> {
    if report.is_empty() {
        ctx.note("No volumes to auto-mount.");
        return Ok(());
    }
    for name in &report.mounted {
        ctx.note(&format!("Mounted '{name}'"));
    }
    for name in &report.cancelled {
        ctx.note(&format!("Skipped '{name}' (no password)"));
    }
    if report.failed.is_empty() {
        Ok(())
    } else {
        let names: Vec<String> = report.failed.iter().map(|n| format!("'{n}'")).collect();
        Err(CommandFailure::MountFailed(names.join(", ")).into())
    }
}
