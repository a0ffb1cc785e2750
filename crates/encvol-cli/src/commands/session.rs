//! Session command - the long-running mode of the desktop tool.
//!
//! Auto-mounts at start, then waits until interrupted (Ctrl+C or SIGTERM)
//! and runs the quit flow: confirm, and auto-unmount when enabled in the
//! settings. Declining the confirmation keeps the session running. Without
//! a terminal on stdin nobody can answer, so an interrupt quits directly.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use encvol_core::{AppState, ProcessRunner, QuitOutcome};

use super::{automount, autounmount, Context};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Quit without asking for confirmation on interrupt
    #[arg(short, long)]
    pub yes: bool,

    /// Skip auto-mount at start
    #[arg(long)]
    pub no_automount: bool,
}

#[instrument(level = "info", name = "cmd::session", skip_all)]
pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, args: &Args, ctx: &Context) -> Result<()> {
    if !args.no_automount {
        let report = app.auto_mount(&ctx.interaction(false), &ctx.credentials());
        // Failed mounts were already reported; the session keeps running.
        if let Err(e) = automount::summarize(&report, ctx) {
            eprintln!("Warning: {e}");
        }
    }
    ctx.note(&app.status_line());

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let assume_yes = args.yes || !std::io::stdin().is_terminal();
    ctx.note("Press Ctrl+C to quit");
    loop {
        while running.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(100));
        }
        eprintln!();

        match app.quit(&ctx.interaction(assume_yes)) {
            QuitOutcome::Cancelled => {
                ctx.note("Still running. Press Ctrl+C to quit");
                running.store(true, Ordering::SeqCst);
            }
            QuitOutcome::Exit(report) => {
                if let Some(report) = report {
                    autounmount::summarize(&report, ctx);
                }
                return Ok(());
            }
        }
    }
}
