//! Mount command - mount one volume, asking again while the password is wrong.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use encvol_core::{AppState, MountAttempt, ProcessRunner};

use super::{CommandFailure, Context};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume name
    pub name: String,
}

#[instrument(level = "info", name = "cmd::mount", skip_all, fields(name = %args.name))]
pub fn execute<R: ProcessRunner>(app: &mut AppState<R>, args: &Args, ctx: &Context) -> Result<()> {
    app.select(&args.name)?;
    let attempt = app.mount_selected(&ctx.interaction(false), &ctx.credentials())?;

    match attempt {
        MountAttempt::Mounted { attempts } => {
            let mount_path = app
                .registry()
                .get(&args.name)
                .map(|v| v.mount_path.display().to_string())
                .unwrap_or_default();
            ctx.note(&format!("Mounted '{}' at {}", args.name, mount_path));
            tracing::debug!("Mounted after {} attempt(s)", attempts);
            Ok(())
        }
        MountAttempt::Cancelled { rejected: 0 } => {
            Err(CommandFailure::MountCancelled(args.name.clone()).into())
        }
        MountAttempt::Cancelled { .. } => {
            Err(CommandFailure::PasswordRejected(args.name.clone()).into())
        }
        MountAttempt::Failed => Err(CommandFailure::MountFailed(format!("'{}'", args.name)).into()),
    }
}
