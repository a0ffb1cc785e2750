#![deny(unsafe_code)]

// Use mimalloc for reduced allocation latency (enabled by default).
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod exit_code;
mod terminal;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use encvol_core::{AppState, ConfigStore, CoreError, RegistryError, StoreError, SystemRunner};

use crate::commands::{
    add, automount, autounmount, browse, edit, info, list, mount, remove, session, settings,
    status, unmount, CommandFailure, Context,
};
use crate::terminal::PasswordSource;

/// Manage and mount EncFS volumes
#[derive(Parser)]
#[command(name = "encvol")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Register an existing encrypted folder
    encvol add work ~/.work-encrypted ~/Work --automount

    # Mount it (prompts for the password)
    encvol mount work

    # Mount with a password from a secret manager
    pass show encfs/work | encvol --password-stdin mount work

    # Mount everything flagged for auto-mount, unmount on Ctrl-C
    encvol session

Configuration lives in the platform config directory, or in
$ENCVOL_CONFIG_DIR/config.toml when that variable is set.
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Read the password from stdin (single line, one attempt)
    #[arg(long, global = true)]
    password_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered volumes
    List(list::Args),

    /// Register an existing encrypted folder
    Add(add::Args),

    /// Change a volume's paths or flags
    Edit(edit::Args),

    /// Forget a volume (does not unmount or delete anything)
    Remove(remove::Args),

    /// Mount a volume
    Mount(mount::Args),

    /// Unmount a volume
    Unmount(unmount::Args),

    /// Show encfsctl information for a volume
    Info(info::Args),

    /// Open a mounted volume in the file browser
    Browse(browse::Args),

    /// Mount every volume flagged for auto-mount
    Automount,

    /// Unmount every mounted volume not exempt from auto-unmount
    Autounmount,

    /// Show or change settings
    Settings(settings::Args),

    /// Show encfs status, configuration problems and volume counts
    Status,

    /// Auto-mount, wait for Ctrl-C, then quit
    Session(session::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            let args: Vec<String> = std::env::args().collect();
            let is_quiet = args.iter().any(|a| a == "-q" || a == "--quiet");

            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let store = ConfigStore::at_default_location()?;
    let mut app = AppState::load(store, SystemRunner);

    if !cli.quiet {
        if let Some(warning) = app.load_status().warning_message() {
            eprintln!("Warning: {warning}");
        }
        if !matches!(cli.command, Commands::Status) {
            for issue in app.config_issues() {
                eprintln!("Warning: {issue}");
            }
        }
    }

    let ctx = Context {
        password_source: if cli.password_stdin {
            PasswordSource::Stdin
        } else {
            PasswordSource::Prompt
        },
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::List(args) => list::execute(&app, &args),
        Commands::Add(args) => add::execute(&mut app, &args, &ctx),
        Commands::Edit(args) => edit::execute(&mut app, &args, &ctx),
        Commands::Remove(args) => remove::execute(&mut app, &args, &ctx),
        Commands::Mount(args) => mount::execute(&mut app, &args, &ctx),
        Commands::Unmount(args) => unmount::execute(&mut app, &args, &ctx),
        Commands::Info(args) => info::execute(&mut app, &args),
        Commands::Browse(args) => browse::execute(&mut app, &args),
        Commands::Automount => automount::execute(&mut app, &ctx),
        Commands::Autounmount => autounmount::execute(&mut app, &ctx),
        Commands::Settings(args) => settings::execute(&mut app, &args, &ctx),
        Commands::Status => status::execute(&app),
        Commands::Session(args) => session::execute(&mut app, &args, &ctx),
    }
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(failure) = cause.downcast_ref::<CommandFailure>() {
            return match failure {
                CommandFailure::PasswordRejected(_) => exit_code::AUTH_FAILED,
                CommandFailure::MountCancelled(_) | CommandFailure::Declined => {
                    exit_code::CANCELLED
                }
                CommandFailure::MountFailed(_) | CommandFailure::StillMounted(_) => {
                    exit_code::MOUNT_FAILED
                }
            };
        }

        if let Some(registry_err) = cause.downcast_ref::<RegistryError>()
            && matches!(registry_err, RegistryError::NotFound(_))
        {
            return exit_code::NOT_FOUND;
        }

        if let Some(core_err) = cause.downcast_ref::<CoreError>() {
            match core_err {
                CoreError::Registry(RegistryError::NotFound(_)) => return exit_code::NOT_FOUND,
                CoreError::Config(_) | CoreError::Store(_) => return exit_code::CONFIG_ERROR,
                _ => {}
            }
        }

        if cause.downcast_ref::<StoreError>().is_some() {
            return exit_code::CONFIG_ERROR;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && io_err.kind() == io::ErrorKind::Interrupted
        {
            return exit_code::CANCELLED;
        }
    }

    exit_code::GENERAL_ERROR
}
