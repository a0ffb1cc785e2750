pub mod add;
pub mod automount;
pub mod autounmount;
pub mod browse;
pub mod edit;
pub mod info;
pub mod list;
pub mod mount;
pub mod remove;
pub mod session;
pub mod settings;
pub mod status;
pub mod unmount;

use encvol_core::{KeychainStore, SystemRunner};
use thiserror::Error;

use crate::terminal::{PasswordSource, TerminalInteraction};

/// Options shared by every command.
pub struct Context {
    pub password_source: PasswordSource,
    pub quiet: bool,
}

impl Context {
    pub fn interaction(&self, assume_yes: bool) -> TerminalInteraction {
        TerminalInteraction::new(self.password_source).assume_yes(assume_yes)
    }

    pub fn credentials(&self) -> KeychainStore<SystemRunner> {
        KeychainStore::new(SystemRunner)
    }

    /// Print a progress line unless `--quiet`.
    pub fn note(&self, message: &str) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }
}

/// Command outcomes that map to dedicated exit codes.
#[derive(Debug, Error)]
pub enum CommandFailure {
    #[error("Password for '{0}' was rejected")]
    PasswordRejected(String),

    #[error("Mounting '{0}' was cancelled")]
    MountCancelled(String),

    #[error("Failed to mount {0}")]
    MountFailed(String),

    #[error("'{0}' is still mounted; close open files and try again")]
    StillMounted(String),

    #[error("Cancelled")]
    Declined,
}

/// Parse `true`/`false`/`yes`/`no`/`1`/`0` for flag options.
pub fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("expected true or false, got '{other}'")),
    }
}
