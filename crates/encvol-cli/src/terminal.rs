//! Terminal implementations of the interaction collaborators.

use std::cell::Cell;
use std::io::{self, BufRead, IsTerminal, Write};

use encvol_core::{Interaction, Passphrase};

/// Where passphrases come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource {
    /// Prompt on the controlling terminal, as often as needed
    Prompt,
    /// Read one line from stdin; later requests count as cancelled
    Stdin,
}

/// Prompts, confirmations and error messages on stderr.
pub struct TerminalInteraction {
    source: PasswordSource,
    stdin_consumed: Cell<bool>,
    assume_yes: bool,
}

impl TerminalInteraction {
    pub fn new(source: PasswordSource) -> Self {
        Self {
            source,
            stdin_consumed: Cell::new(false),
            assume_yes: false,
        }
    }

    /// Answer every confirmation with yes.
    #[must_use]
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    fn read_stdin_password(&self) -> Option<Passphrase> {
        if self.stdin_consumed.replace(true) {
            return None;
        }
        let mut line = String::new();
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            tracing::warn!("Failed to read password from stdin: {}", e);
            return None;
        }
        let password = line.trim_end_matches(['\r', '\n']);
        (!password.is_empty()).then(|| Passphrase::new(password))
    }
}

impl Interaction for TerminalInteraction {
    fn prompt_password(&self, title: &str, message: &str) -> Option<Passphrase> {
        match self.source {
            PasswordSource::Stdin => self.read_stdin_password(),
            PasswordSource::Prompt => {
                eprintln!("{title}");
                eprintln!("{message}");
                match rpassword::prompt_password("Password: ") {
                    Ok(password) if !password.is_empty() => Some(Passphrase::new(password)),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::debug!("Password prompt unavailable: {}", e);
                        None
                    }
                }
            }
        }
    }

    fn confirm(&self, title: &str, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        if !io::stdin().is_terminal() {
            eprintln!("{title} (use --yes to confirm non-interactively)");
            return false;
        }

        eprintln!("{message}");
        eprint!("{title} [y/N] ");
        if io::stderr().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }

    fn notify_error(&self, title: &str, message: &str) {
        eprintln!("Error: {title}");
        eprintln!("{message}");
    }
}
