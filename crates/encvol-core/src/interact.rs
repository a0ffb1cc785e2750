//! Collaborators supplied by the front end.
//!
//! The core never talks to the user or the desktop directly. Password
//! prompts, confirmations, error notifications, credential lookup and the
//! file browser are all reached through the traits below.

use std::io;
use std::path::Path;

use crate::process::{Invocation, ProcessRunner};
use crate::secret::Passphrase;

/// Service name under which volume passphrases are stored.
pub const KEYCHAIN_SERVICE: &str = "encvol";

/// Talks to the user.
pub trait Interaction {
    /// Ask for a passphrase. `None` (or an empty passphrase) means the user
    /// cancelled.
    fn prompt_password(&self, title: &str, message: &str) -> Option<Passphrase>;

    /// Ask a yes/no question.
    fn confirm(&self, title: &str, message: &str) -> bool;

    /// Show an error the user has to acknowledge.
    fn notify_error(&self, title: &str, message: &str);
}

impl<I: Interaction + ?Sized> Interaction for &I {
    fn prompt_password(&self, title: &str, message: &str) -> Option<Passphrase> {
        (**self).prompt_password(title, message)
    }

    fn confirm(&self, title: &str, message: &str) -> bool {
        (**self).confirm(title, message)
    }

    fn notify_error(&self, title: &str, message: &str) {
        (**self).notify_error(title, message);
    }
}

/// Looks up saved passphrases.
pub trait CredentialStore {
    /// The saved passphrase for `volume`, or `None` if there is none.
    fn get_password(&self, volume: &str) -> Option<Passphrase>;
}

impl<C: CredentialStore + ?Sized> CredentialStore for &C {
    fn get_password(&self, volume: &str) -> Option<Passphrase> {
        (**self).get_password(volume)
    }
}

/// A credential store that never has anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentialStore;

impl CredentialStore for NoCredentialStore {
    fn get_password(&self, _volume: &str) -> Option<Passphrase> {
        None
    }
}

/// The platform secret store, queried through its command-line client.
///
/// macOS uses `security find-generic-password`; elsewhere the Secret
/// Service is queried with `secret-tool lookup`. Entries are keyed by
/// [`KEYCHAIN_SERVICE`] and the volume name.
#[derive(Debug, Clone)]
pub struct KeychainStore<R> {
    runner: R,
}

impl<R: ProcessRunner> KeychainStore<R> {
    /// Create a store that runs its lookups through `runner`.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    #[cfg(target_os = "macos")]
    fn lookup_invocation(volume: &str) -> Invocation {
        Invocation::new("/usr/bin/security")
            .args(["find-generic-password", "-s", KEYCHAIN_SERVICE, "-a"])
            .arg(volume)
            .arg("-w")
    }

    #[cfg(not(target_os = "macos"))]
    fn lookup_invocation(volume: &str) -> Invocation {
        Invocation::new("secret-tool")
            .args(["lookup", "service", KEYCHAIN_SERVICE, "volume"])
            .arg(volume)
    }
}

impl<R: ProcessRunner> CredentialStore for KeychainStore<R> {
    fn get_password(&self, volume: &str) -> Option<Passphrase> {
        let out = self.runner.run(&Self::lookup_invocation(volume));
        if !out.success() {
            tracing::debug!("No saved password for '{}'", volume);
            return None;
        }
        // Diagnostics on stderr (GLib warnings and the like) are not part of
        // the secret.
        let secret = out.stdout.trim_end_matches(['\r', '\n']);
        if secret.is_empty() {
            return None;
        }
        Some(Passphrase::new(secret))
    }
}

/// Opens paths in the desktop file browser.
pub trait Launcher {
    /// Open `path`.
    fn open_path(&self, path: &Path) -> io::Result<()>;
}

/// Opens paths with the platform default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open_path(&self, path: &Path) -> io::Result<()> {
        tracing::debug!("Opening {}", path.display());
        open::that(path)
    }
}
