//! The per-volume mount and unmount protocol.
//!
//! Mount success is never taken from encfs' exit status. After every
//! invocation the mount table is captured again and the target path is
//! looked up; only the known bad-password signature short-circuits that
//! check.

use std::fmt;
use std::path::Path;

use crate::error::CoreError;
use crate::mount_table::MountTable;
use crate::process::{Invocation, ProcessRunner};
use crate::registry::VolumeDefinition;
use crate::secret::Passphrase;
use crate::settings::Settings;

/// Output fragment encfs prints when the passphrase cannot decode the volume key.
pub const PASSWORD_FAILURE_SIGNATURE: &str = "Error decoding volume key, password incorrect";

/// Classified result of one mount attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    /// The mount path now shows up in the mount table
    Ok,
    /// encfs rejected the passphrase
    PasswordFailure,
    /// Anything else: missing binary, permissions, busy target, corruption
    OtherFailure,
}

impl MountOutcome {
    /// True for [`MountOutcome::Ok`].
    pub fn is_ok(self) -> bool {
        self == MountOutcome::Ok
    }
}

impl fmt::Display for MountOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MountOutcome::Ok => "mounted",
            MountOutcome::PasswordFailure => "password incorrect",
            MountOutcome::OtherFailure => "mount failed",
        })
    }
}

/// Drives encfs and the OS mount utilities for one volume at a time.
///
/// Borrows the runner and the settings for the duration of an operation;
/// the volume is borrowed mutably so that only one mount or unmount can be
/// in flight for it.
pub struct Orchestrator<'a, R: ProcessRunner> {
    runner: &'a R,
    settings: &'a Settings,
}

impl<'a, R: ProcessRunner> Orchestrator<'a, R> {
    /// Create an orchestrator over a runner and the current settings.
    pub fn new(runner: &'a R, settings: &'a Settings) -> Self {
        Self { runner, settings }
    }

    /// Capture the mount table once.
    pub fn snapshot(&self) -> MountTable {
        MountTable::capture(self.runner, &self.settings.mount_bin)
    }

    /// Mount `volume` with `passphrase`.
    ///
    /// Sets `volume.mounted` only on [`MountOutcome::Ok`]; any other outcome
    /// leaves it untouched.
    pub fn mount(&self, volume: &mut VolumeDefinition, passphrase: &Passphrase) -> MountOutcome {
        let Some(encfs) = self.settings.encfs_program() else {
            tracing::warn!("Cannot mount '{}': encfs not found", volume.name);
            return MountOutcome::OtherFailure;
        };

        self.ensure_mount_point(&volume.mount_path);

        tracing::info!(
            "Mounting '{}': {} -> {}",
            volume.name,
            volume.encrypted_path.display(),
            volume.mount_path.display()
        );
        let invocation = Invocation::new(encfs)
            .args(["-v", "-S", "-o"])
            .arg(format!("volname={}", volume.name))
            .arg(&volume.encrypted_path)
            .arg(&volume.mount_path)
            .stdin(passphrase.to_stdin_bytes());
        let out = self.runner.run(&invocation);

        if out.output.contains(PASSWORD_FAILURE_SIGNATURE) {
            tracing::info!("Password rejected for '{}'", volume.name);
            return MountOutcome::PasswordFailure;
        }

        if self.snapshot().contains(&volume.mount_path) {
            volume.mounted = true;
            tracing::info!("Mounted '{}' at {}", volume.name, volume.mount_path.display());
            MountOutcome::Ok
        } else {
            tracing::warn!(
                "Mounting '{}' failed (exit {:?}): {}",
                volume.name,
                out.status,
                out.output.trim()
            );
            MountOutcome::OtherFailure
        }
    }

    /// Unmount `volume`. Returns true once the mount path is gone from the
    /// mount table; on false the volume is left marked as mounted.
    pub fn unmount(&self, volume: &mut VolumeDefinition) -> bool {
        tracing::info!("Unmounting '{}' from {}", volume.name, volume.mount_path.display());
        let out = self
            .runner
            .run(&Invocation::new(&self.settings.umount_bin).arg(&volume.mount_path));

        if self.snapshot().contains(&volume.mount_path) {
            tracing::warn!(
                "'{}' is still mounted at {} (volume busy?): {}",
                volume.name,
                volume.mount_path.display(),
                out.output.trim()
            );
            false
        } else {
            volume.mounted = false;
            tracing::info!("Unmounted '{}'", volume.name);
            true
        }
    }

    /// The encfs version string, if encfs can be run.
    pub fn encfs_version(&self) -> Option<String> {
        let encfs = self.settings.resolve_encfs()?;
        let out = self.runner.run(&Invocation::new(encfs).arg("--version"));
        let version = out.output.trim();
        (out.status.is_some() && !version.is_empty()).then(|| version.to_string())
    }

    /// Output of `encfsctl info` for the volume's encrypted directory.
    pub fn volume_info(&self, volume: &VolumeDefinition) -> Result<String, CoreError> {
        let encfsctl = self.settings.resolve_encfsctl().ok_or_else(|| {
            CoreError::Config("encfsctl not found next to the encfs binary".to_string())
        })?;
        let out = self
            .runner
            .run(&Invocation::new(encfsctl).arg("info").arg(&volume.encrypted_path));
        Ok(out.output)
    }

    fn ensure_mount_point(&self, mount_path: &Path) {
        let out = self
            .runner
            .run(&Invocation::new("mkdir").arg("-p").arg(mount_path));
        if !out.success() {
            tracing::debug!(
                "Could not create mount point {}: {}",
                mount_path.display(),
                out.output.trim()
            );
        }
    }
}
