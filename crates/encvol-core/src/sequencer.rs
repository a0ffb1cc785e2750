//! Bulk auto-mount at startup and auto-unmount at exit, plus the password
//! retry loop shared with interactive mounting.

use serde::Serialize;

use crate::interact::{CredentialStore, Interaction};
use crate::orchestrator::{MountOutcome, Orchestrator};
use crate::process::ProcessRunner;
use crate::registry::{Registry, VolumeDefinition};

/// How a mount-with-retry sequence for one volume ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountAttempt {
    /// Mounted after `attempts` tries
    Mounted {
        /// Number of passphrases tried, including the successful one
        attempts: u32,
    },
    /// No passphrase was obtained; nothing more was tried
    Cancelled {
        /// Passphrases rejected before the user gave up
        rejected: u32,
    },
    /// encfs failed for a reason other than the passphrase
    Failed,
}

/// Mount one volume, asking again for as long as the passphrase is rejected.
///
/// The passphrase comes from `credentials` when the volume has a saved
/// password, otherwise from the user. A saved passphrase that is rejected is
/// not read again: later attempts prompt the user instead. There is no cap
/// on the number of attempts; the loop ends on success, on another kind of
/// failure (reported through [`Interaction::notify_error`]) or when no
/// passphrase is supplied. Prompts read "Please enter password to
/// `action`".
pub fn mount_with_retry<R, I, C>(
    orchestrator: &Orchestrator<'_, R>,
    volume: &mut VolumeDefinition,
    interaction: &I,
    credentials: &C,
    title: &str,
    action: &str,
) -> MountAttempt
where
    R: ProcessRunner,
    I: Interaction + ?Sized,
    C: CredentialStore + ?Sized,
{
    let mut use_saved = volume.password_saved;
    let mut failures = 0u32;

    loop {
        let passphrase = if use_saved {
            credentials.get_password(&volume.name)
        } else {
            interaction.prompt_password(title, &prompt_message(volume, action, failures))
        };
        let Some(passphrase) = passphrase.filter(|p| !p.is_empty()) else {
            tracing::info!("No password for '{}', not mounting", volume.name);
            return MountAttempt::Cancelled { rejected: failures };
        };

        match orchestrator.mount(volume, &passphrase) {
            MountOutcome::Ok => {
                return MountAttempt::Mounted {
                    attempts: failures + 1,
                };
            }
            MountOutcome::PasswordFailure => {
                failures += 1;
                if use_saved {
                    tracing::warn!("Saved password for '{}' was rejected", volume.name);
                    use_saved = false;
                }
            }
            MountOutcome::OtherFailure => {
                interaction.notify_error(
                    &format!("Error found while mounting '{}'", volume.name),
                    &format!(
                        "Unable to mount volume '{}'\nEncfs folder: {}\nMount path: {}",
                        volume.name,
                        volume.encrypted_path.display(),
                        volume.mount_path.display()
                    ),
                );
                return MountAttempt::Failed;
            }
        }
    }
}

fn prompt_message(volume: &VolumeDefinition, action: &str, failures: u32) -> String {
    let warning = match failures {
        0 => String::new(),
        1 => "** You have entered an invalid password **\n\n".to_string(),
        n => format!("** You have entered an invalid password ({n} failed attempts) **\n\n"),
    };
    format!(
        "{warning}Please enter password to {action}\n'{}'\nas\n'{}'",
        volume.encrypted_path.display(),
        volume.mount_path.display()
    )
}

/// What [`auto_mount_all`] did, by volume name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoMountReport {
    /// Volumes mounted during this run
    pub mounted: Vec<String>,
    /// Volumes skipped because no password was obtained
    pub cancelled: Vec<String>,
    /// Volumes that failed for a reason other than the password
    pub failed: Vec<String>,
}

impl AutoMountReport {
    /// True if no eligible volume was found.
    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty() && self.cancelled.is_empty() && self.failed.is_empty()
    }
}

/// Mount every unmounted volume flagged for auto-mount, in registry order.
pub fn auto_mount_all<R, I, C>(
    registry: &mut Registry,
    orchestrator: &Orchestrator<'_, R>,
    interaction: &I,
    credentials: &C,
) -> AutoMountReport
where
    R: ProcessRunner,
    I: Interaction + ?Sized,
    C: CredentialStore + ?Sized,
{
    let mut report = AutoMountReport::default();
    for volume in registry.iter_mut() {
        if volume.mounted || !volume.auto_mount {
            continue;
        }
        let title = format!("Automount '{}'", volume.name);
        let attempt =
            mount_with_retry(orchestrator, volume, interaction, credentials, &title, "auto-mount");
        let bucket = match attempt {
            MountAttempt::Mounted { .. } => &mut report.mounted,
            MountAttempt::Cancelled { .. } => &mut report.cancelled,
            MountAttempt::Failed => &mut report.failed,
        };
        bucket.push(volume.name.clone());
    }
    tracing::info!(
        "Auto-mount finished: {} mounted, {} skipped, {} failed",
        report.mounted.len(),
        report.cancelled.len(),
        report.failed.len()
    );
    report
}

/// What [`auto_unmount_all`] did, by volume name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoUnmountReport {
    /// Volumes unmounted during this run
    pub unmounted: Vec<String>,
    /// Volumes that stayed mounted (usually busy)
    pub still_mounted: Vec<String>,
    /// Mounted volumes exempt from auto-unmount
    pub exempt: Vec<String>,
}

/// Unmount every mounted volume that is not exempt. Best effort: failures
/// are recorded and otherwise ignored.
pub fn auto_unmount_all<R: ProcessRunner>(
    registry: &mut Registry,
    orchestrator: &Orchestrator<'_, R>,
) -> AutoUnmountReport {
    let mut report = AutoUnmountReport::default();
    for volume in registry.iter_mut().filter(|v| v.mounted) {
        if volume.prevent_auto_unmount {
            report.exempt.push(volume.name.clone());
        } else if orchestrator.unmount(volume) {
            report.unmounted.push(volume.name.clone());
        } else {
            report.still_mounted.push(volume.name.clone());
        }
    }
    report
}
