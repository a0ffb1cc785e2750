//! Application state owned by the front end.
//!
//! [`AppState`] ties the store, the settings, the registry and the
//! selection together. Every operation that changes persisted data ends by
//! rebuilding the registry from disk and the live mount table, which also
//! clears the selection.

use std::fmt;
use std::path::Path;

use crate::error::{CoreError, RegistryError, Result};
use crate::interact::{CredentialStore, Interaction, Launcher};
use crate::orchestrator::Orchestrator;
use crate::process::ProcessRunner;
use crate::registry::{Registry, VolumeDefinition, VolumeUpdate};
use crate::sequencer::{self, AutoMountReport, AutoUnmountReport, MountAttempt};
use crate::settings::{ConfigIssue, Settings};
use crate::store::{ConfigLoadStatus, ConfigStore};

/// User-facing operations, one per toolbar button or menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Register an existing encrypted folder
    AddExisting,
    /// Mount the selected volume
    Mount,
    /// Unmount the selected volume
    Unmount,
    /// Open the selected volume's mount path
    Browse,
    /// Edit the selected volume's definition
    Edit,
    /// Forget the selected volume
    Remove,
    /// Show `encfsctl info` for the selected volume
    Info,
    /// Change global settings
    Settings,
    /// Leave the application
    Quit,
}

impl Operation {
    /// Every operation, in toolbar order.
    pub const ALL: [Operation; 9] = [
        Operation::AddExisting,
        Operation::Mount,
        Operation::Unmount,
        Operation::Browse,
        Operation::Edit,
        Operation::Remove,
        Operation::Info,
        Operation::Settings,
        Operation::Quit,
    ];

    /// Whether the operation acts on the selected volume.
    pub fn needs_selection(self) -> bool {
        !matches!(
            self,
            Operation::AddExisting | Operation::Settings | Operation::Quit
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::AddExisting => "add existing",
            Operation::Mount => "mount",
            Operation::Unmount => "unmount",
            Operation::Browse => "browse",
            Operation::Edit => "edit",
            Operation::Remove => "remove",
            Operation::Info => "info",
            Operation::Settings => "settings",
            Operation::Quit => "quit",
        })
    }
}

/// Result of an interactive unmount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountResult {
    /// The user did not confirm; nothing was run
    Declined,
    /// The volume is no longer mounted
    Unmounted,
    /// The unmount utility ran but the path is still mounted
    StillMounted,
}

/// What activating (double-clicking) a volume did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The volume was mounted, so its mount path was opened
    Browsed,
    /// The volume was not mounted, so a mount was attempted
    Mount(MountAttempt),
}

/// Result of the quit flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuitOutcome {
    /// The user chose to stay
    Cancelled,
    /// Leave; carries the auto-unmount report when auto-unmount is enabled
    Exit(Option<AutoUnmountReport>),
}

/// The controller state: settings, registry and selection.
pub struct AppState<R: ProcessRunner> {
    store: ConfigStore,
    runner: R,
    settings: Settings,
    registry: Registry,
    selected: Option<String>,
    load_status: ConfigLoadStatus,
    issues: Vec<ConfigIssue>,
}

impl<R: ProcessRunner> AppState<R> {
    /// Load settings and volumes from `store` and reconcile them with the
    /// live mount table.
    pub fn load(store: ConfigStore, runner: R) -> Self {
        let mut state = Self {
            store,
            runner,
            settings: Settings::default(),
            registry: Registry::default(),
            selected: None,
            load_status: ConfigLoadStatus::Fresh,
            issues: Vec::new(),
        };
        state.refresh();
        state
    }

    /// Rebuild everything from disk and one fresh mount-table snapshot.
    ///
    /// Clears the selection.
    pub fn refresh(&mut self) {
        let (doc, status) = self.store.load();
        if let Some(warning) = status.warning_message() {
            tracing::debug!("Config load issue: {}", warning);
        }

        self.settings = Settings::from_document(&doc);
        self.issues = self.settings.diagnose();
        // Surfacing these to the user is left to the front end.
        for issue in &self.issues {
            tracing::debug!("{}", issue);
        }

        let snapshot = Orchestrator::new(&self.runner, &self.settings).snapshot();
        self.registry = Registry::load(&doc, &snapshot);
        self.selected = None;
        self.load_status = status;
    }

    /// The configuration store.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// The process runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The volume catalog.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// How the configuration file was loaded on the last refresh.
    pub fn load_status(&self) -> &ConfigLoadStatus {
        &self.load_status
    }

    /// Configuration problems found on the last refresh.
    pub fn config_issues(&self) -> &[ConfigIssue] {
        &self.issues
    }

    /// Whether a usable encfs binary was found.
    pub fn encfs_available(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|i| matches!(i, ConfigIssue::EncfsNotFound { .. }))
    }

    /// An orchestrator over this state's runner and settings.
    pub fn orchestrator(&self) -> Orchestrator<'_, R> {
        Orchestrator::new(&self.runner, &self.settings)
    }

    /// The encfs status banner: version when ready, otherwise a hint.
    pub fn status_banner(&self) -> String {
        if !self.encfs_available() {
            return "** encFS not found. Open 'Settings' and set path to encfs **".to_string();
        }
        match self.orchestrator().encfs_version() {
            Some(version) => format!("encFS ready // {version}"),
            None => "encFS ready".to_string(),
        }
    }

    /// Volume count, mounted count and selection, for a status bar.
    pub fn status_line(&self) -> String {
        let total = self.registry.len();
        let mounted = self.registry.mounted_count();
        let noun = if total == 1 { "volume" } else { "volumes" };
        match &self.selected {
            Some(name) => format!("{total} {noun}, {mounted} mounted, selected '{name}'"),
            None => format!("{total} {noun}, {mounted} mounted"),
        }
    }

    /// Select a volume by name.
    pub fn select(&mut self, name: &str) -> Result<()> {
        if !self.registry.contains(name) {
            return Err(RegistryError::NotFound(name.to_string()).into());
        }
        self.selected = Some(name.to_string());
        Ok(())
    }

    /// Drop the selection.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// The selected volume, if any.
    pub fn selected(&self) -> Option<&VolumeDefinition> {
        self.selected.as_deref().and_then(|n| self.registry.get(n))
    }

    /// Whether `op` is currently enabled.
    pub fn is_available(&self, op: Operation) -> bool {
        self.check(op).is_ok()
    }

    /// Every enabled operation, in toolbar order.
    pub fn available_operations(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| self.is_available(*op))
            .collect()
    }

    fn check(&self, op: Operation) -> Result<()> {
        if matches!(op, Operation::Settings | Operation::Quit) {
            return Ok(());
        }
        if let Some(issue) = self
            .issues
            .iter()
            .find(|i| matches!(i, ConfigIssue::EncfsNotFound { .. }))
        {
            return Err(CoreError::Config(issue.to_string()));
        }
        if !op.needs_selection() {
            return Ok(());
        }

        let volume = self.selected().ok_or(RegistryError::NoSelection)?;
        match op {
            Operation::Mount if volume.mounted => Err(CoreError::Unavailable(format!(
                "'{}' is already mounted",
                volume.name
            ))),
            Operation::Unmount | Operation::Browse if !volume.mounted => Err(
                CoreError::Unavailable(format!("'{}' is not mounted", volume.name)),
            ),
            _ => Ok(()),
        }
    }

    fn selected_name(&self) -> Result<String> {
        self.selected
            .clone()
            .ok_or_else(|| RegistryError::NoSelection.into())
    }

    /// Register a new volume definition.
    pub fn create_volume(&mut self, volume: &VolumeDefinition) -> Result<()> {
        self.check(Operation::AddExisting)?;
        Registry::create(&self.store, volume)?;
        self.refresh();
        Ok(())
    }

    /// Edit the selected volume. Paths are locked while it is mounted.
    pub fn edit_selected(&mut self, update: &VolumeUpdate) -> Result<()> {
        self.check(Operation::Edit)?;
        let name = self.selected_name()?;
        self.registry.edit(&self.store, &name, update)?;
        self.refresh();
        Ok(())
    }

    /// Forget the selected volume after confirmation. A mounted volume stays
    /// mounted. Returns false if the user declined.
    pub fn remove_selected<I: Interaction + ?Sized>(&mut self, interaction: &I) -> Result<bool> {
        self.check(Operation::Remove)?;
        let name = self.selected_name()?;
        let message = format!(
            "Are you really sure you want to remove volume '{name}' from this application?\n\
             This will not remove the actual folders or data.\n\
             Removing a mounted volume will not unmount it."
        );
        if !interaction.confirm(&format!("Remove '{name}' ?"), &message) {
            return Ok(false);
        }
        Registry::remove(&self.store, &name)?;
        self.refresh();
        Ok(true)
    }

    /// Persist new settings and rebuild.
    pub fn update_settings(&mut self, settings: &Settings) -> Result<()> {
        self.store.update(|doc| settings.write_to(doc))?;
        tracing::info!("Settings updated");
        self.refresh();
        Ok(())
    }

    /// Mount the selected volume, prompting again while the password is
    /// rejected.
    pub fn mount_selected<I, C>(&mut self, interaction: &I, credentials: &C) -> Result<MountAttempt>
    where
        I: Interaction + ?Sized,
        C: CredentialStore + ?Sized,
    {
        self.check(Operation::Mount)?;
        let name = self.selected_name()?;
        let orchestrator = Orchestrator::new(&self.runner, &self.settings);
        let volume = self
            .registry
            .get_mut(&name)
            .ok_or_else(|| RegistryError::NotFound(name.clone()))?;
        let title = format!("Enter password for '{name}'");
        Ok(sequencer::mount_with_retry(
            &orchestrator,
            volume,
            interaction,
            credentials,
            &title,
            "mount",
        ))
    }

    /// Unmount the selected volume after confirmation.
    ///
    /// A busy volume is reported through [`Interaction::notify_error`] and
    /// stays marked as mounted.
    pub fn unmount_selected<I: Interaction + ?Sized>(
        &mut self,
        interaction: &I,
    ) -> Result<UnmountResult> {
        self.check(Operation::Unmount)?;
        let name = self.selected_name()?;
        let orchestrator = Orchestrator::new(&self.runner, &self.settings);
        let volume = self
            .registry
            .get_mut(&name)
            .ok_or_else(|| RegistryError::NotFound(name.clone()))?;

        let message = format!(
            "Are you sure you want to unmount\n'{}' ?\n\nNote: make sure to close all open files first.",
            volume.mount_path.display()
        );
        if !interaction.confirm(&format!("Unmount '{name}' ?"), &message) {
            return Ok(UnmountResult::Declined);
        }

        if orchestrator.unmount(volume) {
            Ok(UnmountResult::Unmounted)
        } else {
            interaction.notify_error(
                &format!("Error found while unmounting '{name}'"),
                &format!(
                    "Unable to unmount '{}'.\nMake sure no files are open on the volume.",
                    volume.mount_path.display()
                ),
            );
            Ok(UnmountResult::StillMounted)
        }
    }

    /// Open the selected volume's mount path.
    pub fn browse_selected<L: Launcher + ?Sized>(&self, launcher: &L) -> Result<()> {
        self.check(Operation::Browse)?;
        let volume = self.selected().ok_or(RegistryError::NoSelection)?;
        open_path(launcher, &volume.mount_path)
    }

    /// Select `name` and do the obvious thing: browse it if mounted,
    /// otherwise mount it.
    pub fn activate<I, C, L>(
        &mut self,
        name: &str,
        interaction: &I,
        credentials: &C,
        launcher: &L,
    ) -> Result<Activation>
    where
        I: Interaction + ?Sized,
        C: CredentialStore + ?Sized,
        L: Launcher + ?Sized,
    {
        self.select(name)?;
        if self.selected().is_some_and(|v| v.mounted) {
            self.browse_selected(launcher)?;
            Ok(Activation::Browsed)
        } else {
            self.mount_selected(interaction, credentials)
                .map(Activation::Mount)
        }
    }

    /// `encfsctl info` for the selected volume, prefixed with its
    /// encrypted path.
    pub fn info_selected(&self) -> Result<String> {
        self.check(Operation::Info)?;
        let volume = self.selected().ok_or(RegistryError::NoSelection)?;
        let info = self.orchestrator().volume_info(volume)?;
        Ok(format!(
            "Encrypted path: '{}'\n\n{}",
            volume.encrypted_path.display(),
            info.trim_end()
        ))
    }

    /// Mount every volume flagged for auto-mount.
    pub fn auto_mount<I, C>(&mut self, interaction: &I, credentials: &C) -> AutoMountReport
    where
        I: Interaction + ?Sized,
        C: CredentialStore + ?Sized,
    {
        if !self.encfs_available() {
            tracing::warn!("Skipping auto-mount: encfs not found");
            return AutoMountReport::default();
        }
        let orchestrator = Orchestrator::new(&self.runner, &self.settings);
        sequencer::auto_mount_all(&mut self.registry, &orchestrator, interaction, credentials)
    }

    /// Unmount every mounted volume that is not exempt.
    pub fn auto_unmount(&mut self) -> AutoUnmountReport {
        let orchestrator = Orchestrator::new(&self.runner, &self.settings);
        sequencer::auto_unmount_all(&mut self.registry, &orchestrator)
    }

    /// Ask to quit; when auto-unmount is enabled, unmount eligible volumes
    /// before leaving.
    pub fn quit<I: Interaction + ?Sized>(&mut self, interaction: &I) -> QuitOutcome {
        let note = if self.settings.auto_unmount {
            "All mounted volumes will be unmounted, except the ones configured to never \
             auto-unmount.\nPlease close all open files first!"
        } else {
            "Mounted volumes will not be unmounted!"
        };
        let message = format!("Are you sure you want to exit this program?\n\n{note}");
        if !interaction.confirm("Quit ?", &message) {
            return QuitOutcome::Cancelled;
        }
        if self.settings.auto_unmount {
            QuitOutcome::Exit(Some(self.auto_unmount()))
        } else {
            QuitOutcome::Exit(None)
        }
    }
}

fn open_path<L: Launcher + ?Sized>(launcher: &L, path: &Path) -> Result<()> {
    launcher.open_path(path).map_err(|source| CoreError::Launch {
        path: path.to_path_buf(),
        source,
    })
}
