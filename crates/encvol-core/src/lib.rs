//! Volume registry and mount orchestration for EncFS volumes.
//!
//! This crate supervises an external `encfs` binary and the OS mount
//! utilities. It never touches encrypted data itself: every mount and
//! unmount is a subprocess, and every outcome is re-verified against the
//! live mount table.
//!
//! # Components
//!
//! - [`process`] - synchronous subprocess execution with merged output
//! - [`mount_table`] - decides whether a path is an active mount point
//! - [`store`] - the persisted TOML document (settings and volume groups)
//! - [`registry`] - the in-memory, insertion-ordered volume catalog
//! - [`orchestrator`] - the per-volume mount/unmount protocol
//! - [`sequencer`] - bulk auto-mount at startup and auto-unmount at exit
//! - [`app`] - the controller owning registry, settings and selection
//!
//! Interaction with the user (password prompts, confirmations, the
//! keychain, the file browser) goes through the traits in [`interact`], so
//! any front end can drive the same state machine.
//!
//! # Example
//!
//! ```no_run
//! use encvol_core::app::AppState;
//! use encvol_core::process::SystemRunner;
//! use encvol_core::store::ConfigStore;
//!
//! let store = ConfigStore::at_default_location()?;
//! let app = AppState::load(store, SystemRunner);
//! for volume in app.registry().iter() {
//!     println!("{} mounted={}", volume.name, volume.mounted);
//! }
//! # Ok::<(), encvol_core::CoreError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod error;
pub mod interact;
pub mod mount_table;
pub mod orchestrator;
pub mod process;
pub mod registry;
pub mod secret;
pub mod sequencer;
pub mod settings;
pub mod store;

pub use app::{Activation, AppState, Operation, QuitOutcome, UnmountResult};
pub use error::{CoreError, RegistryError, StoreError};
pub use interact::{
    CredentialStore, Interaction, KeychainStore, Launcher, NoCredentialStore, SystemLauncher,
};
pub use mount_table::{is_mounted, MountTable};
pub use orchestrator::{MountOutcome, Orchestrator, PASSWORD_FAILURE_SIGNATURE};
pub use process::{CommandOutput, Invocation, ProcessRunner, SystemRunner};
pub use registry::{Registry, VolumeDefinition, VolumeUpdate};
pub use secret::Passphrase;
pub use sequencer::{
    auto_mount_all, auto_unmount_all, mount_with_retry, AutoMountReport, AutoUnmountReport,
    MountAttempt,
};
pub use settings::{ConfigIssue, Settings};
pub use store::{ConfigLoadStatus, ConfigStore, Document};

/// Testing helpers shared by unit and integration tests.
///
/// Provides a scripted [`ProcessRunner`] that simulates encfs, mount and
/// umount against an in-memory mount table, plus scripted interaction fakes.
pub mod testing;
