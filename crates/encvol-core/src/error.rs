//! Error types for the volume registry.
//!
//! Mount and unmount never fail with an error: they resolve into
//! [`MountOutcome`](crate::MountOutcome) or a `bool`. The types here cover
//! reading and writing the persisted configuration and validating edits to
//! volume definitions.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The configuration file could not be read or written.
    #[error("Failed to access config file {}: {source}", path.display())]
    Io {
        /// Path of the file being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The document could not be serialized back to TOML.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No platform configuration directory could be determined.
    #[error("Failed to find config directory")]
    NoConfigDir,
}

/// Errors from creating, editing or removing volume definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No volume with this name is registered.
    #[error("Volume '{0}' not found")]
    NotFound(String),

    /// A volume with this name already exists.
    #[error("Volume '{0}' already exists")]
    AlreadyExists(String),

    /// The volume name is empty or unusable as a config group or mount option.
    #[error("Invalid volume name '{0}'")]
    InvalidName(String),

    /// A required path was left empty.
    #[error("Volume '{name}' is missing its {field}")]
    MissingPath {
        /// Volume being validated
        name: String,
        /// Which path is missing ("encrypted path" or "mount path")
        field: &'static str,
    },

    /// Paths cannot change while the volume is mounted.
    #[error("Volume '{0}' is mounted; only its flags can be edited until it is unmounted")]
    MountedPathChange(String),

    /// No volume is selected.
    #[error("No volume selected")]
    NoSelection,
}

/// Top-level error for controller operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration file failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Volume definition failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A configured binary is missing, so the operation is unavailable.
    #[error("{0}")]
    Config(String),

    /// The operation does not apply to the volume in its current state.
    #[error("{0}")]
    Unavailable(String),

    /// The file browser could not be launched.
    #[error("Failed to open {}: {source}", path.display())]
    Launch {
        /// Path that was being opened
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for controller operations.
pub type Result<T> = std::result::Result<T, CoreError>;
