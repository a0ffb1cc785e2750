//! Persisted configuration: global settings and volume definitions.
//!
//! The store is a hierarchical key-value document kept as TOML:
//!
//! ```toml
//! [Config]
//! mountbin_path = "/sbin/mount"
//! autounmount = false
//!
//! [Volumes.vault1]
//! enc_path = "/data/enc"
//! mount_path = "/mnt/vault1"
//! automount = true
//! preventautounmount = false
//! passwordsaved = false
//! ```
//!
//! Group order is preserved, which gives the registry its stable display
//! order. The document is kept loosely typed so that malformed volume
//! groups survive a rewrite untouched; the registry decides what is usable.
//!
//! The file lives in `$ENCVOL_CONFIG_DIR/config.toml` when that variable is
//! set, otherwise in the platform config directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::error::StoreError;

/// Group holding application settings.
pub const CONFIG_GROUP: &str = "Config";
/// Group holding one sub-group per volume.
pub const VOLUMES_GROUP: &str = "Volumes";
/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "ENCVOL_CONFIG_DIR";
/// File name of the configuration document.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Status of a config load operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLoadStatus {
    /// Config loaded successfully from disk
    Loaded,
    /// No config file existed, using fresh defaults
    Fresh,
    /// Config file was corrupted, using defaults (backup created)
    Corrupted {
        /// Path to the backup of the corrupted config
        backup_path: PathBuf,
        /// Error message describing the corruption
        error: String,
    },
    /// Config file couldn't be read, using defaults
    ReadError {
        /// Error message
        error: String,
    },
}

impl ConfigLoadStatus {
    /// Returns true if the config was loaded successfully
    pub fn is_ok(&self) -> bool {
        matches!(self, ConfigLoadStatus::Loaded | ConfigLoadStatus::Fresh)
    }

    /// Get a user-friendly warning message, if applicable
    pub fn warning_message(&self) -> Option<String> {
        match self {
            ConfigLoadStatus::Corrupted { backup_path, error } => Some(format!(
                "Your configuration file was corrupted and could not be loaded. \
                 A backup has been saved to:\n{}\n\nError: {}\n\n\
                 Your volume list has been reset. You may need to re-add your volumes.",
                backup_path.display(),
                error
            )),
            ConfigLoadStatus::ReadError { error } => Some(format!(
                "Could not read your configuration file: {error}\n\n\
                 Your volume list is empty for this session."
            )),
            _ => None,
        }
    }
}

/// The configuration document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    table: Table,
}

impl Document {
    /// Parse a TOML document.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        Ok(Self {
            table: toml::from_str(contents)?,
        })
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&self.table)
    }

    /// A string value from the `[Config]` group.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.group(CONFIG_GROUP)?.get(key)?.as_str()
    }

    /// A boolean value from the `[Config]` group.
    pub fn config_bool(&self, key: &str) -> Option<bool> {
        self.group(CONFIG_GROUP)?.get(key).and_then(value_as_bool)
    }

    /// Set a value in the `[Config]` group.
    pub fn set_config(&mut self, key: &str, value: impl Into<Value>) {
        group_mut(&mut self.table, CONFIG_GROUP).insert(key.to_string(), value.into());
    }

    /// Remove a value from the `[Config]` group.
    pub fn remove_config(&mut self, key: &str) {
        if let Some(Value::Table(config)) = self.table.get_mut(CONFIG_GROUP) {
            config.remove(key);
        }
    }

    /// Names of all volume groups, in document order.
    ///
    /// Entries under `[Volumes]` that are not groups are not volumes and are
    /// skipped.
    pub fn volume_names(&self) -> impl Iterator<Item = &str> {
        self.group(VOLUMES_GROUP)
            .into_iter()
            .flat_map(|volumes| volumes.iter())
            .filter(|(_, value)| value.is_table())
            .map(|(name, _)| name.as_str())
    }

    /// Whether a group exists for this volume.
    pub fn has_volume(&self, name: &str) -> bool {
        self.volume(name).is_some()
    }

    /// A string value from a volume group. Empty strings read as absent.
    pub fn volume_str(&self, name: &str, key: &str) -> Option<&str> {
        self.volume(name)?
            .get(key)?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    /// A boolean value from a volume group.
    pub fn volume_bool(&self, name: &str, key: &str) -> Option<bool> {
        self.volume(name)?.get(key).and_then(value_as_bool)
    }

    /// Set a value in a volume group, creating the group if needed.
    pub fn set_volume(&mut self, name: &str, key: &str, value: impl Into<Value>) {
        let volumes = group_mut(&mut self.table, VOLUMES_GROUP);
        group_mut(volumes, name).insert(key.to_string(), value.into());
    }

    /// Delete a volume group. Returns false if it did not exist.
    pub fn remove_volume(&mut self, name: &str) -> bool {
        let Some(Value::Table(volumes)) = self.table.get_mut(VOLUMES_GROUP) else {
            return false;
        };
        if !volumes.contains_key(name) {
            return false;
        }
        // Rebuild instead of removing in place so the remaining groups keep
        // their relative order.
        let kept: Table = volumes
            .iter()
            .filter(|(key, _)| key.as_str() != name)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        *volumes = kept;
        true
    }

    fn group(&self, name: &str) -> Option<&Table> {
        self.table.get(name)?.as_table()
    }

    fn volume(&self, name: &str) -> Option<&Table> {
        self.group(VOLUMES_GROUP)?.get(name)?.as_table()
    }
}

/// Booleans written by older tools are stored as `0`/`1`.
fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        Value::Integer(i) => Some(*i != 0),
        _ => None,
    }
}

fn group_mut<'a>(table: &'a mut Table, name: &str) -> &'a mut Table {
    let slot = table
        .entry(name.to_string())
        .or_insert(Value::Table(Table::new()));
    if !slot.is_table() {
        tracing::warn!("Config entry '{}' is not a group, replacing it", name);
        *slot = Value::Table(Table::new());
    }
    match slot {
        Value::Table(group) => group,
        _ => unreachable!("slot was just made a table"),
    }
}

/// Reads and writes the configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Use the configuration file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `config.toml` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(CONFIG_FILE_NAME))
    }

    /// Use `$ENCVOL_CONFIG_DIR` if set, otherwise the platform config dir.
    pub fn at_default_location() -> Result<Self, StoreError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(Self::in_dir(PathBuf::from(dir)));
        }
        let dirs = directories::ProjectDirs::from("org", "encvol", "encvol")
            .ok_or(StoreError::NoConfigDir)?;
        Ok(Self::in_dir(dirs.config_dir()))
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, falling back to an empty one on any problem.
    ///
    /// A corrupted file is copied aside before defaults are returned, so a
    /// later save cannot destroy it.
    pub fn load(&self) -> (Document, ConfigLoadStatus) {
        if !self.path.exists() {
            tracing::info!("No config file at {}, using defaults", self.path.display());
            return (Document::default(), ConfigLoadStatus::Fresh);
        }

        match std::fs::read_to_string(&self.path) {
            Ok(contents) => match Document::parse(&contents) {
                Ok(doc) => {
                    tracing::debug!("Loaded config from {}", self.path.display());
                    (doc, ConfigLoadStatus::Loaded)
                }
                Err(e) => {
                    tracing::error!("Failed to parse config: {}", e);
                    let backup_path = self.backup_corrupted_config(&contents);
                    (
                        Document::default(),
                        ConfigLoadStatus::Corrupted {
                            backup_path,
                            error: e.to_string(),
                        },
                    )
                }
            },
            Err(e) => {
                tracing::error!("Failed to read config: {}", e);
                (
                    Document::default(),
                    ConfigLoadStatus::ReadError {
                        error: e.to_string(),
                    },
                )
            }
        }
    }

    /// Write the document atomically (temp file + rename).
    pub fn save(&self, doc: &Document) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let contents = doc.to_toml_string()?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(contents.as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        tracing::debug!("Saved config to {}", self.path.display());
        Ok(())
    }

    /// Load, apply `f`, and save.
    pub fn update<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Document) -> T,
    {
        let (mut doc, status) = self.load();
        if let ConfigLoadStatus::ReadError { error } = status {
            // Do not replace a file we could not read with an empty document.
            return Err(StoreError::Io {
                path: self.path.clone(),
                source: std::io::Error::other(error),
            });
        }
        let result = f(&mut doc);
        self.save(&doc)?;
        Ok(result)
    }

    fn backup_corrupted_config(&self, contents: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let backup_path = self
            .path
            .with_file_name(format!("config.corrupted.{timestamp}.toml"));

        if let Err(e) = std::fs::write(&backup_path, contents) {
            tracing::error!(
                "Failed to create backup of corrupted config at {}: {}",
                backup_path.display(),
                e
            );
        } else {
            tracing::info!(
                "Created backup of corrupted config at {}",
                backup_path.display()
            );
        }

        backup_path
    }
}
