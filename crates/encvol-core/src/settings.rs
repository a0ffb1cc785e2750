//! Application settings stored in the `[Config]` group.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::store::Document;

/// Config key for the encfs binary.
pub const KEY_ENCFS_BIN: &str = "encfsbin_path";
/// Config key for the mount-table utility.
pub const KEY_MOUNT_BIN: &str = "mountbin_path";
/// Config key for the unmount utility.
pub const KEY_UMOUNT_BIN: &str = "umountbin_path";
/// Config key for the auto-unmount-on-exit flag.
pub const KEY_AUTO_UNMOUNT: &str = "autounmount";

#[cfg(target_os = "macos")]
const DEFAULT_MOUNT_BIN: &str = "/sbin/mount";
#[cfg(not(target_os = "macos"))]
const DEFAULT_MOUNT_BIN: &str = "/bin/mount";

#[cfg(target_os = "macos")]
const DEFAULT_UMOUNT_BIN: &str = "/sbin/umount";
#[cfg(not(target_os = "macos"))]
const DEFAULT_UMOUNT_BIN: &str = "/bin/umount";

/// Where encfs is looked for when no path is configured.
const ENCFS_CANDIDATES: &[&str] = &[
    "/usr/local/bin/encfs",
    "/opt/homebrew/bin/encfs",
    "/usr/bin/encfs",
    "/bin/encfs",
];

/// Global settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Configured encfs binary; `None` means "probe well-known locations"
    pub encfs_bin: Option<PathBuf>,
    /// Utility whose output lists active mounts
    pub mount_bin: PathBuf,
    /// Utility used to unmount a volume
    pub umount_bin: PathBuf,
    /// Unmount eligible volumes when the application quits
    pub auto_unmount: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            encfs_bin: None,
            mount_bin: PathBuf::from(DEFAULT_MOUNT_BIN),
            umount_bin: PathBuf::from(DEFAULT_UMOUNT_BIN),
            auto_unmount: false,
        }
    }
}

impl Settings {
    /// Read settings from the document, defaulting anything missing.
    pub fn from_document(doc: &Document) -> Self {
        let defaults = Self::default();
        let path = |key| {
            doc.config_str(key)
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
        };
        Self {
            encfs_bin: path(KEY_ENCFS_BIN),
            mount_bin: path(KEY_MOUNT_BIN).unwrap_or(defaults.mount_bin),
            umount_bin: path(KEY_UMOUNT_BIN).unwrap_or(defaults.umount_bin),
            auto_unmount: doc.config_bool(KEY_AUTO_UNMOUNT).unwrap_or(false),
        }
    }

    /// Write settings into the document.
    pub fn write_to(&self, doc: &mut Document) {
        match &self.encfs_bin {
            Some(path) => doc.set_config(KEY_ENCFS_BIN, path.to_string_lossy().into_owned()),
            None => doc.remove_config(KEY_ENCFS_BIN),
        }
        doc.set_config(KEY_MOUNT_BIN, self.mount_bin.to_string_lossy().into_owned());
        doc.set_config(KEY_UMOUNT_BIN, self.umount_bin.to_string_lossy().into_owned());
        doc.set_config(KEY_AUTO_UNMOUNT, self.auto_unmount);
    }

    /// The encfs binary to use: the configured one if it exists, otherwise
    /// the first well-known location that exists.
    pub fn resolve_encfs(&self) -> Option<PathBuf> {
        match &self.encfs_bin {
            Some(path) => path.is_file().then(|| path.clone()),
            None => first_file(ENCFS_CANDIDATES),
        }
    }

    /// The encfs program to invoke: the configured path as-is, otherwise the
    /// first well-known location that exists.
    ///
    /// Unlike [`resolve_encfs`](Self::resolve_encfs) a configured path is not
    /// probed; a missing binary shows up as a failed invocation.
    pub fn encfs_program(&self) -> Option<PathBuf> {
        match &self.encfs_bin {
            Some(path) => Some(path.clone()),
            None => self.resolve_encfs(),
        }
    }

    /// The `encfsctl` binary shipped next to encfs.
    pub fn resolve_encfsctl(&self) -> Option<PathBuf> {
        let encfs = self.resolve_encfs()?;
        let ctl = encfs.with_file_name("encfsctl");
        ctl.is_file().then_some(ctl)
    }

    /// Problems that make some operations unavailable.
    ///
    /// These are surfaced as a status banner; the application stays usable.
    pub fn diagnose(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.resolve_encfs().is_none() {
            issues.push(ConfigIssue::EncfsNotFound {
                configured: self.encfs_bin.clone(),
            });
        }
        if !self.mount_bin.is_file() {
            issues.push(ConfigIssue::MountBinaryMissing(self.mount_bin.clone()));
        }
        if !self.umount_bin.is_file() {
            issues.push(ConfigIssue::UmountBinaryMissing(self.umount_bin.clone()));
        }
        issues
    }
}

/// A configuration problem detected by [`Settings::diagnose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    /// No usable encfs binary
    EncfsNotFound {
        /// The configured path, if any
        configured: Option<PathBuf>,
    },
    /// The mount-table utility does not exist
    MountBinaryMissing(PathBuf),
    /// The unmount utility does not exist
    UmountBinaryMissing(PathBuf),
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIssue::EncfsNotFound { configured: Some(path) } => write!(
                f,
                "encfs not found at {}. Set the encfs path in settings",
                path.display()
            ),
            ConfigIssue::EncfsNotFound { configured: None } => {
                f.write_str("encfs not found. Set the encfs path in settings")
            }
            ConfigIssue::MountBinaryMissing(path) => {
                write!(f, "mount utility not found at {}", path.display())
            }
            ConfigIssue::UmountBinaryMissing(path) => {
                write!(f, "unmount utility not found at {}", path.display())
            }
        }
    }
}

fn first_file<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(AsRef::<Path>::as_ref)
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}
