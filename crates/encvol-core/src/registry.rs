//! The volume registry.
//!
//! A [`Registry`] is the in-memory catalog of volume definitions, built
//! from the persisted document and one mount-table snapshot. It is never
//! patched incrementally from disk: after any change to the persisted
//! definitions the whole registry is rebuilt (see
//! [`AppState::refresh`](crate::app::AppState::refresh)). The only in-place
//! mutation is the live `mounted` flag, which the orchestrator updates
//! after a verified mount or unmount.
//!
//! Iteration order is the order of the volume groups in the document, which
//! is the order in which volumes were added.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{CoreError, RegistryError};
use crate::mount_table::MountTable;
use crate::store::{ConfigStore, Document};

/// Volume key for the encrypted source directory.
pub const KEY_ENC_PATH: &str = "enc_path";
/// Volume key for the mount target directory.
pub const KEY_MOUNT_PATH: &str = "mount_path";
/// Volume key for the auto-mount flag.
pub const KEY_AUTO_MOUNT: &str = "automount";
/// Volume key for the auto-unmount exemption flag.
pub const KEY_PREVENT_AUTO_UNMOUNT: &str = "preventautounmount";
/// Volume key for the saved-password flag.
pub const KEY_PASSWORD_SAVED: &str = "passwordsaved";

/// A named pairing of an encrypted directory and a mount target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeDefinition {
    /// Unique name; also passed to encfs as the volume label
    pub name: String,
    /// Encrypted source directory
    pub encrypted_path: PathBuf,
    /// Where the decrypted view is mounted
    pub mount_path: PathBuf,
    /// Mount automatically at application start
    pub auto_mount: bool,
    /// Exempt from bulk auto-unmount on exit
    pub prevent_auto_unmount: bool,
    /// The passphrase is kept in the credential store
    pub password_saved: bool,
    /// Last observed mount state (not persisted)
    pub mounted: bool,
}

impl VolumeDefinition {
    /// A new, unmounted definition with all flags off.
    pub fn new(
        name: impl Into<String>,
        encrypted_path: impl Into<PathBuf>,
        mount_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            encrypted_path: encrypted_path.into(),
            mount_path: mount_path.into(),
            auto_mount: false,
            prevent_auto_unmount: false,
            password_saved: false,
            mounted: false,
        }
    }

    /// Read a definition from its volume group.
    ///
    /// Returns `None` when either path is missing or empty; such entries are
    /// "not yet configured" and stay out of the catalog.
    pub fn from_document(doc: &Document, name: &str) -> Option<Self> {
        let encrypted_path = doc.volume_str(name, KEY_ENC_PATH)?;
        let mount_path = doc.volume_str(name, KEY_MOUNT_PATH)?;
        Some(Self {
            name: name.to_string(),
            encrypted_path: PathBuf::from(encrypted_path),
            mount_path: PathBuf::from(mount_path),
            auto_mount: doc.volume_bool(name, KEY_AUTO_MOUNT).unwrap_or(false),
            prevent_auto_unmount: doc
                .volume_bool(name, KEY_PREVENT_AUTO_UNMOUNT)
                .unwrap_or(false),
            password_saved: doc.volume_bool(name, KEY_PASSWORD_SAVED).unwrap_or(false),
            mounted: false,
        })
    }

    /// Write the persisted fields into the document.
    pub fn write_to(&self, doc: &mut Document) {
        let name = self.name.as_str();
        doc.set_volume(name, KEY_ENC_PATH, path_value(&self.encrypted_path));
        doc.set_volume(name, KEY_MOUNT_PATH, path_value(&self.mount_path));
        doc.set_volume(name, KEY_AUTO_MOUNT, self.auto_mount);
        doc.set_volume(name, KEY_PREVENT_AUTO_UNMOUNT, self.prevent_auto_unmount);
        doc.set_volume(name, KEY_PASSWORD_SAVED, self.password_saved);
    }

    /// Check name and paths before persisting.
    pub fn validate(&self) -> Result<(), RegistryError> {
        // The name goes into encfs's `-o volname=` option list.
        if self.name.trim().is_empty()
            || self.name.chars().any(|c| c.is_control() || c == ',')
        {
            return Err(RegistryError::InvalidName(self.name.clone()));
        }
        if self.encrypted_path.as_os_str().is_empty() {
            return Err(RegistryError::MissingPath {
                name: self.name.clone(),
                field: "encrypted path",
            });
        }
        if self.mount_path.as_os_str().is_empty() {
            return Err(RegistryError::MissingPath {
                name: self.name.clone(),
                field: "mount path",
            });
        }
        Ok(())
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Changes to an existing definition. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeUpdate {
    /// New encrypted source directory
    pub encrypted_path: Option<PathBuf>,
    /// New mount target
    pub mount_path: Option<PathBuf>,
    /// New auto-mount flag
    pub auto_mount: Option<bool>,
    /// New auto-unmount exemption flag
    pub prevent_auto_unmount: Option<bool>,
    /// New saved-password flag
    pub password_saved: Option<bool>,
}

impl VolumeUpdate {
    /// True if applying this update would change either path.
    pub fn changes_paths(&self, current: &VolumeDefinition) -> bool {
        self.encrypted_path
            .as_ref()
            .is_some_and(|p| *p != current.encrypted_path)
            || self
                .mount_path
                .as_ref()
                .is_some_and(|p| *p != current.mount_path)
    }

    /// Apply the update to a definition.
    pub fn apply(&self, volume: &mut VolumeDefinition) {
        if let Some(path) = &self.encrypted_path {
            volume.encrypted_path.clone_from(path);
        }
        if let Some(path) = &self.mount_path {
            volume.mount_path.clone_from(path);
        }
        if let Some(flag) = self.auto_mount {
            volume.auto_mount = flag;
        }
        if let Some(flag) = self.prevent_auto_unmount {
            volume.prevent_auto_unmount = flag;
        }
        if let Some(flag) = self.password_saved {
            volume.password_saved = flag;
        }
    }
}

/// The in-memory catalog of volumes, in stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    volumes: Vec<VolumeDefinition>,
}

impl Registry {
    /// Build the catalog from persisted definitions and one mount-table
    /// snapshot shared by every volume.
    pub fn load(doc: &Document, snapshot: &MountTable) -> Self {
        let mut volumes = Vec::new();
        for name in doc.volume_names() {
            match VolumeDefinition::from_document(doc, name) {
                Some(mut volume) => {
                    volume.mounted = snapshot.contains(&volume.mount_path);
                    volumes.push(volume);
                }
                None => tracing::debug!("Skipping incomplete volume definition '{}'", name),
            }
        }
        tracing::debug!("Loaded {} volume(s)", volumes.len());
        Self { volumes }
    }

    /// Look up a volume by name.
    pub fn get(&self, name: &str) -> Option<&VolumeDefinition> {
        self.volumes.iter().find(|v| v.name == name)
    }

    /// Look up a volume by name (mutable).
    pub fn get_mut(&mut self, name: &str) -> Option<&mut VolumeDefinition> {
        self.volumes.iter_mut().find(|v| v.name == name)
    }

    /// Whether a volume with this name is in the catalog.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Volumes in registry order.
    pub fn iter(&self) -> std::slice::Iter<'_, VolumeDefinition> {
        self.volumes.iter()
    }

    /// Volumes in registry order (mutable).
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, VolumeDefinition> {
        self.volumes.iter_mut()
    }

    /// Volume names in registry order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.volumes.iter().map(|v| v.name.as_str())
    }

    /// Number of volumes in the catalog.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// True if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Number of volumes currently observed as mounted.
    pub fn mounted_count(&self) -> usize {
        self.volumes.iter().filter(|v| v.mounted).count()
    }

    /// Persist a new definition.
    pub fn create(store: &ConfigStore, volume: &VolumeDefinition) -> Result<(), CoreError> {
        volume.validate()?;
        store.update(|doc| {
            if doc.has_volume(&volume.name) {
                return Err(RegistryError::AlreadyExists(volume.name.clone()));
            }
            volume.write_to(doc);
            Ok(())
        })??;
        tracing::info!("Added volume '{}'", volume.name);
        Ok(())
    }

    /// Persist changes to an existing definition.
    ///
    /// Paths of a mounted volume are locked; only flags may change.
    pub fn edit(
        &self,
        store: &ConfigStore,
        name: &str,
        update: &VolumeUpdate,
    ) -> Result<(), CoreError> {
        let current = self
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        if current.mounted && update.changes_paths(current) {
            return Err(RegistryError::MountedPathChange(name.to_string()).into());
        }

        let mut edited = current.clone();
        update.apply(&mut edited);
        edited.validate()?;

        store.update(|doc| edited.write_to(doc))?;
        tracing::info!("Updated volume '{}'", name);
        Ok(())
    }

    /// Delete a persisted definition.
    ///
    /// The live mount is left alone: removing a mounted volume leaves it
    /// mounted and orphaned from the registry.
    pub fn remove(store: &ConfigStore, name: &str) -> Result<(), CoreError> {
        let removed = store.update(|doc| doc.remove_volume(name))?;
        if !removed {
            return Err(RegistryError::NotFound(name.to_string()).into());
        }
        tracing::info!("Removed volume '{}'", name);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a VolumeDefinition;
    type IntoIter = std::slice::Iter<'a, VolumeDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DOC: &str = r#"
[Volumes.vault1]
enc_path = "/data/enc1"
mount_path = "/mnt/vault1"
automount = true

[Volumes.missing_mount]
enc_path = "/data/enc2"

[Volumes.missing_enc]
mount_path = "/mnt/x"

[Volumes.empty_enc]
enc_path = ""
mount_path = "/mnt/y"

[Volumes.vault2]
enc_path = "/data/enc3"
mount_path = "/mnt/vault2"
preventautounmount = 1
passwordsaved = true
"#;

    fn table() -> MountTable {
        MountTable::from_output("encfs on /mnt/vault2 type fuse.encfs (rw)\n")
    }

    #[test]
    fn test_load_skips_malformed_entries() {
        let doc = Document::parse(DOC).unwrap();
        let registry = Registry::load(&doc, &table());
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["vault1", "vault2"]);
        assert!(registry.get("missing_mount").is_none());
        assert!(registry.get("missing_enc").is_none());
        assert!(registry.get("empty_enc").is_none());
    }

    #[test]
    fn test_load_reads_flags_and_mount_state() {
        let doc = Document::parse(DOC).unwrap();
        let registry = Registry::load(&doc, &table());

        let v1 = registry.get("vault1").unwrap();
        assert!(v1.auto_mount);
        assert!(!v1.prevent_auto_unmount);
        assert!(!v1.password_saved);
        assert!(!v1.mounted);

        let v2 = registry.get("vault2").unwrap();
        assert!(!v2.auto_mount);
        assert!(v2.prevent_auto_unmount);
        assert!(v2.password_saved);
        assert!(v2.mounted);
        assert_eq!(registry.mounted_count(), 1);
    }

    #[test]
    fn test_validate() {
        assert!(VolumeDefinition::new("v", "/a", "/b").validate().is_ok());
        assert_eq!(
            VolumeDefinition::new("  ", "/a", "/b").validate(),
            Err(RegistryError::InvalidName("  ".into()))
        );
        assert_eq!(
            VolumeDefinition::new("work,allow_other", "/a", "/b").validate(),
            Err(RegistryError::InvalidName("work,allow_other".into()))
        );
        assert!(matches!(
            VolumeDefinition::new("v", "", "/b").validate(),
            Err(RegistryError::MissingPath { field: "encrypted path", .. })
        ));
        assert!(matches!(
            VolumeDefinition::new("v", "/a", "").validate(),
            Err(RegistryError::MissingPath { field: "mount path", .. })
        ));
    }

    #[test]
    fn test_create_rejects_duplicates() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(temp.path());
        let volume = VolumeDefinition::new("vault1", "/data/enc", "/mnt/vault1");

        Registry::create(&store, &volume).unwrap();
        let err = Registry::create(&store, &volume).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Registry(RegistryError::AlreadyExists(ref n)) if n == "vault1"
        ));
    }

    #[test]
    fn test_edit_mounted_volume_only_flags() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(temp.path());
        Registry::create(&store, &VolumeDefinition::new("vault1", "/data/enc", "/mnt/vault1"))
            .unwrap();

        let snapshot = MountTable::from_output("encfs on /mnt/vault1 type fuse.encfs (rw)");
        let registry = Registry::load(&store.load().0, &snapshot);
        assert!(registry.get("vault1").unwrap().mounted);

        let move_it = VolumeUpdate {
            mount_path: Some(PathBuf::from("/mnt/elsewhere")),
            ..VolumeUpdate::default()
        };
        assert!(matches!(
            registry.edit(&store, "vault1", &move_it),
            Err(CoreError::Registry(RegistryError::MountedPathChange(_)))
        ));

        let same_path = VolumeUpdate {
            mount_path: Some(PathBuf::from("/mnt/vault1")),
            auto_mount: Some(true),
            ..VolumeUpdate::default()
        };
        registry.edit(&store, "vault1", &same_path).unwrap();

        let reloaded = Registry::load(&store.load().0, &snapshot);
        assert!(reloaded.get("vault1").unwrap().auto_mount);
    }

    #[test]
    fn test_remove() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(temp.path());
        Registry::create(&store, &VolumeDefinition::new("vault1", "/data/enc", "/mnt/vault1"))
            .unwrap();

        Registry::remove(&store, "vault1").unwrap();
        assert!(matches!(
            Registry::remove(&store, "vault1"),
            Err(CoreError::Registry(RegistryError::NotFound(_)))
        ));
        assert!(Registry::load(&store.load().0, &MountTable::default()).is_empty());
    }
}
