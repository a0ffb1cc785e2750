//! End-to-end scenarios for the mount protocol and the auto-mount sequencer,
//! driven through `AppState` with a simulated system.

use std::path::{Path, PathBuf};

use encvol_core::testing::{FakeSystem, ScriptedInteraction, StaticCredentials};
use encvol_core::{
    AppState, ConfigLoadStatus, ConfigStore, MountAttempt, MountOutcome, NoCredentialStore,
    Orchestrator, Passphrase, QuitOutcome, Registry, Settings, UnmountResult, VolumeDefinition,
    VolumeUpdate,
};
use tempfile::TempDir;

struct Fixture {
    temp: TempDir,
}

impl Fixture {
    /// A config dir whose `[Config]` points at an existing encfs file and the
    /// fake mount utilities.
    fn new(volumes: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("encfs"), "").unwrap();

        let config = format!(
            "[Config]\nencfsbin_path = \"{}\"\nmountbin_path = \"/fake/bin/mount\"\n\
             umountbin_path = \"/fake/bin/umount\"\nautounmount = true\n\n{volumes}",
            bin.join("encfs").display()
        );
        std::fs::write(temp.path().join("config.toml"), config).unwrap();
        Self { temp }
    }

    fn store(&self) -> ConfigStore {
        ConfigStore::in_dir(self.temp.path())
    }

    fn app(&self, system: FakeSystem) -> AppState<FakeSystem> {
        AppState::load(self.store(), system)
    }
}

const VAULT1: &str = r#"
[Volumes.vault1]
enc_path = "/data/enc"
mount_path = "/mnt/vault1"
automount = true
passwordsaved = false
"#;

#[test]
fn wrong_then_right_password_mounts_after_one_retry() {
    let fixture = Fixture::new(VAULT1);
    let mut app = fixture.app(FakeSystem::new().with_password("/mnt/vault1", "rightpw"));
    let ui = ScriptedInteraction::new().passwords(["wrongpw", "rightpw"]);

    let report = app.auto_mount(&ui, &NoCredentialStore);

    assert_eq!(report.mounted, ["vault1"]);
    let prompts = ui.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("invalid password"));
    assert!(app.registry().get("vault1").unwrap().mounted);
    assert_eq!(app.runner().count_calls("encfs"), 2);
}

#[test]
fn busy_unmount_keeps_volume_mounted() {
    let fixture = Fixture::new(VAULT1);
    let system = FakeSystem::new()
        .with_mounted("/mnt/vault1")
        .with_busy("/mnt/vault1");
    let mut app = fixture.app(system);
    app.select("vault1").unwrap();

    let result = app
        .unmount_selected(&ScriptedInteraction::new().confirms([true]))
        .unwrap();

    assert_eq!(result, UnmountResult::StillMounted);
    assert!(app.selected().unwrap().mounted);
}

#[test]
fn password_signature_beats_mount_table() {
    let system = FakeSystem::new()
        .with_password("/mnt/vault1", "rightpw")
        .with_mounted("/mnt/vault1");
    let settings = system.settings();
    let mut volume = VolumeDefinition::new("vault1", "/data/enc", "/mnt/vault1");

    let outcome = Orchestrator::new(&system, &settings).mount(&mut volume, &Passphrase::new("nope"));

    assert_eq!(outcome, MountOutcome::PasswordFailure);
    assert!(!volume.mounted);
}

#[test]
fn auto_mount_respects_flags_and_current_state() {
    let fixture = Fixture::new(
        r#"
[Volumes.manual]
enc_path = "/data/manual"
mount_path = "/mnt/manual"
automount = false

[Volumes.already]
enc_path = "/data/already"
mount_path = "/mnt/already"
automount = true

[Volumes.auto]
enc_path = "/data/auto"
mount_path = "/mnt/auto"
automount = 1
"#,
    );
    let system = FakeSystem::new()
        .with_mounted("/mnt/already")
        .with_password("/mnt/manual", "pw")
        .with_password("/mnt/already", "pw")
        .with_password("/mnt/auto", "pw");
    let mut app = fixture.app(system);
    let ui = ScriptedInteraction::new().passwords(["pw", "pw", "pw"]);

    let report = app.auto_mount(&ui, &NoCredentialStore);

    assert_eq!(report.mounted, ["auto"]);
    assert_eq!(ui.prompts().len(), 1);
    assert!(!app.registry().get("manual").unwrap().mounted);
    let encfs_calls: Vec<_> = app
        .runner()
        .calls()
        .into_iter()
        .filter(|c| c.contains("volname="))
        .collect();
    assert_eq!(encfs_calls.len(), 1);
    assert!(encfs_calls[0].contains("volname=auto"));
}

#[test]
fn auto_mount_uses_saved_password() {
    let fixture = Fixture::new(
        r#"
[Volumes.saved]
enc_path = "/data/saved"
mount_path = "/mnt/saved"
automount = true
passwordsaved = true
"#,
    );
    let mut app = fixture.app(FakeSystem::new().with_password("/mnt/saved", "fromkeychain"));
    let ui = ScriptedInteraction::new();
    let creds = StaticCredentials::new([("saved", "fromkeychain")]);

    let report = app.auto_mount(&ui, &creds);

    assert_eq!(report.mounted, ["saved"]);
    assert!(ui.prompts().is_empty());
    assert_eq!(creds.lookups(), 1);
}

#[test]
fn auto_unmount_skips_exempt_volumes() {
    let fixture = Fixture::new(
        r#"
[Volumes.keep]
enc_path = "/data/keep"
mount_path = "/mnt/keep"
preventautounmount = true

[Volumes.drop]
enc_path = "/data/drop"
mount_path = "/mnt/drop"
"#,
    );
    let system = FakeSystem::new()
        .with_mounted("/mnt/keep")
        .with_mounted("/mnt/drop");
    let mut app = fixture.app(system);

    let outcome = app.quit(&ScriptedInteraction::new().confirms([true]));

    let QuitOutcome::Exit(Some(report)) = outcome else {
        panic!("expected quit with auto-unmount");
    };
    assert_eq!(report.unmounted, ["drop"]);
    assert_eq!(report.exempt, ["keep"]);
    assert!(app.runner().is_mounted("/mnt/keep"));
    assert!(!app.runner().is_mounted("/mnt/drop"));
}

#[test]
fn malformed_entries_are_not_loaded() {
    let fixture = Fixture::new(
        r#"
[Volumes.no_enc]
mount_path = "/mnt/a"

[Volumes.no_mount]
enc_path = "/data/b"

[Volumes.blank]
enc_path = ""
mount_path = ""

[Volumes.good]
enc_path = "/data/good"
mount_path = "/mnt/good"
"#,
    );
    let app = fixture.app(FakeSystem::new());

    let names: Vec<_> = app.registry().names().collect();
    assert_eq!(names, ["good"]);
    assert!(matches!(app.load_status(), ConfigLoadStatus::Loaded));
}

#[test]
fn mount_table_is_captured_once_per_load() {
    let fixture = Fixture::new(
        r#"
[Volumes.a]
enc_path = "/data/a"
mount_path = "/mnt/a"

[Volumes.b]
enc_path = "/data/b"
mount_path = "/mnt/b"

[Volumes.c]
enc_path = "/data/c"
mount_path = "/mnt/c"
"#,
    );
    let app = fixture.app(FakeSystem::new().with_mounted("/mnt/b"));

    assert_eq!(app.runner().count_calls("mount"), 1);
    assert_eq!(app.registry().mounted_count(), 1);
}

#[test]
fn create_edit_remove_round_trip() {
    let fixture = Fixture::new("");
    let mut app = fixture.app(FakeSystem::new().with_password("/mnt/new", "pw"));

    app.create_volume(&VolumeDefinition::new("new", "/data/new", "/mnt/new"))
        .unwrap();
    assert_eq!(app.registry().len(), 1);

    app.select("new").unwrap();
    app.edit_selected(&VolumeUpdate {
        auto_mount: Some(true),
        mount_path: Some(PathBuf::from("/mnt/new")),
        ..VolumeUpdate::default()
    })
    .unwrap();
    assert!(app.selected().is_none());
    assert!(app.registry().get("new").unwrap().auto_mount);

    app.select("new").unwrap();
    let attempt = app
        .mount_selected(&ScriptedInteraction::new().passwords(["pw"]), &NoCredentialStore)
        .unwrap();
    assert_eq!(attempt, MountAttempt::Mounted { attempts: 1 });

    // Paths are locked while mounted
    app.select("new").unwrap();
    assert!(app
        .edit_selected(&VolumeUpdate {
            encrypted_path: Some(PathBuf::from("/data/other")),
            ..VolumeUpdate::default()
        })
        .is_err());

    app.select("new").unwrap();
    assert!(app
        .remove_selected(&ScriptedInteraction::new().confirms([true]))
        .unwrap());
    assert!(app.registry().is_empty());
    assert!(app.runner().is_mounted("/mnt/new"));
}

#[test]
fn settings_survive_a_reload() {
    let fixture = Fixture::new("");
    let mut app = fixture.app(FakeSystem::new());
    let settings = Settings {
        auto_unmount: false,
        umount_bin: PathBuf::from("/fake/sbin/umount"),
        ..app.settings().clone()
    };
    app.update_settings(&settings).unwrap();

    let reloaded = fixture.app(FakeSystem::new());
    assert_eq!(reloaded.settings(), &settings);
    assert_eq!(
        reloaded.settings().umount_bin.as_path(),
        Path::new("/fake/sbin/umount")
    );
}

#[test]
fn corrupted_config_falls_back_to_defaults() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("config.toml"), "[Volumes.vault1\nenc_path = ").unwrap();

    let app = AppState::load(ConfigStore::in_dir(temp.path()), FakeSystem::new());

    assert!(app.registry().is_empty());
    let ConfigLoadStatus::Corrupted { backup_path, .. } = app.load_status() else {
        panic!("expected corrupted status");
    };
    assert!(backup_path.exists());
    assert!(Registry::load(&app.store().load().0, &Default::default()).is_empty());
}
