#![cfg(unix)]
#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use assert_cmd::Command;
use predicates::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const RIGHT_PASSWORD: &str = "rightpw";

/// A sandbox with shell-script stand-ins for encfs, encfsctl, mount and
/// umount. The simulated mount table is a plain file with one mount path
/// per line.
struct Sandbox {
    temp: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let sandbox = Self { temp };
        std::fs::create_dir_all(sandbox.bin()).unwrap();
        std::fs::create_dir_all(sandbox.config_dir()).unwrap();
        std::fs::write(sandbox.state(), "").unwrap();

        let state = sandbox.state().display().to_string();
        let busy = sandbox.busy_marker().display().to_string();
        sandbox.script(
            "encfs",
            &format!(
                r#"if [ "$1" = "--version" ]; then echo "encfs version 1.9.5-test"; exit 0; fi
for last; do :; done
read -r pw
if [ "$pw" = "{RIGHT_PASSWORD}" ]; then echo "$last" >> "{state}"; exit 0; fi
echo "Error decoding volume key, password incorrect"
exit 1
"#
            ),
        );
        sandbox.script(
            "encfsctl",
            "echo \"Version 6 configuration; created by EncFS 1.9.5 (revision 20100713)\"\n",
        );
        sandbox.script(
            "mount",
            &format!(
                r#"while read -r p; do echo "encfs on $p type fuse.encfs (rw,nosuid,nodev)"; done < "{state}"
exit 0
"#
            ),
        );
        sandbox.script(
            "umount",
            &format!(
                r#"if [ -f "{busy}" ]; then echo "umount: $1: target is busy."; exit 1; fi
grep -v -x -F "$1" "{state}" > "{state}.tmp"
mv "{state}.tmp" "{state}"
"#
            ),
        );

        std::fs::write(
            sandbox.config_dir().join("config.toml"),
            format!(
                "[Config]\nencfsbin_path = \"{}\"\nmountbin_path = \"{}\"\numountbin_path = \"{}\"\n",
                sandbox.bin().join("encfs").display(),
                sandbox.bin().join("mount").display(),
                sandbox.bin().join("umount").display(),
            ),
        )
        .unwrap();
        sandbox
    }

    fn bin(&self) -> PathBuf {
        self.temp.path().join("bin")
    }

    fn config_dir(&self) -> PathBuf {
        self.temp.path().join("config")
    }

    fn state(&self) -> PathBuf {
        self.temp.path().join("mounts.txt")
    }

    fn busy_marker(&self) -> PathBuf {
        self.temp.path().join("busy")
    }

    fn mount_path(&self, name: &str) -> PathBuf {
        self.temp.path().join("mnt").join(name)
    }

    fn script(&self, name: &str, body: &str) {
        let path = self.bin().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn encvol(&self) -> Command {
        let mut cmd = Command::cargo_bin("encvol").unwrap();
        cmd.env("ENCVOL_CONFIG_DIR", self.config_dir());
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn add(&self, name: &str, extra: &[&str]) {
        self.encvol()
            .arg("add")
            .arg(name)
            .arg(self.temp.path().join("enc").join(name))
            .arg(self.mount_path(name))
            .args(extra)
            .assert()
            .success();
    }

    fn mount(&self, name: &str) {
        self.encvol()
            .args(["--password-stdin", "mount", name])
            .write_stdin(format!("{RIGHT_PASSWORD}\n"))
            .assert()
            .success();
    }

    fn is_mounted(&self, name: &str) -> bool {
        let table = std::fs::read_to_string(self.state()).unwrap();
        let wanted = self.mount_path(name).display().to_string();
        table.lines().any(|l| l == wanted)
    }
}

fn config_contents(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("config.toml")).unwrap()
}

// ============================================================================
// Help and version
// ============================================================================

#[test]
fn test_help() {
    Command::cargo_bin("encvol")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Manage and mount EncFS volumes"))
        .stdout(predicate::str::contains("automount"));
}

#[test]
fn test_version() {
    Command::cargo_bin("encvol")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("encvol"));
}

// ============================================================================
// Registry management
// ============================================================================

#[test]
fn test_add_and_list() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &["--automount"]);

    sandbox
        .encvol()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("vault1"))
        .stdout(predicate::str::contains("Encrypted path"));

    let output = sandbox.encvol().args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["name"], "vault1");
    assert_eq!(json[0]["auto_mount"], true);
    assert_eq!(json[0]["mounted"], false);

    assert!(config_contents(&sandbox.config_dir()).contains("[Volumes.vault1]"));
}

#[test]
fn test_list_keeps_insertion_order() {
    let sandbox = Sandbox::new();
    for name in ["zeta", "alpha", "mid"] {
        sandbox.add(name, &[]);
    }

    let output = sandbox.encvol().args(["list", "--json"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["zeta", "alpha", "mid"]);
}

#[test]
fn test_add_duplicate_fails() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);

    sandbox
        .encvol()
        .args(["add", "vault1", "/data/other", "/mnt/other"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_remove_unknown_volume_is_not_found() {
    let sandbox = Sandbox::new();
    sandbox
        .encvol()
        .args(["remove", "ghost", "--yes"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_remove_mounted_volume_leaves_it_mounted() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);
    sandbox.mount("vault1");

    sandbox
        .encvol()
        .args(["remove", "vault1", "--yes"])
        .assert()
        .success()
        .stderr(predicate::str::contains("still mounted"));

    assert!(sandbox.is_mounted("vault1"));
    assert!(!config_contents(&sandbox.config_dir()).contains("vault1"));
}

#[test]
fn test_remove_without_confirmation_is_cancelled() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);

    sandbox
        .encvol()
        .args(["remove", "vault1"])
        .write_stdin("")
        .assert()
        .code(5);
    assert!(config_contents(&sandbox.config_dir()).contains("vault1"));
}

// ============================================================================
// Mount / unmount
// ============================================================================

#[test]
fn test_mount_with_right_password() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);

    sandbox
        .encvol()
        .args(["--password-stdin", "mount", "vault1"])
        .write_stdin("rightpw\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Mounted 'vault1'"));

    assert!(sandbox.is_mounted("vault1"));
    assert!(sandbox.mount_path("vault1").is_dir());

    let output = sandbox.encvol().args(["list", "--json"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["mounted"], true);
}

#[test]
fn test_mount_with_wrong_password_is_auth_failure() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);

    sandbox
        .encvol()
        .args(["--password-stdin", "mount", "vault1"])
        .write_stdin("wrongpw\n")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("rejected"));

    assert!(!sandbox.is_mounted("vault1"));
}

#[test]
fn test_mount_already_mounted_volume_is_rejected() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);
    sandbox.mount("vault1");

    sandbox
        .encvol()
        .args(["--password-stdin", "mount", "vault1"])
        .write_stdin("rightpw\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already mounted"));
}

#[test]
fn test_unmount() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);
    sandbox.mount("vault1");

    sandbox
        .encvol()
        .args(["unmount", "vault1", "--yes"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Unmounted 'vault1'"));

    assert!(!sandbox.is_mounted("vault1"));
}

#[test]
fn test_unmount_busy_volume_fails() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);
    sandbox.mount("vault1");
    std::fs::write(sandbox.busy_marker(), "").unwrap();

    sandbox
        .encvol()
        .args(["unmount", "vault1", "--yes"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("still mounted"));

    assert!(sandbox.is_mounted("vault1"));
}

#[test]
fn test_unmount_needs_confirmation() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);
    sandbox.mount("vault1");

    sandbox
        .encvol()
        .args(["unmount", "vault1"])
        .write_stdin("")
        .assert()
        .code(5);

    assert!(sandbox.is_mounted("vault1"));
}

#[test]
fn test_edit_paths_locked_while_mounted() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);
    sandbox.mount("vault1");

    sandbox
        .encvol()
        .args(["edit", "vault1", "--mount-path", "/elsewhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only its flags can be edited"));

    sandbox
        .encvol()
        .args(["edit", "vault1", "--automount", "true"])
        .assert()
        .success();
    assert!(config_contents(&sandbox.config_dir()).contains("automount = true"));
}

// ============================================================================
// Auto-mount / auto-unmount
// ============================================================================

#[test]
fn test_automount_only_flagged_volumes() {
    let sandbox = Sandbox::new();
    sandbox.add("manual", &[]);
    sandbox.add("auto", &["--automount"]);

    sandbox
        .encvol()
        .args(["--password-stdin", "automount"])
        .write_stdin("rightpw\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Mounted 'auto'"));

    assert!(sandbox.is_mounted("auto"));
    assert!(!sandbox.is_mounted("manual"));
}

#[test]
fn test_autounmount_skips_exempt_volumes() {
    let sandbox = Sandbox::new();
    sandbox.add("keep", &["--prevent-auto-unmount"]);
    sandbox.add("drop", &[]);
    sandbox.mount("keep");
    sandbox.mount("drop");

    sandbox
        .encvol()
        .arg("autounmount")
        .assert()
        .success()
        .stderr(predicate::str::contains("Unmounted 'drop'"));

    assert!(sandbox.is_mounted("keep"));
    assert!(!sandbox.is_mounted("drop"));
}

#[test]
fn test_session_quits_on_sigterm_without_tty() {
    use std::io::{BufRead, BufReader, Read};
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    let sandbox = Sandbox::new();
    sandbox.add("keep", &["--prevent-auto-unmount"]);
    sandbox.add("drop", &[]);
    sandbox.mount("keep");
    sandbox.mount("drop");
    sandbox
        .encvol()
        .args(["settings", "--auto-unmount", "yes"])
        .assert()
        .success();

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("encvol"))
        .env("ENCVOL_CONFIG_DIR", sandbox.config_dir())
        .env_remove("RUST_LOG")
        .arg("session")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut stderr = BufReader::new(child.stderr.take().unwrap());
    let mut line = String::new();
    loop {
        line.clear();
        assert!(stderr.read_line(&mut line).unwrap() > 0, "session exited early");
        if line.contains("Press Ctrl+C to quit") {
            break;
        }
    }

    let killed = std::process::Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("session ignored SIGTERM");
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    assert!(status.success());

    let mut rest = String::new();
    stderr.read_to_string(&mut rest).unwrap();
    assert!(rest.contains("Unmounted 'drop'"), "stderr: {rest}");
    assert!(sandbox.is_mounted("keep"));
    assert!(!sandbox.is_mounted("drop"));
}

// ============================================================================
// Settings, status and info
// ============================================================================

#[test]
fn test_status_shows_encfs_version() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);

    sandbox
        .encvol()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("encFS ready // encfs version 1.9.5-test"))
        .stdout(predicate::str::contains("1 volume, 0 mounted"));
}

#[test]
fn test_missing_encfs_is_config_error() {
    let sandbox = Sandbox::new();
    sandbox
        .encvol()
        .args(["settings", "--encfs-bin", "/nonexistent/encfs"])
        .assert()
        .success();

    sandbox
        .encvol()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("encFS not found"));

    sandbox
        .encvol()
        .args(["add", "vault1", "/data/enc", "/mnt/vault1"])
        .assert()
        .code(6);
}

#[test]
fn test_config_issue_reported_once() {
    let sandbox = Sandbox::new();
    sandbox
        .encvol()
        .args(["settings", "--encfs-bin", "/nonexistent/encfs"])
        .assert()
        .success();

    let output = sandbox.encvol().arg("list").output().unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("encfs not found at").count(), 1, "stderr: {stderr}");
}

#[test]
fn test_settings_update_persists() {
    let sandbox = Sandbox::new();
    sandbox
        .encvol()
        .args(["settings", "--auto-unmount", "yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("auto-unmount"));

    assert!(config_contents(&sandbox.config_dir()).contains("autounmount = true"));
}

#[test]
fn test_info_runs_encfsctl() {
    let sandbox = Sandbox::new();
    sandbox.add("vault1", &[]);

    sandbox
        .encvol()
        .args(["info", "vault1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EncFS information for 'vault1'"))
        .stdout(predicate::str::contains("Version 6 configuration"));
}

#[test]
fn test_corrupted_config_is_backed_up() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.config_dir().join("config.toml"), "[Volumes.vault1\n").unwrap();

    sandbox
        .encvol()
        .arg("list")
        .assert()
        .success()
        .stderr(predicate::str::contains("corrupted"));

    let backups = std::fs::read_dir(sandbox.config_dir())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("config.corrupted."))
        .count();
    assert_eq!(backups, 1);
}
