use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use crate::interact::{CredentialStore, Interaction};
use crate::orchestrator::PASSWORD_FAILURE_SIGNATURE;
use crate::process::{CommandOutput, Invocation, ProcessRunner};
use crate::secret::Passphrase;
use crate::settings::Settings;

/// Default fake encfs location used by [`FakeSystem::settings`].
pub const FAKE_ENCFS: &str = "/fake/bin/encfs";
/// Default fake mount utility location.
pub const FAKE_MOUNT: &str = "/fake/bin/mount";
/// Default fake unmount utility location.
pub const FAKE_UMOUNT: &str = "/fake/bin/umount";

/// A [`ProcessRunner`] that simulates encfs, encfsctl, mount, umount,
/// mkdir and the keychain CLIs against an in-memory mount table.
///
/// Programs are recognised by file name, so any directory works. Every
/// invocation is recorded in its display form (stdin elided).
#[derive(Debug, Default)]
pub struct FakeSystem {
    mounted: RefCell<Vec<String>>,
    passwords: HashMap<String, String>,
    mount_errors: HashMap<String, String>,
    busy: HashSet<String>,
    saved: HashMap<String, String>,
    keychain_warning: Option<String>,
    version: Option<String>,
    info: Option<String>,
    calls: RefCell<Vec<String>>,
}

impl FakeSystem {
    /// An empty system: nothing mounted, no volumes known to encfs.
    pub fn new() -> Self {
        Self::default()
    }

    /// encfs mounts `mount_path` when given exactly `password`.
    #[must_use]
    pub fn with_password(mut self, mount_path: &str, password: &str) -> Self {
        self.passwords.insert(mount_path.to_string(), password.to_string());
        self
    }

    /// `mount_path` is already in the mount table.
    #[must_use]
    pub fn with_mounted(self, mount_path: &str) -> Self {
        self.mounted.borrow_mut().push(mount_path.to_string());
        self
    }

    /// encfs accepts the password for `mount_path` but prints `error`
    /// instead of mounting.
    #[must_use]
    pub fn with_mount_error(mut self, mount_path: &str, error: &str) -> Self {
        self.mount_errors.insert(mount_path.to_string(), error.to_string());
        self
    }

    /// umount of `mount_path` reports "resource busy" and leaves it mounted.
    #[must_use]
    pub fn with_busy(mut self, mount_path: &str) -> Self {
        self.busy.insert(mount_path.to_string());
        self
    }

    /// The keychain CLI returns `password` for `volume`.
    #[must_use]
    pub fn with_saved_password(mut self, volume: &str, password: &str) -> Self {
        self.saved.insert(volume.to_string(), password.to_string());
        self
    }

    /// The keychain CLI also prints `warning` on stderr.
    #[must_use]
    pub fn with_keychain_warning(mut self, warning: &str) -> Self {
        self.keychain_warning = Some(warning.to_string());
        self
    }

    /// `encfs --version` prints `version`.
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// `encfsctl info` prints `info`.
    #[must_use]
    pub fn with_info(mut self, info: &str) -> Self {
        self.info = Some(info.to_string());
        self
    }

    /// Settings pointing at the fake binaries.
    pub fn settings(&self) -> Settings {
        Settings {
            encfs_bin: Some(PathBuf::from(FAKE_ENCFS)),
            mount_bin: PathBuf::from(FAKE_MOUNT),
            umount_bin: PathBuf::from(FAKE_UMOUNT),
            auto_unmount: false,
        }
    }

    /// Whether `mount_path` is in the simulated mount table.
    pub fn is_mounted(&self, mount_path: &str) -> bool {
        self.mounted.borrow().iter().any(|m| m == mount_path)
    }

    /// Every invocation so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Number of invocations of the program named `program`.
    pub fn count_calls(&self, program: &str) -> usize {
        let bare = format!("'{program}'");
        let in_dir = format!("/{program}'");
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| c.split(' ').next())
            .filter(|p| *p == bare || p.ends_with(&in_dir))
            .count()
    }

    fn table(&self) -> String {
        self.mounted
            .borrow()
            .iter()
            .map(|m| format!("encfs on {m} type fuse.encfs (rw,nosuid,nodev)\n"))
            .collect()
    }

    fn encfs(&self, args: &[String], stdin: Option<&[u8]>) -> CommandOutput {
        if args.first().map(String::as_str) == Some("--version") {
            return match &self.version {
                Some(v) => CommandOutput::new(0, format!("{v}\n")),
                None => CommandOutput::new(0, "encfs version 1.9.5\n"),
            };
        }
        let Some(mount_path) = args.last() else {
            return CommandOutput::new(1, "Missing one or more arguments, aborting.\n");
        };
        let given = stdin
            .map(|b| String::from_utf8_lossy(b).trim_end_matches('\n').to_string())
            .unwrap_or_default();

        match self.passwords.get(mount_path) {
            Some(expected) if *expected == given => {
                if let Some(error) = self.mount_errors.get(mount_path) {
                    return CommandOutput::new(1, format!("{error}\n"));
                }
                if !self.is_mounted(mount_path) {
                    self.mounted.borrow_mut().push(mount_path.clone());
                }
                CommandOutput::new(0, "")
            }
            Some(_) => CommandOutput::new(1, format!("{PASSWORD_FAILURE_SIGNATURE}\n")),
            None => CommandOutput::new(1, "The directory does not contain an encfs volume\n"),
        }
    }

    fn umount(&self, args: &[String]) -> CommandOutput {
        let Some(path) = args.last() else {
            return CommandOutput::new(1, "usage: umount target\n");
        };
        if self.busy.contains(path) {
            return CommandOutput::new(1, format!("umount: {path}: target is busy.\n"));
        }
        let mut mounted = self.mounted.borrow_mut();
        let before = mounted.len();
        mounted.retain(|m| m != path);
        if mounted.len() == before {
            CommandOutput::new(1, format!("umount: {path}: not mounted.\n"))
        } else {
            CommandOutput::new(0, "")
        }
    }

    fn keychain(&self, args: &[String]) -> CommandOutput {
        let volume = args
            .iter()
            .position(|a| a == "-a")
            .and_then(|i| args.get(i + 1))
            .or_else(|| args.last());
        match volume.and_then(|v| self.saved.get(v)) {
            Some(pw) => CommandOutput::with_streams(
                0,
                format!("{pw}\n"),
                self.keychain_warning.as_deref().unwrap_or_default(),
            ),
            None => CommandOutput::new(44, "The specified item could not be found in the keychain.\n"),
        }
    }
}

impl ProcessRunner for FakeSystem {
    fn run(&self, invocation: &Invocation) -> CommandOutput {
        self.calls.borrow_mut().push(invocation.to_string());

        let args: Vec<String> = invocation
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let program = invocation
            .program()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match program.as_str() {
            "encfs" => self.encfs(&args, invocation.stdin_bytes()),
            "encfsctl" => CommandOutput::new(0, self.info.clone().unwrap_or_default()),
            "mount" => CommandOutput::new(0, self.table()),
            "umount" => self.umount(&args),
            "mkdir" => CommandOutput::new(0, ""),
            "security" | "secret-tool" => self.keychain(&args),
            other => {
                CommandOutput::not_run(format!("failed to execute {other}: No such file or directory"))
            }
        }
    }
}

/// An [`Interaction`] that replays scripted answers and records what it
/// was asked.
#[derive(Debug, Default)]
pub struct ScriptedInteraction {
    passwords: RefCell<VecDeque<String>>,
    confirms: RefCell<VecDeque<bool>>,
    prompts: RefCell<Vec<String>>,
    errors: RefCell<Vec<String>>,
}

impl ScriptedInteraction {
    /// No scripted answers: prompts cancel, confirmations decline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers for successive password prompts. An empty string cancels.
    #[must_use]
    pub fn passwords<I, S>(self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.passwords
            .borrow_mut()
            .extend(answers.into_iter().map(Into::into));
        self
    }

    /// Answers for successive confirmations.
    #[must_use]
    pub fn confirms(self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.confirms.borrow_mut().extend(answers);
        self
    }

    /// Messages of every password prompt shown.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    /// Every error shown, as `title: message`.
    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }
}

impl Interaction for ScriptedInteraction {
    fn prompt_password(&self, _title: &str, message: &str) -> Option<Passphrase> {
        self.prompts.borrow_mut().push(message.to_string());
        self.passwords.borrow_mut().pop_front().map(Passphrase::new)
    }

    fn confirm(&self, _title: &str, _message: &str) -> bool {
        self.confirms.borrow_mut().pop_front().unwrap_or(false)
    }

    fn notify_error(&self, title: &str, message: &str) {
        self.errors.borrow_mut().push(format!("{title}: {message}"));
    }
}

/// A [`CredentialStore`] backed by a fixed map that counts lookups.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    entries: HashMap<String, String>,
    lookups: Cell<usize>,
}

impl StaticCredentials {
    /// A store holding `(volume, password)` pairs.
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            lookups: Cell::new(0),
        }
    }

    /// How many times a password was requested.
    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl CredentialStore for StaticCredentials {
    fn get_password(&self, volume: &str) -> Option<Passphrase> {
        self.lookups.set(self.lookups.get() + 1);
        self.entries.get(volume).map(|p| Passphrase::new(p.as_str()))
    }
}
