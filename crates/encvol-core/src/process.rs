//! Synchronous subprocess execution.
//!
//! Every external tool (encfs, encfsctl, mount, umount, the keychain CLI)
//! is run through a [`ProcessRunner`]. The call blocks until the child
//! exits; there is no timeout, so a hung binary hangs the caller.
//!
//! Failure is not signalled separately: a child that cannot be spawned
//! produces an output string describing the spawn error, and downstream
//! parsers simply fail to find what they are looking for.
//!
//! Commands are executed directly, never through a shell, so paths and
//! volume names need no quoting. The passphrase travels on stdin and never
//! appears in the argument vector.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use zeroize::Zeroizing;

/// A command line to execute, with optional bytes for stdin.
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
    stdin: Option<Zeroizing<Vec<u8>>>,
}

impl Invocation {
    /// Start building an invocation of `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Pipe these bytes to the child's stdin.
    #[must_use]
    pub fn stdin(mut self, bytes: Zeroizing<Vec<u8>>) -> Self {
        self.stdin = Some(bytes);
        self
    }

    /// The program to run.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The argument vector (excluding the program).
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Bytes that will be written to stdin, if any.
    pub fn stdin_bytes(&self) -> Option<&[u8]> {
        self.stdin.as_deref().map(Vec::as_slice)
    }
}

/// Renders the command line shell-style for logs. Stdin content is elided.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.program.display())?;
        for arg in &self.args {
            write!(f, " '{}'", arg.to_string_lossy())?;
        }
        if self.stdin.is_some() {
            f.write_str(" <stdin elided>")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invocation({self})")
    }
}

/// Captured result of running an [`Invocation`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the child could not be spawned or was killed by a signal
    pub status: Option<i32>,
    /// Stdout followed by stderr, lossily decoded
    pub output: String,
    /// Stdout alone, for tools whose answer must not pick up diagnostics
    pub stdout: String,
}

impl CommandOutput {
    /// Output for a child that exited with `status` after printing `output`
    /// on stdout.
    pub fn new(status: i32, output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            status: Some(status),
            stdout: output.clone(),
            output,
        }
    }

    /// Output for a child that wrote to both streams.
    pub fn with_streams(status: i32, stdout: impl Into<String>, stderr: &str) -> Self {
        let stdout = stdout.into();
        Self {
            status: Some(status),
            output: format!("{stdout}{stderr}"),
            stdout,
        }
    }

    /// Output for a child that never ran.
    pub fn not_run(message: String) -> Self {
        Self {
            status: None,
            output: message,
            stdout: String::new(),
        }
    }

    /// True if the child ran and exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Executes command lines synchronously.
///
/// Implementations must block until the child exits and must merge stdout
/// and stderr into [`CommandOutput::output`].
pub trait ProcessRunner {
    /// Run the invocation to completion.
    fn run(&self, invocation: &Invocation) -> CommandOutput;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, invocation: &Invocation) -> CommandOutput {
        (**self).run(invocation)
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> CommandOutput {
        tracing::debug!("Running {}", invocation);

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(
                    "Failed to spawn {}: {}",
                    invocation.program.display(),
                    e
                );
                return CommandOutput::not_run(format!(
                    "failed to execute {}: {e}",
                    invocation.program.display()
                ));
            }
        };

        if let (Some(bytes), Some(mut pipe)) = (&invocation.stdin, child.stdin.take()) {
            // A child that exits without reading stdin yields EPIPE; its
            // output still tells us what happened.
            if let Err(e) = pipe.write_all(bytes) {
                tracing::debug!("Writing stdin to {} failed: {}", invocation.program.display(), e);
            }
            // pipe dropped here, closing the child's stdin
        }

        match child.wait_with_output() {
            Ok(out) => {
                let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
                let mut output = stdout.clone();
                output.push_str(&String::from_utf8_lossy(&out.stderr));
                tracing::trace!(status = ?out.status.code(), "Command finished");
                CommandOutput {
                    status: out.status.code(),
                    output,
                    stdout,
                }
            }
            Err(e) => CommandOutput::not_run(format!(
                "failed to wait for {}: {e}",
                invocation.program.display()
            )),
        }
    }
}
