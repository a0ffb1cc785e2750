//! Mount table observation.
//!
//! The mount table is the only source of truth for "is this volume mounted
//! right now". A snapshot is the raw text printed by the configured mount
//! utility (one line per active mount), parsed on demand.
//!
//! # Matching rules
//!
//! A path is mounted iff it appears as a discrete whitespace-delimited token
//! on some line, after normalizing trailing slashes on both sides. Substring
//! matches never count: `/mnt/vol1` being mounted says nothing about
//! `/mnt/vol`.
//!
//! Two platform formats get extra handling so that mount points containing
//! spaces are still recognized:
//!
//! - macOS / BSD: `{fsname} on {mountpoint} ({fstype}, {options...})`
//! - util-linux:  `{fsname} on {mountpoint} type {fstype} ({options...})`
//!
//! `/proc/mounts`-style octal escapes (`\040` for space) are decoded.

use std::borrow::Cow;
use std::path::Path;

use crate::process::{Invocation, ProcessRunner};

/// A snapshot of the system mount table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTable {
    raw: String,
}

impl MountTable {
    /// Wrap raw mount utility output.
    pub fn from_output(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Run the mount utility once and keep its output.
    ///
    /// A failed run yields a snapshot in which nothing is mounted.
    pub fn capture<R: ProcessRunner>(runner: &R, mount_bin: &Path) -> Self {
        let out = runner.run(&Invocation::new(mount_bin));
        if !out.success() {
            tracing::debug!(
                "Mount table query via {} exited with {:?}",
                mount_bin.display(),
                out.status
            );
        }
        Self { raw: out.output }
    }

    /// Whether `path` is an active mount point in this snapshot.
    pub fn contains(&self, path: &Path) -> bool {
        is_mounted(&path.to_string_lossy(), &self.raw)
    }

    /// The raw text of the snapshot.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Whether `path` appears as an active mount in `table`.
///
/// An empty (or all-whitespace) path is never mounted.
pub fn is_mounted(path: &str, table: &str) -> bool {
    let wanted = normalize(path.trim());
    if wanted.is_empty() {
        return false;
    }
    table.lines().any(|line| line_mounts(line, wanted))
}

fn line_mounts(line: &str, wanted: &str) -> bool {
    if line
        .split_whitespace()
        .any(|token| normalize(&unescape(token)) == wanted)
    {
        return true;
    }

    // Mount points with embedded spaces span several tokens; recover them
    // from the "on ... (" / "on ... type" framing.
    mountpoint_segment(line).is_some_and(|segment| normalize(segment) == wanted)
}

fn mountpoint_segment(line: &str) -> Option<&str> {
    let start = line.find(" on ")? + 4;
    let rest = &line[start..];
    let end = rest.find(" type ").or_else(|| rest.rfind(" ("))?;
    Some(&rest[..end])
}

/// Strip trailing slashes, keeping a lone root `/`.
fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Decode `\NNN` octal escapes as written by the kernel in `/proc/mounts`.
fn unescape(token: &str) -> Cow<'_, str> {
    if !token.contains('\\') {
        return Cow::Borrowed(token);
    }

    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'\\' && i + 3 < bytes.len())
            .then(|| &bytes[i + 1..=i + 3])
            .filter(|digits| digits.iter().all(|b| (b'0'..=b'7').contains(b)))
            .and_then(|digits| {
                let value = digits
                    .iter()
                    .fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
                u8::try_from(value).ok()
            });
        if let Some(value) = escaped {
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}
