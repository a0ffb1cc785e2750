//! Passphrase handling.
//!
//! Passphrases live in a [`SecretString`] for their whole lifetime and are
//! wiped when dropped. The only place the plaintext leaves the wrapper is
//! [`Passphrase::to_stdin_bytes`], which hands out a [`Zeroizing`] buffer
//! for piping into the encfs subprocess.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// A volume passphrase, wiped on drop.
pub struct Passphrase(SecretString);

impl Passphrase {
    /// Wrap a passphrase. The input string is moved into secret storage.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// True if nothing was entered.
    ///
    /// An empty passphrase means "cancelled" (prompt) or "not found"
    /// (credential store).
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    /// Borrow the plaintext.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// The bytes written to encfs on stdin: the passphrase plus a newline.
    pub fn to_stdin_bytes(&self) -> Zeroizing<Vec<u8>> {
        let secret = self.0.expose_secret();
        let mut bytes = Zeroizing::new(Vec::with_capacity(secret.len() + 1));
        bytes.extend_from_slice(secret.as_bytes());
        bytes.push(b'\n');
        bytes
    }
}

impl From<String> for Passphrase {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Passphrase {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase([REDACTED])")
    }
}
