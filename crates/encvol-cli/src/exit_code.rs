//! Process exit codes.
//!
//! Scripts can rely on these values; they do not change between releases.

/// Command completed successfully
pub const SUCCESS: u8 = 0;
/// Unclassified failure
pub const GENERAL_ERROR: u8 = 1;
/// A passphrase was rejected and no further attempt was made
pub const AUTH_FAILED: u8 = 2;
/// The named volume does not exist
pub const NOT_FOUND: u8 = 3;
/// Mounting or unmounting did not take effect
pub const MOUNT_FAILED: u8 = 4;
/// The user declined or cancelled
pub const CANCELLED: u8 = 5;
/// A required binary is missing or the config file is unusable
pub const CONFIG_ERROR: u8 = 6;
