use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

use crate::config::APP_NAME;

/// OS-keychain storage for remembered passwords (`login --remember`).
///
/// Passwords never touch the JSON store; they live in the platform keychain
/// under the app's service name, one entry per username.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(username: &str) -> Result<Entry> {
        Entry::new(APP_NAME, username).context("Failed to open keyring entry")
    }

    /// Remember a password for a username.
    pub fn remember(username: &str, password: &str) -> Result<()> {
        Self::entry(username)?
            .set_password(password)
            .context("Failed to store password in keychain")?;
        debug!(%username, "Password remembered in keychain");
        Ok(())
    }

    /// The remembered password, if one exists. Keychain errors (locked,
    /// unavailable, no entry) all read as "nothing remembered".
    pub fn remembered(username: &str) -> Option<String> {
        Self::entry(username).ok()?.get_password().ok()
    }

    /// Drop the remembered password. Forgetting a username that was never
    /// remembered is not an error.
    pub fn forget(username: &str) -> Result<()> {
        let entry = Self::entry(username)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to remove password from keychain"),
        }
    }
}
