//! Persistence for the raw access token.
//!
//! Every backend holds exactly one slot. The token is written back verbatim;
//! expiry is the manager's concern, not the store's.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

use super::session::Credential;

/// Token file name in cache directory
const TOKEN_FILE: &str = "auth_token";

/// Staging file renamed over the token file on save
const TOKEN_TMP_FILE: &str = "auth_token.tmp";

/// Keyring service and account holding the token
const KEYRING_SERVICE: &str = "escola-portal";
const KEYRING_ACCOUNT: &str = "authToken";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Token file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

pub trait SessionStore: Send + Sync {
    /// Read the persisted token, if any
    fn load(&self) -> Result<Option<Credential>, StoreError>;

    /// Persist the token, replacing any previous one
    fn save(&self, credential: &Credential) -> Result<(), StoreError>;

    /// Remove the persisted token. No-op when the slot is empty.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Token kept in a plain file under the cache directory.
pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn token_path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_FILE)
    }

    fn tmp_path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_TMP_FILE)
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        if contents.is_empty() {
            return Ok(None);
        }
        debug!(path = %path.display(), "Loaded stored token");
        Ok(Some(Credential::new(contents)))
    }

    /// Writes a staging file created owner-only, then renames it over the
    /// token file. The token is never readable by other users, even briefly.
    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        fs::create_dir_all(&self.cache_dir)?;

        let tmp = self.tmp_path();
        if tmp.exists() {
            fs::remove_file(&tmp)?;
        }

        let result = write_private(&tmp, credential.as_str()).and_then(|()| fs::rename(&tmp, self.token_path()));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let path = self.token_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = private_options().open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

#[cfg(unix)]
fn private_options() -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;
    let mut options = File::options();
    options.write(true).create_new(true).mode(0o600);
    options
}

#[cfg(not(unix))]
fn private_options() -> OpenOptions {
    let mut options = File::options();
    options.write(true).create_new(true);
    options
}

/// Token kept in the OS keychain.
pub struct KeyringStore {
    account: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_account(KEYRING_ACCOUNT)
    }

    pub fn with_account(account: &str) -> Self {
        Self {
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry, StoreError> {
        Ok(Entry::new(KEYRING_SERVICE, &self.account)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for KeyringStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        match self.entry()?.get_password() {
            Ok(token) if token.is_empty() => Ok(None),
            Ok(token) => Ok(Some(Credential::new(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        self.entry()?.set_password(credential.as_str())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local slot. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}
