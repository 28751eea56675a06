//! Durable client storage
//!
//! A string key/value [`Storage`] backend plus the typed [`ClientStorage`]
//! adapter the rest of the client uses. Reads are best-effort: anything that
//! fails to load or parse is reported as absent.

use crate::error::BookingError;
use crate::types::{BookingDraft, Session, TicketSelection, UserProfile};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Key holding the bearer token
pub const AUTH_TOKEN_KEY: &str = "authToken";
/// Key holding the cached [`UserProfile`]
pub const USER_DATA_KEY: &str = "userData";
/// Prefix of the per-event draft keys
pub const DRAFT_KEY_PREFIX: &str = "bookingDraft:";

/// Key of the draft for one event
#[must_use]
pub fn draft_key(event_id: &str) -> String {
    format!("{DRAFT_KEY_PREFIX}{event_id}")
}

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock holder panicked
    #[error("Storage lock poisoned")]
    Poisoned,
}

impl From<StorageError> for BookingError {
    fn from(error: StorageError) -> Self {
        Self::Storage(error.to_string())
    }
}

/// String key/value storage
pub trait Storage: Send + Sync {
    /// Read a value
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value; removing a missing key succeeds
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// One file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`, created if missing
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lowercase letters, digits and `-` stay as they are; every other byte
    /// becomes `_xx` in hex, so two keys never share a file even where the
    /// filesystem ignores case
    fn path_for(&self, key: &str) -> PathBuf {
        let mut file_name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' {
                file_name.push(char::from(byte));
            } else {
                let _ = write!(file_name, "_{byte:02x}");
            }
        }
        file_name.push_str(".json");
        self.dir.join(file_name)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// Typed access to the client's durable state
///
/// Cheap to clone; all clones share the backend.
#[derive(Clone)]
pub struct ClientStorage {
    backend: Arc<dyn Storage>,
}

impl std::fmt::Debug for ClientStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientStorage").finish_non_exhaustive()
    }
}

impl ClientStorage {
    /// Wrap a backend
    #[must_use]
    pub fn new(backend: Arc<dyn Storage>) -> Self {
        Self { backend }
    }

    /// In-memory storage, mostly for tests
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(key, %error, "Failed to read client storage");
                None
            },
        }
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key, %error, "Discarding unparseable client storage entry");
                None
            },
        }
    }

    fn write_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), BookingError> {
        let raw = serde_json::to_string(value)
            .map_err(|error| BookingError::Storage(error.to_string()))?;
        self.backend.set(key, &raw)?;
        Ok(())
    }

    fn remove_logged(&self, key: &str) {
        if let Err(error) = self.backend.remove(key) {
            tracing::warn!(key, %error, "Failed to clear client storage entry");
        }
    }

    /// Stored bearer token, if any
    #[must_use]
    pub fn auth_token(&self) -> Option<String> {
        self.read(AUTH_TOKEN_KEY).filter(|token| !token.trim().is_empty())
    }

    /// Rehydrate the session; absent unless both token and profile load
    #[must_use]
    pub fn load_session(&self) -> Option<Session> {
        let token = self.auth_token()?;
        let profile: UserProfile = self.read_json(USER_DATA_KEY)?;
        Some(Session::from_profile(profile, token))
    }

    /// Persist a session
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] if either key cannot be written
    pub fn save_session(&self, session: &Session) -> Result<(), BookingError> {
        self.backend.set(AUTH_TOKEN_KEY, &session.auth_token)?;
        self.write_json(USER_DATA_KEY, &session.profile())
    }

    /// Persist an updated profile
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] if the profile cannot be written
    pub fn save_profile(&self, profile: &UserProfile) -> Result<(), BookingError> {
        self.write_json(USER_DATA_KEY, profile)
    }

    /// Remove token and profile; never fails
    pub fn clear_session(&self) {
        self.remove_logged(AUTH_TOKEN_KEY);
        self.remove_logged(USER_DATA_KEY);
    }

    /// Draft selection for an event
    ///
    /// A draft stored under the key of another event is ignored.
    #[must_use]
    pub fn load_draft(&self, event_id: &str) -> Option<TicketSelection> {
        let draft: BookingDraft = self.read_json(&draft_key(event_id))?;
        (draft.event_id == event_id).then_some(draft.selection)
    }

    /// Persist a draft; an empty selection clears it
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] if the draft cannot be written
    pub fn save_draft(&self, event_id: &str, selection: &TicketSelection) -> Result<(), BookingError> {
        if selection.is_empty() {
            self.clear_draft(event_id);
            return Ok(());
        }
        self.write_json(
            &draft_key(event_id),
            &BookingDraft {
                event_id: event_id.to_string(),
                selection: selection.clone(),
            },
        )
    }

    /// Remove the draft of an event; never fails
    pub fn clear_draft(&self, event_id: &str) {
        self.remove_logged(&draft_key(event_id));
    }
}
