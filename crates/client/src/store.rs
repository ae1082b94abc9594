//! Durable storage for the session token.
//!
//! The store is a small JSON key-value document. The token lives under
//! [`TOKEN_KEY`]; other keys are preserved untouched. There is no
//! client-side expiry: a stored token is valid until the remote service
//! rejects it.
//!
//! Only the session manager writes here.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use popflix_core::SessionToken;

/// Key under which the session token is stored.
pub const TOKEN_KEY: &str = "token";

/// Errors from reading or writing the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O failed.
    #[error("credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store file exists but is not a JSON object of strings.
    #[error("credential store is corrupt: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Persistent key-value storage for the session token.
pub trait CredentialStore: Send + Sync {
    /// Read the stored token, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    fn load(&self) -> Result<Option<SessionToken>, StoreError>;

    /// Store `token`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns error if the token could not be durably written.
    fn save(&self, token: &SessionToken) -> Result<(), StoreError>;

    /// Remove the stored token. Removing an absent token succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be rewritten.
    fn remove(&self) -> Result<(), StoreError>;
}

// =============================================================================
// File store
// =============================================================================

/// Credential store backed by a JSON file.
///
/// Writes go to a sibling temp file which is synced and renamed over the
/// target, so a crash leaves either the old or the new document.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store at `path`. Nothing is touched until the first read or write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    fn write_document(&self, document: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.temp_path();

        let mut tmp_file = open_private(&tmp_path)?;
        tmp_file.write_all(&json)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "credentials".into(), |n| n.to_string_lossy());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

/// Create or truncate `path` readable by the owner only.
fn open_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt as _, PermissionsExt as _};

        options.mode(0o600);
        let file = options.open(path)?;
        // A leftover temp file keeps its old mode; tighten it as well.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    {
        options.open(path)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<SessionToken>, StoreError> {
        Ok(self
            .read_document()?
            .remove(TOKEN_KEY)
            .filter(|t| !t.trim().is_empty())
            .map(SessionToken::new))
    }

    fn save(&self, token: &SessionToken) -> Result<(), StoreError> {
        let mut document = self.read_document().unwrap_or_else(|e| {
            tracing::warn!(error = %e, path = %self.path.display(), "Replacing unreadable credential store");
            BTreeMap::new()
        });
        document.insert(TOKEN_KEY.to_string(), token.expose().to_string());
        self.write_document(&document)
    }

    fn remove(&self) -> Result<(), StoreError> {
        let (mut document, corrupt) = match self.read_document() {
            Ok(document) => (document, false),
            Err(StoreError::Decode(e)) => {
                tracing::warn!(error = %e, path = %self.path.display(), "Clearing corrupt credential store");
                (BTreeMap::new(), true)
            }
            Err(e) => return Err(e),
        };

        if document.remove(TOKEN_KEY).is_none() && !corrupt {
            return Ok(());
        }
        self.write_document(&document)
    }
}

// =============================================================================
// Memory store
// =============================================================================

/// Credential store held in memory, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<SessionToken>, StoreError> {
        let token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(token.clone().map(SessionToken::new))
    }

    fn save(&self, token: &SessionToken) -> Result<(), StoreError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(token.expose().to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
