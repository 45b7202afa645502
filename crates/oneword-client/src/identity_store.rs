//! JSON file identity store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use oneword_core::error::DomainError;
use oneword_core::identity::{IdentityStore, ParticipantIdentity};
use tracing::debug;

use crate::error::AppError;

/// Keeps the participant identity in a small JSON file.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so a crash never leaves a half-written identity behind.
#[derive(Debug, Clone)]
pub struct JsonFileIdentityStore {
    path: PathBuf,
}

impl JsonFileIdentityStore {
    /// Store the identity at `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the identity file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ParticipantIdentity, AppError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ParticipantIdentity::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, identity: &ParticipantIdentity) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec_pretty(identity)?)?;
        fs::rename(&staging, &self.path)?;
        debug!(path = %self.path.display(), "identity saved");
        Ok(())
    }
}

impl IdentityStore for JsonFileIdentityStore {
    fn load(&self) -> Result<ParticipantIdentity, DomainError> {
        Ok(self.read()?)
    }

    fn save(&self, identity: &ParticipantIdentity) -> Result<(), DomainError> {
        Ok(self.write(identity)?)
    }

    fn clear(&self) -> Result<(), DomainError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::from(e).into()),
        }
    }
}
