use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Error, Result};
use super::Session;

/// Persists and restores the joined-network session
pub trait SessionStore: Send {
    /// Saves the session, replacing any previous one
    fn save(&mut self, session: &Session) -> Result<()>;

    /// Restores the last saved session.
    ///
    /// Fails with [`Error::SessionUnavailable`] when nothing has been saved.
    fn restore(&self) -> Result<Session>;

    /// Forgets the saved session, forcing a fresh join
    fn clear(&mut self) -> Result<()>;
}

/// Volatile store; the session is lost with the process
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    blob: Option<Bytes>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The persisted form of the saved session
    pub fn blob(&self) -> Option<&Bytes> {
        self.blob.as_ref()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&mut self, session: &Session) -> Result<()> {
        self.blob = Some(session.to_blob()?);
        Ok(())
    }

    fn restore(&self) -> Result<Session> {
        match &self.blob {
            Some(blob) => Session::from_blob(blob),
            None => Err(Error::session_unavailable("no session has been saved")),
        }
    }

    fn clear(&mut self) -> Result<()> {
        self.blob = None;
        Ok(())
    }
}

/// On-disk record wrapping the session blob
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    #[serde(serialize_with = "crate::core::serde::serialize_time")]
    #[serde(deserialize_with = "crate::core::serde::deserialize_time")]
    saved_at: SystemTime,
    blob: Vec<u8>,
}

/// Durable store backed by a single file.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a power cut leaves either the old or the new session.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSessionStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for FileSessionStore {
    fn save(&mut self, session: &Session) -> Result<()> {
        let record = SessionRecord {
            saved_at: SystemTime::now(),
            blob: session.to_blob()?.to_vec(),
        };
        let encoded = bincode::serialize(&record)
            .map_err(|e| Error::storage(format!("Failed to encode session record: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp = self.temp_path();
        fs::write(&temp, &encoded)?;
        fs::rename(&temp, &self.path)?;

        debug!(path = %self.path.display(), bytes = encoded.len(), "Session saved");
        Ok(())
    }

    fn restore(&self) -> Result<Session> {
        let encoded = match fs::read(&self.path) {
            Ok(encoded) => encoded,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::session_unavailable(format!(
                    "no session file at {}",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let record: SessionRecord = bincode::deserialize(&encoded)
            .map_err(|e| Error::storage(format!("Corrupt session file: {}", e)))?;
        Session::from_blob(&record.blob)
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
