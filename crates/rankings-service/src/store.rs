//! Access to the persisted record collection.
//!
//! The collection is a single JSON file holding an array of [`BusinessRecord`]s. Every load
//! re-reads and re-parses the whole file. There is no incremental read and no shared in-memory
//! copy, so a file that was rewritten between two loads is picked up by the next one.

use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::BusinessRecord;

/// An error loading the record collection.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The collection could not be read, e.g. because the file is missing.
    #[error("record store unavailable at {path}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The collection was read but does not decode into records.
    #[error("record store at {path} is corrupt")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A source of the full record collection.
///
/// Implementations either return every record or fail. Partial results are never returned.
pub trait RecordSource: Send + Sync + 'static {
    /// Loads the full, ordered record collection.
    fn load(&self) -> Result<Vec<BusinessRecord>, StoreError>;
}

/// The record collection persisted as a JSON file.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("path", &self.path.display())
            .finish()
    }
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the backing file exists.
    ///
    /// Errors other than the file not being found are returned, as they indicate a problem with the
    /// configured location rather than a missing collection.
    pub fn exists(&self) -> io::Result<bool> {
        match fs::metadata(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Loads the collection, treating a missing file as an empty collection.
    ///
    /// This is only meant for writers that grow the collection.
    pub fn load_or_default(&self) -> Result<Vec<BusinessRecord>, StoreError> {
        match self.load() {
            Err(StoreError::Unavailable { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                Ok(Vec::new())
            }
            result => result,
        }
    }

    /// Replaces the whole collection.
    ///
    /// The records are written to a temporary file next to the target which is then renamed over
    /// it, so concurrent readers observe either the old or the new collection, never a partially
    /// written one.
    pub fn replace(&self, records: &[BusinessRecord]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp_file.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.flush()?;
        }
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            "Replaced record store"
        );
        Ok(())
    }
}

impl RecordSource for JsonFileStore {
    fn load(&self) -> Result<Vec<BusinessRecord>, StoreError> {
        tracing::trace!(path = %self.path.display(), "Reading record store");

        let data = fs::read(&self.path).map_err(|source| StoreError::Unavailable {
            path: self.path.clone(),
            source,
        })?;

        let records: Vec<BusinessRecord> =
            serde_json::from_slice(&data).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        tracing::trace!(records = records.len(), "Decoded record store");
        Ok(records)
    }
}
