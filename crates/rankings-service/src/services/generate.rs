use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::time::Instant;

use crate::config::GeneratorConfig;
use crate::generator;
use crate::store::{JsonFileStore, StoreError};
use crate::types::{GenerateResponse, format_elapsed};

/// An error growing the record collection.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The existing collection could not be read.
    #[error("failed to load existing records")]
    Load(#[from] StoreError),
    /// The location of the collection could not be inspected.
    #[error("failed to access record store at {path}")]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The grown collection could not be written.
    #[error("failed to write record store at {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The generation task panicked.
    #[error("record generation was interrupted")]
    Interrupted,
}

/// Appends `count` generated records to the collection in `store` and returns the new total.
///
/// New ids continue from the current number of records. A missing collection is created.
pub fn append_records(store: &JsonFileStore, count: usize) -> Result<usize, GenerateError> {
    let mut records = store.load_or_default()?;
    let first_id = records.len() as u64 + 1;
    records.extend(generator::generate_records(first_id, count));

    store
        .replace(&records)
        .map_err(|source| GenerateError::Persist {
            path: store.path().to_owned(),
            source,
        })?;

    Ok(records.len())
}

/// Grows the record collection with synthetic data.
///
/// Runs are serialized, so concurrent requests never lose each other's records. Rankings are not
/// invalidated, they pick up the new records once their cache entries expire.
#[derive(Clone, Debug)]
pub struct GeneratorService {
    store: JsonFileStore,
    config: GeneratorConfig,
    running: Arc<tokio::sync::Mutex<()>>,
}

impl GeneratorService {
    pub fn new(store: JsonFileStore, config: GeneratorConfig) -> Self {
        Self {
            store,
            config,
            running: Default::default(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Appends `count` records, or the configured batch size if `None`.
    pub async fn append(&self, count: Option<usize>) -> Result<GenerateResponse, GenerateError> {
        let started = Instant::now();
        let count = count.unwrap_or(self.config.batch_size);

        let _running = self.running.lock().await;
        let store = self.store.clone();
        let total_records = tokio::task::spawn_blocking(move || append_records(&store, count))
            .await
            .map_err(|_| GenerateError::Interrupted)??;

        metric!(counter("generator.records") += count as i64);
        let elapsed = started.elapsed();
        tracing::info!(count, total_records, ?elapsed, "Generated records");

        Ok(GenerateResponse {
            message: format!("{count} novos registros adicionados com sucesso!"),
            elapsed: format_elapsed(elapsed),
            total_records,
        })
    }

    /// Creates the collection with the configured number of initial records if it does not exist.
    ///
    /// Returns `true` if the collection was created.
    pub async fn bootstrap(&self) -> Result<bool, GenerateError> {
        let exists = self.store.exists().map_err(|source| GenerateError::Access {
            path: self.store.path().to_owned(),
            source,
        })?;
        if exists {
            return Ok(false);
        }

        tracing::info!(
            path = %self.store.path().display(),
            "Record store not found, generating initial records"
        );
        self.append(Some(self.config.initial_records)).await?;
        Ok(true)
    }
}
