use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::aggregation::AggregationError;
use crate::store::StoreError;

/// An error recomputing a ranking.
#[derive(Debug, Error)]
pub enum ComputationError {
    /// The record collection could not be loaded.
    #[error("failed to load records")]
    Store(#[from] StoreError),
    /// The records could not be aggregated into a ranking.
    #[error("failed to aggregate records")]
    Aggregation(#[from] AggregationError),
    /// Loading and aggregating did not finish within the configured timeout.
    #[error("computation timed out after {0:?}")]
    Timeout(Duration),
    /// The computation was dropped or panicked before producing a result.
    #[error("computation was interrupted")]
    Interrupted,
}

/// The uniform failure of a ranking request.
///
/// The cause is shared, since a single failed computation fails every request waiting on it.
#[derive(Debug, Clone, Error)]
#[error("ranking computation failed")]
pub struct ComputationFailed(#[source] pub Arc<ComputationError>);

impl ComputationFailed {
    /// The underlying reason for the failure.
    pub fn cause(&self) -> &ComputationError {
        &self.0
    }
}

impl From<Arc<ComputationError>> for ComputationFailed {
    fn from(err: Arc<ComputationError>) -> Self {
        Self(err)
    }
}

impl From<ComputationError> for ComputationFailed {
    fn from(err: ComputationError) -> Self {
        Self(Arc::new(err))
    }
}
