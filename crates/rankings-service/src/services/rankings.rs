//! The request orchestrator serving rankings.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::aggregation::{self, GroupTotal};
use crate::caching::{CacheLookup, ComputationError, ComputationFailed, RankingCache};
use crate::config::CacheConfig;
use crate::store::RecordSource;
use crate::types::{
    CategoryRevenue, CityRevenue, RankingKind, RankingPayload, RankingResponse, format_elapsed,
};
use crate::utils::currency::format_brl;

/// Loads the full record collection and computes the ranking of `kind` from it.
///
/// This is blocking and should run on a thread that is allowed to block.
pub fn compute_payload(
    source: &dyn RecordSource,
    kind: RankingKind,
) -> Result<RankingPayload, ComputationError> {
    let records = source.load()?;

    let payload = match kind {
        RankingKind::TopRevenue => RankingPayload::TopBusinesses {
            top_10_comercios: aggregation::top_records_by_revenue(records)?,
        },
        RankingKind::TopCities => RankingPayload::TopCities {
            top_10_cidades: aggregation::top_cities_by_revenue(&records)?
                .into_iter()
                .map(|GroupTotal { key, revenue }| CityRevenue {
                    city: key,
                    revenue: format_brl(revenue),
                })
                .collect(),
        },
        RankingKind::TopCategories => RankingPayload::TopCategories {
            top_10_categorias: aggregation::top_categories_by_revenue(&records)
                .into_iter()
                .map(|GroupTotal { key, revenue }| CategoryRevenue {
                    category: key,
                    revenue: format_brl(revenue),
                })
                .collect(),
        },
    };

    Ok(payload)
}

fn outcome(result: &Result<RankingPayload, ComputationError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(ComputationError::Store(_)) => "store_error",
        Err(ComputationError::Aggregation(_)) => "insufficient_data",
        Err(ComputationError::Timeout(_)) => "timeout",
        Err(ComputationError::Interrupted) => "interrupted",
    }
}

/// Serves rankings from the cache, recomputing them from the record source when needed.
#[derive(Clone)]
pub struct RankingService {
    source: Arc<dyn RecordSource>,
    cache: RankingCache,
    /// One permit per kind, held by a blocking load for as long as it actually runs.
    ///
    /// A load that timed out keeps its thread until it returns, so retries wait for it instead of
    /// stacking up more blocked threads.
    loads: Arc<[Arc<Semaphore>; 3]>,
}

impl fmt::Debug for RankingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankingService")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl RankingService {
    pub fn new(source: Arc<dyn RecordSource>, config: CacheConfig) -> Self {
        Self {
            source,
            cache: RankingCache::new(config),
            loads: Arc::new(std::array::from_fn(|_| Arc::new(Semaphore::new(1)))),
        }
    }

    pub fn cache(&self) -> &RankingCache {
        &self.cache
    }

    /// Returns the ranking of `kind`, stamped with the elapsed time and where it came from.
    ///
    /// With `force_refresh`, a fresh cache entry is ignored and the result is always live. The
    /// elapsed time is measured from the start of this call, so it is close to zero for cache hits.
    pub async fn get_ranking(
        &self,
        kind: RankingKind,
        force_refresh: bool,
    ) -> Result<RankingResponse, ComputationFailed> {
        let started = Instant::now();

        let source = Arc::clone(&self.source);
        let load = Arc::clone(&self.loads[kind as usize]);
        let computation = move || async move {
            let computation_started = Instant::now();

            let permit = match Arc::clone(&load).try_acquire_owned() {
                Ok(permit) => Ok(permit),
                Err(_) => {
                    metric!(counter("rankings.computation.stalled") += 1, "kind" => kind.name());
                    tracing::warn!(%kind, "Waiting for a timed out ranking load to return");
                    load.acquire_owned().await
                }
            };

            // The blocking task keeps running if the computation times out, since it cannot be
            // interrupted. Its result is discarded in that case.
            let result = match permit {
                Ok(permit) => tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    compute_payload(&*source, kind)
                })
                .await
                .unwrap_or_else(|_join_error| Err(ComputationError::Interrupted)),
                Err(_closed) => Err(ComputationError::Interrupted),
            };

            metric!(
                timer("rankings.computation") = computation_started.elapsed(),
                "kind" => kind.name(),
                "outcome" => outcome(&result),
            );
            result
        };

        let lookup = self
            .cache
            .compute_memoized(kind, force_refresh, computation)
            .await;

        let CacheLookup {
            payload,
            provenance,
        } = match lookup {
            Ok(lookup) => lookup,
            Err(err) => {
                let err = ComputationFailed::from(err);
                tracing::error!(
                    error = &err as &dyn std::error::Error,
                    %kind,
                    "Failed to compute ranking"
                );
                return Err(err);
            }
        };

        let elapsed = started.elapsed();
        tracing::debug!(%kind, source = provenance.as_str(), ?elapsed, "Served ranking");

        Ok(RankingResponse {
            payload,
            elapsed: format_elapsed(elapsed),
            source: provenance,
        })
    }
}
