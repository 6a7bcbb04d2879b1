use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use sentry::{Hub, SentryFutureExt};
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::types::{Provenance, RankingKind, RankingPayload};
use crate::utils::futures::CallOnDrop;

use super::ComputationError;

type ComputationResult = Result<Arc<RankingPayload>, Arc<ComputationError>>;

// `Shared` hands out clones of the result to every waiter, hence the `Arc`s above.
type ComputationChannel = Shared<oneshot::Receiver<ComputationResult>>;

/// The last successfully computed payload of a ranking and when it stops being served.
#[derive(Clone, Debug)]
struct CacheEntry {
    payload: Arc<RankingPayload>,
    expires_at: Instant,
}

/// A running computation that later requests for the same kind wait on.
struct InFlight {
    /// Distinguishes this computation from earlier ones, whose cleanup must not remove it.
    generation: u64,
    channel: ComputationChannel,
}

/// The state of one ranking kind.
///
/// The entry is only ever replaced as a whole, so a reader never sees a payload together with the
/// expiry of another computation.
///
/// `follow_up` is a computation queued behind `in_flight` for forced refreshes that arrived while
/// `in_flight` was already running. It becomes `in_flight` once that one has finished.
#[derive(Default)]
struct Slot {
    entry: Option<CacheEntry>,
    in_flight: Option<InFlight>,
    follow_up: Option<InFlight>,
}

impl Slot {
    fn fresh_payload(&self, now: Instant) -> Option<Arc<RankingPayload>> {
        self.entry
            .as_ref()
            .filter(|entry| now < entry.expires_at)
            .map(|entry| Arc::clone(&entry.payload))
    }

    /// Replaces the entry with `payload`, valid until `now + ttl`.
    fn store(&mut self, payload: Arc<RankingPayload>, now: Instant, ttl: Duration) {
        self.entry = Some(CacheEntry {
            payload,
            expires_at: now + ttl,
        });
    }

    /// Promotes the queued follow-up computation `generation` once it starts running.
    fn start_follow_up(&mut self, generation: u64) {
        if self
            .follow_up
            .as_ref()
            .is_some_and(|follow_up| follow_up.generation == generation)
        {
            self.in_flight = self.follow_up.take();
        }
    }

    /// The channel of the computation that has not loaded any records yet, if any.
    fn pending_channel(&self) -> Option<ComputationChannel> {
        self.follow_up
            .as_ref()
            .map(|follow_up| follow_up.channel.clone())
    }

    fn clear_in_flight(&mut self, generation: u64) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            self.in_flight = None;
        }
        if self
            .follow_up
            .as_ref()
            .is_some_and(|follow_up| follow_up.generation == generation)
        {
            self.follow_up = None;
        }
    }
}

type Slots = Arc<[Mutex<Slot>; 3]>;

fn slot_index(kind: RankingKind) -> usize {
    match kind {
        RankingKind::TopRevenue => 0,
        RankingKind::TopCities => 1,
        RankingKind::TopCategories => 2,
    }
}

/// The result of [`RankingCache::compute_memoized`].
#[derive(Clone, Debug)]
pub struct CacheLookup {
    pub payload: Arc<RankingPayload>,
    /// [`Provenance::Cache`] for a fresh cache entry, [`Provenance::Live`] if the request started
    /// or joined a computation.
    pub provenance: Provenance,
}

/// Holds the last computed payload per ranking kind, and deduplicates their recomputation.
///
/// Entries start out empty, which is treated the same as an expired entry. They are overwritten by
/// every successful computation and never removed otherwise. A failed computation leaves the
/// previous entry untouched.
///
/// Cloning is cheap and yields a handle to the same slots.
#[derive(Clone)]
pub struct RankingCache {
    config: CacheConfig,
    slots: Slots,
    generation: Arc<AtomicU64>,
}

impl fmt::Debug for RankingCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in RankingKind::ALL {
            let slot = self.slots[slot_index(kind)].lock();
            map.entry(
                &kind.name(),
                &format_args!(
                    "entry: {:?}, computing: {}, queued: {}",
                    slot.entry.as_ref().map(|entry| entry.expires_at),
                    slot.in_flight.is_some(),
                    slot.follow_up.is_some()
                ),
            );
        }
        map.finish()
    }
}

impl RankingCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            slots: Default::default(),
            generation: Default::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cached payload of `kind` if it is still valid at `now`.
    ///
    /// A `None` is a miss, either because nothing was computed yet or because the entry expired.
    pub fn try_read(&self, kind: RankingKind, now: Instant) -> Option<Arc<RankingPayload>> {
        self.slots[slot_index(kind)].lock().fresh_payload(now)
    }

    /// Stores `payload` as computed at `now`.
    ///
    /// The slot is determined by the payload itself, and the entry is valid until `now + ttl`.
    pub fn write(&self, payload: RankingPayload, now: Instant) {
        let kind = payload.kind();
        self.slots[slot_index(kind)]
            .lock()
            .store(Arc::new(payload), now, self.config.ttl);
    }

    /// The point in time at which the current entry of `kind` expires.
    pub fn expires_at(&self, kind: RankingKind) -> Option<Instant> {
        let slot = self.slots[slot_index(kind)].lock();
        slot.entry.as_ref().map(|entry| entry.expires_at)
    }

    /// Returns `true` while a computation for `kind` is running or queued.
    pub fn is_computing(&self, kind: RankingKind) -> bool {
        let slot = self.slots[slot_index(kind)].lock();
        slot.in_flight.is_some() || slot.follow_up.is_some()
    }

    /// Spawns `computation` and returns a channel that every waiter can clone.
    ///
    /// With `previous`, the computation only starts once `previous` has finished, whatever its
    /// outcome. The timeout applies from that point on.
    ///
    /// On success the payload is written and the in-flight marker is removed within the same lock,
    /// so later requests either join this computation or see its entry. On failure only the marker
    /// is removed.
    fn spawn_computation<F>(
        &self,
        kind: RankingKind,
        generation: u64,
        previous: Option<ComputationChannel>,
        computation: F,
    ) -> ComputationChannel
    where
        F: Future<Output = Result<RankingPayload, ComputationError>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();

        let slots = Arc::clone(&self.slots);
        let remove_computation_token = CallOnDrop::new(move || {
            slots[slot_index(kind)].lock().clear_in_flight(generation);
        });

        let slots = Arc::clone(&self.slots);
        let CacheConfig {
            ttl,
            computation_timeout,
        } = self.config;

        let channel = async move {
            if let Some(previous) = previous {
                // The outcome belongs to the requests that waited on `previous`.
                let _ = previous.await;
                slots[slot_index(kind)].lock().start_follow_up(generation);
            }

            let result = match tokio::time::timeout(computation_timeout, computation).await {
                Ok(Ok(payload)) => {
                    debug_assert_eq!(payload.kind(), kind);
                    let payload = Arc::new(payload);
                    let mut slot = slots[slot_index(kind)].lock();
                    slot.store(Arc::clone(&payload), Instant::now(), ttl);
                    slot.clear_in_flight(generation);
                    Ok(payload)
                }
                Ok(Err(err)) => Err(Arc::new(err)),
                Err(_elapsed) => {
                    metric!(counter("rankings.computation.timeout") += 1, "kind" => kind.name());
                    tracing::warn!(%kind, timeout = ?computation_timeout, "Ranking computation timed out");
                    Err(Arc::new(ComputationError::Timeout(computation_timeout)))
                }
            };
            // Drop the token before sending, so that callers either get a channel that will
            // receive data, or they create a new channel.
            drop(remove_computation_token);
            sender.send(result).ok();
        }
        .bind_hub(Hub::new_from_top(Hub::current()));

        tokio::spawn(channel);

        receiver.shared()
    }

    /// Returns the payload of `kind`, computing it if necessary.
    ///
    /// Unless `force_refresh` is set, a fresh cache entry is returned right away. Otherwise, if a
    /// computation for `kind` is already running, this waits for its result. Only if there is none,
    /// `computation` is invoked and spawned.
    ///
    /// A forced refresh never joins a computation that was already running when it arrived, since
    /// that one may have loaded the records before they changed. Instead, it queues a single
    /// follow-up computation that starts once the running one has finished. All forced refreshes
    /// arriving in the meantime wait on that same follow-up. This guarantees at most one running
    /// computation per kind, no matter how many requests miss the cache concurrently.
    ///
    /// The computation runs to completion even if the calling request goes away, and is bounded by
    /// the configured `computation_timeout`.
    ///
    /// # Errors
    ///
    /// Returns the error of the computation this request waited on. Errors are never cached, the
    /// next request after a failure starts a new computation.
    pub async fn compute_memoized<F, Fut>(
        &self,
        kind: RankingKind,
        force_refresh: bool,
        computation: F,
    ) -> Result<CacheLookup, Arc<ComputationError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RankingPayload, ComputationError>> + Send + 'static,
    {
        let channel = {
            let mut guard = self.slots[slot_index(kind)].lock();
            let slot = &mut *guard;

            if !force_refresh {
                if let Some(payload) = slot.fresh_payload(Instant::now()) {
                    metric!(counter("rankings.cache.hit") += 1, "kind" => kind.name());
                    return Ok(CacheLookup {
                        payload,
                        provenance: Provenance::Cache,
                    });
                }
            }

            let running = slot
                .in_flight
                .as_ref()
                .map(|in_flight| in_flight.channel.clone());
            // Nothing was loaded for a queued computation yet, so it also serves forced refreshes.
            let joinable = if force_refresh {
                slot.pending_channel()
            } else {
                running.clone().or_else(|| slot.pending_channel())
            };

            match (joinable, running) {
                (Some(channel), _) => {
                    // A concurrent recomputation was deduplicated.
                    metric!(counter("rankings.cache.joined") += 1, "kind" => kind.name());
                    tracing::debug!(%kind, "Waiting for running ranking computation");
                    channel
                }
                (None, Some(running)) => {
                    metric!(counter("rankings.cache.refresh_queued") += 1, "kind" => kind.name());
                    tracing::debug!(%kind, "Queueing ranking computation behind running one");
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let channel =
                        self.spawn_computation(kind, generation, Some(running), computation());
                    slot.follow_up = Some(InFlight {
                        generation,
                        channel: channel.clone(),
                    });
                    channel
                }
                (None, None) => {
                    metric!(
                        counter("rankings.cache.miss") += 1,
                        "kind" => kind.name(),
                        "forced" => if force_refresh { "true" } else { "false" },
                    );
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let channel = self.spawn_computation(kind, generation, None, computation());
                    slot.in_flight = Some(InFlight {
                        generation,
                        channel: channel.clone(),
                    });
                    channel
                }
            }
        };

        let payload = channel
            .await
            .unwrap_or_else(|_cancelled| Err(Arc::new(ComputationError::Interrupted)))?;

        Ok(CacheLookup {
            payload,
            provenance: Provenance::Live,
        })
    }
}
