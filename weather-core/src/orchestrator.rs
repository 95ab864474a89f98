//! Single entry point for weather lookups.
//!
//! The orchestrator sits between the presentation layer and the transport:
//! - answers repeated lookups from a short-lived cache
//! - coalesces concurrent lookups for the same place into one HTTP call
//! - retries network failures with backoff
//! - classifies every failure into a [`FetchError`]
//! - publishes [`FetchState`] changes to its [`QueryStore`]
//!
//! Every lookup is stamped with a sequence number when it is issued. A
//! completed lookup may only update the published state if nothing newer
//! has been requested since, so a slow response for an old query can never
//! overwrite the result of a newer one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    cache::{CachedSnapshot, DEFAULT_CAPACITY, DEFAULT_TTL, SnapshotCache},
    config::Config,
    error::FetchError,
    location::LocationProvider,
    model::{FetchState, Query, QueryKey, WeatherSnapshot},
    normalize::normalize,
    retry::RetryPolicy,
    store::{QueryStore, StateSubscription},
    transport::WeatherTransport,
};

type Outcome = Result<CachedSnapshot, FetchError>;

/// Tunables for cache and retry behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            cache_capacity: DEFAULT_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    cache: SnapshotCache,
    in_flight: HashMap<QueryKey, broadcast::Sender<Outcome>>,
    /// Sequence number of the most recently issued lookup.
    latest_seq: u64,
    /// Last non-`Loading` state handed to the store.
    settled: FetchState,
}

impl Inner {
    fn settle(&mut self, store: &QueryStore, state: FetchState) {
        self.settled = state.clone();
        store.publish(state);
    }
}

/// How a lookup will be served, decided under the lock.
enum Plan {
    Cached(CachedSnapshot),
    Follow(broadcast::Receiver<Outcome>),
    Lead,
}

#[derive(Debug)]
pub struct FetchOrchestrator {
    transport: Arc<dyn WeatherTransport>,
    location: Option<Arc<dyn LocationProvider>>,
    retry: RetryPolicy,
    inner: Mutex<Inner>,
    store: QueryStore,
}

impl FetchOrchestrator {
    /// Fails with [`FetchError::Configuration`] when the API key or base URL
    /// is missing.
    pub fn new(transport: Arc<dyn WeatherTransport>, config: &Config) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self::with_settings(transport, config.orchestrator_settings()))
    }

    pub fn with_settings(
        transport: Arc<dyn WeatherTransport>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            transport,
            location: None,
            retry: settings.retry,
            inner: Mutex::new(Inner {
                cache: SnapshotCache::new(settings.cache_ttl, settings.cache_capacity),
                in_flight: HashMap::new(),
                latest_seq: 0,
                settled: FetchState::Idle,
            }),
            store: QueryStore::new(),
        }
    }

    pub fn with_location(mut self, provider: Arc<dyn LocationProvider>) -> Self {
        self.location = Some(provider);
        self
    }

    pub fn current_state(&self) -> FetchState {
        self.store.current()
    }

    pub fn subscribe(&self) -> StateSubscription {
        self.store.subscribe()
    }

    /// Drop the cached snapshot for `query` so the next fetch goes upstream.
    pub fn invalidate(&self, query: &Query) {
        let key = query.key();
        if self.inner.lock().cache.remove(&key) {
            debug!(%key, "cache entry invalidated");
        }
    }

    /// Invalidate then fetch.
    pub async fn refresh(&self, query: Query) -> Result<WeatherSnapshot, FetchError> {
        self.invalidate(&query);
        self.fetch(query).await
    }

    /// Ask the location provider for coordinates and fetch weather there.
    pub async fn fetch_current_location(&self) -> Result<WeatherSnapshot, FetchError> {
        let provider = self
            .location
            .as_ref()
            .ok_or(FetchError::LocationUnavailable)?;

        let coords = provider
            .current_location()
            .await
            .ok_or(FetchError::LocationUnavailable)?;

        self.fetch(Query::ByCoordinates(coords)).await
    }

    pub async fn fetch(&self, query: Query) -> Result<WeatherSnapshot, FetchError> {
        if let Err(err) = query.validate() {
            let mut inner = self.inner.lock();
            inner.latest_seq += 1;
            debug!(%query, "rejected invalid query");
            inner.settle(
                &self.store,
                FetchState::Failed {
                    error: err.kind(),
                    query,
                },
            );
            return Err(err);
        }

        let key = query.key();
        let (seq, plan) = self.plan(&query, &key);
        let mut pending = PendingPublish {
            orchestrator: self,
            seq,
            done: false,
        };

        let outcome = match plan {
            Plan::Cached(cached) => {
                pending.done = true;
                return Ok(cached.snapshot);
            }
            Plan::Follow(mut rx) => {
                debug!(%key, "attaching to in-flight request");
                rx.recv()
                    .await
                    .unwrap_or_else(|_| Err(FetchError::Network("request abandoned".to_string())))
            }
            Plan::Lead => self.lead(&query, key).await,
        };

        self.apply(seq, &query, &outcome);
        pending.done = true;
        outcome.map(|cached| cached.snapshot)
    }

    /// Issue a sequence number and decide between cache, follow and lead.
    /// Publishes the immediate state transition while still holding the lock.
    fn plan(&self, query: &Query, key: &QueryKey) -> (u64, Plan) {
        let mut inner = self.inner.lock();
        inner.latest_seq += 1;
        let seq = inner.latest_seq;

        if let Some(cached) = inner.cache.get(key) {
            debug!(%key, "cache hit");
            inner.settle(
                &self.store,
                FetchState::Loaded {
                    snapshot: cached.snapshot.clone(),
                    fetched_at: cached.fetched_at,
                },
            );
            return (seq, Plan::Cached(cached));
        }

        self.store.publish(FetchState::Loading(query.clone()));

        if let Some(tx) = inner.in_flight.get(key) {
            return (seq, Plan::Follow(tx.subscribe()));
        }

        let (tx, _) = broadcast::channel(1);
        inner.in_flight.insert(key.clone(), tx);
        debug!(%key, seq, "cache miss, requesting upstream");
        (seq, Plan::Lead)
    }

    /// Perform the upstream call for `key`, then hand the outcome to every
    /// follower and cache it on success.
    async fn lead(&self, query: &Query, key: QueryKey) -> Outcome {
        let mut slot = InFlightSlot {
            inner: &self.inner,
            key: Some(key),
        };

        let outcome = self
            .retry
            .run(|| self.transport.get(query))
            .await
            .map_err(FetchError::from)
            .and_then(|raw| normalize(&raw).map_err(FetchError::from))
            .map(CachedSnapshot::now);

        match &outcome {
            Ok(cached) => info!(
                %query,
                city = %cached.snapshot.city,
                temperature = cached.snapshot.temperature,
                "weather fetched"
            ),
            Err(FetchError::MalformedResponse(reason)) => {
                warn!(%query, %reason, "provider payload failed normalization")
            }
            Err(err) => debug!(%query, error = %err, "fetch failed"),
        }

        slot.complete(&outcome);
        outcome
    }

    /// Publish the outcome unless a newer lookup has been issued since `seq`.
    fn apply(&self, seq: u64, query: &Query, outcome: &Outcome) {
        let mut inner = self.inner.lock();
        if seq != inner.latest_seq {
            debug!(%query, seq, latest = inner.latest_seq, "discarding stale result");
            return;
        }

        let state = match outcome {
            Ok(cached) => FetchState::Loaded {
                snapshot: cached.snapshot.clone(),
                fetched_at: cached.fetched_at,
            },
            Err(err) => FetchState::Failed {
                error: err.kind(),
                query: query.clone(),
            },
        };
        inner.settle(&self.store, state);
    }
}

/// A lookup's claim on the published state between `plan` and `apply`.
/// If the caller drops the lookup while it still holds the newest sequence
/// number, nothing else would ever replace its `Loading`, so the last
/// settled state is put back.
struct PendingPublish<'a> {
    orchestrator: &'a FetchOrchestrator,
    seq: u64,
    done: bool,
}

impl Drop for PendingPublish<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        let inner = self.orchestrator.inner.lock();
        if inner.latest_seq == self.seq {
            debug!(seq = self.seq, "latest lookup abandoned, restoring settled state");
            self.orchestrator.store.publish(inner.settled.clone());
        }
    }
}

/// Ownership of one in-flight table entry. Dropping it without completing
/// (the leader's future was cancelled) releases the entry, which closes the
/// channel and wakes any followers.
struct InFlightSlot<'a> {
    inner: &'a Mutex<Inner>,
    key: Option<QueryKey>,
}

impl InFlightSlot<'_> {
    fn complete(&mut self, outcome: &Outcome) {
        let Some(key) = self.key.take() else {
            return;
        };

        let tx = {
            let mut inner = self.inner.lock();
            if let Ok(cached) = outcome {
                inner.cache.insert(key.clone(), cached.clone());
            }
            inner.in_flight.remove(&key)
        };

        if let Some(tx) = tx {
            // No receivers just means nobody attached.
            let _ = tx.send(outcome.clone());
        }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            debug!(%key, "in-flight request abandoned");
            self.inner.lock().in_flight.remove(&key);
        }
    }
}
