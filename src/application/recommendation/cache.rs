//! RecommendationCache - per-(user, context) results with coalesced recompute.
//!
//! Each key owns a slot guarded by an async mutex. The first caller to
//! find a slot stale recomputes while holding the lock; concurrent callers
//! queue on the same lock and, once it is released, are served the result
//! that was just produced. At most one recompute per key is ever in flight.
//!
//! Invalidation never takes the slot lock. It bumps the slot's generation
//! counter; a payload computed for an older generation is treated as stale
//! on the next access, including one whose recompute was still running
//! when the invalidation arrived.
//!
//! ## Failure Handling
//!
//! A failed recompute never surfaces as an error. The caller receives the
//! last known-good payload flagged `stale`, falling back to the snapshot
//! store and finally to an empty stale result. Fallback payloads are
//! re-filtered by the source so that opportunities applied to since they
//! were computed are never served again.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time;

use crate::domain::foundation::{DomainError, ErrorCode, StateMachine, Timestamp, UserId};
use crate::domain::recommendation::{
    CacheState, CachedRecommendationRecord, RecommendationContext, RecommendationResult,
};
use crate::ports::RecommendationSnapshotStore;

use super::pipeline::RecommendationSource;

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub recomputes: u64,
    pub coalesced_waits: u64,
    pub compute_failures: u64,
    pub stale_served: u64,
    pub invalidations: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    recomputes: AtomicU64,
    coalesced_waits: AtomicU64,
    compute_failures: AtomicU64,
    stale_served: AtomicU64,
    invalidations: AtomicU64,
}

/// A recompute that failed and was answered from a fallback payload.
#[derive(Debug, Clone, Error)]
#[error("recompute for user {user_id} (context {context_hash}) failed: {source}")]
pub struct CacheComputeFailure {
    pub user_id: UserId,
    pub context_hash: String,
    #[source]
    pub source: DomainError,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug)]
struct SlotState {
    state: CacheState,
    result: Option<RecommendationResult>,
    /// Generation the stored payload was computed for.
    computed_generation: u64,
    /// Generation of the most recent attempt and whether it failed.
    attempt_generation: u64,
    last_attempt_failed: bool,
}

#[derive(Debug)]
struct Slot {
    generation: AtomicU64,
    attempts: AtomicU64,
    state: Mutex<SlotState>,
}

impl Slot {
    fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            state: Mutex::new(SlotState {
                state: CacheState::Stale,
                result: None,
                computed_generation: 0,
                attempt_generation: 0,
                last_attempt_failed: false,
            }),
        }
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl SlotState {
    fn fresh_payload(&self, generation: u64, now: &Timestamp) -> Option<&RecommendationResult> {
        if self.state != CacheState::Fresh || self.computed_generation != generation {
            return None;
        }
        self.result.as_ref().filter(|r| !r.is_expired(now))
    }

    fn transition(&mut self, target: CacheState) {
        match self.state.transition_to(target) {
            Ok(next) => self.state = next,
            Err(e) => tracing::warn!(error = %e, "Ignoring illegal cache slot transition"),
        }
    }
}

type UserSlots = HashMap<String, Arc<Slot>>;

/// Coalescing recommendation cache.
pub struct RecommendationCache {
    source: Arc<dyn RecommendationSource>,
    snapshots: Arc<dyn RecommendationSnapshotStore>,
    ttl_secs: u64,
    slots: StdMutex<HashMap<UserId, UserSlots>>,
    counters: Counters,
    last_failure: StdMutex<Option<CacheComputeFailure>>,
}

impl RecommendationCache {
    pub fn new(
        source: Arc<dyn RecommendationSource>,
        snapshots: Arc<dyn RecommendationSnapshotStore>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            source,
            snapshots,
            ttl_secs,
            slots: StdMutex::new(HashMap::new()),
            counters: Counters::default(),
            last_failure: StdMutex::new(None),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Serves a fresh result or recomputes it, coalescing concurrent callers.
    pub async fn get_or_compute(
        &self,
        user_id: &UserId,
        context: &RecommendationContext,
    ) -> RecommendationResult {
        self.get_or_compute_at(user_id, context, Timestamp::now()).await
    }

    /// As [`get_or_compute`](Self::get_or_compute) with an explicit clock.
    pub async fn get_or_compute_at(
        &self,
        user_id: &UserId,
        context: &RecommendationContext,
        now: Timestamp,
    ) -> RecommendationResult {
        self.resolve(user_id, context, now, false).await
    }

    /// Recomputes even if the cached payload is still fresh.
    ///
    /// Callers waiting on a recompute that finishes meanwhile share it
    /// instead of starting another.
    pub async fn refresh(
        &self,
        user_id: &UserId,
        context: &RecommendationContext,
    ) -> RecommendationResult {
        self.resolve(user_id, context, Timestamp::now(), true).await
    }

    /// Marks every cached context of a user stale. Never blocks on a
    /// recompute in progress.
    pub fn invalidate_user(&self, user_id: &UserId) -> usize {
        bump(&self.counters.invalidations);
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let touched = slots
            .get(user_id)
            .map(|contexts| {
                contexts.values().for_each(|slot| slot.invalidate());
                contexts.len()
            })
            .unwrap_or(0);
        tracing::debug!(user_id = %user_id, contexts = touched, "Invalidated cached recommendations");
        touched
    }

    /// Invalidates and forgets a user's entries, including persisted ones.
    pub async fn purge_user(&self, user_id: &UserId) {
        let removed = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
        if let Some(contexts) = removed {
            contexts.values().for_each(|slot| slot.invalidate());
        }
        bump(&self.counters.invalidations);

        if let Err(e) = self.snapshots.delete(user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to delete recommendation snapshots");
        }
    }

    /// Drops idle slots whose payload has expired. Returns how many.
    pub fn evict_expired(&self, now: Timestamp) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut evicted = 0;
        for contexts in slots.values_mut() {
            contexts.retain(|_, slot| {
                if Arc::strong_count(slot) > 1 {
                    return true;
                }
                let keep = match slot.state.try_lock() {
                    Ok(inner) => inner
                        .result
                        .as_ref()
                        .map(|r| !r.is_expired(&now))
                        .unwrap_or(false),
                    Err(_) => true,
                };
                if !keep {
                    evicted += 1;
                }
                keep
            });
        }
        slots.retain(|_, contexts| !contexts.is_empty());
        evicted
    }

    /// Evicts expired entries every `interval` until shutdown.
    pub async fn run_eviction(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                _ = ticker.tick() => {
                    let evicted = self.evict_expired(Timestamp::now());
                    if evicted > 0 {
                        tracing::debug!(evicted, "Evicted expired recommendation entries");
                    }
                }
            }
        }
    }

    /// Most recent failed recompute, if any.
    pub fn last_failure(&self) -> Option<CacheComputeFailure> {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stats(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let entries = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum();
        CacheStats {
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            recomputes: load(&self.counters.recomputes),
            coalesced_waits: load(&self.counters.coalesced_waits),
            compute_failures: load(&self.counters.compute_failures),
            stale_served: load(&self.counters.stale_served),
            invalidations: load(&self.counters.invalidations),
            entries,
        }
    }

    fn slot(&self, user_id: &UserId, context_hash: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots
            .entry(user_id.clone())
            .or_default()
            .entry(context_hash.to_string())
            .or_insert_with(|| Arc::new(Slot::new()));
        Arc::clone(slot)
    }

    async fn resolve(
        &self,
        user_id: &UserId,
        context: &RecommendationContext,
        now: Timestamp,
        force: bool,
    ) -> RecommendationResult {
        let context_hash = context.context_hash();
        let slot = self.slot(user_id, &context_hash);
        let attempts_seen = slot.attempts.load(Ordering::SeqCst);

        let mut inner = match slot.state.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                bump(&self.counters.coalesced_waits);
                tracing::debug!(
                    user_id = %user_id,
                    context_hash = %context_hash,
                    "Waiting on in-flight recompute"
                );
                slot.state.lock().await
            }
        };

        let generation = slot.generation.load(Ordering::SeqCst);

        if !force {
            if let Some(result) = inner.fresh_payload(generation, &now) {
                bump(&self.counters.hits);
                tracing::debug!(user_id = %user_id, context_hash = %context_hash, "Cache hit");
                return result.clone();
            }
        }

        // Another caller finished an attempt while we waited and nothing was
        // invalidated since: share its outcome.
        let coalesced = slot.attempts.load(Ordering::SeqCst) != attempts_seen;
        if coalesced && inner.attempt_generation == generation {
            if inner.last_attempt_failed {
                let last_good = inner.result.clone();
                return self.fallback(user_id, &context_hash, last_good).await;
            }
            if let Some(result) = &inner.result {
                bump(&self.counters.hits);
                return result.clone();
            }
        }

        bump(&self.counters.misses);
        tracing::debug!(user_id = %user_id, context_hash = %context_hash, "Cache miss");

        if inner.state == CacheState::Fresh {
            inner.transition(CacheState::Stale);
        }
        inner.transition(CacheState::Recomputing);
        bump(&self.counters.recomputes);

        let outcome = self.source.compute(user_id, context, now).await;
        slot.attempts.fetch_add(1, Ordering::SeqCst);
        inner.attempt_generation = generation;

        match outcome {
            Ok(items) => {
                let result = RecommendationResult::new(
                    user_id.clone(),
                    context_hash.clone(),
                    items,
                    now,
                    self.ttl_secs,
                );
                inner.result = Some(result.clone());
                inner.computed_generation = generation;
                inner.last_attempt_failed = false;
                inner.transition(CacheState::Fresh);
                drop(inner);

                self.persist(user_id, &context_hash, &result).await;
                result
            }
            Err(e) => {
                bump(&self.counters.compute_failures);
                let failure = CacheComputeFailure {
                    user_id: user_id.clone(),
                    context_hash: context_hash.clone(),
                    source: e,
                };
                tracing::warn!(
                    code = %ErrorCode::CacheComputeFailure,
                    error = %failure,
                    "Serving last known-good recommendations"
                );
                *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(failure);
                inner.last_attempt_failed = true;
                inner.transition(CacheState::Stale);
                let last_good = inner.result.clone();
                self.fallback(user_id, &context_hash, last_good).await
            }
        }
    }

    async fn fallback(
        &self,
        user_id: &UserId,
        context_hash: &str,
        last_good: Option<RecommendationResult>,
    ) -> RecommendationResult {
        bump(&self.counters.stale_served);
        let served = match last_good {
            Some(result) => result,
            None => match self.snapshots.load(user_id, context_hash).await {
                Ok(Some(record)) => record.into_result(user_id.clone(), context_hash),
                Ok(None) => {
                    return RecommendationResult::empty_stale(
                        user_id.clone(),
                        context_hash,
                        Timestamp::now(),
                    )
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Snapshot store unavailable");
                    return RecommendationResult::empty_stale(
                        user_id.clone(),
                        context_hash,
                        Timestamp::now(),
                    );
                }
            },
        };

        let mut served = served.marked_stale();
        served.items = self.source.retain_eligible(user_id, served.items).await;
        served
    }

    async fn persist(&self, user_id: &UserId, context_hash: &str, result: &RecommendationResult) {
        let record = CachedRecommendationRecord::from_result(result);
        if let Err(e) = self.snapshots.save(user_id, context_hash, &record).await {
            tracing::warn!(
                user_id = %user_id,
                context_hash = %context_hash,
                error = %e,
                "Failed to persist recommendation snapshot"
            );
        }
    }
}
