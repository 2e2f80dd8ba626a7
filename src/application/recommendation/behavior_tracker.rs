//! Behavior Tracker - fire-and-forget ingestion of interaction events.
//!
//! `record` never blocks on I/O and never fails. It suppresses duplicate
//! `(user, opportunity, action)` tuples inside the dedupe window, marks the
//! user's cached recommendations stale, and enqueues the event on a bounded
//! queue. When the queue is full the oldest event is dropped.
//!
//! [`BehaviorConsumer`] drains the queue in the background: it persists
//! each batch, merges it into the neighbor index and invalidates the
//! affected users again so no result computed before the merge survives.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `queue_capacity` | 10 000 | Events held before the oldest is dropped |
//! | `dedupe_window` | 2s | Window for suppressing repeated tuples |
//! | `batch_size` | 256 | Max events persisted per batch |

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Notify};

use crate::domain::behavior::{BehaviorAction, BehaviorEvent};
use crate::domain::collaborative::NeighborIndex;
use crate::domain::foundation::{ErrorCode, OpportunityId, Timestamp, UserId};
use crate::ports::BehaviorEventStore;

use super::cache::RecommendationCache;

/// Dedupe entries are pruned once the table grows past this size.
const DEDUPE_PRUNE_THRESHOLD: usize = 1024;

/// Configuration for the tracker and its consumer.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub queue_capacity: usize,
    pub dedupe_window: Duration,
    pub batch_size: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            dedupe_window: Duration::from_millis(2_000),
            batch_size: 256,
        }
    }
}

impl TrackerSettings {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_dedupe_window(mut self, window: Duration) -> Self {
        self.dedupe_window = window;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }
}

/// What happened to a `record` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Accepted,
    Duplicate,
}

/// Point-in-time tracker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub accepted: u64,
    pub deduplicated: u64,
    pub dropped: u64,
    pub persisted: u64,
    pub failed: u64,
    pub queued: usize,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    deduplicated: AtomicU64,
    dropped: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
}

/// Bounded drop-oldest queue shared by tracker and consumer.
#[derive(Debug)]
struct EventQueue {
    capacity: usize,
    events: Mutex<VecDeque<BehaviorEvent>>,
    notify: Notify,
}

impl EventQueue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Enqueues an event, returning the one evicted to make room.
    fn push(&self, event: BehaviorEvent) -> Option<BehaviorEvent> {
        let evicted = {
            let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
            let evicted = if events.len() >= self.capacity {
                events.pop_front()
            } else {
                None
            };
            events.push_back(event);
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    fn drain(&self, max: usize) -> Vec<BehaviorEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let take = max.min(events.len());
        events.drain(..take).collect()
    }

    fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

type DedupeKey = (UserId, OpportunityId, BehaviorAction);

/// Request-path entrypoint for behavior events.
pub struct BehaviorTracker {
    cache: Arc<RecommendationCache>,
    queue: Arc<EventQueue>,
    recent: Mutex<HashMap<DedupeKey, Timestamp>>,
    counters: Arc<Counters>,
    settings: TrackerSettings,
}

impl BehaviorTracker {
    pub fn new(cache: Arc<RecommendationCache>, settings: TrackerSettings) -> Self {
        Self {
            cache,
            queue: Arc::new(EventQueue::new(settings.queue_capacity)),
            recent: Mutex::new(HashMap::new()),
            counters: Arc::new(Counters::default()),
            settings,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Records an interaction. Never blocks on storage, never fails.
    pub fn record(
        &self,
        user_id: UserId,
        opportunity_id: OpportunityId,
        action: BehaviorAction,
    ) -> RecordOutcome {
        self.record_at(user_id, opportunity_id, action, Timestamp::now())
    }

    /// As [`record`](Self::record) with an explicit clock.
    pub fn record_at(
        &self,
        user_id: UserId,
        opportunity_id: OpportunityId,
        action: BehaviorAction,
        now: Timestamp,
    ) -> RecordOutcome {
        let event = BehaviorEvent::new(user_id, opportunity_id, action, now);

        if self.is_duplicate(event.dedupe_key(), now) {
            self.counters.deduplicated.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                user_id = %event.user_id(),
                opportunity_id = %opportunity_id,
                action = %action,
                "Suppressed duplicate behavior event"
            );
            return RecordOutcome::Duplicate;
        }

        self.cache.invalidate_user(event.user_id());

        if let Some(evicted) = self.queue.push(event) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                user_id = %evicted.user_id(),
                opportunity_id = %evicted.opportunity_id(),
                capacity = self.queue.capacity,
                "Behavior queue full, dropped oldest event"
            );
        }
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        RecordOutcome::Accepted
    }

    /// Builds the background consumer that drains this tracker's queue.
    pub fn consumer(
        &self,
        store: Arc<dyn BehaviorEventStore>,
        index: Arc<NeighborIndex>,
    ) -> BehaviorConsumer {
        BehaviorConsumer {
            queue: Arc::clone(&self.queue),
            store,
            index,
            cache: Arc::clone(&self.cache),
            counters: Arc::clone(&self.counters),
            batch_size: self.settings.batch_size.max(1),
        }
    }

    pub fn stats(&self) -> TrackerStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        TrackerStats {
            accepted: load(&self.counters.accepted),
            deduplicated: load(&self.counters.deduplicated),
            dropped: load(&self.counters.dropped),
            persisted: load(&self.counters.persisted),
            failed: load(&self.counters.failed),
            queued: self.queue.len(),
        }
    }

    fn is_duplicate(&self, key: DedupeKey, now: Timestamp) -> bool {
        let window_ms = i64::try_from(self.settings.dedupe_window.as_millis()).unwrap_or(i64::MAX);
        let within_window =
            |seen: &Timestamp| now.duration_since(seen).num_milliseconds() < window_ms;

        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        if recent.len() > DEDUPE_PRUNE_THRESHOLD {
            recent.retain(|_, seen| within_window(seen));
        }

        match recent.get(&key) {
            Some(seen) if within_window(seen) => true,
            _ => {
                recent.insert(key, now);
                false
            }
        }
    }
}

/// Background service persisting queued behavior events.
pub struct BehaviorConsumer {
    queue: Arc<EventQueue>,
    store: Arc<dyn BehaviorEventStore>,
    index: Arc<NeighborIndex>,
    cache: Arc<RecommendationCache>,
    counters: Arc<Counters>,
    batch_size: usize,
}

impl BehaviorConsumer {
    /// Runs until shutdown is signalled, then drains the queue and returns.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let drained = self.drain().await;
                        tracing::info!(drained, "Behavior consumer stopped");
                        return;
                    }
                }
                _ = self.queue.notify.notified() => {
                    self.drain().await;
                }
            }
        }
    }

    /// Processes batches until the queue is empty.
    pub async fn drain(&self) -> usize {
        let mut total = 0;
        loop {
            let processed = self.process_batch().await;
            if processed == 0 {
                return total;
            }
            total += processed;
        }
    }

    /// Persists and indexes one batch. Returns the number of events taken.
    pub async fn process_batch(&self) -> usize {
        let events = self.queue.drain(self.batch_size);
        if events.is_empty() {
            return 0;
        }
        let count = events.len() as u64;

        let persisted = match self.store.append_batch(&events).await {
            Ok(()) => true,
            Err(e) => {
                self.counters.failed.fetch_add(count, Ordering::Relaxed);
                tracing::error!(
                    code = %ErrorCode::BehaviorRecordFailure,
                    events = count,
                    error = %e,
                    "Failed to persist behavior events"
                );
                false
            }
        };

        self.index.apply_events(&events);

        let affected: BTreeSet<&UserId> = events.iter().map(BehaviorEvent::user_id).collect();
        for user_id in affected {
            self.cache.invalidate_user(user_id);
        }
        if persisted {
            self.counters.persisted.fetch_add(count, Ordering::Relaxed);
        }

        events.len()
    }
}
