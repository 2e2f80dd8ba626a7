//! Batch refresh of cached recommendations for every active user.
//!
//! Users are pulled from a shared work queue by a fixed pool of workers;
//! each worker owns one user at a time. Cancellation is cooperative and
//! checked between users, so a user that was started is always finished
//! and its cache entry written completely.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::recommendation::RecommendationContext;
use crate::ports::ProfileRepository;

use super::cache::RecommendationCache;

/// Outcome of one refresh run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub users: usize,
    pub refreshed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl RefreshReport {
    fn merge(&mut self, other: WorkerTally) {
        self.refreshed += other.refreshed;
        self.failed += other.failed;
        self.cancelled |= other.cancelled;
    }
}

#[derive(Debug, Default)]
struct WorkerTally {
    refreshed: usize,
    failed: usize,
    cancelled: bool,
}

pub struct BatchRefresher {
    profiles: Arc<dyn ProfileRepository>,
    cache: Arc<RecommendationCache>,
    contexts: Arc<Vec<RecommendationContext>>,
    workers: usize,
}

impl BatchRefresher {
    /// Refreshes the unfiltered context with `workers` parallel workers.
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        cache: Arc<RecommendationCache>,
        workers: usize,
    ) -> Self {
        Self {
            profiles,
            cache,
            contexts: Arc::new(vec![RecommendationContext::default()]),
            workers: workers.max(1),
        }
    }

    /// Replaces the set of contexts refreshed per user.
    pub fn with_contexts(mut self, contexts: Vec<RecommendationContext>) -> Self {
        self.contexts = Arc::new(contexts);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Refreshes every active user once, stopping early when `cancel`
    /// turns true.
    pub async fn run(&self, cancel: watch::Receiver<bool>) -> Result<RefreshReport, DomainError> {
        let users = self.profiles.list_active_users().await?;
        let mut report = RefreshReport {
            users: users.len(),
            ..RefreshReport::default()
        };
        let queue: Arc<Mutex<VecDeque<UserId>>> = Arc::new(Mutex::new(users.into()));

        let mut workers = JoinSet::new();
        for _ in 0..self.workers.min(report.users.max(1)) {
            workers.spawn(Self::worker(
                Arc::clone(&queue),
                Arc::clone(&self.cache),
                Arc::clone(&self.contexts),
                cancel.clone(),
            ));
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(tally) => report.merge(tally),
                Err(e) => tracing::error!(error = %e, "Refresh worker panicked"),
            }
        }

        report.skipped = queue.lock().unwrap_or_else(PoisonError::into_inner).len();
        tracing::info!(
            users = report.users,
            refreshed = report.refreshed,
            failed = report.failed,
            skipped = report.skipped,
            cancelled = report.cancelled,
            "Batch refresh finished"
        );
        Ok(report)
    }

    /// Runs a refresh every `interval` until shutdown. The first run starts
    /// one interval after the call.
    pub async fn run_periodic(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
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
                    if let Err(e) = self.run(shutdown.clone()).await {
                        tracing::warn!(error = %e, "Batch refresh could not list active users");
                    }
                }
            }
        }
    }

    async fn worker(
        queue: Arc<Mutex<VecDeque<UserId>>>,
        cache: Arc<RecommendationCache>,
        contexts: Arc<Vec<RecommendationContext>>,
        cancel: watch::Receiver<bool>,
    ) -> WorkerTally {
        let mut tally = WorkerTally::default();
        loop {
            if *cancel.borrow() {
                tally.cancelled = true;
                return tally;
            }
            let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
            let Some(user_id) = next else {
                return tally;
            };

            let mut healthy = true;
            for context in contexts.iter() {
                healthy &= !cache.refresh(&user_id, context).await.stale;
            }
            if healthy {
                tally.refreshed += 1;
            } else {
                tally.failed += 1;
            }
        }
    }
}
