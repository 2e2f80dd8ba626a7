//! RecommendationEngine - wires the pipeline, cache, tracker and refresher.
//!
//! ## Lifecycle
//!
//! 1. [`RecommendationEngine::new`] validates settings and builds components.
//! 2. [`start`](RecommendationEngine::start) warms the neighbor index from
//!    stored behavior and active profiles, then spawns the behavior
//!    consumer, the periodic batch refresh and cache eviction.
//! 3. [`shutdown`](RecommendationEngine::shutdown) signals the tasks and
//!    waits for them; the consumer drains its queue first.

use futures::future::join_all;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::collaborative::{CollaborativeFilter, NeighborIndex, NeighborSettings};
use crate::domain::foundation::{DomainError, ValidationError};
use crate::domain::matching::{ScoringEngine, UserProfile, WeightConfig};
use crate::domain::ranking::RankingPolicy;
use crate::domain::recommendation::RecommendationContext;
use crate::ports::{
    ApplicationLedger, BehaviorEventStore, ProfileRepository, RecommendationSnapshotStore,
};

use super::batch_refresh::BatchRefresher;
use super::behavior_tracker::{BehaviorTracker, TrackerSettings, TrackerStats};
use super::cache::{CacheStats, RecommendationCache};
use super::pipeline::RecommendationPipeline;

/// Tunables for the whole engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub ranking: RankingPolicy,
    pub cache_ttl_secs: u64,
    pub neighbors: NeighborSettings,
    pub tracker: TrackerSettings,
    pub refresh_interval: Duration,
    pub refresh_workers: usize,
    /// Contexts warmed for every user by the batch refresh.
    pub refresh_contexts: Vec<RecommendationContext>,
    pub eviction_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ranking: RankingPolicy::default(),
            cache_ttl_secs: 3600,
            neighbors: NeighborSettings::default(),
            tracker: TrackerSettings::default(),
            refresh_interval: Duration::from_secs(3600),
            refresh_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            refresh_contexts: vec![RecommendationContext::default()],
            eviction_interval: Duration::from_secs(300),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.ranking.validate()?;
        self.neighbors.validate()?;
        if self.cache_ttl_secs == 0 {
            return Err(ValidationError::out_of_range("cache_ttl_secs", 1.0, f64::MAX, 0.0));
        }
        if self.tracker.queue_capacity == 0 {
            return Err(ValidationError::out_of_range("queue_capacity", 1.0, f64::MAX, 0.0));
        }
        if self.eviction_interval.is_zero() {
            return Err(ValidationError::out_of_range("eviction_interval", 1.0, f64::MAX, 0.0));
        }
        if self.refresh_contexts.is_empty() {
            return Err(ValidationError::empty_field("refresh_contexts"));
        }
        Ok(())
    }
}

/// Storage the engine depends on.
#[derive(Clone)]
pub struct EnginePorts {
    pub profiles: Arc<dyn ProfileRepository>,
    pub ledger: Arc<dyn ApplicationLedger>,
    pub events: Arc<dyn BehaviorEventStore>,
    pub snapshots: Arc<dyn RecommendationSnapshotStore>,
}

/// Combined counters for health and admin endpoints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineStats {
    pub cache: CacheStats,
    pub tracker: TrackerStats,
    pub indexed_users: usize,
}

pub struct RecommendationEngine {
    settings: EngineSettings,
    ports: EnginePorts,
    index: Arc<NeighborIndex>,
    cache: Arc<RecommendationCache>,
    tracker: Arc<BehaviorTracker>,
    refresher: Arc<BatchRefresher>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RecommendationEngine {
    pub fn new(
        settings: EngineSettings,
        weights: WeightConfig,
        ports: EnginePorts,
    ) -> Result<Self, ValidationError> {
        settings.validate()?;

        let index = Arc::new(NeighborIndex::new());
        let pipeline = RecommendationPipeline::new(
            Arc::clone(&ports.profiles),
            Arc::clone(&ports.ledger),
            ScoringEngine::new(weights),
            CollaborativeFilter::new(Arc::clone(&index), settings.neighbors),
            settings.ranking,
        );
        let cache = Arc::new(RecommendationCache::new(
            Arc::new(pipeline),
            Arc::clone(&ports.snapshots),
            settings.cache_ttl_secs,
        ));
        let tracker = Arc::new(BehaviorTracker::new(
            Arc::clone(&cache),
            settings.tracker.clone(),
        ));
        let refresher = Arc::new(
            BatchRefresher::new(
                Arc::clone(&ports.profiles),
                Arc::clone(&cache),
                settings.refresh_workers,
            )
            .with_contexts(settings.refresh_contexts.clone()),
        );
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            settings,
            ports,
            index,
            cache,
            tracker,
            refresher,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<RecommendationCache> {
        &self.cache
    }

    pub fn tracker(&self) -> &Arc<BehaviorTracker> {
        &self.tracker
    }

    pub fn refresher(&self) -> &Arc<BatchRefresher> {
        &self.refresher
    }

    pub fn index(&self) -> &Arc<NeighborIndex> {
        &self.index
    }

    /// A receiver that turns true once shutdown begins.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Warms the neighbor index and spawns background tasks.
    ///
    /// Warm-up failures are logged and the engine starts with whatever was
    /// loaded; requests still work, with weaker collaborative signal.
    pub async fn start(&self) {
        self.warm_up().await;

        let consumer = self
            .tracker
            .consumer(Arc::clone(&self.ports.events), Arc::clone(&self.index));
        let consumer_shutdown = self.shutdown_tx.subscribe();
        let consumer_task = tokio::spawn(async move { consumer.run(consumer_shutdown).await });

        let refresher = Arc::clone(&self.refresher);
        let interval = self.settings.refresh_interval;
        let refresh_shutdown = self.shutdown_tx.subscribe();
        let refresh_task =
            tokio::spawn(async move { refresher.run_periodic(interval, refresh_shutdown).await });

        let cache = Arc::clone(&self.cache);
        let eviction_interval = self.settings.eviction_interval;
        let eviction_shutdown = self.shutdown_tx.subscribe();
        let eviction_task = tokio::spawn(async move {
            cache.run_eviction(eviction_interval, eviction_shutdown).await
        });

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([consumer_task, refresh_task, eviction_task]);

        tracing::info!(
            indexed_users = self.index.snapshot().user_count(),
            refresh_interval_secs = interval.as_secs(),
            refresh_workers = self.refresher.workers(),
            "Recommendation engine started"
        );
    }

    /// Stops background tasks, draining queued behavior events.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for joined in join_all(tasks).await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!(stats = ?self.stats(), "Recommendation engine stopped");
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            cache: self.cache.stats(),
            tracker: self.tracker.stats(),
            indexed_users: self.index.snapshot().user_count(),
        }
    }

    async fn warm_up(&self) {
        match self.ports.events.load_all().await {
            Ok(events) => {
                self.index.apply_events(&events);
                tracing::info!(events = events.len(), "Loaded behavior history");
            }
            Err(e) => tracing::warn!(error = %e, "Behavior history unavailable, starting cold"),
        }

        if let Err(e) = self.load_profiles().await {
            tracing::warn!(error = %e, "Active profiles unavailable, index is partial");
        }
    }

    async fn load_profiles(&self) -> Result<(), DomainError> {
        let users = self.ports.profiles.list_active_users().await?;
        let fetched = join_all(users.iter().map(|u| self.ports.profiles.get(u))).await;

        let mut profiles: Vec<UserProfile> = Vec::with_capacity(fetched.len());
        for (user_id, result) in users.iter().zip(fetched) {
            match result {
                Ok(Some(profile)) => profiles.push(profile),
                Ok(None) => {}
                Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Skipping profile"),
            }
        }
        self.index.upsert_profiles(&profiles);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryApplicationLedger, InMemoryBehaviorEventStore, InMemoryProfileRepository,
        InMemorySnapshotStore,
    };
    use crate::domain::behavior::{BehaviorAction, BehaviorEvent};
    use crate::domain::foundation::{OpportunityId, Timestamp, UserId};

    fn ports(
        repo: Arc<InMemoryProfileRepository>,
        events: Arc<InMemoryBehaviorEventStore>,
    ) -> EnginePorts {
        EnginePorts {
            profiles: repo,
            ledger: Arc::new(InMemoryApplicationLedger::new()),
            events,
            snapshots: Arc::new(InMemorySnapshotStore::new()),
        }
    }

    #[test]
    fn rejects_invalid_settings() {
        let settings = EngineSettings {
            cache_ttl_secs: 0,
            ..EngineSettings::default()
        };
        let result = RecommendationEngine::new(
            settings,
            WeightConfig::default(),
            ports(
                Arc::new(InMemoryProfileRepository::new()),
                Arc::new(InMemoryBehaviorEventStore::new()),
            ),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn start_warms_index_from_history_and_profiles() {
        let repo = Arc::new(InMemoryProfileRepository::new());
        let events = Arc::new(InMemoryBehaviorEventStore::new());
        let user = UserId::new("student-1").unwrap();
        let opp = OpportunityId::new();
        repo.insert_profile(UserProfile::new(user.clone()).with_skills(["rust"]));
        repo.insert_profile(UserProfile::new(UserId::new("student-2").unwrap()));
        events
            .append_batch(&[BehaviorEvent::new(
                user.clone(),
                opp,
                BehaviorAction::Apply,
                Timestamp::now(),
            )])
            .await
            .unwrap();

        let engine =
            RecommendationEngine::new(EngineSettings::default(), WeightConfig::default(), ports(repo, events))
                .unwrap();
        engine.start().await;

        assert!(engine.index().has_applied(&user, opp));
        assert_eq!(engine.stats().indexed_users, 2);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_persists_queued_events() {
        let repo = Arc::new(InMemoryProfileRepository::new());
        let events = Arc::new(InMemoryBehaviorEventStore::new());
        let engine = RecommendationEngine::new(
            EngineSettings::default(),
            WeightConfig::default(),
            ports(repo, events.clone()),
        )
        .unwrap();
        engine.start().await;

        for _ in 0..5 {
            engine.tracker().record(
                UserId::new("student-1").unwrap(),
                OpportunityId::new(),
                BehaviorAction::View,
            );
        }
        engine.shutdown().await;

        assert_eq!(events.len(), 5);
        assert_eq!(engine.stats().tracker.queued, 0);
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_in_the_background() {
        let repo = Arc::new(InMemoryProfileRepository::new());
        let settings = EngineSettings {
            cache_ttl_secs: 1,
            eviction_interval: Duration::from_millis(50),
            ..EngineSettings::default()
        };
        let engine = RecommendationEngine::new(
            settings,
            WeightConfig::default(),
            ports(repo.clone(), Arc::new(InMemoryBehaviorEventStore::new())),
        )
        .unwrap();
        for i in 0..20 {
            let user = UserId::new(format!("one-off-{i}")).unwrap();
            repo.insert_profile(UserProfile::new(user.clone()));
            engine
                .cache()
                .get_or_compute(&user, &RecommendationContext::default())
                .await;
        }
        assert_eq!(engine.stats().cache.entries, 20);
        engine.start().await;

        tokio::time::sleep(Duration::from_millis(1300)).await;

        assert_eq!(engine.stats().cache.entries, 0);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn batch_refresh_warms_configured_contexts() {
        use crate::domain::matching::OpportunityKind;

        let repo = Arc::new(InMemoryProfileRepository::new());
        let user = UserId::new("student-1").unwrap();
        repo.insert_profile(UserProfile::new(user.clone()));
        let mentor = RecommendationContext::for_kind(OpportunityKind::Mentor);
        let settings = EngineSettings {
            refresh_contexts: vec![RecommendationContext::default(), mentor.clone()],
            ..EngineSettings::default()
        };
        let engine = RecommendationEngine::new(
            settings,
            WeightConfig::default(),
            ports(repo, Arc::new(InMemoryBehaviorEventStore::new())),
        )
        .unwrap();
        let (_tx, rx) = watch::channel(false);

        engine.refresher().run(rx).await.unwrap();
        engine.cache().get_or_compute(&user, &mentor).await;

        assert_eq!(engine.stats().cache.entries, 2);
        assert_eq!(engine.stats().cache.hits, 1);
    }

    #[test]
    fn rejects_empty_refresh_contexts() {
        let settings = EngineSettings {
            refresh_contexts: Vec::new(),
            ..EngineSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[tokio::test]
    async fn starts_cold_when_stores_are_down() {
        let repo = Arc::new(InMemoryProfileRepository::new());
        repo.set_unavailable(true);
        let events = Arc::new(InMemoryBehaviorEventStore::new());
        events.set_unavailable(true);

        let engine =
            RecommendationEngine::new(EngineSettings::default(), WeightConfig::default(), ports(repo, events))
                .unwrap();
        engine.start().await;

        assert_eq!(engine.stats().indexed_users, 0);
        engine.shutdown().await;
    }
}
