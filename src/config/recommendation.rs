//! Recommendation engine configuration
//!
//! Every tunable has a serde default, so an empty section yields the
//! documented defaults. Nested values follow the usual separator, e.g.
//! `OPPORTUNITY_MATCHER__RECOMMENDATION__NEIGHBORS__K=10`.

use serde::Deserialize;
use std::time::Duration;

use crate::application::recommendation::{EngineSettings, TrackerSettings};
use crate::domain::collaborative::{NeighborSettings, SimilarityWeights};
use crate::domain::matching::{InvalidWeightConfiguration, OpportunityKind, WeightConfig};
use crate::domain::ranking::RankingPolicy;
use crate::domain::recommendation::RecommendationContext;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationConfig {
    /// YAML weight file; built-in weights when absent
    pub weights_path: Option<String>,

    /// Inclusive lower bound on final scores
    #[serde(default = "default_min_score_threshold")]
    pub min_score_threshold: f64,

    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// How often expired cache entries are dropped
    #[serde(default = "default_eviction_interval")]
    pub cache_eviction_interval_secs: u64,

    #[serde(default)]
    pub neighbors: NeighborsConfig,

    #[serde(default)]
    pub behavior: BehaviorConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Collaborative filter tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct NeighborsConfig {
    #[serde(default = "default_k")]
    pub k: usize,

    #[serde(default = "default_min_neighbors")]
    pub min_neighbors: usize,

    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    #[serde(default = "default_max_boost")]
    pub max_boost: f64,

    #[serde(default = "default_max_dampening")]
    pub max_dampening: f64,

    #[serde(default = "default_skills_weight")]
    pub skills_weight: f64,

    #[serde(default = "default_major_weight")]
    pub major_weight: f64,

    #[serde(default = "default_interactions_weight")]
    pub interactions_weight: f64,
}

/// Behavior ingestion tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_dedupe_window_ms")]
    pub dedupe_window_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Periodic batch refresh tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,

    /// Worker count; available parallelism when unset
    pub workers: Option<usize>,

    /// Comma-separated contexts to warm, e.g. "all, job, mentor";
    /// only the unfiltered context when unset
    pub contexts: Option<String>,
}

impl RefreshConfig {
    /// Parses `contexts`. `all` (or `*`) is the unfiltered context.
    pub fn context_list(&self) -> Result<Vec<RecommendationContext>, ValidationError> {
        let Some(raw) = self.contexts.as_deref() else {
            return Ok(vec![RecommendationContext::default()]);
        };
        let mut contexts = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let context = match token {
                "all" | "*" => RecommendationContext::default(),
                kind => kind
                    .parse::<OpportunityKind>()
                    .map(RecommendationContext::for_kind)
                    .map_err(|e| ValidationError::InvalidRecommendationSettings(e.to_string()))?,
            };
            if !contexts.contains(&context) {
                contexts.push(context);
            }
        }
        Ok(contexts)
    }
}

impl RecommendationConfig {
    /// Loads the configured weight file, or the built-in weights.
    pub fn load_weights(&self) -> Result<WeightConfig, InvalidWeightConfiguration> {
        match &self.weights_path {
            Some(path) if !path.trim().is_empty() => WeightConfig::load(path),
            _ => Ok(WeightConfig::default()),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let n = &self.neighbors;
        EngineSettings {
            ranking: RankingPolicy {
                min_score: self.min_score_threshold,
                top_n: self.top_n,
            },
            cache_ttl_secs: self.cache_ttl_secs,
            neighbors: NeighborSettings {
                k: n.k,
                min_neighbors: n.min_neighbors,
                min_similarity: n.min_similarity,
                max_boost: n.max_boost,
                max_dampening: n.max_dampening,
                similarity: SimilarityWeights {
                    skills: n.skills_weight,
                    major: n.major_weight,
                    interactions: n.interactions_weight,
                },
            },
            tracker: TrackerSettings {
                queue_capacity: self.behavior.queue_capacity,
                dedupe_window: Duration::from_millis(self.behavior.dedupe_window_ms),
                batch_size: self.behavior.batch_size,
            },
            refresh_interval: Duration::from_secs(self.refresh.interval_secs),
            refresh_workers: self.refresh.workers.unwrap_or_else(default_workers),
            refresh_contexts: self.refresh.context_list().unwrap_or_default(),
            eviction_interval: Duration::from_secs(self.cache_eviction_interval_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.refresh.interval_secs == 0 {
            return Err(ValidationError::out_of_range(
                "refresh.interval_secs",
                1.0,
                f64::MAX,
                0.0,
            ));
        }
        if self.behavior.batch_size == 0 {
            return Err(ValidationError::out_of_range("behavior.batch_size", 1.0, f64::MAX, 0.0));
        }
        self.refresh.context_list()?;
        self.engine_settings()
            .validate()
            .map_err(|e| ValidationError::InvalidRecommendationSettings(e.to_string()))
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            weights_path: None,
            min_score_threshold: default_min_score_threshold(),
            top_n: default_top_n(),
            cache_ttl_secs: default_cache_ttl(),
            cache_eviction_interval_secs: default_eviction_interval(),
            neighbors: NeighborsConfig::default(),
            behavior: BehaviorConfig::default(),
            refresh: RefreshConfig::default(),
        }
    }
}

impl Default for NeighborsConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            min_neighbors: default_min_neighbors(),
            min_similarity: default_min_similarity(),
            max_boost: default_max_boost(),
            max_dampening: default_max_dampening(),
            skills_weight: default_skills_weight(),
            major_weight: default_major_weight(),
            interactions_weight: default_interactions_weight(),
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            dedupe_window_ms: default_dedupe_window_ms(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
            workers: None,
            contexts: None,
        }
    }
}

fn default_min_score_threshold() -> f64 {
    0.30
}

fn default_top_n() -> usize {
    20
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_eviction_interval() -> u64 {
    300
}

fn default_k() -> usize {
    20
}

fn default_min_neighbors() -> usize {
    5
}

fn default_min_similarity() -> f64 {
    0.15
}

fn default_max_boost() -> f64 {
    1.3
}

fn default_max_dampening() -> f64 {
    0.9
}

fn default_skills_weight() -> f64 {
    0.5
}

fn default_major_weight() -> f64 {
    0.2
}

fn default_interactions_weight() -> f64 {
    0.3
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_dedupe_window_ms() -> u64 {
    2_000
}

fn default_batch_size() -> usize {
    256
}

fn default_refresh_interval() -> u64 {
    3600
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matching::{Factor, OpportunityKind};
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let settings = RecommendationConfig::default().engine_settings();
        assert_eq!(settings.ranking.min_score, 0.30);
        assert_eq!(settings.ranking.top_n, 20);
        assert_eq!(settings.cache_ttl_secs, 3600);
        assert_eq!(settings.neighbors, NeighborSettings::default());
        assert_eq!(settings.tracker.queue_capacity, 10_000);
        assert_eq!(settings.tracker.dedupe_window, Duration::from_secs(2));
        assert!(settings.refresh_workers >= 1);
    }

    #[test]
    fn defaults_validate() {
        assert!(RecommendationConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_threshold_outside_unit_interval() {
        let config = RecommendationConfig {
            min_score_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidRecommendationSettings(_))
        ));
    }

    #[test]
    fn rejects_zero_top_n() {
        let config = RecommendationConfig {
            top_n: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_boost_below_one() {
        let mut config = RecommendationConfig::default();
        config.neighbors.max_boost = 0.8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_similarity_weights_not_summing_to_one() {
        let mut config = RecommendationConfig::default();
        config.neighbors.skills_weight = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_queue_capacity() {
        let mut config = RecommendationConfig::default();
        config.behavior.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_workers_override_parallelism() {
        let mut config = RecommendationConfig::default();
        config.refresh.workers = Some(3);
        assert_eq!(config.engine_settings().refresh_workers, 3);
    }

    #[test]
    fn refresh_contexts_default_to_unfiltered() {
        let settings = RecommendationConfig::default().engine_settings();
        assert_eq!(settings.refresh_contexts, vec![RecommendationContext::default()]);
        assert_eq!(settings.eviction_interval, Duration::from_secs(300));
    }

    #[test]
    fn refresh_contexts_parse_from_list() {
        let mut config = RecommendationConfig::default();
        config.refresh.contexts = Some("all, job ,mentor,job".to_string());

        assert_eq!(
            config.engine_settings().refresh_contexts,
            vec![
                RecommendationContext::default(),
                RecommendationContext::for_kind(OpportunityKind::Job),
                RecommendationContext::for_kind(OpportunityKind::Mentor),
            ]
        );
    }

    #[test]
    fn rejects_unknown_refresh_context() {
        let mut config = RecommendationConfig::default();
        config.refresh.contexts = Some("job, internship".to_string());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidRecommendationSettings(_))
        ));
    }

    #[test]
    fn missing_weights_path_uses_builtin_weights() {
        assert_eq!(
            RecommendationConfig::default().load_weights().unwrap(),
            WeightConfig::default()
        );
    }

    #[test]
    fn loads_weights_from_configured_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "job:\n  skills: 1.0\nmentor:\n  major: 1.0").unwrap();
        let config = RecommendationConfig {
            weights_path: Some(file.path().display().to_string()),
            ..Default::default()
        };

        let weights = config.load_weights().unwrap();
        assert_eq!(weights.for_kind(OpportunityKind::Job).weight(Factor::Skills), 1.0);
    }

    #[test]
    fn invalid_weight_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "job:\n  skills: 0.4\nmentor:\n  major: 1.0").unwrap();
        let config = RecommendationConfig {
            weights_path: Some(file.path().display().to_string()),
            ..Default::default()
        };

        assert!(matches!(
            config.load_weights(),
            Err(InvalidWeightConfiguration::SumMismatch { .. })
        ));
    }
}
