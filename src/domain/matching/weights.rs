//! Validated factor weight sets.
//!
//! Weight sets are loaded once at process start and never mutated. A set
//! whose weights do not sum to 1.0 (within [`WEIGHT_SUM_TOLERANCE`]) is
//! rejected at load time with [`InvalidWeightConfiguration`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use super::OpportunityKind;

/// Allowed deviation of a weight set's sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// A single normalized matching factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Skills,
    Major,
    Experience,
    Location,
    Reputation,
    Behavior,
    Industry,
    Availability,
    Recency,
}

impl Factor {
    pub const ALL: [Factor; 9] = [
        Factor::Skills,
        Factor::Major,
        Factor::Experience,
        Factor::Location,
        Factor::Reputation,
        Factor::Behavior,
        Factor::Industry,
        Factor::Availability,
        Factor::Recency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::Skills => "skills",
            Factor::Major => "major",
            Factor::Experience => "experience",
            Factor::Location => "location",
            Factor::Reputation => "reputation",
            Factor::Behavior => "behavior",
            Factor::Industry => "industry",
            Factor::Availability => "availability",
            Factor::Recency => "recency",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal configuration error raised while loading weights.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidWeightConfiguration {
    #[error("weight set '{set}' sums to {sum}, expected 1.0")]
    SumMismatch { set: String, sum: f64 },

    #[error("weight set '{set}' has invalid weight {weight} for factor '{factor}'")]
    InvalidWeight {
        set: String,
        factor: Factor,
        weight: f64,
    },

    #[error("weight file '{path}' could not be read: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("weight file is malformed: {0}")]
    Malformed(String),
}

/// Immutable, validated mapping from factor to weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightSet {
    weights: BTreeMap<Factor, f64>,
}

impl WeightSet {
    /// Validates and builds a weight set.
    ///
    /// Every weight must be finite and within [0, 1]; the total must be
    /// 1.0 within tolerance. Zero weights are dropped.
    pub fn try_new(
        set: &str,
        weights: impl IntoIterator<Item = (Factor, f64)>,
    ) -> Result<Self, InvalidWeightConfiguration> {
        let mut validated = BTreeMap::new();
        for (factor, weight) in weights {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(InvalidWeightConfiguration::InvalidWeight {
                    set: set.to_string(),
                    factor,
                    weight,
                });
            }
            if weight > 0.0 {
                *validated.entry(factor).or_insert(0.0) += weight;
            }
        }

        let sum: f64 = validated.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(InvalidWeightConfiguration::SumMismatch {
                set: set.to_string(),
                sum,
            });
        }

        Ok(Self { weights: validated })
    }

    /// Weight for a factor; zero when the factor is not part of the set.
    pub fn weight(&self, factor: Factor) -> f64 {
        self.weights.get(&factor).copied().unwrap_or(0.0)
    }

    /// Factors and weights in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (Factor, f64)> + '_ {
        self.weights.iter().map(|(f, w)| (*f, *w))
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Job defaults: skills 0.30, major 0.25, experience 0.15,
    /// location 0.10, company reputation 0.10, behavior 0.10.
    pub fn default_job() -> Self {
        Self {
            weights: BTreeMap::from([
                (Factor::Skills, 0.30),
                (Factor::Major, 0.25),
                (Factor::Experience, 0.15),
                (Factor::Location, 0.10),
                (Factor::Reputation, 0.10),
                (Factor::Behavior, 0.10),
            ]),
        }
    }

    /// Mentor defaults: major 0.30, industry 0.25, skills 0.20,
    /// location 0.10, experience 0.10, availability 0.05.
    pub fn default_mentor() -> Self {
        Self {
            weights: BTreeMap::from([
                (Factor::Major, 0.30),
                (Factor::Industry, 0.25),
                (Factor::Skills, 0.20),
                (Factor::Location, 0.10),
                (Factor::Experience, 0.10),
                (Factor::Availability, 0.05),
            ]),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawWeightConfig {
    job: BTreeMap<Factor, f64>,
    mentor: BTreeMap<Factor, f64>,
}

/// One validated weight set per opportunity kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightConfig {
    job: WeightSet,
    mentor: WeightSet,
}

impl WeightConfig {
    pub fn new(job: WeightSet, mentor: WeightSet) -> Self {
        Self { job, mentor }
    }

    /// Parses and validates a YAML document with `job` and `mentor` maps.
    ///
    /// ```yaml
    /// job:
    ///   skills: 0.30
    ///   major: 0.25
    ///   ...
    /// mentor:
    ///   major: 0.30
    ///   ...
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self, InvalidWeightConfiguration> {
        let raw: RawWeightConfig = serde_yaml::from_str(yaml)
            .map_err(|e| InvalidWeightConfiguration::Malformed(e.to_string()))?;

        Ok(Self {
            job: WeightSet::try_new(OpportunityKind::Job.as_str(), raw.job)?,
            mentor: WeightSet::try_new(OpportunityKind::Mentor.as_str(), raw.mentor)?,
        })
    }

    /// Loads weights from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InvalidWeightConfiguration> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| InvalidWeightConfiguration::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Self::from_yaml_str(&contents)
    }

    pub fn for_kind(&self, kind: OpportunityKind) -> &WeightSet {
        match kind {
            OpportunityKind::Job => &self.job,
            OpportunityKind::Mentor => &self.mentor,
        }
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            job: WeightSet::default_job(),
            mentor: WeightSet::default_mentor(),
        }
    }
}
