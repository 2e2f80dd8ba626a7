//! Profile Normalizer - turns a (profile, opportunity) pair into factor values.
//!
//! Every factor lands in [0, 1]. A factor whose inputs are absent falls
//! back to [`NEUTRAL_VALUE`] and is recorded as missing; when more than
//! half of the factors expected for the opportunity kind are missing the
//! vector carries a [`MissingDataWarning`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::domain::foundation::{DomainError, ErrorCode, OpportunityId, Timestamp, UserId};

use super::{normalize_term, Factor, Location, Opportunity, OpportunityKind, UserProfile};

/// Value substituted for factors with missing inputs.
pub const NEUTRAL_VALUE: f64 = 0.5;

/// Non-fatal notice that a feature vector was built mostly from defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDataWarning {
    pub user_id: UserId,
    pub opportunity_id: OpportunityId,
    pub missing: Vec<Factor>,
    pub expected: usize,
}

impl fmt::Display for MissingDataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.missing.iter().map(Factor::as_str).collect();
        write!(
            f,
            "{} of {} factors missing for user {} / opportunity {}: {}",
            self.missing.len(),
            self.expected,
            self.user_id,
            self.opportunity_id,
            names.join(", ")
        )
    }
}

/// Factors the normalizer expects to be able to fill for a kind.
pub fn expected_factors(kind: OpportunityKind) -> &'static [Factor] {
    match kind {
        OpportunityKind::Job => &[
            Factor::Skills,
            Factor::Major,
            Factor::Experience,
            Factor::Location,
            Factor::Reputation,
            Factor::Behavior,
            Factor::Recency,
        ],
        OpportunityKind::Mentor => &[
            Factor::Major,
            Factor::Industry,
            Factor::Skills,
            Factor::Location,
            Factor::Experience,
            Factor::Availability,
            Factor::Recency,
        ],
    }
}

/// Normalized factor values for one (user, opportunity) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub kind: OpportunityKind,
    values: BTreeMap<Factor, f64>,
    missing: BTreeSet<Factor>,
    warning: Option<MissingDataWarning>,
}

impl FeatureVector {
    /// Builds a vector from explicit values; absent factors read as neutral.
    pub fn from_values(
        kind: OpportunityKind,
        values: impl IntoIterator<Item = (Factor, f64)>,
    ) -> Self {
        Self {
            kind,
            values: values
                .into_iter()
                .map(|(f, v)| (f, if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }))
                .collect(),
            missing: BTreeSet::new(),
            warning: None,
        }
    }

    /// Value for a factor; neutral when it was never computed.
    pub fn value(&self, factor: Factor) -> f64 {
        self.values.get(&factor).copied().unwrap_or(NEUTRAL_VALUE)
    }

    /// True when the factor fell back to the neutral default.
    pub fn is_missing(&self, factor: Factor) -> bool {
        self.missing.contains(&factor) || !self.values.contains_key(&factor)
    }

    pub fn missing(&self) -> impl Iterator<Item = Factor> + '_ {
        self.missing.iter().copied()
    }

    pub fn warning(&self) -> Option<&MissingDataWarning> {
        self.warning.as_ref()
    }
}

/// Distance bucket thresholds in kilometres and their scores.
const DISTANCE_BUCKETS_KM: [(f64, f64); 4] = [(25.0, 1.0), (100.0, 0.75), (500.0, 0.5), (1500.0, 0.25)];

/// Posting age thresholds in days and their scores.
const RECENCY_BUCKETS_DAYS: [(i64, f64); 4] = [(7, 1.0), (30, 0.75), (90, 0.5), (180, 0.25)];

/// Converts raw records into [`FeatureVector`]s for one user.
///
/// The user side is normalized once on construction so that scoring a
/// pool of opportunities does not redo that work per candidate.
#[derive(Debug, Clone)]
pub struct ProfileNormalizer {
    user_id: UserId,
    skills: BTreeSet<String>,
    major: Option<String>,
    industries: BTreeSet<String>,
    location: Option<Location>,
    experience_rank: Option<i32>,
    behavior: super::BehaviorSummary,
}

impl ProfileNormalizer {
    pub fn new(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            skills: profile.skills.iter().map(|s| normalize_term(s)).collect(),
            major: profile.major.as_deref().map(normalize_term),
            industries: profile
                .industry_interests
                .iter()
                .map(|s| normalize_term(s))
                .collect(),
            location: profile.location.clone().filter(|l| !l.is_empty()),
            experience_rank: profile.experience_level.map(|l| l.rank()),
            behavior: profile.behavior.clone(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Normalizes one opportunity against the prepared profile.
    ///
    /// # Errors
    ///
    /// Returns `MalformedOpportunity` when the record fails validation;
    /// callers drop that candidate and continue.
    pub fn normalize(
        &self,
        opportunity: &Opportunity,
        as_of: &Timestamp,
    ) -> Result<FeatureVector, DomainError> {
        opportunity.validate().map_err(|e| {
            DomainError::new(ErrorCode::MalformedOpportunity, e.to_string())
                .with_detail("opportunity_id", opportunity.id.to_string())
        })?;

        let computed: [(Factor, Option<f64>); 9] = [
            (Factor::Skills, self.skills_overlap(opportunity)),
            (Factor::Major, self.major_match(opportunity)),
            (Factor::Experience, self.experience_delta(opportunity)),
            (Factor::Location, self.location_bucket(opportunity)),
            (Factor::Reputation, opportunity.poster_reputation),
            (Factor::Behavior, self.behavior_affinity(opportunity)),
            (Factor::Industry, self.industry_match(opportunity)),
            (Factor::Availability, opportunity.availability),
            (Factor::Recency, Some(recency_bucket(opportunity, as_of))),
        ];

        let mut values = BTreeMap::new();
        let mut missing = BTreeSet::new();
        for (factor, value) in computed {
            match value {
                Some(v) => {
                    values.insert(factor, v.clamp(0.0, 1.0));
                }
                None => {
                    values.insert(factor, NEUTRAL_VALUE);
                    missing.insert(factor);
                }
            }
        }

        let expected = expected_factors(opportunity.kind);
        let missing_expected: Vec<Factor> = expected
            .iter()
            .copied()
            .filter(|f| missing.contains(f))
            .collect();

        let warning = if missing_expected.len() * 2 > expected.len() {
            let warning = MissingDataWarning {
                user_id: self.user_id.clone(),
                opportunity_id: opportunity.id,
                missing: missing_expected,
                expected: expected.len(),
            };
            tracing::warn!(
                user_id = %self.user_id,
                opportunity_id = %opportunity.id,
                "Missing data: {}",
                warning
            );
            Some(warning)
        } else {
            None
        };

        Ok(FeatureVector {
            kind: opportunity.kind,
            values,
            missing,
            warning,
        })
    }

    /// Share of required skills the user already has.
    fn skills_overlap(&self, opportunity: &Opportunity) -> Option<f64> {
        if opportunity.required_skills.is_empty() || self.skills.is_empty() {
            return None;
        }
        let matched = opportunity
            .required_skills
            .iter()
            .filter(|s| self.skills.contains(&normalize_term(s)))
            .count();
        Some(matched as f64 / opportunity.required_skills.len() as f64)
    }

    fn major_match(&self, opportunity: &Opportunity) -> Option<f64> {
        let major = self.major.as_ref()?;
        if opportunity.preferred_majors.is_empty() {
            return None;
        }
        let hit = opportunity
            .preferred_majors
            .iter()
            .any(|m| &normalize_term(m) == major);
        Some(if hit { 1.0 } else { 0.0 })
    }

    /// 1.0 when the user meets the minimum, 0.5 one level short, else 0.0.
    fn experience_delta(&self, opportunity: &Opportunity) -> Option<f64> {
        let required = opportunity.min_experience?.rank();
        let actual = self.experience_rank?;
        let delta = actual - required;
        Some(match delta {
            d if d >= 0 => 1.0,
            -1 => 0.5,
            _ => 0.0,
        })
    }

    fn location_bucket(&self, opportunity: &Opportunity) -> Option<f64> {
        if opportunity.remote {
            return Some(1.0);
        }
        let theirs = opportunity.location.as_ref().filter(|l| !l.is_empty())?;
        let ours = self.location.as_ref()?;

        if let (Some(a), Some(b)) = (&ours.coordinates, &theirs.coordinates) {
            let km = a.distance_km(b);
            let score = DISTANCE_BUCKETS_KM
                .iter()
                .find(|(limit, _)| km <= *limit)
                .map(|(_, score)| *score)
                .unwrap_or(0.0);
            return Some(score);
        }

        let same = |x: &Option<String>, y: &Option<String>| match (x, y) {
            (Some(x), Some(y)) => normalize_term(x) == normalize_term(y),
            _ => false,
        };

        if same(&ours.city, &theirs.city) && same(&ours.country, &theirs.country) {
            Some(1.0)
        } else if same(&ours.region, &theirs.region) && same(&ours.country, &theirs.country) {
            Some(0.7)
        } else if same(&ours.country, &theirs.country) {
            Some(0.4)
        } else if ours.country.is_some() && theirs.country.is_some() {
            Some(0.0)
        } else {
            None
        }
    }

    fn behavior_affinity(&self, opportunity: &Opportunity) -> Option<f64> {
        let industry = opportunity.industry.as_deref()?;
        self.behavior.share_for(industry)
    }

    fn industry_match(&self, opportunity: &Opportunity) -> Option<f64> {
        let industry = opportunity.industry.as_deref()?;
        if self.industries.is_empty() {
            return None;
        }
        Some(if self.industries.contains(&normalize_term(industry)) {
            1.0
        } else {
            0.0
        })
    }
}

fn recency_bucket(opportunity: &Opportunity, as_of: &Timestamp) -> f64 {
    let age_days = as_of.duration_since(&opportunity.posted_at).num_days().max(0);
    RECENCY_BUCKETS_DAYS
        .iter()
        .find(|(limit, _)| age_days <= *limit)
        .map(|(_, score)| *score)
        .unwrap_or(0.0)
}
