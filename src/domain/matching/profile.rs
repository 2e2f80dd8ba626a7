//! Profile and opportunity records as supplied by the surrounding system.
//!
//! Text attributes (skills, majors, industries) are normalized on the way
//! in: trimmed, lowercased, and blank entries dropped.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{OpportunityId, Timestamp, UserId, ValidationError};

/// Normalizes a free-text term for set comparisons.
pub fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

fn normalize_terms<I, S>(terms: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    terms
        .into_iter()
        .map(|t| normalize_term(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// What kind of opportunity is being offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    Job,
    Mentor,
}

impl OpportunityKind {
    /// Returns the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityKind::Job => "job",
            OpportunityKind::Mentor => "mentor",
        }
    }
}

impl fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpportunityKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_term(s).as_str() {
            "job" => Ok(OpportunityKind::Job),
            "mentor" => Ok(OpportunityKind::Mentor),
            other => Err(ValidationError::invalid_format(
                "opportunity_kind",
                format!("unknown kind '{}'", other),
            )),
        }
    }
}

/// Academic or professional seniority, ordered from least to most senior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Freshman,
    Sophomore,
    Junior,
    Senior,
    Graduate,
    Professional,
}

impl ExperienceLevel {
    /// Ordinal rank used for experience deltas.
    pub fn rank(&self) -> i32 {
        match self {
            ExperienceLevel::Freshman => 0,
            ExperienceLevel::Sophomore => 1,
            ExperienceLevel::Junior => 2,
            ExperienceLevel::Senior => 3,
            ExperienceLevel::Graduate => 4,
            ExperienceLevel::Professional => 5,
        }
    }

    /// Returns the string representation of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Freshman => "freshman",
            ExperienceLevel::Sophomore => "sophomore",
            ExperienceLevel::Junior => "junior",
            ExperienceLevel::Senior => "senior",
            ExperienceLevel::Graduate => "graduate",
            ExperienceLevel::Professional => "professional",
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_term(s).as_str() {
            "freshman" => Ok(ExperienceLevel::Freshman),
            "sophomore" => Ok(ExperienceLevel::Sophomore),
            "junior" => Ok(ExperienceLevel::Junior),
            "senior" => Ok(ExperienceLevel::Senior),
            "graduate" => Ok(ExperienceLevel::Graduate),
            "professional" => Ok(ExperienceLevel::Professional),
            other => Err(ValidationError::invalid_format(
                "experience_level",
                format!("unknown level '{}'", other),
            )),
        }
    }
}

/// Geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        Self::EARTH_RADIUS_KM * c
    }
}

/// Where a student lives or where an opportunity is based.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Location {
    /// Location known only by city, region, and country names.
    pub fn named(
        city: impl Into<String>,
        region: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            city: Some(city.into()),
            region: Some(region.into()),
            country: Some(country.into()),
            coordinates: None,
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates::new(latitude, longitude));
        self
    }

    /// True when no attribute is known.
    pub fn is_empty(&self) -> bool {
        self.city.is_none()
            && self.region.is_none()
            && self.country.is_none()
            && self.coordinates.is_none()
    }
}

/// Aggregated engagement of a user, keyed by opportunity industry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorSummary {
    #[serde(default)]
    pub industry_engagement: BTreeMap<String, u32>,
}

impl BehaviorSummary {
    /// Records `count` engagements in an industry.
    pub fn with_engagement(mut self, industry: &str, count: u32) -> Self {
        let key = normalize_term(industry);
        if !key.is_empty() {
            *self.industry_engagement.entry(key).or_insert(0) += count;
        }
        self
    }

    /// Total number of engagements across industries.
    pub fn total(&self) -> u64 {
        self.industry_engagement.values().map(|c| u64::from(*c)).sum()
    }

    /// Share of engagement that falls in `industry`, if any history exists.
    pub fn share_for(&self, industry: &str) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let hits = self
            .industry_engagement
            .get(&normalize_term(industry))
            .copied()
            .unwrap_or(0);
        Some(f64::from(hits) / total as f64)
    }
}

/// A student profile as stored by the profile service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub industry_interests: BTreeSet<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default)]
    pub behavior: BehaviorSummary,
}

impl UserProfile {
    /// Creates an empty profile for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            skills: BTreeSet::new(),
            major: None,
            industry_interests: BTreeSet::new(),
            location: None,
            experience_level: None,
            behavior: BehaviorSummary::default(),
        }
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.skills = normalize_terms(skills);
        self
    }

    pub fn with_major(mut self, major: &str) -> Self {
        let major = normalize_term(major);
        self.major = (!major.is_empty()).then_some(major);
        self
    }

    pub fn with_industry_interests<I, S>(mut self, industries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.industry_interests = normalize_terms(industries);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_experience(mut self, level: ExperienceLevel) -> Self {
        self.experience_level = Some(level);
        self
    }

    pub fn with_behavior(mut self, behavior: BehaviorSummary) -> Self {
        self.behavior = behavior;
        self
    }
}

/// A job posting or mentoring offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub kind: OpportunityKind,
    pub title: String,
    #[serde(default)]
    pub required_skills: BTreeSet<String>,
    #[serde(default)]
    pub preferred_majors: BTreeSet<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub min_experience: Option<ExperienceLevel>,
    /// Poster reputation on a 0.0-1.0 scale.
    #[serde(default)]
    pub poster_reputation: Option<f64>,
    /// Share of open mentoring slots on a 0.0-1.0 scale.
    #[serde(default)]
    pub availability: Option<f64>,
    pub posted_at: Timestamp,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

impl Opportunity {
    /// Creates a bare opportunity with a fresh id.
    pub fn new(kind: OpportunityKind, title: impl Into<String>, posted_at: Timestamp) -> Self {
        Self {
            id: OpportunityId::new(),
            kind,
            title: title.into(),
            required_skills: BTreeSet::new(),
            preferred_majors: BTreeSet::new(),
            industry: None,
            location: None,
            remote: false,
            min_experience: None,
            poster_reputation: None,
            availability: None,
            posted_at,
            expires_at: None,
        }
    }

    pub fn with_id(mut self, id: OpportunityId) -> Self {
        self.id = id;
        self
    }

    pub fn with_required_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.required_skills = normalize_terms(skills);
        self
    }

    pub fn with_preferred_majors<I, S>(mut self, majors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.preferred_majors = normalize_terms(majors);
        self
    }

    pub fn with_industry(mut self, industry: &str) -> Self {
        let industry = normalize_term(industry);
        self.industry = (!industry.is_empty()).then_some(industry);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn remote(mut self) -> Self {
        self.remote = true;
        self
    }

    pub fn with_min_experience(mut self, level: ExperienceLevel) -> Self {
        self.min_experience = Some(level);
        self
    }

    pub fn with_reputation(mut self, reputation: f64) -> Self {
        self.poster_reputation = Some(reputation);
        self
    }

    pub fn with_availability(mut self, availability: f64) -> Self {
        self.availability = Some(availability);
        self
    }

    pub fn expiring_at(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// True when the deadline has passed at `as_of`.
    pub fn is_expired(&self, as_of: &Timestamp) -> bool {
        self.expires_at
            .map(|deadline| !deadline.is_after(as_of))
            .unwrap_or(false)
    }

    /// Rejects records the scorer cannot interpret.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(reputation) = self.poster_reputation {
            if !reputation.is_finite() || !(0.0..=1.0).contains(&reputation) {
                return Err(ValidationError::out_of_range(
                    "poster_reputation",
                    0.0,
                    1.0,
                    reputation,
                ));
            }
        }
        if let Some(availability) = self.availability {
            if !availability.is_finite() || !(0.0..=1.0).contains(&availability) {
                return Err(ValidationError::out_of_range(
                    "availability",
                    0.0,
                    1.0,
                    availability,
                ));
            }
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at.is_before(&self.posted_at) {
                return Err(ValidationError::invalid_format(
                    "expires_at",
                    "deadline precedes posting date",
                ));
            }
        }
        Ok(())
    }
}
