//! PostgreSQL implementation of ProfileRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::foundation::{DomainError, ErrorCode, OpportunityId, Timestamp, UserId};
use crate::domain::matching::{
    normalize_term, BehaviorSummary, Coordinates, ExperienceLevel, Location, Opportunity, OpportunityKind,
    UserProfile,
};
use crate::ports::{OpportunityFilter, ProfileRepository};

/// Reads `student_profiles` and `opportunities`.
///
/// Kind, region, and expiry filters are pushed down into SQL.
#[derive(Clone)]
pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresProfileRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresProfileRepository")
            .field("pool", &"PgPool")
            .finish()
    }
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: String,
    skills: Vec<String>,
    major: Option<String>,
    industry_interests: Vec<String>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    experience_level: Option<String>,
    industry_engagement: Json<BTreeMap<String, u32>>,
}

#[derive(Debug, sqlx::FromRow)]
struct OpportunityRow {
    id: uuid::Uuid,
    kind: String,
    title: String,
    required_skills: Vec<String>,
    preferred_majors: Vec<String>,
    industry: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    remote: bool,
    min_experience: Option<String>,
    poster_reputation: Option<f64>,
    availability: Option<f64>,
    posted_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

fn location_from(
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Option<Location> {
    let location = Location {
        city,
        region,
        country,
        coordinates: latitude.zip(longitude).map(|(lat, lon)| Coordinates::new(lat, lon)),
    };
    (!location.is_empty()).then_some(location)
}

fn normalized(terms: Vec<String>) -> BTreeSet<String> {
    terms
        .iter()
        .map(|t| normalize_term(t))
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_level(raw: Option<String>) -> Result<Option<ExperienceLevel>, DomainError> {
    raw.map(|s| s.parse::<ExperienceLevel>())
        .transpose()
        .map_err(DomainError::from)
}

impl ProfileRow {
    fn into_profile(self) -> Result<UserProfile, DomainError> {
        let user_id = UserId::new(self.user_id).map_err(|e| {
            DomainError::new(ErrorCode::InvalidFormat, format!("Invalid user_id: {}", e))
        })?;

        Ok(UserProfile {
            user_id,
            skills: normalized(self.skills),
            major: self.major.map(|m| normalize_term(&m)).filter(|m| !m.is_empty()),
            industry_interests: normalized(self.industry_interests),
            location: location_from(self.city, self.region, self.country, self.latitude, self.longitude),
            experience_level: parse_level(self.experience_level)?,
            behavior: BehaviorSummary {
                industry_engagement: self.industry_engagement.0,
            },
        })
    }
}

impl OpportunityRow {
    fn into_opportunity(self) -> Result<Opportunity, DomainError> {
        let kind: OpportunityKind = self.kind.parse()?;
        Ok(Opportunity {
            id: OpportunityId::from_uuid(self.id),
            kind,
            title: self.title,
            required_skills: normalized(self.required_skills),
            preferred_majors: normalized(self.preferred_majors),
            industry: self.industry.map(|i| normalize_term(&i)),
            location: location_from(self.city, self.region, self.country, self.latitude, self.longitude),
            remote: self.remote,
            min_experience: parse_level(self.min_experience)?,
            poster_reputation: self.poster_reputation,
            availability: self.availability,
            posted_at: Timestamp::from_datetime(self.posted_at),
            expires_at: self.expires_at.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn get(&self, user_id: &UserId) -> Result<Option<UserProfile>, DomainError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT
                user_id, skills, major, industry_interests,
                city, region, country, latitude, longitude,
                experience_level, industry_engagement
            FROM student_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DomainError::database)?;

        row.map(ProfileRow::into_profile).transpose()
    }

    async fn get_opportunities(
        &self,
        filter: &OpportunityFilter,
    ) -> Result<Vec<Opportunity>, DomainError> {
        let rows = sqlx::query_as::<_, OpportunityRow>(
            r#"
            SELECT
                id, kind, title, required_skills, preferred_majors, industry,
                city, region, country, latitude, longitude, remote,
                min_experience, poster_reputation, availability,
                posted_at, expires_at
            FROM opportunities
            WHERE archived = FALSE
              AND ($1::text IS NULL OR kind = $1)
              AND ($2::text IS NULL OR remote OR lower(trim(region)) = $2)
              AND ($3::timestamptz IS NULL OR expires_at IS NULL OR expires_at > $3)
            ORDER BY posted_at DESC, id
            "#,
        )
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.region.as_deref())
        .bind(filter.active_at.map(|t| *t.as_datetime()))
        .fetch_all(&self.pool)
        .await
        .map_err(DomainError::database)?;

        let mut opportunities = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.into_opportunity() {
                Ok(opportunity) => opportunities.push(opportunity),
                Err(e) => tracing::warn!(opportunity_id = %id, error = %e, "Skipping unreadable opportunity row"),
            }
        }
        Ok(opportunities)
    }

    async fn list_active_users(&self) -> Result<Vec<UserId>, DomainError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT user_id
            FROM student_profiles
            WHERE active = TRUE
            ORDER BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DomainError::database)?;

        Ok(rows
            .into_iter()
            .filter_map(|(id,)| UserId::new(id).ok())
            .collect())
    }
}
