//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// User identifier (typically from auth provider).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a job or mentor opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpportunityId(Uuid);

impl OpportunityId {
    /// Creates a new random OpportunityId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an OpportunityId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OpportunityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OpportunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OpportunityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a recorded behavior event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviorEventId(Uuid);

impl BehaviorEventId {
    /// Creates a new random BehaviorEventId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a BehaviorEventId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BehaviorEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BehaviorEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_empty() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
    }

    #[test]
    fn user_id_displays_inner_value() {
        let id = UserId::new("student-42").unwrap();
        assert_eq!(id.to_string(), "student-42");
        assert_eq!(id.as_str(), "student-42");
    }

    #[test]
    fn user_id_serializes_transparently() {
        let id = UserId::new("student-42").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"student-42\"");
    }

    #[test]
    fn opportunity_id_parses_from_string() {
        let id = OpportunityId::new();
        let parsed: OpportunityId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn opportunity_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<OpportunityId>().is_err());
    }

    #[test]
    fn opportunity_ids_are_unique() {
        assert_ne!(OpportunityId::new(), OpportunityId::new());
    }
}
