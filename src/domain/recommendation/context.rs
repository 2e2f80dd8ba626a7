//! Request context that partitions a user's cached results.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::matching::{normalize_term, OpportunityKind};

/// Filters that shape a recommendation request.
///
/// Two contexts with the same filters hash identically regardless of
/// letter case or surrounding whitespace in `region`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationContext {
    #[serde(default)]
    pub kind: Option<OpportunityKind>,
    #[serde(default)]
    pub region: Option<String>,
}

impl RecommendationContext {
    pub fn new(kind: Option<OpportunityKind>, region: Option<&str>) -> Self {
        let region = region.map(normalize_term).filter(|r| !r.is_empty());
        Self { kind, region }
    }

    pub fn for_kind(kind: OpportunityKind) -> Self {
        Self::new(Some(kind), None)
    }

    /// Stable hex digest of the canonical form.
    pub fn context_hash(&self) -> String {
        let canonical = format!(
            "kind={};region={}",
            self.kind.map(|k| k.as_str()).unwrap_or("*"),
            self.region.as_deref().unwrap_or("*"),
        );
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
