//! Nearest-neighbor search and the multiplicative score adjustment.
//!
//! Similarity between two users is a weighted blend of skill-set Jaccard,
//! major equality, and interaction-set Jaccard. For a candidate
//! opportunity the neighbors vote with their similarity: a positive action
//! (apply/save) counts for it, a view or click without one counts against
//! it. The net vote, normalized by total neighbor similarity, maps onto
//! `[max_dampening, max_boost]` with 1.0 at zero.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::foundation::{OpportunityId, UserId};
use crate::domain::matching::UserProfile;

use super::index::{IndexSnapshot, UserSignals};
use super::{NeighborIndex, NeighborSettings};

/// Too few similar users to trust a collaborative signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("user {user_id} has {found} neighbors, {required} required")]
pub struct InsufficientNeighborData {
    pub user_id: UserId,
    pub found: usize,
    pub required: usize,
}

/// Multiplicative factor applied to a match score.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub factor: f64,
    pub insufficient: Option<InsufficientNeighborData>,
}

impl Adjustment {
    pub fn neutral() -> Self {
        Self {
            factor: 1.0,
            insufficient: None,
        }
    }
}

/// A similar user and how similar they are.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub user_id: UserId,
    pub similarity: f64,
}

/// Neighbors of one user, bound to the snapshot they were found in.
#[derive(Debug, Clone)]
pub struct Neighborhood {
    user_id: UserId,
    neighbors: Vec<Neighbor>,
    snapshot: Arc<IndexSnapshot>,
    settings: NeighborSettings,
}

impl Neighborhood {
    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn is_sufficient(&self) -> bool {
        self.neighbors.len() >= self.settings.min_neighbors
    }

    /// True when the user applied to the opportunity per the indexed events.
    pub fn has_applied(&self, opportunity_id: OpportunityId) -> bool {
        self.snapshot.has_applied(&self.user_id, opportunity_id)
    }

    /// Adjustment for one candidate opportunity.
    pub fn adjustment_for(&self, opportunity_id: OpportunityId) -> Adjustment {
        if !self.is_sufficient() {
            return Adjustment {
                factor: 1.0,
                insufficient: Some(InsufficientNeighborData {
                    user_id: self.user_id.clone(),
                    found: self.neighbors.len(),
                    required: self.settings.min_neighbors,
                }),
            };
        }

        let mut total = 0.0;
        let mut favor = 0.0;
        let mut reject = 0.0;
        for neighbor in &self.neighbors {
            total += neighbor.similarity;
            let Some(signals) = self.snapshot.signals(&neighbor.user_id) else {
                continue;
            };
            if signals.positives.contains(&opportunity_id) {
                favor += neighbor.similarity;
            } else if signals.interactions.contains(&opportunity_id) {
                reject += neighbor.similarity;
            }
        }

        if total <= 0.0 {
            return Adjustment::neutral();
        }

        let signal = ((favor - reject) / total).clamp(-1.0, 1.0);
        let s = &self.settings;
        let factor = if signal > 0.0 {
            (1.0 + (s.max_boost - 1.0) * signal).min(s.max_boost)
        } else if signal < 0.0 {
            (1.0 - (1.0 - s.max_dampening) * signal.abs()).max(s.max_dampening)
        } else {
            1.0
        };

        Adjustment {
            factor,
            insufficient: None,
        }
    }
}

/// Finds similar users and derives score adjustments from their behavior.
#[derive(Debug, Clone)]
pub struct CollaborativeFilter {
    index: Arc<NeighborIndex>,
    settings: NeighborSettings,
}

impl CollaborativeFilter {
    pub fn new(index: Arc<NeighborIndex>, settings: NeighborSettings) -> Self {
        Self { index, settings }
    }

    pub fn index(&self) -> &Arc<NeighborIndex> {
        &self.index
    }

    pub fn settings(&self) -> &NeighborSettings {
        &self.settings
    }

    /// Top-K most similar users at or above the similarity floor.
    ///
    /// Ties are broken by user id so the result is reproducible.
    pub fn neighborhood(&self, profile: &UserProfile) -> Neighborhood {
        let snapshot = self.index.snapshot();

        let mut me = UserSignals::from_profile(profile);
        if let Some(indexed) = snapshot.signals(&profile.user_id) {
            me.interactions = indexed.interactions.clone();
        }

        let mut neighbors: Vec<Neighbor> = snapshot
            .candidates_for(&profile.user_id, &me)
            .into_iter()
            .filter_map(|other| {
                let theirs = snapshot.signals(&other)?;
                let similarity = self.similarity(&me, theirs);
                (similarity >= self.settings.min_similarity).then_some(Neighbor {
                    user_id: other,
                    similarity,
                })
            })
            .collect();

        neighbors.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        neighbors.truncate(self.settings.k);

        if neighbors.len() < self.settings.min_neighbors {
            tracing::debug!(
                user_id = %profile.user_id,
                found = neighbors.len(),
                required = self.settings.min_neighbors,
                "Insufficient neighbor data, collaborative adjustment disabled"
            );
        }

        Neighborhood {
            user_id: profile.user_id.clone(),
            neighbors,
            snapshot,
            settings: self.settings,
        }
    }

    /// One-off adjustment for a single (user, opportunity) pair.
    pub fn adjustment_for(&self, profile: &UserProfile, opportunity_id: OpportunityId) -> Adjustment {
        self.neighborhood(profile).adjustment_for(opportunity_id)
    }

    fn similarity(&self, a: &UserSignals, b: &UserSignals) -> f64 {
        let w = self.settings.similarity;
        let major = match (&a.major, &b.major) {
            (Some(x), Some(y)) if x == y => 1.0,
            _ => 0.0,
        };
        w.skills * jaccard(&a.skills, &b.skills)
            + w.major * major
            + w.interactions * jaccard(&a.interactions, &b.interactions)
    }
}

fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
