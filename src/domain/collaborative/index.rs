//! Inverted index over skills, majors, and interactions.
//!
//! Readers take an `Arc` to the current snapshot and never see a partial
//! update. Writers are serialized, build the next snapshot off to the side,
//! and swap it in with a single pointer store.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::domain::behavior::{BehaviorAction, BehaviorEvent};
use crate::domain::foundation::{OpportunityId, UserId, ValidationError};
use crate::domain::matching::{normalize_term, UserProfile};

/// Relative weight of each similarity component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub skills: f64,
    pub major: f64,
    pub interactions: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            skills: 0.5,
            major: 0.2,
            interactions: 0.3,
        }
    }
}

/// Tunables for neighbor search and the adjustment curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighborSettings {
    /// Neighbors considered per user.
    pub k: usize,
    /// Below this many neighbors the adjustment is forced to 1.0.
    pub min_neighbors: usize,
    /// Users less similar than this are not neighbors.
    pub min_similarity: f64,
    /// Ceiling of the multiplicative boost.
    pub max_boost: f64,
    /// Floor of the multiplicative dampening.
    pub max_dampening: f64,
    pub similarity: SimilarityWeights,
}

impl Default for NeighborSettings {
    fn default() -> Self {
        Self {
            k: 20,
            min_neighbors: 5,
            min_similarity: 0.15,
            max_boost: 1.3,
            max_dampening: 0.9,
            similarity: SimilarityWeights::default(),
        }
    }
}

impl NeighborSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.k == 0 {
            return Err(ValidationError::out_of_range("k", 1.0, f64::MAX, 0.0));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(ValidationError::out_of_range(
                "min_similarity",
                0.0,
                1.0,
                self.min_similarity,
            ));
        }
        if !self.max_boost.is_finite() || self.max_boost < 1.0 {
            return Err(ValidationError::out_of_range(
                "max_boost",
                1.0,
                f64::MAX,
                self.max_boost,
            ));
        }
        if !(self.max_dampening > 0.0 && self.max_dampening <= 1.0) {
            return Err(ValidationError::out_of_range(
                "max_dampening",
                0.0,
                1.0,
                self.max_dampening,
            ));
        }
        let w = self.similarity;
        let sum = w.skills + w.major + w.interactions;
        if [w.skills, w.major, w.interactions].iter().any(|x| *x < 0.0) || (sum - 1.0).abs() > 1e-6 {
            return Err(ValidationError::invalid_format(
                "similarity",
                format!("weights must be non-negative and sum to 1.0, got {}", sum),
            ));
        }
        Ok(())
    }
}

/// Everything the index knows about one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct UserSignals {
    pub skills: BTreeSet<String>,
    pub major: Option<String>,
    pub interactions: BTreeSet<OpportunityId>,
    pub positives: BTreeSet<OpportunityId>,
    pub applied: BTreeSet<OpportunityId>,
}

impl UserSignals {
    pub(super) fn from_profile(profile: &UserProfile) -> Self {
        Self {
            skills: profile.skills.iter().map(|s| normalize_term(s)).collect(),
            major: profile.major.as_deref().map(normalize_term),
            ..Self::default()
        }
    }
}

/// Immutable view of the index at one version.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub(super) users: HashMap<UserId, UserSignals>,
    pub(super) by_skill: HashMap<String, BTreeSet<UserId>>,
    pub(super) by_major: HashMap<String, BTreeSet<UserId>>,
    pub(super) by_opportunity: HashMap<OpportunityId, BTreeSet<UserId>>,
    version: u64,
}

impl IndexSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// True when an `apply` event from the user has been indexed.
    pub fn has_applied(&self, user_id: &UserId, opportunity_id: OpportunityId) -> bool {
        self.users
            .get(user_id)
            .map(|u| u.applied.contains(&opportunity_id))
            .unwrap_or(false)
    }

    pub(super) fn signals(&self, user_id: &UserId) -> Option<&UserSignals> {
        self.users.get(user_id)
    }

    /// Users sharing at least one skill, the major, or an interaction.
    pub(super) fn candidates_for(&self, user_id: &UserId, signals: &UserSignals) -> BTreeSet<UserId> {
        let mut out = BTreeSet::new();
        for skill in &signals.skills {
            if let Some(users) = self.by_skill.get(skill) {
                out.extend(users.iter().cloned());
            }
        }
        if let Some(users) = signals.major.as_ref().and_then(|m| self.by_major.get(m)) {
            out.extend(users.iter().cloned());
        }
        for opp in &signals.interactions {
            if let Some(users) = self.by_opportunity.get(opp) {
                out.extend(users.iter().cloned());
            }
        }
        out.remove(user_id);
        out
    }

    fn upsert_profile(&mut self, profile: &UserProfile) {
        let incoming = UserSignals::from_profile(profile);
        let entry = self.users.entry(profile.user_id.clone()).or_default();

        for skill in entry.skills.difference(&incoming.skills) {
            if let Some(set) = self.by_skill.get_mut(skill) {
                set.remove(&profile.user_id);
            }
        }
        if entry.major != incoming.major {
            if let Some(set) = entry.major.as_ref().and_then(|m| self.by_major.get_mut(m)) {
                set.remove(&profile.user_id);
            }
        }

        for skill in &incoming.skills {
            self.by_skill
                .entry(skill.clone())
                .or_default()
                .insert(profile.user_id.clone());
        }
        if let Some(major) = &incoming.major {
            self.by_major
                .entry(major.clone())
                .or_default()
                .insert(profile.user_id.clone());
        }

        entry.skills = incoming.skills;
        entry.major = incoming.major;
    }

    fn apply_event(&mut self, event: &BehaviorEvent) {
        let opp = event.opportunity_id();
        let entry = self.users.entry(event.user_id().clone()).or_default();
        entry.interactions.insert(opp);
        if event.action().is_positive() {
            entry.positives.insert(opp);
        }
        if event.action() == BehaviorAction::Apply {
            entry.applied.insert(opp);
        }
        self.by_opportunity
            .entry(opp)
            .or_default()
            .insert(event.user_id().clone());
    }
}

/// Shared, read-mostly neighbor index.
#[derive(Debug, Default)]
pub struct NeighborIndex {
    current: RwLock<Arc<IndexSnapshot>>,
    writer: Mutex<()>,
}

impl NeighborIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; stays valid while later updates land.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Merges a batch of events into a new snapshot.
    pub fn apply_events(&self, events: &[BehaviorEvent]) {
        if events.is_empty() {
            return;
        }
        self.update(|next| {
            for event in events {
                next.apply_event(event);
            }
        });
    }

    /// Inserts or refreshes a user's profile signals.
    pub fn upsert_profile(&self, profile: &UserProfile) {
        let unchanged = {
            let snapshot = self.snapshot();
            snapshot
                .signals(&profile.user_id)
                .map(|s| {
                    let incoming = UserSignals::from_profile(profile);
                    s.skills == incoming.skills && s.major == incoming.major
                })
                .unwrap_or(false)
        };
        if unchanged {
            return;
        }
        self.update(|next| next.upsert_profile(profile));
    }

    pub fn upsert_profiles(&self, profiles: &[UserProfile]) {
        if profiles.is_empty() {
            return;
        }
        self.update(|next| {
            for profile in profiles {
                next.upsert_profile(profile);
            }
        });
    }

    pub fn has_applied(&self, user_id: &UserId, opportunity_id: OpportunityId) -> bool {
        self.snapshot().has_applied(user_id, opportunity_id)
    }

    fn update(&self, mutate: impl FnOnce(&mut IndexSnapshot)) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = IndexSnapshot::clone(&self.snapshot());
        mutate(&mut next);
        next.version += 1;

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn event(u: &str, opp: OpportunityId, action: BehaviorAction) -> BehaviorEvent {
        BehaviorEvent::new(user(u), opp, action, Timestamp::now())
    }

    #[test]
    fn old_snapshots_are_unaffected_by_updates() {
        let index = NeighborIndex::new();
        let before = index.snapshot();

        index.apply_events(&[event("a", OpportunityId::new(), BehaviorAction::View)]);

        assert_eq!(before.user_count(), 0);
        assert_eq!(index.snapshot().user_count(), 1);
        assert_eq!(index.snapshot().version(), before.version() + 1);
    }

    #[test]
    fn apply_events_are_tracked_per_user() {
        let index = NeighborIndex::new();
        let opp = OpportunityId::new();
        index.apply_events(&[
            event("a", opp, BehaviorAction::Apply),
            event("b", opp, BehaviorAction::Save),
        ]);

        assert!(index.has_applied(&user("a"), opp));
        assert!(!index.has_applied(&user("b"), opp));
    }

    #[test]
    fn candidates_come_from_inverted_lists() {
        let index = NeighborIndex::new();
        index.upsert_profiles(&[
            UserProfile::new(user("a")).with_skills(["rust"]),
            UserProfile::new(user("b")).with_skills(["rust", "go"]),
            UserProfile::new(user("c")).with_major("biology"),
            UserProfile::new(user("d")).with_skills(["cobol"]),
        ]);

        let snapshot = index.snapshot();
        let me = UserSignals::from_profile(
            &UserProfile::new(user("me")).with_skills(["Rust"]).with_major("Biology"),
        );
        let found: Vec<String> = snapshot
            .candidates_for(&user("me"), &me)
            .into_iter()
            .map(|u| u.to_string())
            .collect();

        assert_eq!(found, vec!["a", "b", "c"]);
    }

    #[test]
    fn profile_edits_move_user_between_lists() {
        let index = NeighborIndex::new();
        index.upsert_profile(&UserProfile::new(user("a")).with_skills(["rust"]));
        index.upsert_profile(&UserProfile::new(user("a")).with_skills(["python"]));

        let snapshot = index.snapshot();
        assert!(snapshot.by_skill.get("rust").map_or(true, |s| s.is_empty()));
        assert!(snapshot.by_skill["python"].contains(&user("a")));
    }

    #[test]
    fn unchanged_profile_does_not_bump_version() {
        let index = NeighborIndex::new();
        let profile = UserProfile::new(user("a")).with_skills(["rust"]);
        index.upsert_profile(&profile);
        let version = index.snapshot().version();

        index.upsert_profile(&profile);
        assert_eq!(index.snapshot().version(), version);
    }

    #[test]
    fn settings_validation_rejects_bad_curves() {
        let mut settings = NeighborSettings::default();
        assert!(settings.validate().is_ok());

        settings.max_boost = 0.8;
        assert!(settings.validate().is_err());

        settings = NeighborSettings::default();
        settings.similarity.skills = 0.9;
        assert!(settings.validate().is_err());
    }
}
