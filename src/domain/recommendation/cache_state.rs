//! Lifecycle of one cached recommendation slot.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Fresh -> Stale -> Recomputing -> Fresh.
///
/// A failed recompute returns the slot to Stale; there is no terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Fresh,
    Stale,
    Recomputing,
}

impl StateMachine for CacheState {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            CacheState::Fresh => vec![CacheState::Stale],
            CacheState::Stale => vec![CacheState::Recomputing],
            CacheState::Recomputing => vec![CacheState::Fresh, CacheState::Stale],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle_is_valid() {
        let state = CacheState::Fresh
            .transition_to(CacheState::Stale)
            .and_then(|s| s.transition_to(CacheState::Recomputing))
            .and_then(|s| s.transition_to(CacheState::Fresh))
            .unwrap();
        assert_eq!(state, CacheState::Fresh);
    }

    #[test]
    fn failed_recompute_returns_to_stale() {
        assert!(CacheState::Recomputing.can_transition_to(&CacheState::Stale));
    }

    #[test]
    fn fresh_cannot_skip_to_recomputing() {
        assert!(CacheState::Fresh.transition_to(CacheState::Recomputing).is_err());
        assert!(CacheState::Stale.transition_to(CacheState::Fresh).is_err());
    }

    #[test]
    fn no_state_is_terminal() {
        for state in [CacheState::Fresh, CacheState::Stale, CacheState::Recomputing] {
            assert!(!state.is_terminal());
        }
    }
}
