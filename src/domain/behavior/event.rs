//! Append-only interaction events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{BehaviorEventId, OpportunityId, Timestamp, UserId, ValidationError};

/// What a user did with an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorAction {
    View,
    Click,
    Apply,
    Save,
    Share,
}

impl BehaviorAction {
    /// Apply and save signal interest strong enough to recommend to peers.
    pub fn is_positive(&self) -> bool {
        matches!(self, BehaviorAction::Apply | BehaviorAction::Save)
    }

    /// Views and clicks are engagement without commitment.
    pub fn is_passive(&self) -> bool {
        matches!(self, BehaviorAction::View | BehaviorAction::Click)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorAction::View => "view",
            BehaviorAction::Click => "click",
            BehaviorAction::Apply => "apply",
            BehaviorAction::Save => "save",
            BehaviorAction::Share => "share",
        }
    }
}

impl fmt::Display for BehaviorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BehaviorAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "view" => Ok(BehaviorAction::View),
            "click" => Ok(BehaviorAction::Click),
            "apply" => Ok(BehaviorAction::Apply),
            "save" => Ok(BehaviorAction::Save),
            "share" => Ok(BehaviorAction::Share),
            other => Err(ValidationError::invalid_format(
                "action",
                format!("unknown action '{}'", other),
            )),
        }
    }
}

/// A recorded interaction. Fields are private; events never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    id: BehaviorEventId,
    user_id: UserId,
    opportunity_id: OpportunityId,
    action: BehaviorAction,
    occurred_at: Timestamp,
}

impl BehaviorEvent {
    pub fn new(
        user_id: UserId,
        opportunity_id: OpportunityId,
        action: BehaviorAction,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            id: BehaviorEventId::new(),
            user_id,
            opportunity_id,
            action,
            occurred_at,
        }
    }

    /// Rebuilds an event read back from storage.
    pub fn reconstitute(
        id: BehaviorEventId,
        user_id: UserId,
        opportunity_id: OpportunityId,
        action: BehaviorAction,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            opportunity_id,
            action,
            occurred_at,
        }
    }

    pub fn id(&self) -> BehaviorEventId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn opportunity_id(&self) -> OpportunityId {
        self.opportunity_id
    }

    pub fn action(&self) -> BehaviorAction {
        self.action
    }

    pub fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    /// Key used for duplicate suppression.
    pub fn dedupe_key(&self) -> (UserId, OpportunityId, BehaviorAction) {
        (self.user_id.clone(), self.opportunity_id, self.action)
    }
}
