//! RecordBehaviorHandler - Command handler for behavior ingestion.

use std::sync::Arc;

use crate::application::recommendation::{BehaviorTracker, RecordOutcome};
use crate::domain::behavior::BehaviorAction;
use crate::domain::foundation::{OpportunityId, UserId};

/// Command to record one interaction.
#[derive(Debug, Clone)]
pub struct RecordBehaviorCommand {
    pub user_id: UserId,
    pub opportunity_id: OpportunityId,
    pub action: BehaviorAction,
}

/// Result of recording behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordBehaviorResult {
    pub outcome: RecordOutcome,
}

/// Enqueues behavior events; returns immediately.
pub struct RecordBehaviorHandler {
    tracker: Arc<BehaviorTracker>,
}

impl RecordBehaviorHandler {
    pub fn new(tracker: Arc<BehaviorTracker>) -> Self {
        Self { tracker }
    }

    pub fn handle(&self, cmd: RecordBehaviorCommand) -> RecordBehaviorResult {
        let outcome = self.tracker.record(cmd.user_id, cmd.opportunity_id, cmd.action);
        RecordBehaviorResult { outcome }
    }
}
