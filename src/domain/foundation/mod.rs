//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types
//! that form the vocabulary of the matching domain.

mod errors;
mod ids;
mod state_machine;
mod timestamp;
mod unit_score;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{BehaviorEventId, OpportunityId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
pub use unit_score::UnitScore;
