//! Behavior module - Interaction events between users and opportunities.

mod event;

pub use event::{BehaviorAction, BehaviorEvent};
