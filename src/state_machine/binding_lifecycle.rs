// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred Attribute Lifecycle
//!
//! Every deferred attribute starts `Pending` and leaves it exactly once:
//!
//! - Resolve: Pending → Resolved (the engine reported a value)
//! - Block: Pending → Failed (the owning operation or one of its
//!   dependencies failed)
//! - Retry: Failed → Pending (the operation is re-run)
//!
//! Resolved is terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};

/// State of one deferred attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingState {
    Pending,
    Resolved,
    Failed,
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Resolved => write!(f, "resolved"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingEvent {
    Resolve,
    Block,
    Retry,
}

impl StateMachine for BindingState {
    type Input = BindingEvent;
    type Output = ();

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use BindingEvent::*;
        use BindingState::*;

        match (self, input) {
            (Pending, Resolve) => Ok((Resolved, ())),
            (Pending, Block) => Ok((Failed, ())),
            (Failed, Retry) => Ok((Pending, ())),
            (Resolved, _) => Err(TransitionError::Terminal(self.to_string())),
            (Pending, Retry) => Err(TransitionError::InvalidTransition {
                from: Pending.to_string(),
                to: Pending.to_string(),
            }),
            (Failed, Resolve) => Err(TransitionError::InvalidTransition {
                from: Failed.to_string(),
                to: Resolved.to_string(),
            }),
            (Failed, Block) => Err(TransitionError::InvalidTransition {
                from: Failed.to_string(),
                to: Failed.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_resolves_once() {
        let (state, _) = BindingState::Pending
            .transition(&BindingEvent::Resolve)
            .expect("Transition should succeed");
        assert_eq!(state, BindingState::Resolved);

        assert!(matches!(
            state.transition(&BindingEvent::Resolve),
            Err(TransitionError::Terminal(_))
        ));
    }

    #[test]
    fn test_pending_blocks() {
        let (state, _) = BindingState::Pending
            .transition(&BindingEvent::Block)
            .expect("Transition should succeed");
        assert_eq!(state, BindingState::Failed);
        assert!(!state.can_transition(&BindingEvent::Resolve));
    }

    #[test]
    fn test_resolved_is_not_blocked() {
        assert!(!BindingState::Resolved.can_transition(&BindingEvent::Block));
        assert!(!BindingState::Resolved.can_transition(&BindingEvent::Retry));
    }

    #[test]
    fn test_failed_retries_to_pending() {
        let (state, _) = BindingState::Failed
            .transition(&BindingEvent::Retry)
            .expect("Transition should succeed");
        assert_eq!(state, BindingState::Pending);
        assert!(!BindingState::Pending.can_transition(&BindingEvent::Retry));
    }
}
