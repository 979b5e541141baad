//! Connection lifecycle state machine.
//!
//! Every accepted connection walks through the same phases:
//!
//! ```text
//! Admitted ──► Onboarding ──► Active ──► Closing ──► Closed
//!                  │                        ▲
//!                  └────────────────────────┘   (snapshot send failed)
//! ```
//!
//! - `Admitted`: the admission controller accepted the connection and the
//!   client is registered.
//! - `Onboarding`: the current document snapshot is being sent.
//! - `Active`: the handler is reading edits; `Active → Active` is the normal
//!   per-edit loop.
//! - `Closing`: peer closed, read error, idle timeout, shutdown, or forced
//!   removal.  The handler deregisters and closes the socket.
//! - `Closed`: terminal.

use std::fmt;

use thiserror::Error;

/// The phase a connection handler is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    Admitted,
    Onboarding,
    Active,
    Closing,
    Closed,
}

/// Returned when a handler attempts a transition the lifecycle does not allow.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal connection phase transition: {from} -> {to}")]
pub struct PhaseError {
    pub from: ConnectionPhase,
    pub to: ConnectionPhase,
}

impl ConnectionPhase {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionPhase) -> bool {
        use ConnectionPhase::*;
        matches!(
            (self, next),
            (Admitted, Onboarding)
                | (Admitted, Closing)
                | (Onboarding, Active)
                | (Onboarding, Closing)
                | (Active, Active)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }

    /// Moves to `next`, or reports why it is not allowed.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseError`] if the transition is not part of the lifecycle.
    pub fn transition(&mut self, next: ConnectionPhase) -> Result<(), PhaseError> {
        if !self.can_transition_to(next) {
            return Err(PhaseError { from: *self, to: next });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Admitted => "ADMITTED",
            ConnectionPhase::Onboarding => "ONBOARDING",
            ConnectionPhase::Active => "ACTIVE",
            ConnectionPhase::Closing => "CLOSING",
            ConnectionPhase::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::ConnectionPhase::*;
    use super::*;

    #[test]
    fn test_happy_path_is_legal() {
        let mut phase = Admitted;
        for next in [Onboarding, Active, Active, Closing, Closed] {
            phase.transition(next).unwrap();
        }
        assert_eq!(phase, Closed);
    }

    #[test]
    fn test_failed_onboarding_goes_straight_to_closing() {
        let mut phase = Onboarding;
        assert!(phase.transition(Closing).is_ok());
    }

    #[test]
    fn test_cannot_skip_onboarding() {
        let mut phase = Admitted;
        let err = phase.transition(Active).unwrap_err();
        assert_eq!(err, PhaseError { from: Admitted, to: Active });
        assert_eq!(phase, Admitted, "phase must be unchanged on error");
    }

    #[test]
    fn test_closed_is_terminal() {
        for next in [Admitted, Onboarding, Active, Closing, Closed] {
            assert!(!Closed.can_transition_to(next));
        }
    }

    #[test]
    fn test_display_uses_upper_case_names() {
        assert_eq!(Onboarding.to_string(), "ONBOARDING");
        let err = PhaseError { from: Closed, to: Active };
        assert_eq!(err.to_string(), "illegal connection phase transition: CLOSED -> ACTIVE");
    }
}
