//! Session status state machine.
//!
//! ```text
//! draft ──────► in_progress ──────► completed
//!   │                                   ▲
//!   └───────────────────────────────────┘
//! ```
//!
//! Every request must be an actual change: asking for the current status is
//! rejected, and nothing leaves `completed`.

use crate::session::error::SessionError;
use crate::session::model::{Session, SessionStatus};
use chrono::{DateTime, Utc};

/// Fields a transition writes back to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEffect {
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransitionEffect {
    pub fn apply_to(&self, session: &mut Session) {
        session.status = self.status;
        session.started_at = self.started_at;
        session.completed_at = self.completed_at;
    }
}

/// Pure validation of status changes; performs no I/O
pub struct StatusTransitionValidator;

impl StatusTransitionValidator {
    /// Parse a requested status string into the closed status set
    pub fn parse(requested: &str) -> Result<SessionStatus, SessionError> {
        requested.parse()
    }

    /// Validate `requested` against the session's current status and
    /// compute the resulting fields
    pub fn apply_transition(
        session: &Session,
        requested: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionEffect, SessionError> {
        let target = Self::parse(requested)?;
        Self::transition(session, target, now)
    }

    /// Same as [`apply_transition`](Self::apply_transition) for an already
    /// parsed target
    pub fn transition(
        session: &Session,
        target: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionEffect, SessionError> {
        use SessionStatus::*;

        match (session.status, target) {
            (Draft, InProgress) => Ok(TransitionEffect {
                status: InProgress,
                // Keeps an earlier start if one was recorded
                started_at: session.started_at.or(Some(now)),
                completed_at: None,
            }),
            (InProgress, Completed) | (Draft, Completed) => Ok(TransitionEffect {
                status: Completed,
                started_at: session.started_at,
                completed_at: Some(now),
            }),
            (from, to) => Err(SessionError::InvalidTransition { from, to }),
        }
    }

    /// Fields for a session created directly in `status`
    pub fn initial(status: SessionStatus, now: DateTime<Utc>) -> TransitionEffect {
        match status {
            SessionStatus::Draft => TransitionEffect {
                status,
                started_at: None,
                completed_at: None,
            },
            SessionStatus::InProgress => TransitionEffect {
                status,
                started_at: Some(now),
                completed_at: None,
            },
            SessionStatus::Completed => TransitionEffect {
                status,
                started_at: None,
                completed_at: Some(now),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn session_in(status: SessionStatus) -> Session {
        let now = Utc::now();
        let mut session = Session {
            id: 42,
            owner_id: 1,
            status: SessionStatus::Draft,
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            session_type: "Workout".to_string(),
            notes: None,
            started_at: None,
            paused_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
            exercises: Vec::new(),
        };
        StatusTransitionValidator::initial(status, now - Duration::minutes(30))
            .apply_to(&mut session);
        session
    }

    #[test]
    fn test_draft_to_in_progress_sets_started_at() {
        let session = session_in(SessionStatus::Draft);
        let now = Utc::now();

        let effect = StatusTransitionValidator::apply_transition(&session, "in_progress", now)
            .unwrap();

        assert_eq!(effect.status, SessionStatus::InProgress);
        assert_eq!(effect.started_at, Some(now));
        assert_eq!(effect.completed_at, None);
    }

    #[test]
    fn test_draft_to_in_progress_keeps_existing_started_at() {
        let mut session = session_in(SessionStatus::Draft);
        let earlier = Utc::now() - Duration::hours(2);
        session.started_at = Some(earlier);

        let effect =
            StatusTransitionValidator::apply_transition(&session, "in_progress", Utc::now())
                .unwrap();

        assert_eq!(effect.started_at, Some(earlier));
    }

    #[test]
    fn test_in_progress_to_completed() {
        let session = session_in(SessionStatus::InProgress);
        let started = session.started_at;
        assert!(started.is_some());
        let now = Utc::now();

        let effect =
            StatusTransitionValidator::apply_transition(&session, "completed", now).unwrap();

        assert_eq!(effect.status, SessionStatus::Completed);
        assert_eq!(effect.started_at, started);
        assert_eq!(effect.completed_at, Some(now));
    }

    #[test]
    fn test_draft_to_completed_leaves_started_at_null() {
        let session = session_in(SessionStatus::Draft);

        let effect =
            StatusTransitionValidator::apply_transition(&session, "completed", Utc::now())
                .unwrap();

        assert_eq!(effect.status, SessionStatus::Completed);
        assert!(effect.started_at.is_none());
        assert!(effect.completed_at.is_some());
    }

    #[test]
    fn test_repeated_status_is_rejected() {
        for status in SessionStatus::ALL {
            let session = session_in(status);
            let err = StatusTransitionValidator::transition(&session, status, Utc::now())
                .unwrap_err();
            assert!(
                matches!(err, SessionError::InvalidTransition { from, to } if from == status && to == status),
                "{} -> {} should be rejected",
                status,
                status
            );
        }
    }

    #[test]
    fn test_backward_and_terminal_moves_are_rejected() {
        let rejected = [
            (SessionStatus::InProgress, SessionStatus::Draft),
            (SessionStatus::Completed, SessionStatus::Draft),
            (SessionStatus::Completed, SessionStatus::InProgress),
        ];

        for (from, to) in rejected {
            let session = session_in(from);
            assert!(StatusTransitionValidator::transition(&session, to, Utc::now()).is_err());
        }
    }

    #[test]
    fn test_empty_and_unknown_status() {
        let session = session_in(SessionStatus::Draft);

        assert!(matches!(
            StatusTransitionValidator::apply_transition(&session, "", Utc::now()),
            Err(SessionError::EmptyStatus)
        ));
        assert!(matches!(
            StatusTransitionValidator::apply_transition(&session, "bogus", Utc::now()),
            Err(SessionError::InvalidStatus(_))
        ));
        assert!(matches!(
            StatusTransitionValidator::apply_transition(&session, "paused", Utc::now()),
            Err(SessionError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_exactly_three_moves_are_legal() {
        use SessionStatus::*;
        let legal = [(Draft, InProgress), (InProgress, Completed), (Draft, Completed)];

        for from in SessionStatus::ALL {
            for to in SessionStatus::ALL {
                let session = session_in(from);
                let result = StatusTransitionValidator::transition(&session, to, Utc::now());
                assert_eq!(
                    result.is_ok(),
                    legal.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_initial_effects_hold_timestamp_invariants() {
        let now = Utc::now();
        for status in SessionStatus::ALL {
            let effect = StatusTransitionValidator::initial(status, now);
            assert_eq!(effect.status, status);
            assert_eq!(effect.completed_at.is_some(), status == SessionStatus::Completed);
            assert_eq!(effect.started_at.is_some(), status == SessionStatus::InProgress);
        }
    }
}
