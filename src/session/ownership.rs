use crate::session::error::SessionError;
use crate::session::model::{OwnerId, Session};

/// Confirms that the caller owns the session being accessed.
///
/// A missing session and a session owned by someone else produce the same
/// [`SessionError::NotFound`], so callers can't discover other users' ids.
pub struct OwnershipGuard;

impl OwnershipGuard {
    pub fn authorize(caller: OwnerId, session: Option<&Session>) -> Result<&Session, SessionError> {
        match session {
            Some(session) if Self::owns(caller, session) => Ok(session),
            _ => Err(SessionError::NotFound),
        }
    }

    /// Owned-value variant of [`authorize`](Self::authorize)
    pub fn authorize_owned(caller: OwnerId, session: Option<Session>) -> Result<Session, SessionError> {
        match session {
            Some(session) if Self::owns(caller, &session) => Ok(session),
            _ => Err(SessionError::NotFound),
        }
    }

    pub fn owns(caller: OwnerId, session: &Session) -> bool {
        session.owner_id == caller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::SessionStatus;
    use chrono::{NaiveDate, Utc};

    fn session_owned_by(owner_id: OwnerId) -> Session {
        let now = Utc::now();
        Session {
            id: 1,
            owner_id,
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
        }
    }

    #[test]
    fn test_owner_is_allowed() {
        let session = session_owned_by(1);
        let allowed = OwnershipGuard::authorize(1, Some(&session)).unwrap();
        assert_eq!(allowed.id, session.id);
    }

    #[test]
    fn test_foreign_and_missing_look_identical() {
        let session = session_owned_by(1);

        let foreign = OwnershipGuard::authorize(2, Some(&session)).unwrap_err();
        let missing = OwnershipGuard::authorize(2, None).unwrap_err();

        assert!(matches!(foreign, SessionError::NotFound));
        assert!(matches!(missing, SessionError::NotFound));
        assert_eq!(foreign.to_string(), missing.to_string());
    }

    #[test]
    fn test_authorize_owned() {
        assert!(OwnershipGuard::authorize_owned(1, Some(session_owned_by(1))).is_ok());
        assert!(matches!(
            OwnershipGuard::authorize_owned(7, Some(session_owned_by(1))),
            Err(SessionError::NotFound)
        ));
    }
}
