use crate::session::error::SessionError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned session identifier
pub type SessionId = i64;

/// Store-assigned exercise identifier
pub type ExerciseId = i64;

/// Store-assigned exercise set identifier
pub type SetId = i64;

/// Verified numeric identity of the calling user
pub type OwnerId = i64;

/// Lifecycle status of a session.
///
/// `Draft` is initial, `Completed` is terminal. See
/// [`StatusTransitionValidator`](crate::session::StatusTransitionValidator)
/// for the legal moves.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Draft,
    InProgress,
    Completed,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 3] = [
        SessionStatus::Draft,
        SessionStatus::InProgress,
        SessionStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(SessionError::EmptyStatus);
        }

        SessionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| SessionError::InvalidStatus(value.to_string()))
    }
}

/// One workout occurrence owned by a single user.
///
/// In the row store the `exercises` collection is always empty; it is filled
/// when a session tree is assembled for a caller.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub owner_id: OwnerId,
    pub status: SessionStatus,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub session_type: String,
    pub notes: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted but never set by any transition.
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Session {
    /// Total number of sets across all exercises of an assembled tree
    pub fn set_count(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    /// Header-only copy, as stored in the session table
    pub fn header(&self) -> Session {
        Session {
            exercises: Vec::new(),
            ..self.clone()
        }
    }
}

/// Exercise performed within a session
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Exercise {
    pub id: ExerciseId,
    pub session_id: SessionId,
    pub name: String,
    pub version: u64,
    #[serde(default)]
    pub sets: Vec<ExerciseSet>,
}

/// Single set of an exercise
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExerciseSet {
    pub id: SetId,
    pub exercise_id: ExerciseId,
    pub reps: u32,
    pub weight: f64,
    pub completed: bool,
    pub version: u64,
}

/// Caller payload for creating a session.
///
/// `owner_id` and `version` are accepted so that client payloads
/// deserialize, but the store never reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub session_type: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub owner_id: Option<OwnerId>,
    #[serde(default)]
    pub version: Option<u64>,
}

impl NewSession {
    pub fn new(date: NaiveDate, session_type: impl Into<String>) -> Self {
        Self {
            date,
            session_type: session_type.into(),
            notes: None,
            status: None,
            owner_id: None,
            version: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// Full session record submitted for an update.
///
/// `version` must equal the stored version for the update to commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub id: SessionId,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub session_type: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub version: u64,
    #[serde(default)]
    pub owner_id: Option<OwnerId>,
}

impl From<&Session> for SessionUpdate {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            date: session.date,
            session_type: session.session_type.clone(),
            notes: session.notes.clone(),
            status: Some(session.status.as_str().to_string()),
            version: session.version,
            owner_id: Some(session.owner_id),
        }
    }
}

/// Caller payload for adding a set to an exercise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSet {
    pub reps: u32,
    pub weight: f64,
    #[serde(default)]
    pub completed: bool,
}

/// Full set record submitted for an update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUpdate {
    pub reps: u32,
    pub weight: f64,
    pub completed: bool,
    pub version: u64,
}

impl From<&ExerciseSet> for SetUpdate {
    fn from(set: &ExerciseSet) -> Self {
        Self {
            reps: set.reps,
            weight: set.weight,
            completed: set.completed,
            version: set.version,
        }
    }
}

/// Reject weights that can't be stored meaningfully
pub fn validate_weight(weight: f64) -> Result<(), SessionError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(SessionError::InvalidSet(format!(
            "weight must be a non-negative number, got {}",
            weight
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("draft".parse::<SessionStatus>().unwrap(), SessionStatus::Draft);
        assert_eq!(
            "in_progress".parse::<SessionStatus>().unwrap(),
            SessionStatus::InProgress
        );
        assert_eq!(
            " completed ".parse::<SessionStatus>().unwrap(),
            SessionStatus::Completed
        );

        assert!(matches!(
            "".parse::<SessionStatus>(),
            Err(SessionError::EmptyStatus)
        ));
        assert!(matches!(
            "   ".parse::<SessionStatus>(),
            Err(SessionError::EmptyStatus)
        ));
        assert!(matches!(
            "paused".parse::<SessionStatus>(),
            Err(SessionError::InvalidStatus(s)) if s == "paused"
        ));
        assert!(matches!(
            "Draft".parse::<SessionStatus>(),
            Err(SessionError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_status_serde_matches_display() {
        for status in SessionStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }

    #[test]
    fn test_new_session_payload_accepts_client_fields() {
        let payload: NewSession = serde_json::from_str(
            r#"{"date":"2026-10-19","type":"Workout","owner_id":999,"version":5}"#,
        )
        .unwrap();

        assert_eq!(payload.session_type, "Workout");
        assert_eq!(payload.owner_id, Some(999));
        assert!(payload.status.is_none());
    }

    #[test]
    fn test_weight_validation() {
        assert!(validate_weight(0.0).is_ok());
        assert!(validate_weight(102.5).is_ok());
        assert!(matches!(
            validate_weight(-1.0),
            Err(SessionError::InvalidSet(_))
        ));
        assert!(validate_weight(f64::NAN).is_err());
    }
}
