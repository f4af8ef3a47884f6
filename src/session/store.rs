use crate::session::error::{SessionError, StorageError};
use crate::session::model::*;
use crate::session::ownership::OwnershipGuard;
use crate::session::persistence::{CasOutcome, RowStore, TableStore};
use crate::session::transition::StatusTransitionValidator;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How many times a status update re-validates against a row that another
/// writer changed underneath it
const MAX_STATUS_ATTEMPTS: u32 = 3;

/// Owner-scoped session operations on top of a [`RowStore`].
///
/// Holds no mutable state of its own; all coordination goes through the
/// row store's version checks, so clones can be handed to any number of
/// concurrent request tasks.
#[derive(Clone)]
pub struct SessionStore {
    rows: Arc<dyn RowStore>,
}

impl SessionStore {
    pub fn new(rows: Arc<dyn RowStore>) -> Self {
        Self { rows }
    }

    /// Store backed by in-process tables only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(TableStore::in_memory()))
    }

    pub fn rows(&self) -> &Arc<dyn RowStore> {
        &self.rows
    }

    /// Create a session owned by `owner`.
    ///
    /// Any owner or version carried in `draft` is ignored. Status defaults to
    /// draft; an explicit status must be a recognized value.
    pub async fn create(&self, owner: OwnerId, draft: NewSession) -> Result<Session, SessionError> {
        let status = match draft.status.as_deref().map(str::trim) {
            None | Some("") => SessionStatus::Draft,
            Some(requested) => StatusTransitionValidator::parse(requested)?,
        };

        if let Some(claimed) = draft.owner_id
            && claimed != owner
        {
            warn!(
                owner_id = owner,
                claimed_owner_id = claimed,
                "Ignoring client-supplied owner on create"
            );
        }

        let now = Utc::now();
        let mut session = Session {
            id: 0,
            owner_id: owner,
            status,
            date: draft.date,
            session_type: draft.session_type,
            notes: draft.notes,
            started_at: None,
            paused_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
            exercises: Vec::new(),
        };
        StatusTransitionValidator::initial(status, now).apply_to(&mut session);

        let created = storage(self.rows.insert_session(session).await, "insert session")?;
        info!(
            session_id = created.id,
            owner_id = owner,
            status = %created.status,
            "Session created"
        );
        Ok(created)
    }

    /// Fetch a session tree, visible to its owner only
    pub async fn get(&self, owner: OwnerId, id: SessionId) -> Result<Session, SessionError> {
        let found = storage(self.rows.fetch_session(id).await, "fetch session")?;
        OwnershipGuard::authorize_owned(owner, found)
    }

    /// All sessions of `owner` with nested exercises and sets, ordered by id
    pub async fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<Session>, SessionError> {
        storage(self.rows.sessions_by_owner(owner).await, "list sessions")
    }

    /// Replace the caller-editable fields of a session.
    ///
    /// The submitted `version` must equal the stored one; otherwise the
    /// stored record is returned inside [`SessionError::VersionConflict`]
    /// and nothing changes.
    pub async fn full_update(
        &self,
        owner: OwnerId,
        id: SessionId,
        submitted: SessionUpdate,
    ) -> Result<Session, SessionError> {
        if submitted.id != id {
            return Err(SessionError::IdMismatch {
                path: id,
                body: submitted.id,
            });
        }

        let requested_status = match submitted.status.as_deref() {
            Some(status) => Some(StatusTransitionValidator::parse(status)?),
            None => None,
        };

        let current = self.get(owner, id).await?;

        if submitted.version != current.version {
            debug!(
                session_id = id,
                submitted = submitted.version,
                stored = current.version,
                "Rejecting stale session update"
            );
            return Err(SessionError::VersionConflict {
                submitted: submitted.version,
                current: Box::new(current),
            });
        }

        let now = Utc::now();
        let mut next = current.header();
        next.date = submitted.date;
        next.session_type = submitted.session_type;
        next.notes = submitted.notes;
        next.updated_at = now;

        if let Some(target) = requested_status
            && target != current.status
        {
            StatusTransitionValidator::transition(&current, target, now)?.apply_to(&mut next);
        }

        match storage(
            self.rows
                .update_session_if_version(submitted.version, next)
                .await,
            "update session",
        )? {
            CasOutcome::Committed(updated) => {
                info!(
                    session_id = id,
                    version = updated.version,
                    "Session updated"
                );
                Ok(updated)
            }
            CasOutcome::Conflict(current) => {
                debug!(
                    session_id = id,
                    submitted = submitted.version,
                    stored = current.version,
                    "Session changed during update"
                );
                Err(SessionError::VersionConflict {
                    submitted: submitted.version,
                    current: Box::new(current),
                })
            }
            CasOutcome::Missing => Err(SessionError::NotFound),
        }
    }

    /// Move a session to `requested` status.
    ///
    /// Validation errors leave the stored record untouched. A concurrent
    /// commit makes the call re-read and re-validate; after
    /// `MAX_STATUS_ATTEMPTS` lost races it gives up with
    /// [`SessionError::VersionConflict`] carrying the latest record.
    pub async fn update_status(
        &self,
        owner: OwnerId,
        id: SessionId,
        requested: &str,
    ) -> Result<Session, SessionError> {
        let target = StatusTransitionValidator::parse(requested)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.get(owner, id).await?;

            let now = Utc::now();
            let effect = StatusTransitionValidator::transition(&current, target, now)?;
            let mut next = current.header();
            effect.apply_to(&mut next);
            next.updated_at = now;

            match storage(
                self.rows
                    .update_session_if_version(current.version, next)
                    .await,
                "update session status",
            )? {
                CasOutcome::Committed(updated) => {
                    info!(
                        session_id = id,
                        from = %current.status,
                        to = %updated.status,
                        version = updated.version,
                        "Session status changed"
                    );
                    return Ok(updated);
                }
                CasOutcome::Conflict(latest) if attempt >= MAX_STATUS_ATTEMPTS => {
                    warn!(
                        session_id = id,
                        attempts = attempt,
                        "Giving up on contended status update"
                    );
                    return Err(SessionError::VersionConflict {
                        submitted: current.version,
                        current: Box::new(latest),
                    });
                }
                CasOutcome::Conflict(_) => {
                    debug!(session_id = id, attempt, "Status update raced, re-validating");
                }
                CasOutcome::Missing => return Err(SessionError::NotFound),
            }
        }
    }

    /// Delete a session together with all of its exercises and sets
    pub async fn delete(&self, owner: OwnerId, id: SessionId) -> Result<(), SessionError> {
        self.get(owner, id).await?;

        if !storage(self.rows.delete_session_cascade(id).await, "delete session")? {
            return Err(SessionError::NotFound);
        }

        info!(session_id = id, owner_id = owner, "Session deleted");
        Ok(())
    }

    /// Append an exercise to an owned session
    pub async fn add_exercise(
        &self,
        owner: OwnerId,
        session_id: SessionId,
        name: impl Into<String>,
    ) -> Result<Exercise, SessionError> {
        self.get(owner, session_id).await?;

        let exercise = Exercise {
            id: 0,
            session_id,
            name: name.into(),
            version: 0,
            sets: Vec::new(),
        };

        let inserted = storage(self.rows.insert_exercise(exercise).await, "insert exercise")?
            .ok_or(SessionError::NotFound)?;
        debug!(session_id, exercise_id = inserted.id, "Exercise added");
        Ok(inserted)
    }

    /// Append a set to an exercise of an owned session
    pub async fn add_set(
        &self,
        owner: OwnerId,
        exercise_id: ExerciseId,
        new_set: NewSet,
    ) -> Result<ExerciseSet, SessionError> {
        validate_weight(new_set.weight)?;
        self.authorize_exercise(owner, exercise_id).await?;

        let set = ExerciseSet {
            id: 0,
            exercise_id,
            reps: new_set.reps,
            weight: new_set.weight,
            completed: new_set.completed,
            version: 0,
        };

        let inserted = storage(self.rows.insert_set(set).await, "insert set")?
            .ok_or(SessionError::NotFound)?;
        debug!(exercise_id, set_id = inserted.id, "Set added");
        Ok(inserted)
    }

    /// Version-checked replace of a set's fields
    pub async fn update_set(
        &self,
        owner: OwnerId,
        set_id: SetId,
        submitted: SetUpdate,
    ) -> Result<ExerciseSet, SessionError> {
        validate_weight(submitted.weight)?;

        let current = storage(self.rows.fetch_set(set_id).await, "fetch set")?
            .ok_or(SessionError::NotFound)?;
        self.authorize_exercise(owner, current.exercise_id).await?;

        if submitted.version != current.version {
            return Err(SessionError::SetVersionConflict {
                submitted: submitted.version,
                current: Box::new(current),
            });
        }

        let next = ExerciseSet {
            reps: submitted.reps,
            weight: submitted.weight,
            completed: submitted.completed,
            ..current
        };

        match storage(
            self.rows
                .update_set_if_version(submitted.version, next)
                .await,
            "update set",
        )? {
            CasOutcome::Committed(updated) => Ok(updated),
            CasOutcome::Conflict(latest) => Err(SessionError::SetVersionConflict {
                submitted: submitted.version,
                current: Box::new(latest),
            }),
            CasOutcome::Missing => Err(SessionError::NotFound),
        }
    }

    /// Ids of drafts dated before `cutoff`, across all owners
    pub async fn expired_drafts(&self, cutoff: NaiveDate) -> Result<Vec<SessionId>, SessionError> {
        storage(
            self.rows.drafts_dated_before(cutoff).await,
            "select expired drafts",
        )
    }

    /// Delete every draft dated before `cutoff` in one batch, regardless of
    /// owner. Not owner-scoped; meant for the retention sweep only.
    pub async fn delete_expired_drafts(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<SessionId>, SessionError> {
        storage(
            self.rows.delete_drafts_dated_before(cutoff).await,
            "delete expired drafts",
        )
    }

    async fn authorize_exercise(
        &self,
        owner: OwnerId,
        exercise_id: ExerciseId,
    ) -> Result<Exercise, SessionError> {
        let exercise = storage(self.rows.fetch_exercise(exercise_id).await, "fetch exercise")?
            .ok_or(SessionError::NotFound)?;
        self.get(owner, exercise.session_id).await?;
        Ok(exercise)
    }
}

/// Log a storage failure once, at the point it surfaces
fn storage<T>(result: Result<T, StorageError>, operation: &str) -> Result<T, SessionError> {
    result.map_err(|e| {
        error!("Storage failure during {}: {}", operation, e);
        SessionError::Storage(e)
    })
}
