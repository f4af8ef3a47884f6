use crate::env;
use crate::session::error::StorageError;
use crate::session::model::*;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Outcome of a version-checked write
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome<T> {
    /// Stored version matched; carries the committed row
    Committed(T),
    /// Stored version differed; carries the unchanged stored row
    Conflict(T),
    /// No row with that id
    Missing,
}

/// Row totals per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub sessions: usize,
    pub exercises: usize,
    pub sets: usize,
}

/// Transactional row store the session core runs on.
///
/// Every method is atomic with respect to every other method: in particular
/// the `*_if_version` methods compare and increment `version` in one step,
/// and cascade deletes remove a session with all of its exercises and sets
/// or nothing at all.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert a session header, assigning a fresh unique id
    async fn insert_session(&self, session: Session) -> Result<Session, StorageError>;

    /// Fetch a session with its exercises and sets
    async fn fetch_session(&self, id: SessionId) -> Result<Option<Session>, StorageError>;

    /// All session trees owned by `owner`, ordered by id
    async fn sessions_by_owner(&self, owner: OwnerId) -> Result<Vec<Session>, StorageError>;

    /// Replace the session header if the stored version equals
    /// `expected_version`. On commit the stored version becomes
    /// `expected_version + 1`; `id`, `owner_id` and `created_at` are kept
    /// from the stored row.
    async fn update_session_if_version(
        &self,
        expected_version: u64,
        next: Session,
    ) -> Result<CasOutcome<Session>, StorageError>;

    /// Delete a session with all descendants. Returns false if it was absent.
    async fn delete_session_cascade(&self, id: SessionId) -> Result<bool, StorageError>;

    /// Ids of draft sessions dated strictly before `cutoff`, any owner
    async fn drafts_dated_before(&self, cutoff: NaiveDate)
    -> Result<Vec<SessionId>, StorageError>;

    /// Select and cascade-delete draft sessions dated before `cutoff` as one
    /// batch. Returns the deleted ids.
    async fn delete_drafts_dated_before(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<SessionId>, StorageError>;

    /// Insert an exercise under its session. `None` if the session is gone.
    async fn insert_exercise(&self, exercise: Exercise) -> Result<Option<Exercise>, StorageError>;

    async fn fetch_exercise(&self, id: ExerciseId) -> Result<Option<Exercise>, StorageError>;

    /// Insert a set under its exercise. `None` if the exercise is gone.
    async fn insert_set(&self, set: ExerciseSet) -> Result<Option<ExerciseSet>, StorageError>;

    async fn fetch_set(&self, id: SetId) -> Result<Option<ExerciseSet>, StorageError>;

    /// Version-checked replace of a set; `id` and `exercise_id` are kept
    async fn update_set_if_version(
        &self,
        expected_version: u64,
        next: ExerciseSet,
    ) -> Result<CasOutcome<ExerciseSet>, StorageError>;

    async fn row_counts(&self) -> Result<RowCounts, StorageError>;

    /// Exercises without a session plus sets without an exercise
    async fn orphaned_rows(&self) -> Result<usize, StorageError>;
}

/// Arena-style tables: children reference their parent by id and are
/// swept by that key on cascade delete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    next_session_id: SessionId,
    next_exercise_id: ExerciseId,
    next_set_id: SetId,
    sessions: BTreeMap<SessionId, Session>,
    exercises: BTreeMap<ExerciseId, Exercise>,
    sets: BTreeMap<SetId, ExerciseSet>,
    /// Bumped by every mutating call; not persisted
    #[serde(skip)]
    revision: u64,
}

impl Tables {
    pub fn insert_session(&mut self, session: Session) -> Session {
        self.next_session_id += 1;
        let row = Session {
            id: self.next_session_id,
            ..session.header()
        };
        self.sessions.insert(row.id, row.clone());
        self.revision += 1;
        row
    }

    /// Assemble a session header with its ordered exercises and sets
    pub fn assemble(&self, id: SessionId) -> Option<Session> {
        let header = self.sessions.get(&id)?;
        let exercises = self
            .exercises
            .values()
            .filter(|exercise| exercise.session_id == id)
            .map(|exercise| self.assemble_exercise(exercise))
            .collect();

        Some(Session {
            exercises,
            ..header.clone()
        })
    }

    fn assemble_exercise(&self, exercise: &Exercise) -> Exercise {
        let sets = self
            .sets
            .values()
            .filter(|set| set.exercise_id == exercise.id)
            .cloned()
            .collect();

        Exercise {
            sets,
            ..exercise.clone()
        }
    }

    pub fn by_owner(&self, owner: OwnerId) -> Vec<Session> {
        self.sessions
            .values()
            .filter(|session| session.owner_id == owner)
            .filter_map(|session| self.assemble(session.id))
            .collect()
    }

    pub fn update_session_if_version(
        &mut self,
        expected_version: u64,
        next: Session,
    ) -> CasOutcome<Session> {
        let Some(stored) = self.sessions.get(&next.id) else {
            return CasOutcome::Missing;
        };

        if stored.version != expected_version {
            return match self.assemble(next.id) {
                Some(current) => CasOutcome::Conflict(current),
                None => CasOutcome::Missing,
            };
        }

        let row = Session {
            owner_id: stored.owner_id,
            created_at: stored.created_at,
            version: expected_version + 1,
            ..next.header()
        };
        let id = row.id;
        self.sessions.insert(id, row);
        self.revision += 1;

        match self.assemble(id) {
            Some(committed) => CasOutcome::Committed(committed),
            None => CasOutcome::Missing,
        }
    }

    pub fn delete_session_cascade(&mut self, id: SessionId) -> bool {
        if self.sessions.remove(&id).is_none() {
            return false;
        }

        let exercise_ids: BTreeSet<ExerciseId> = self
            .exercises
            .values()
            .filter(|exercise| exercise.session_id == id)
            .map(|exercise| exercise.id)
            .collect();

        self.exercises
            .retain(|exercise_id, _| !exercise_ids.contains(exercise_id));
        self.sets
            .retain(|_, set| !exercise_ids.contains(&set.exercise_id));

        self.revision += 1;
        true
    }

    pub fn drafts_dated_before(&self, cutoff: NaiveDate) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|session| session.status == SessionStatus::Draft && session.date < cutoff)
            .map(|session| session.id)
            .collect()
    }

    pub fn delete_drafts_dated_before(&mut self, cutoff: NaiveDate) -> Vec<SessionId> {
        let expired = self.drafts_dated_before(cutoff);
        for id in &expired {
            self.delete_session_cascade(*id);
        }
        expired
    }

    pub fn insert_exercise(&mut self, exercise: Exercise) -> Option<Exercise> {
        if !self.sessions.contains_key(&exercise.session_id) {
            return None;
        }

        self.next_exercise_id += 1;
        let row = Exercise {
            id: self.next_exercise_id,
            sets: Vec::new(),
            ..exercise
        };
        self.exercises.insert(row.id, row.clone());
        self.revision += 1;
        Some(row)
    }

    pub fn fetch_exercise(&self, id: ExerciseId) -> Option<Exercise> {
        self.exercises
            .get(&id)
            .map(|exercise| self.assemble_exercise(exercise))
    }

    pub fn insert_set(&mut self, set: ExerciseSet) -> Option<ExerciseSet> {
        if !self.exercises.contains_key(&set.exercise_id) {
            return None;
        }

        self.next_set_id += 1;
        let row = ExerciseSet {
            id: self.next_set_id,
            ..set
        };
        self.sets.insert(row.id, row.clone());
        self.revision += 1;
        Some(row)
    }

    pub fn fetch_set(&self, id: SetId) -> Option<ExerciseSet> {
        self.sets.get(&id).cloned()
    }

    pub fn update_set_if_version(
        &mut self,
        expected_version: u64,
        next: ExerciseSet,
    ) -> CasOutcome<ExerciseSet> {
        let Some(stored) = self.sets.get_mut(&next.id) else {
            return CasOutcome::Missing;
        };

        if stored.version != expected_version {
            return CasOutcome::Conflict(stored.clone());
        }

        *stored = ExerciseSet {
            exercise_id: stored.exercise_id,
            version: expected_version + 1,
            ..next
        };
        let committed = stored.clone();
        self.revision += 1;
        CasOutcome::Committed(committed)
    }

    pub fn row_counts(&self) -> RowCounts {
        RowCounts {
            sessions: self.sessions.len(),
            exercises: self.exercises.len(),
            sets: self.sets.len(),
        }
    }

    pub fn orphaned_rows(&self) -> usize {
        let orphan_exercises = self
            .exercises
            .values()
            .filter(|exercise| !self.sessions.contains_key(&exercise.session_id))
            .count();
        let orphan_sets = self
            .sets
            .values()
            .filter(|set| !self.exercises.contains_key(&set.exercise_id))
            .count();
        orphan_exercises + orphan_sets
    }

    /// Structural checks run when a snapshot is loaded
    pub fn validate(&self) -> Result<(), StorageError> {
        let key_mismatch = self.sessions.iter().any(|(id, s)| *id != s.id)
            || self.exercises.iter().any(|(id, e)| *id != e.id)
            || self.sets.iter().any(|(id, s)| *id != s.id);
        if key_mismatch {
            return Err(StorageError::Corrupt(
                "row key does not match row id".to_string(),
            ));
        }

        let counters_behind = self.sessions.keys().any(|id| *id > self.next_session_id)
            || self.exercises.keys().any(|id| *id > self.next_exercise_id)
            || self.sets.keys().any(|id| *id > self.next_set_id);
        if counters_behind {
            return Err(StorageError::Corrupt(
                "id counter is behind stored rows".to_string(),
            ));
        }

        let orphans = self.orphaned_rows();
        if orphans > 0 {
            return Err(StorageError::Corrupt(format!(
                "{} orphaned child rows",
                orphans
            )));
        }

        Ok(())
    }
}

/// JSON snapshot of the tables, replaced atomically on every commit
#[derive(Debug, Clone)]
struct SnapshotFile {
    path: PathBuf,
    temp_dir: PathBuf,
}

impl SnapshotFile {
    async fn load(&self) -> Result<Tables, StorageError> {
        if !async_fs::try_exists(&self.path).await? {
            info!("No snapshot at {:?}, starting with empty tables", self.path);
            return Ok(Tables::default());
        }

        let content = async_fs::read(&self.path).await?;
        let tables: Tables = serde_json::from_slice(&content)?;
        tables.validate()?;

        let counts = tables.row_counts();
        info!(
            sessions = counts.sessions,
            exercises = counts.exercises,
            sets = counts.sets,
            "Snapshot loaded from {:?}",
            self.path
        );
        Ok(tables)
    }

    async fn persist(&self, tables: &Tables) -> Result<(), StorageError> {
        let serialized = serde_json::to_vec_pretty(tables)?;
        let temp_file = self
            .temp_dir
            .join(format!("sessions_{}.json", uuid::Uuid::new_v4()));

        let result = self.write_and_swap(&temp_file, &serialized).await;
        if result.is_err() {
            let _ = async_fs::remove_file(&temp_file).await;
        }
        result
    }

    async fn write_and_swap(&self, temp_file: &Path, data: &[u8]) -> Result<(), StorageError> {
        let mut file = async_fs::File::create(temp_file).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        async_fs::rename(temp_file, &self.path).await?;
        debug!("Snapshot committed: {} bytes", data.len());
        Ok(())
    }

    /// Remove staged files left behind by an interrupted write
    async fn cleanup_temp_files(&self) -> Result<u32, StorageError> {
        let mut removed = 0;
        let mut entries = async_fs::read_dir(&self.temp_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str())
                && name.starts_with("sessions_")
            {
                match async_fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove stale temp file {:?}: {}", path, e),
                }
            }
        }

        Ok(removed)
    }
}

/// [`RowStore`] over in-process [`Tables`], optionally backed by a JSON
/// snapshot file.
///
/// Writers run against a staged copy of the tables when a snapshot is
/// attached; the copy only becomes visible once the snapshot has been
/// replaced on disk, so a failed or interrupted write commits nothing.
pub struct TableStore {
    tables: Arc<RwLock<Tables>>,
    snapshot: Option<Arc<SnapshotFile>>,
}

impl TableStore {
    pub fn in_memory() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            snapshot: None,
        }
    }

    /// Open (or create) the snapshot in `data_dir`
    pub async fn open(data_dir: &Path) -> Result<Self, StorageError> {
        let snapshot = SnapshotFile {
            path: env::snapshot_file_path(data_dir),
            temp_dir: env::temp_dir_path(data_dir),
        };

        async_fs::create_dir_all(&snapshot.temp_dir).await?;

        let stale = snapshot.cleanup_temp_files().await?;
        if stale > 0 {
            warn!("Removed {} stale snapshot temp files", stale);
        }

        let tables = snapshot.load().await?;

        Ok(Self {
            tables: Arc::new(RwLock::new(tables)),
            snapshot: Some(Arc::new(snapshot)),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_ref().map(|s| s.path.as_path())
    }

    async fn read<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Tables) -> T,
    {
        let tables = self.tables.read().await;
        Ok(f(&*tables))
    }

    async fn write<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Tables) -> T + Send + 'static,
        T: Send + 'static,
    {
        let Some(snapshot) = &self.snapshot else {
            let mut tables = self.tables.write().await;
            return Ok(f(&mut *tables));
        };

        // Detached so that dropping the caller can't split the file rename
        // from the in-memory swap
        let tables = Arc::clone(&self.tables);
        let snapshot = Arc::clone(snapshot);
        let commit = tokio::spawn(async move {
            let mut tables = tables.write_owned().await;

            let mut staged = (*tables).clone();
            let before = staged.revision;
            let out = f(&mut staged);

            if staged.revision != before {
                snapshot.persist(&staged).await?;
                *tables = staged;
            }

            Ok::<T, StorageError>(out)
        });

        commit.await?
    }
}

impl Default for TableStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[async_trait]
impl RowStore for TableStore {
    async fn insert_session(&self, session: Session) -> Result<Session, StorageError> {
        self.write(move |t| t.insert_session(session)).await
    }

    async fn fetch_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        self.read(|t| t.assemble(id)).await
    }

    async fn sessions_by_owner(&self, owner: OwnerId) -> Result<Vec<Session>, StorageError> {
        self.read(|t| t.by_owner(owner)).await
    }

    async fn update_session_if_version(
        &self,
        expected_version: u64,
        next: Session,
    ) -> Result<CasOutcome<Session>, StorageError> {
        self.write(move |t| t.update_session_if_version(expected_version, next))
            .await
    }

    async fn delete_session_cascade(&self, id: SessionId) -> Result<bool, StorageError> {
        self.write(move |t| t.delete_session_cascade(id)).await
    }

    async fn drafts_dated_before(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<SessionId>, StorageError> {
        self.read(|t| t.drafts_dated_before(cutoff)).await
    }

    async fn delete_drafts_dated_before(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<SessionId>, StorageError> {
        self.write(move |t| t.delete_drafts_dated_before(cutoff)).await
    }

    async fn insert_exercise(&self, exercise: Exercise) -> Result<Option<Exercise>, StorageError> {
        self.write(move |t| t.insert_exercise(exercise)).await
    }

    async fn fetch_exercise(&self, id: ExerciseId) -> Result<Option<Exercise>, StorageError> {
        self.read(|t| t.fetch_exercise(id)).await
    }

    async fn insert_set(&self, set: ExerciseSet) -> Result<Option<ExerciseSet>, StorageError> {
        self.write(move |t| t.insert_set(set)).await
    }

    async fn fetch_set(&self, id: SetId) -> Result<Option<ExerciseSet>, StorageError> {
        self.read(|t| t.fetch_set(id)).await
    }

    async fn update_set_if_version(
        &self,
        expected_version: u64,
        next: ExerciseSet,
    ) -> Result<CasOutcome<ExerciseSet>, StorageError> {
        self.write(move |t| t.update_set_if_version(expected_version, next))
            .await
    }

    async fn row_counts(&self) -> Result<RowCounts, StorageError> {
        self.read(|t| t.row_counts()).await
    }

    async fn orphaned_rows(&self) -> Result<usize, StorageError> {
        self.read(|t| t.orphaned_rows()).await
    }
}
