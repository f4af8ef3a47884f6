//! # Liftsync
//!
//! Workout session tracking for one user across several client devices.
//! A phone and a stale cached client may both edit the same session; the
//! core detects lost updates, keeps each session on a legal lifecycle and
//! never leaves orphaned child records behind.
//!
//! ## Architecture Overview
//!
//! - **[`session::OwnershipGuard`]**: owner scoping; foreign and missing
//!   sessions are indistinguishable to the caller
//! - **[`session::StatusTransitionValidator`]**: `draft → in_progress →
//!   completed` state machine, pure and I/O-free
//! - **[`session::SessionStore`]**: create/get/list/update/delete with
//!   optimistic concurrency on `version` and cascading delete
//! - **[`session::DraftReaper`]**: background sweep reclaiming drafts older
//!   than the retention window
//!
//! Storage is behind the [`session::RowStore`] trait; [`session::TableStore`]
//! implements it in memory or on a JSON snapshot.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use liftsync::{NewSession, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SessionStore::in_memory();
//!     let today = chrono::Utc::now().date_naive();
//!
//!     let session = store.create(1, NewSession::new(today, "Workout")).await?;
//!     store.update_status(1, session.id, "in_progress").await?;
//!
//!     println!("Session {} started", session.id);
//!     Ok(())
//! }
//! ```

/// Session lifecycle, concurrency protocol, storage and retention.
///
/// Everything with invariants lives here: ownership checks, the status
/// state machine, version-checked commits and the draft reaper.
pub mod session;

/// Environment constants and path utilities.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use session::{
    DraftReaper, NewSession, OwnerId, ReaperConfig, RowStore, Session, SessionError, SessionId,
    SessionStatus, SessionStore, SessionUpdate, StatusTransitionValidator, StorageError,
    TableStore,
};
