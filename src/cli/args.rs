//! Command line argument parsing
//!
//! Every session command runs as the user given by `--user`, which stands in
//! for an identity already verified by the caller:
//! - `create`, `list`, `show`, `update`, `status`, `delete`: session operations
//! - `add-exercise`, `add-set`, `update-set`: child records
//! - `reap`: run one draft retention sweep
//! - `serve`: run the draft reaper until interrupted
//! - `show-config`, `init-config`: configuration discovery helpers

use crate::session::{ExerciseId, OwnerId, SessionId, SetId};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "liftsync")]
#[command(author = "Liftsync Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track workout sessions shared across devices")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Workspace directory (defaults to the current directory)
    #[arg(short = 'w', long = "workspace", global = true)]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new session
    Create {
        #[arg(short = 'u', long = "user")]
        user: OwnerId,
        /// Workout date (YYYY-MM-DD), defaults to today
        #[arg(short = 'd', long = "date")]
        date: Option<NaiveDate>,
        /// Session type, e.g. "Workout"
        #[arg(short = 't', long = "type", default_value = "Workout")]
        session_type: String,
        #[arg(short = 'n', long = "notes")]
        notes: Option<String>,
        /// Initial status (draft, in_progress, completed)
        #[arg(short = 's', long = "status")]
        status: Option<String>,
    },
    /// List sessions of a user
    List {
        #[arg(short = 'u', long = "user")]
        user: OwnerId,
    },
    /// Show one session with its exercises and sets
    Show {
        #[arg(short = 'u', long = "user")]
        user: OwnerId,
        id: SessionId,
    },
    /// Update session fields; `--version` must match the stored version
    Update {
        #[arg(short = 'u', long = "user")]
        user: OwnerId,
        id: SessionId,
        #[arg(long = "version")]
        version: u64,
        #[arg(short = 'd', long = "date")]
        date: Option<NaiveDate>,
        #[arg(short = 't', long = "type")]
        session_type: Option<String>,
        #[arg(short = 'n', long = "notes")]
        notes: Option<String>,
    },
    /// Change a session's status
    Status {
        #[arg(short = 'u', long = "user")]
        user: OwnerId,
        id: SessionId,
        status: String,
    },
    /// Delete a session and everything under it
    Delete {
        #[arg(short = 'u', long = "user")]
        user: OwnerId,
        id: SessionId,
    },
    /// Add an exercise to a session
    AddExercise {
        #[arg(short = 'u', long = "user")]
        user: OwnerId,
        session: SessionId,
        name: String,
    },
    /// Add a set to an exercise
    AddSet {
        #[arg(short = 'u', long = "user")]
        user: OwnerId,
        exercise: ExerciseId,
        #[arg(short = 'r', long = "reps")]
        reps: u32,
        #[arg(long = "weight", default_value_t = 0.0)]
        weight: f64,
        #[arg(long = "completed")]
        completed: bool,
    },
    /// Update a set; `--version` must match the stored version
    UpdateSet {
        #[arg(short = 'u', long = "user")]
        user: OwnerId,
        set: SetId,
        #[arg(long = "version")]
        version: u64,
        #[arg(short = 'r', long = "reps")]
        reps: Option<u32>,
        #[arg(long = "weight")]
        weight: Option<f64>,
        #[arg(long = "completed")]
        completed: Option<bool>,
    },
    /// Run one draft retention sweep
    Reap {
        /// Only list the drafts that would be deleted
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Run the draft reaper until Ctrl-C
    Serve,
    /// Show configuration discovery information
    ShowConfig,
    /// Write a default configuration file to ~/.liftsync/config.toml
    InitConfig,
}
