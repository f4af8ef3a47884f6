use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use liftsync::cli::{Args, Commands, ConfigDiscovery, ServiceConfig};
use liftsync::session::{NewSet, NewSession, SessionError, SessionUpdate, SetUpdate};
use liftsync::{DraftReaper, SessionStore, env};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(env::DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            return Ok(());
        }
        Commands::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("{}", path.display());
            return Ok(());
        }
        _ => {}
    }

    let config = ConfigDiscovery::load(args.config.as_deref())?;
    let workspace = match args.workspace {
        Some(workspace) => workspace,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let store = config.open_store(&workspace).await?;

    match run_command(args.command, &config, store).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Some(current) = e
                .downcast_ref::<SessionError>()
                .and_then(SessionError::current_record)
            {
                eprintln!("Current record:");
                print_json(current)?;
            }
            Err(e)
        }
    }
}

async fn run_command(command: Commands, config: &ServiceConfig, store: SessionStore) -> Result<()> {
    match command {
        Commands::Create {
            user,
            date,
            session_type,
            notes,
            status,
        } => {
            let mut draft = NewSession::new(
                date.unwrap_or_else(|| Utc::now().date_naive()),
                session_type,
            );
            draft.notes = notes;
            draft.status = status;
            print_json(&store.create(user, draft).await?)
        }
        Commands::List { user } => print_json(&store.list_by_owner(user).await?),
        Commands::Show { user, id } => print_json(&store.get(user, id).await?),
        Commands::Update {
            user,
            id,
            version,
            date,
            session_type,
            notes,
        } => {
            let current = store.get(user, id).await?;
            let mut update = SessionUpdate::from(&current);
            update.version = version;
            update.status = None;
            if let Some(date) = date {
                update.date = date;
            }
            if let Some(session_type) = session_type {
                update.session_type = session_type;
            }
            if notes.is_some() {
                update.notes = notes;
            }
            print_json(&store.full_update(user, id, update).await?)
        }
        Commands::Status { user, id, status } => {
            print_json(&store.update_status(user, id, &status).await?)
        }
        Commands::Delete { user, id } => {
            store.delete(user, id).await?;
            info!(session_id = id, "Deleted");
            Ok(())
        }
        Commands::AddExercise {
            user,
            session,
            name,
        } => print_json(&store.add_exercise(user, session, name).await?),
        Commands::AddSet {
            user,
            exercise,
            reps,
            weight,
            completed,
        } => {
            let set = NewSet {
                reps,
                weight,
                completed,
            };
            print_json(&store.add_set(user, exercise, set).await?)
        }
        Commands::UpdateSet {
            user,
            set,
            version,
            reps,
            weight,
            completed,
        } => {
            let current = store
                .rows()
                .fetch_set(set)
                .await?
                .ok_or(SessionError::NotFound)?;
            let update = SetUpdate {
                reps: reps.unwrap_or(current.reps),
                weight: weight.unwrap_or(current.weight),
                completed: completed.unwrap_or(current.completed),
                version,
            };
            print_json(&store.update_set(user, set, update).await?)
        }
        Commands::Reap { dry_run } => {
            let reaper = DraftReaper::new(store, &config.reaper);
            let report = if dry_run {
                reaper.preview(Utc::now()).await?
            } else {
                reaper.sweep_once(Utc::now()).await?
            };
            print_json(&report)
        }
        Commands::Serve => serve(config, store).await,
        Commands::ShowConfig | Commands::InitConfig => Ok(()),
    }
}

async fn serve(config: &ServiceConfig, store: SessionStore) -> Result<()> {
    if !config.reaper.enabled {
        warn!("Draft reaper is disabled in configuration; nothing to run");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let handle = DraftReaper::new(store, &config.reaper).spawn(cancel.clone());

    info!("Serving; press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down draft reaper...");
    cancel.cancel();
    handle.await.context("Draft reaper task panicked")?;

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

