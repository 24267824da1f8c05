//! Staff Vote Backend
//!
//! REST backend for the internal staff voting campaign: a CSV roster and a JSON vote
//! ledger on disk, each behind a file lock, mirrored to a Google Sheets worksheet.

mod api;
mod config;
mod errors;
mod jobs;
mod models;
mod storage;
mod sync;
mod voting;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use storage::{FileLock, RecordStore, VoteLedger, LEDGER_LOCK, RECORDS_LOCK};
use sync::{GoogleSheets, SheetSync};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub ledger: Arc<VoteLedger>,
    /// Absent when no sheet is configured
    pub sync: Option<Arc<SheetSync>>,
    pub config: Arc<Config>,
}

#[derive(Debug, Parser)]
#[command(name = "staff-vote", version, about = "Staff voting backend and jobs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Rebuild vote counts from the ledger, then push to the sheet
    Recalculate,
    /// Write the local roster to the sheet
    SyncToSheet,
    /// Replace the local roster with the sheet's contents
    SyncFromSheet,
    /// Replace employee IDs using a JSON mapping of {employeeId, FinalID}
    RemapIds {
        #[arg(long)]
        mapping: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    let state = build_state(config).await?;

    let outcome = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => return serve(state).await.map(|()| ExitCode::SUCCESS),
        Command::Recalculate => {
            jobs::recalculate(&state.store, &state.ledger, state.sync.as_deref())
                .await
                .map(|report| {
                    tracing::info!(
                        "Recalculation done: {} candidates, {} votes",
                        report.candidates_updated,
                        report.total_votes
                    )
                })
        }
        Command::SyncToSheet => match state.sync.as_deref() {
            Some(sync) => sync.push().await.map(|_| ()),
            None => Err(errors::AppError::Internal(
                "Sheet sync is not configured".to_string(),
            )),
        },
        Command::SyncFromSheet => match state.sync.as_deref() {
            Some(sync) => sync.pull().await.map(|_| ()),
            None => Err(errors::AppError::Internal(
                "Sheet sync is not configured".to_string(),
            )),
        },
        Command::RemapIds { mapping } => match jobs::read_mapping(&mapping).await {
            Ok(map) => jobs::remap_ids(&state.store, &map).await.map(|report| {
                if !report.unmatched.is_empty() {
                    tracing::warn!("IDs without a mapping: {:?}", report.unmatched);
                }
            }),
            Err(e) => Err(e),
        },
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!("Job failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Open the stores and, when configured, the sheet client.
async fn build_state(config: Config) -> Result<AppState, Box<dyn std::error::Error>> {
    tracing::info!("Roster file: {:?}", config.data_file);
    tracing::info!("Ledger file: {:?}", config.ledger_file);
    tracing::info!(
        "Voting window: {} to {}",
        config.voting_window.start,
        config.voting_window.end
    );

    let store = RecordStore::new(
        config.data_file.clone(),
        FileLock::new(&config.lock_dir, RECORDS_LOCK, config.lock_timeout),
    );
    let ledger = VoteLedger::new(
        config.ledger_file.clone(),
        FileLock::new(&config.lock_dir, LEDGER_LOCK, config.lock_timeout),
    );

    let sync = match &config.sheet {
        Some(sheet) => {
            let client = GoogleSheets::from_credentials_file(
                &sheet.credentials_path,
                sheet.sheet_id.clone(),
                sheet.worksheet.clone(),
            )
            .await?;
            tracing::info!("Sheet sync enabled for worksheet '{}'", sheet.worksheet);
            Some(Arc::new(SheetSync::new(Arc::new(client), store.clone())))
        }
        None => {
            tracing::warn!("No sheet configured (VOTE_SHEET_ID). Sheet sync is disabled!");
            None
        }
    };

    Ok(AppState {
        store: Arc::new(store),
        ledger: Arc::new(ledger),
        sync,
        config: Arc::new(config),
    })
}

async fn serve(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = state.config.bind_addr;
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.config.static_dir);

    // API routes
    let api_routes = Router::new()
        .route("/login", post(api::login))
        .route("/candidates", get(api::list_candidates))
        // Votes
        .route("/vote", post(api::vote))
        .route("/vote-history/{employee_id}", get(api::vote_history))
        .route("/votes-received/{employee_id}", get(api::votes_received))
        // Admin
        .route("/admin/update-name", post(api::update_name))
        .route("/admin/increase-vote", post(api::increase_vote))
        .route("/admin/recalculate", post(api::recalculate))
        // Sheet sync
        .route("/sync/from-sheet", post(api::sync_from_sheet))
        .route("/sync/to-sheet", post(api::sync_to_sheet));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .fallback_service(static_files)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let now = Utc::now().with_timezone(&state.config.voting_window.timezone());
    Json(json!({
        "status": "ok",
        "time_vn": now.to_rfc3339(),
    }))
}
