//! Sheet synchronisation triggers.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::sync::{PullReport, PushReport, SheetSync};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SyncResponse<T: Serialize> {
    pub message: String,
    #[serde(flatten)]
    pub report: T,
}

fn configured(state: &AppState) -> Result<&SheetSync, AppError> {
    state
        .sync
        .as_deref()
        .ok_or_else(|| AppError::Internal("Sheet sync is not configured".to_string()))
}

/// POST /api/sync/from-sheet - Replace the local roster with the sheet.
pub async fn sync_from_sheet(State(state): State<AppState>) -> ApiResult<SyncResponse<PullReport>> {
    let report = configured(&state)?.pull().await?;
    success(SyncResponse {
        message: format!("Synced {} rows from sheet to roster", report.row_count),
        report,
    })
}

/// POST /api/sync/to-sheet - Write the local roster to the sheet.
pub async fn sync_to_sheet(State(state): State<AppState>) -> ApiResult<SyncResponse<PushReport>> {
    let report = configured(&state)?.push().await?;
    success(SyncResponse {
        message: format!("Synced {} rows from roster to sheet", report.row_count),
        report,
    })
}
