//! Administrative roster adjustments.
//!
//! These edit the roster directly and are not recorded in the vote ledger.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult, JsonBody};
use crate::errors::AppError;
use crate::jobs::{self, RecalculationReport};
use crate::models::{count_from_json, IncreaseVoteRequest, UpdateNameRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNameResponse {
    pub message: String,
    pub employee_id: String,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncreaseVoteResponse {
    pub message: String,
    pub employee_id: String,
    #[serde(rename = "olddailyvoteCount")]
    pub old_dailyvote_count: u64,
    #[serde(rename = "newdailyvoteCount")]
    pub new_dailyvote_count: u64,
    pub vote_increase: u64,
}

#[derive(Debug, Serialize)]
pub struct RecalculateResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: RecalculationReport,
}

/// POST /api/admin/update-name - Change an employee's English name.
pub async fn update_name(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<UpdateNameRequest>,
) -> ApiResult<UpdateNameResponse> {
    let employee_id = request.employee_id.trim();
    let new_name = request.new_name.trim();
    if employee_id.is_empty() {
        return Err(AppError::Validation("Employee ID required".to_string()));
    }
    if new_name.is_empty() {
        return Err(AppError::Validation("New name required".to_string()));
    }

    let guard = state.store.lock().await?;
    let mut roster = guard.load().await?;
    let employee = roster
        .find_mut(employee_id)
        .ok_or_else(|| AppError::NotFound("Employee not found".to_string()))?;
    let old_name = std::mem::replace(&mut employee.englishname, new_name.to_string());
    guard.save(&roster).await?;

    tracing::info!("Renamed {}: '{}' -> '{}'", employee_id, old_name, new_name);
    success(UpdateNameResponse {
        message: format!("Updated English name for {}", employee_id),
        employee_id: employee_id.to_string(),
        old_name,
        new_name: new_name.to_string(),
    })
}

/// POST /api/admin/increase-vote - Add to an employee's daily vote quota.
pub async fn increase_vote(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<IncreaseVoteRequest>,
) -> ApiResult<IncreaseVoteResponse> {
    let employee_id = request.employee_id.trim();
    if employee_id.is_empty() {
        return Err(AppError::Validation("Employee ID required".to_string()));
    }

    let increase = match &request.vote_increase {
        None => 0,
        Some(value) => count_from_json(value).ok_or_else(|| {
            AppError::Validation("Invalid vote increase value".to_string())
        })?,
    };
    if increase <= 0 {
        return Err(AppError::Validation(
            "Vote increase must be positive".to_string(),
        ));
    }
    let increase = increase as u64;

    let guard = state.store.lock().await?;
    let mut roster = guard.load().await?;
    let employee = roster
        .find_mut(employee_id)
        .ok_or_else(|| AppError::NotFound("Employee not found".to_string()))?;
    let old_count = employee.dailyvote;
    let new_count = old_count.checked_add(increase).ok_or_else(|| {
        AppError::Validation(format!(
            "Vote increase of {} exceeds the quota limit for {}",
            increase, employee_id
        ))
    })?;
    employee.dailyvote = new_count;
    guard.save(&roster).await?;

    tracing::info!(
        "Daily quota for {} raised by {}: {} -> {}",
        employee_id,
        increase,
        old_count,
        new_count
    );
    success(IncreaseVoteResponse {
        message: format!(
            "Increased vote count for {} by {}",
            employee_id, increase
        ),
        employee_id: employee_id.to_string(),
        old_dailyvote_count: old_count,
        new_dailyvote_count: new_count,
        vote_increase: increase,
    })
}

/// POST /api/admin/recalculate - Rebuild vote counts from the ledger and push to the sheet.
pub async fn recalculate(State(state): State<AppState>) -> ApiResult<RecalculateResponse> {
    let report = jobs::recalculate(&state.store, &state.ledger, state.sync.as_deref()).await?;
    success(RecalculateResponse {
        message: format!(
            "Recalculated vote counts for {} candidates",
            report.candidates_updated
        ),
        report,
    })
}
