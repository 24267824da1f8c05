//! Login and candidate listing.

use axum::{extract::State, Json};
use serde::Serialize;

use super::{success, ApiResult, JsonBody};
use crate::errors::AppError;
use crate::models::{Employee, LoginRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub daily_vote_remaining: u64,
}

/// POST /api/login - Identify a voter by employee ID.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let employee_id = request.employee_id.trim();
    if employee_id.is_empty() {
        return Err(AppError::Validation("Employee ID required".to_string()));
    }

    let roster = state.store.load_all().await?;
    let employee = roster
        .find(employee_id)
        .ok_or_else(|| AppError::Unauthorized("Invalid Employee ID".to_string()))?;

    success(LoginResponse {
        daily_vote_remaining: employee.dailyvote,
    })
}

/// GET /api/candidates - Every employee, in roster order.
pub async fn list_candidates(
    State(state): State<AppState>,
) -> Result<Json<Vec<Employee>>, AppError> {
    let roster = state.store.load_all().await?;
    Ok(Json(roster.employees))
}
