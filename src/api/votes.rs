//! Vote casting and ledger queries.

use axum::extract::{Path, State};
use chrono::Utc;
use serde::Serialize;

use super::{success, ApiResult, JsonBody};
use crate::models::{count_from_json, CastVoteRequest, ReceivedVote, VoteEvent};
use crate::voting::{cast_vote, Ballot};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub votes_used: u64,
    pub daily_vote_remaining: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteHistoryResponse {
    pub employee_id: String,
    pub history: Vec<VoteEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotesReceivedResponse {
    pub candidate_id: String,
    pub total_votes_received: u64,
    pub voter_count: usize,
    pub voters: Vec<ReceivedVote>,
}

/// POST /api/vote - Cast votes for a colleague.
pub async fn vote(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CastVoteRequest>,
) -> ApiResult<VoteResponse> {
    let window = &state.config.voting_window;
    let now = Utc::now().with_timezone(&window.timezone());

    let ballot = Ballot {
        voter_id: request.employee_id,
        candidate_id: request.candidate_id,
        requested_count: match &request.vote_for_count {
            None | Some(serde_json::Value::Null) => Some(1),
            Some(value) => count_from_json(value),
        },
    };

    let receipt = cast_vote(&state.store, &state.ledger, window, now, &ballot).await?;
    success(VoteResponse {
        votes_used: receipt.applied_count,
        daily_vote_remaining: receipt.voter_remaining_daily_votes,
    })
}

/// GET /api/vote-history/:employee_id - Votes cast by one employee.
pub async fn vote_history(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> ApiResult<VoteHistoryResponse> {
    let history = state.ledger.history(&employee_id).await?;
    success(VoteHistoryResponse {
        employee_id,
        history,
    })
}

/// GET /api/votes-received/:employee_id - Who voted for one employee, newest first.
pub async fn votes_received(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> ApiResult<VotesReceivedResponse> {
    let received = state.ledger.query_by_candidate(&employee_id).await?;
    success(VotesReceivedResponse {
        candidate_id: employee_id,
        total_votes_received: received.total_votes,
        voter_count: received.voters.len(),
        voters: received.voters,
    })
}
