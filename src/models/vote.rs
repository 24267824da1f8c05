//! Vote ledger models.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single vote action, immutable once appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteEvent {
    #[serde(deserialize_with = "deserialize_id")]
    pub candidate_id: String,
    pub time: DateTime<FixedOffset>,
    #[serde(deserialize_with = "deserialize_count")]
    pub votecount: u64,
}

/// Voter ID to that voter's events in the order they were cast.
pub type LedgerMap = BTreeMap<String, Vec<VoteEvent>>;

/// One vote received by a candidate, as seen from the candidate's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedVote {
    pub voter_id: String,
    pub time: DateTime<FixedOffset>,
    pub votecount: u64,
}

/// All votes a candidate received, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotesReceived {
    pub total_votes: u64,
    pub voters: Vec<ReceivedVote>,
}

/// Outcome of a successful vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    pub applied_count: u64,
    pub voter_remaining_daily_votes: u64,
}

/// Request body for POST /api/login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub employee_id: String,
}

/// Request body for POST /api/vote.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub employee_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub candidate_id: Option<String>,
    /// Integer or numeric string; absent means 1
    #[serde(default)]
    pub vote_for_count: Option<serde_json::Value>,
}

/// Read a count supplied either as a JSON integer or as a numeric string.
pub fn count_from_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read an employee ID written as a string or a number. `null` reads as empty.
pub fn id_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

pub fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    id_from_json(&value)
        .ok_or_else(|| de::Error::custom(format!("expected an employee ID, got {}", value)))
}

pub fn deserialize_optional_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => id_from_json(&value)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected an employee ID, got {}", value))),
    }
}

/// Ledger counts may have been written as whole floats or numeric strings.
fn deserialize_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let count = match &value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f < u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    count.ok_or_else(|| de::Error::custom(format!("invalid vote count {}", value)))
}
