//! Append-only vote ledger stored as one JSON object keyed by voter ID.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::{LedgerMap, ReceivedVote, VoteEvent, VotesReceived};

use super::{write_replacing, FileLock};

/// The vote ledger file and its lock.
#[derive(Debug, Clone)]
pub struct VoteLedger {
    path: PathBuf,
    lock: FileLock,
}

impl VoteLedger {
    pub fn new(path: impl Into<PathBuf>, lock: FileLock) -> Self {
        Self {
            path: path.into(),
            lock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event to a voter's history. Read, append and write happen under one lock.
    ///
    /// Existing entries are carried over as raw JSON, so events this build cannot
    /// interpret survive the rewrite. A file that is not a JSON object is left
    /// untouched and the append fails.
    pub async fn append(&self, voter_id: &str, event: VoteEvent) -> Result<(), AppError> {
        let _guard = self.lock.acquire().await?;
        let mut document = match self.read_bytes().await? {
            None => Map::new(),
            Some(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err(self.refuse_append("top level is not a JSON object")),
                Err(e) => return Err(self.refuse_append(&e.to_string())),
            },
        };

        let entry = document
            .entry(voter_id.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(events) = entry else {
            return Err(self.refuse_append(&format!("history of {} is not a list", voter_id)));
        };
        events.push(serde_json::to_value(&event)?);

        let bytes = serde_json::to_vec_pretty(&document)?;
        write_replacing(&self.path, &bytes).await
    }

    /// The whole ledger. A missing or unreadable file reads as empty, and events
    /// that cannot be interpreted are skipped.
    pub async fn read_all(&self) -> Result<LedgerMap, AppError> {
        let _guard = self.lock.acquire().await?;
        self.read_unlocked().await
    }

    /// Events cast by one voter, oldest first.
    pub async fn history(&self, voter_id: &str) -> Result<Vec<VoteEvent>, AppError> {
        let mut ledger = self.read_all().await?;
        Ok(ledger.remove(voter_id).unwrap_or_default())
    }

    /// Every vote cast for a candidate across all voters.
    pub async fn query_by_candidate(&self, candidate_id: &str) -> Result<VotesReceived, AppError> {
        let ledger = self.read_all().await?;
        Ok(votes_received(&ledger, candidate_id))
    }

    async fn read_bytes(&self) -> Result<Option<Vec<u8>>, AppError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_unlocked(&self) -> Result<LedgerMap, AppError> {
        let Some(bytes) = self.read_bytes().await? else {
            return Ok(LedgerMap::new());
        };

        let document = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!(
                    "Vote ledger {} is not a JSON object, treating as empty",
                    self.path.display()
                );
                return Ok(LedgerMap::new());
            }
            Err(e) => {
                tracing::warn!(
                    "Vote ledger {} is unreadable, treating as empty: {}",
                    self.path.display(),
                    e
                );
                return Ok(LedgerMap::new());
            }
        };

        let mut ledger = LedgerMap::new();
        for (voter_id, events) in document {
            let Value::Array(events) = events else {
                tracing::warn!("Skipping ledger entry for {}: not a list", voter_id);
                continue;
            };
            let parsed = events
                .into_iter()
                .filter_map(|raw| match serde_json::from_value::<VoteEvent>(raw) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable vote by {}: {}", voter_id, e);
                        None
                    }
                })
                .collect();
            ledger.insert(voter_id, parsed);
        }
        Ok(ledger)
    }

    fn refuse_append(&self, reason: &str) -> AppError {
        tracing::error!(
            "Refusing to append to vote ledger {}: {}",
            self.path.display(),
            reason
        );
        AppError::Storage(format!(
            "Vote ledger {} cannot be appended to: {}",
            self.path.display(),
            reason
        ))
    }
}

/// Full scan of the ledger for one candidate, most recent vote first.
pub fn votes_received(ledger: &LedgerMap, candidate_id: &str) -> VotesReceived {
    let mut voters: Vec<ReceivedVote> = ledger
        .iter()
        .flat_map(|(voter_id, events)| {
            events
                .iter()
                .filter(|e| e.candidate_id == candidate_id)
                .map(move |e| ReceivedVote {
                    voter_id: voter_id.clone(),
                    time: e.time,
                    votecount: e.votecount,
                })
        })
        .collect();

    voters.sort_by(|a, b| b.time.cmp(&a.time));
    let total_votes = voters
        .iter()
        .fold(0u64, |total, v| total.saturating_add(v.votecount));

    VotesReceived {
        total_votes,
        voters,
    }
}
