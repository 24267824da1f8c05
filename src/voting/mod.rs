//! The vote transaction: validate one ballot and apply it to the roster and ledger.

use chrono::{DateTime, FixedOffset};

use crate::config::VotingWindow;
use crate::errors::AppError;
use crate::models::{VoteEvent, VoteReceipt};
use crate::storage::{RecordStore, VoteLedger};

/// One vote action as submitted by a voter.
#[derive(Debug, Clone, Default)]
pub struct Ballot {
    pub voter_id: Option<String>,
    pub candidate_id: Option<String>,
    /// `None` when the submitted count was not an integer
    pub requested_count: Option<i64>,
}

/// Cast a ballot at `now`.
///
/// Preconditions are checked in order and each rejects without touching state:
/// voting window, both IDs present, no self-vote, positive count, both employees
/// exist in one roster snapshot, enough daily quota. The roster update holds the
/// roster lock across load and save; the ledger append follows under its own lock.
pub async fn cast_vote(
    store: &RecordStore,
    ledger: &VoteLedger,
    window: &VotingWindow,
    now: DateTime<FixedOffset>,
    ballot: &Ballot,
) -> Result<VoteReceipt, AppError> {
    if !window.contains(now) {
        return Err(AppError::Forbidden(format!(
            "Voting is closed; it runs from {} until {}",
            window.start.to_rfc3339(),
            window.end.to_rfc3339()
        )));
    }

    let voter_id = non_empty(ballot.voter_id.as_deref());
    let candidate_id = non_empty(ballot.candidate_id.as_deref());
    let (Some(voter_id), Some(candidate_id)) = (voter_id, candidate_id) else {
        return Err(AppError::Validation("Missing fields".to_string()));
    };

    if voter_id == candidate_id {
        return Err(AppError::Validation("Cannot vote for yourself".to_string()));
    }

    let count = match ballot.requested_count {
        Some(n) if n > 0 => n as u64,
        _ => return Err(AppError::Validation("Invalid vote count".to_string())),
    };

    let remaining = {
        let guard = store.lock().await?;
        let mut roster = guard.load().await?;

        let voter_idx = roster
            .position(voter_id)
            .ok_or_else(|| AppError::Unauthorized(format!("Invalid employee ID {}", voter_id)))?;
        let candidate_idx = roster
            .position(candidate_id)
            .ok_or_else(|| AppError::NotFound(format!("Candidate {} not found", candidate_id)))?;

        let available = roster.employees[voter_idx].dailyvote;
        if available < count {
            return Err(AppError::Validation(format!(
                "Not enough daily votes ({} remaining)",
                available
            )));
        }

        let received = roster.employees[candidate_idx]
            .votecount
            .checked_add(count)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Vote count for {} cannot grow any further",
                    candidate_id
                ))
            })?;

        roster.employees[voter_idx].dailyvote = available - count;
        roster.employees[candidate_idx].votecount = received;
        guard.save(&roster).await?;
        available - count
    };

    let event = VoteEvent {
        candidate_id: candidate_id.to_string(),
        time: now,
        votecount: count,
    };
    if let Err(e) = ledger.append(voter_id, event).await {
        tracing::error!(
            "Vote {} -> {} ({}) applied to roster but not recorded in ledger: {}",
            voter_id,
            candidate_id,
            count,
            e
        );
        return Err(e);
    }

    tracing::info!(
        "Vote recorded: {} -> {} ({}), {} remaining",
        voter_id,
        candidate_id,
        count,
        remaining
    );

    Ok(VoteReceipt {
        applied_count: count,
        voter_remaining_daily_votes: remaining,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileLock;
    use std::time::Duration;
    use tempfile::TempDir;

    const ROSTER: &str = "employeeId,vnname,englishname,avatar,gender,votecount,dailyvote\n\
                          E1,An,Ann,,F,0,5\n\
                          E2,Binh,Ben,,M,10,5\n";

    struct Fixture {
        store: RecordStore,
        ledger: VoteLedger,
        window: VotingWindow,
        _temp_dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let timeout = Duration::from_secs(2);
            let store = RecordStore::new(
                temp_dir.path().join("data.csv"),
                FileLock::new(temp_dir.path(), "data", timeout),
            );
            let ledger = VoteLedger::new(
                temp_dir.path().join("vote_history.json"),
                FileLock::new(temp_dir.path(), "vote_history", timeout),
            );
            std::fs::write(store.path(), ROSTER).unwrap();
            let window = VotingWindow::new(
                at("2026-01-26T10:00:00+07:00"),
                at("2026-01-30T12:00:00+07:00"),
            )
            .unwrap();
            Fixture {
                store,
                ledger,
                window,
                _temp_dir: temp_dir,
            }
        }

        async fn cast(
            &self,
            now: &str,
            voter: &str,
            candidate: &str,
            count: i64,
        ) -> Result<VoteReceipt, AppError> {
            let ballot = Ballot {
                voter_id: Some(voter.to_string()),
                candidate_id: Some(candidate.to_string()),
                requested_count: Some(count),
            };
            cast_vote(&self.store, &self.ledger, &self.window, at(now), &ballot).await
        }
    }

    fn at(ts: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(ts).unwrap()
    }

    const INSIDE: &str = "2026-01-27T09:00:00+07:00";

    #[tokio::test]
    async fn test_vote_moves_quota_to_candidate() {
        let fx = Fixture::new();

        let receipt = fx.cast(INSIDE, "E1", "E2", 3).await.unwrap();
        assert_eq!(receipt.applied_count, 3);
        assert_eq!(receipt.voter_remaining_daily_votes, 2);

        let roster = fx.store.load_all().await.unwrap();
        assert_eq!(roster.find("E1").unwrap().dailyvote, 2);
        assert_eq!(roster.find("E2").unwrap().votecount, 13);

        let history = fx.ledger.history("E1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].candidate_id, "E2");
        assert_eq!(history[0].votecount, 3);
        assert_eq!(history[0].time, at(INSIDE));
    }

    #[tokio::test]
    async fn test_self_vote_rejected() {
        let fx = Fixture::new();

        let err = fx.cast(INSIDE, "E1", "E1", 1).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(fx.ledger.read_all().await.unwrap().is_empty());
        let roster = fx.store.load_all().await.unwrap();
        assert_eq!(roster.find("E1").unwrap().dailyvote, 5);
    }

    #[tokio::test]
    async fn test_over_quota_rejected_without_changes() {
        let fx = Fixture::new();
        let before = fx.store.load_all().await.unwrap();

        let err = fx.cast(INSIDE, "E1", "E2", 6).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(fx.store.load_all().await.unwrap(), before);
        assert!(fx.ledger.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outside_window_rejected() {
        let fx = Fixture::new();

        let early = fx.cast("2026-01-26T09:59:59+07:00", "E1", "E2", 1).await;
        assert!(matches!(early, Err(AppError::Forbidden(_))));

        // The end instant itself is already closed
        let at_end = fx.cast("2026-01-30T12:00:00+07:00", "E1", "E2", 1).await;
        assert!(matches!(at_end, Err(AppError::Forbidden(_))));

        // The window check runs before any other validation
        let ballot = Ballot::default();
        let late = at("2026-02-01T00:00:00+07:00");
        let err = cast_vote(&fx.store, &fx.ledger, &fx.window, late, &ballot)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_unknown_employees() {
        let fx = Fixture::new();

        let err = fx.cast(INSIDE, "E9", "E2", 1).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = fx.cast(INSIDE, "E1", "E9", 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let fx = Fixture::new();

        let err = fx.cast(INSIDE, "E1", "E2", 0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let ballot = Ballot {
            voter_id: Some("E1".to_string()),
            candidate_id: Some("  ".to_string()),
            requested_count: Some(1),
        };
        let err = cast_vote(&fx.store, &fx.ledger, &fx.window, at(INSIDE), &ballot)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Missing fields");

        let ballot = Ballot {
            voter_id: Some("E1".to_string()),
            candidate_id: Some("E2".to_string()),
            requested_count: None,
        };
        let err = cast_vote(&fx.store, &fx.ledger, &fx.window, at(INSIDE), &ballot)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Invalid vote count");
    }

    #[tokio::test]
    async fn test_saturated_vote_count_rejected_without_changes() {
        let fx = Fixture::new();
        std::fs::write(
            fx.store.path(),
            "employeeId,vnname,englishname,avatar,gender,votecount,dailyvote\n\
             E1,An,Ann,,F,0,5\n\
             E2,Binh,Ben,,M,18446744073709551615,5\n",
        )
        .unwrap();

        let err = fx.cast(INSIDE, "E1", "E2", 1).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let roster = fx.store.load_all().await.unwrap();
        assert_eq!(roster.find("E1").unwrap().dailyvote, 5);
        assert_eq!(roster.find("E2").unwrap().votecount, u64::MAX);
        assert!(fx.ledger.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_votes_do_not_lose_updates() {
        let fx = Fixture::new();

        let (a, b) = tokio::join!(
            fx.cast(INSIDE, "E1", "E2", 2),
            fx.cast(INSIDE, "E1", "E2", 2)
        );
        a.unwrap();
        b.unwrap();

        let roster = fx.store.load_all().await.unwrap();
        assert_eq!(roster.find("E1").unwrap().dailyvote, 1);
        assert_eq!(roster.find("E2").unwrap().votecount, 14);
        assert_eq!(fx.ledger.history("E1").await.unwrap().len(), 2);
    }
}
