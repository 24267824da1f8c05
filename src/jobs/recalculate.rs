//! Rebuild every candidate's `votecount` from the ledger, then push to the sheet.

use std::collections::HashMap;

use serde::Serialize;

use crate::errors::AppError;
use crate::models::LedgerMap;
use crate::storage::{RecordStore, VoteLedger};
use crate::sync::SheetSync;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculationReport {
    /// Roster rows that received a non-zero ledger total
    pub candidates_updated: usize,
    /// Sum of all `votecount` values after the rebuild
    pub total_votes: u64,
}

/// Sum of `votecount` per candidate across every voter's events.
pub fn tally(ledger: &LedgerMap) -> Result<HashMap<String, u64>, AppError> {
    let mut totals: HashMap<String, u64> = HashMap::new();
    for event in ledger.values().flatten() {
        if event.candidate_id.is_empty() {
            continue;
        }
        let total = totals.entry(event.candidate_id.clone()).or_default();
        *total = total
            .checked_add(event.votecount)
            .ok_or_else(|| overflow(&event.candidate_id))?;
    }
    Ok(totals)
}

fn overflow(candidate_id: &str) -> AppError {
    AppError::Storage(format!(
        "Vote ledger total for {} exceeds the counter range",
        candidate_id
    ))
}

/// Reset all vote counts to their ledger totals and push the result to the sheet.
///
/// An empty ledger aborts before anything is written. The roster is saved before
/// the push, so a failed push leaves the sheet behind the roster.
pub async fn recalculate(
    store: &RecordStore,
    ledger: &VoteLedger,
    sync: Option<&SheetSync>,
) -> Result<RecalculationReport, AppError> {
    tracing::info!("Recalculating vote counts from ledger");

    let entries = ledger.read_all().await?;
    if entries.is_empty() {
        return Err(AppError::Validation(
            "No vote history found; refusing to reset vote counts".to_string(),
        ));
    }

    let totals = tally(&entries)?;
    let record_count: usize = entries.values().map(Vec::len).sum();
    tracing::info!(
        "Processed {} vote records from {} voters, {} candidates",
        record_count,
        entries.len(),
        totals.len()
    );

    let report = {
        let guard = store.lock().await?;
        let mut roster = guard.load().await?;

        let mut candidates_updated = 0;
        for employee in roster.employees.iter_mut() {
            employee.votecount = totals.get(&employee.employee_id).copied().unwrap_or(0);
            if employee.votecount > 0 {
                candidates_updated += 1;
            }
        }
        let total_votes = roster
            .employees
            .iter()
            .try_fold(0u64, |total, e| {
                total
                    .checked_add(e.votecount)
                    .ok_or_else(|| overflow(&e.employee_id))
            })?;

        guard.save(&roster).await?;
        RecalculationReport {
            candidates_updated,
            total_votes,
        }
    };
    tracing::info!(
        "Updated {} candidates, total votes {}",
        report.candidates_updated,
        report.total_votes
    );

    let sync = sync.ok_or_else(|| {
        AppError::Internal("Sheet sync is not configured; roster updated locally only".to_string())
    })?;
    sync.push().await?;

    tracing::info!("Recalculation completed");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoteEvent;
    use crate::storage::FileLock;
    use crate::sync::MemorySheet;
    use chrono::DateTime;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const ROSTER: &str = "employeeId,vnname,englishname,avatar,gender,votecount,dailyvote\n\
                          E1,An,Ann,,F,99,5\n\
                          E2,Binh,Ben,,M,42,5\n\
                          E3,Chi,Chloe,,F,7,5\n";

    struct Fixture {
        store: RecordStore,
        ledger: VoteLedger,
        sheet: Arc<MemorySheet>,
        sync: SheetSync,
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
            let sheet = Arc::new(MemorySheet::with_rows(vec![vec!["employeeId", "votecount"]]));
            let sync = SheetSync::new(sheet.clone(), store.clone());
            Fixture {
                store,
                ledger,
                sheet,
                sync,
                _temp_dir: temp_dir,
            }
        }

        async fn vote(&self, voter: &str, candidate: &str, votecount: u64) {
            let event = VoteEvent {
                candidate_id: candidate.to_string(),
                time: DateTime::parse_from_rfc3339("2026-01-27T09:00:00+07:00").unwrap(),
                votecount,
            };
            self.ledger.append(voter, event).await.unwrap();
        }

        async fn counts(&self) -> Vec<u64> {
            let roster = self.store.load_all().await.unwrap();
            roster.employees.iter().map(|e| e.votecount).collect()
        }
    }

    #[tokio::test]
    async fn test_counts_match_ledger_sums() {
        let fx = Fixture::new();
        fx.vote("E1", "E2", 3).await;
        fx.vote("E3", "E2", 2).await;
        fx.vote("E2", "E1", 1).await;
        fx.vote("E2", "E404", 9).await;

        let report = recalculate(&fx.store, &fx.ledger, Some(&fx.sync))
            .await
            .unwrap();
        assert_eq!(report.candidates_updated, 2);
        assert_eq!(report.total_votes, 6);
        assert_eq!(fx.counts().await, vec![1, 5, 0]);

        let rows = fx.sheet.rows();
        assert_eq!(rows[1], vec!["E1", "1"]);
        assert_eq!(rows[2], vec!["E2", "5"]);
        assert_eq!(rows[3], vec!["E3", "0"]);
    }

    #[tokio::test]
    async fn test_overflowing_ledger_total_aborts_without_writing() {
        let fx = Fixture::new();
        fx.vote("E1", "E2", u64::MAX).await;
        fx.vote("E3", "E2", 1).await;

        let err = recalculate(&fx.store, &fx.ledger, Some(&fx.sync))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(fx.counts().await, vec![99, 42, 7]);
        assert_eq!(fx.sheet.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_idempotent() {
        let fx = Fixture::new();
        fx.vote("E1", "E3", 4).await;

        let first = recalculate(&fx.store, &fx.ledger, Some(&fx.sync))
            .await
            .unwrap();
        let after_first = fx.counts().await;
        let second = recalculate(&fx.store, &fx.ledger, Some(&fx.sync))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.counts().await, after_first);
    }

    #[tokio::test]
    async fn test_empty_ledger_aborts_without_writing() {
        let fx = Fixture::new();

        let result = recalculate(&fx.store, &fx.ledger, Some(&fx.sync)).await;
        assert!(result.is_err());
        assert_eq!(fx.counts().await, vec![99, 42, 7]);
        assert_eq!(fx.sheet.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_push_reports_failure_after_local_update() {
        let fx = Fixture::new();
        fx.vote("E1", "E2", 3).await;
        fx.sheet
            .fail_with(|| AppError::Remote("Sheets API error 500: backend".to_string()));

        let result = recalculate(&fx.store, &fx.ledger, Some(&fx.sync)).await;
        assert!(result.is_err());
        assert_eq!(fx.counts().await, vec![0, 3, 0]);
    }

    #[tokio::test]
    async fn test_without_sync_reports_failure() {
        let fx = Fixture::new();
        fx.vote("E1", "E2", 3).await;

        assert!(recalculate(&fx.store, &fx.ledger, None).await.is_err());
        assert_eq!(fx.counts().await, vec![0, 3, 0]);
    }
}
