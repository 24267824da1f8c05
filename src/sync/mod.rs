//! Whole-table synchronisation between the local roster and the remote worksheet.
//!
//! Push writes every local row below the sheet's header, in the sheet's column
//! order. Pull replaces the local roster with the sheet's contents. Neither
//! direction merges or detects concurrent changes.

mod backend;
mod columns;
mod google;

#[cfg(test)]
pub use backend::memory::MemorySheet;
pub use backend::SheetBackend;
pub use columns::*;
pub use google::*;

use std::sync::Arc;

use serde::Serialize;

use crate::errors::AppError;
use crate::models::Roster;
use crate::storage::RecordStore;

/// Result of a push to the sheet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub row_count: usize,
    pub column_count: usize,
    pub warnings: Vec<String>,
}

/// Result of a pull from the sheet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    pub row_count: usize,
    pub column_count: usize,
}

/// Synchroniser over one remote worksheet and the local roster.
#[derive(Clone)]
pub struct SheetSync {
    backend: Arc<dyn SheetBackend>,
    store: RecordStore,
}

impl SheetSync {
    pub fn new(backend: Arc<dyn SheetBackend>, store: RecordStore) -> Self {
        Self { backend, store }
    }

    /// Write the local roster to the sheet, starting at row 2.
    pub async fn push(&self) -> Result<PushReport, AppError> {
        let result = self.push_inner().await;
        if let Err(e) = &result {
            log_remote_failure("push to sheet", e);
        }
        result
    }

    async fn push_inner(&self) -> Result<PushReport, AppError> {
        let remote_columns = self.backend.header_row().await?;
        if remote_columns.is_empty() {
            return Err(AppError::Remote(
                "Sheet must have headers in row 1".to_string(),
            ));
        }
        tracing::info!("Sheet columns: {:?}", remote_columns);

        let roster = self.store.load_all().await?;
        let (local_columns, rows) = roster.to_rows();

        let plan = ColumnPlan::reconcile(&remote_columns, &local_columns);
        for warning in &plan.warnings {
            tracing::warn!("Column mismatch: {}", warning);
        }
        if plan.matched() == 0 {
            return Err(AppError::Remote(
                "No matching columns between roster and sheet".to_string(),
            ));
        }

        let values = plan.project(&rows);
        let row_count = values.len();
        self.backend.write_below_header(values).await?;

        tracing::info!(
            "Synced {} rows x {} columns to sheet",
            row_count,
            remote_columns.len()
        );
        Ok(PushReport {
            row_count,
            column_count: remote_columns.len(),
            warnings: plan.warnings.iter().map(ToString::to_string).collect(),
        })
    }

    /// Replace the local roster with the sheet's rows. A sheet without data rows
    /// leaves the roster untouched and reports failure.
    pub async fn pull(&self) -> Result<PullReport, AppError> {
        let result = self.pull_inner().await;
        if let Err(e) = &result {
            log_remote_failure("pull from sheet", e);
        }
        result
    }

    async fn pull_inner(&self) -> Result<PullReport, AppError> {
        let mut all_rows = self.backend.all_rows().await?;
        if all_rows.len() < 2 {
            return Err(AppError::Remote(
                "No data in sheet (only headers or empty)".to_string(),
            ));
        }

        let data_rows = all_rows.split_off(1);
        let header: Vec<String> = all_rows
            .swap_remove(0)
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();
        tracing::info!(
            "Sheet has {} columns and {} data rows",
            header.len(),
            data_rows.len()
        );

        let column_count = header.len();
        let roster = Roster::from_rows(header, &data_rows);
        self.store.save_all(&roster).await?;

        tracing::info!("Synced {} rows from sheet to roster", data_rows.len());
        Ok(PullReport {
            row_count: data_rows.len(),
            column_count,
        })
    }
}

fn log_remote_failure(operation: &str, error: &AppError) {
    if error.is_retryable() {
        tracing::warn!("Rate limit hit during {}, retry later: {}", operation, error);
    } else {
        tracing::error!("Failed to {}: {}", operation, error);
    }
}
