//! Replace employee IDs in the roster from a mapping file, keeping a backup copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::errors::AppError;
use crate::models::IdMapping;
use crate::storage::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapReport {
    pub updated: usize,
    /// Roster IDs with no entry in the mapping
    pub unmatched: Vec<String>,
    pub backup_path: PathBuf,
}

/// Read a JSON array of `{employeeId, FinalID}`. Entries with either side blank are skipped.
pub async fn read_mapping(path: &Path) -> Result<HashMap<String, String>, AppError> {
    let raw = tokio::fs::read(path).await.map_err(|e| {
        AppError::Validation(format!("Cannot read mapping file {}: {}", path.display(), e))
    })?;
    let entries: Vec<IdMapping> = serde_json::from_slice(&raw).map_err(|e| {
        AppError::Validation(format!("Invalid mapping file {}: {}", path.display(), e))
    })?;

    Ok(entries
        .into_iter()
        .filter_map(|m| {
            let (old_id, new_id) = (m.old_id.trim(), m.new_id.trim());
            (!old_id.is_empty() && !new_id.is_empty())
                .then(|| (old_id.to_string(), new_id.to_string()))
        })
        .collect())
}

/// Apply `mapping` to every roster row under one lock, after writing a backup.
///
/// The ledger keeps the old IDs as its keys and candidate references.
pub async fn remap_ids(
    store: &RecordStore,
    mapping: &HashMap<String, String>,
) -> Result<RemapReport, AppError> {
    if mapping.is_empty() {
        return Err(AppError::Validation("No mapping data found".to_string()));
    }
    tracing::info!("Loaded {} employee ID mappings", mapping.len());

    let guard = store.lock().await?;
    let mut roster = guard.load().await?;

    let backup_path = backup_path_for(store.path());
    tokio::fs::copy(store.path(), &backup_path).await?;
    tracing::info!("Backup written to {}", backup_path.display());

    let mut updated = 0;
    let mut unmatched = Vec::new();
    for employee in roster.employees.iter_mut() {
        match mapping.get(&employee.employee_id) {
            Some(new_id) => {
                tracing::debug!("{} -> {}", employee.employee_id, new_id);
                employee.employee_id = new_id.clone();
                updated += 1;
            }
            None => unmatched.push(employee.employee_id.clone()),
        }
    }

    guard.save(&roster).await?;
    tracing::info!(
        "Remapped {} of {} employee IDs ({} unmatched)",
        updated,
        roster.employees.len(),
        unmatched.len()
    );

    Ok(RemapReport {
        updated,
        unmatched,
        backup_path,
    })
}

fn backup_path_for(data_file: &Path) -> PathBuf {
    let stem = data_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    data_file.with_file_name(format!("{}.backup-{}.csv", stem, stamp))
}
