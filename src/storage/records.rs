//! Roster persistence: the whole employee table in one CSV file.

use std::path::{Path, PathBuf};

use crate::errors::AppError;
use crate::models::Roster;

use super::{write_replacing, FileLock, LockGuard};

/// The employee roster file and its lock.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    lock: FileLock,
}

/// Exclusive access to the roster for a read-modify-write cycle.
///
/// Callers that load, mutate and save must do all three through one guard, or a
/// concurrent writer's update can be lost.
pub struct RecordsGuard<'a> {
    store: &'a RecordStore,
    _lock: LockGuard,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>, lock: FileLock) -> Self {
        Self {
            path: path.into(),
            lock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the roster lock.
    pub async fn lock(&self) -> Result<RecordsGuard<'_>, AppError> {
        let guard = self.lock.acquire().await?;
        Ok(RecordsGuard {
            store: self,
            _lock: guard,
        })
    }

    /// Load the full roster under a short-lived lock.
    pub async fn load_all(&self) -> Result<Roster, AppError> {
        self.lock().await?.load().await
    }

    /// Replace the full roster under a short-lived lock.
    pub async fn save_all(&self, roster: &Roster) -> Result<(), AppError> {
        self.lock().await?.save(roster).await
    }
}

impl RecordsGuard<'_> {
    pub async fn load(&self) -> Result<Roster, AppError> {
        let path = &self.store.path;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::Storage(format!(
                    "Roster file {} not found; it must be provisioned before use",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let roster = parse_roster(&bytes)?;
        let duplicates = roster.duplicate_ids();
        if !duplicates.is_empty() {
            tracing::warn!("Roster has duplicate employee IDs: {:?}", duplicates);
        }
        Ok(roster)
    }

    pub async fn save(&self, roster: &Roster) -> Result<(), AppError> {
        let bytes = render_roster(roster)?;
        write_replacing(&self.store.path, &bytes).await?;
        tracing::debug!(
            "Saved {} employees to {}",
            roster.employees.len(),
            self.store.path.display()
        );
        Ok(())
    }
}

fn parse_roster(bytes: &[u8]) -> Result<Roster, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Ok(Roster::from_rows(columns, &rows))
}

fn render_roster(roster: &Roster) -> Result<Vec<u8>, AppError> {
    let (columns, rows) = roster.to_rows();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Storage(format!("Failed to render roster: {}", e)))
}
