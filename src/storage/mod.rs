//! File-backed persistence for the roster and the vote ledger.
//!
//! Each file is read and rewritten whole, guarded by its own named cross-process lock.

mod ledger;
mod lock;
mod records;

pub use ledger::*;
pub use lock::*;
pub use records::*;

use std::path::Path;

use crate::errors::AppError;

/// Lock name guarding the roster file.
pub const RECORDS_LOCK: &str = "data";
/// Lock name guarding the ledger file.
pub const LEDGER_LOCK: &str = "vote_history";

/// Replace `path` with `bytes` via a sibling temp file, so readers never see a half-written file.
pub(crate) async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
