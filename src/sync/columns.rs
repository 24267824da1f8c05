//! Column reconciliation between the remote sheet header and the local roster.

use std::fmt;

/// Where one outgoing column takes its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// Index into the local row
    Local(usize),
    /// Column the local roster lacks; written blank
    Blank,
}

/// A mismatch noticed while reconciling columns. Never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnWarning {
    /// Present in the sheet only; written blank to keep the sheet's shape
    MissingLocally(String),
    /// Present locally only; not written
    NotInSheet(String),
}

impl fmt::Display for ColumnWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnWarning::MissingLocally(c) => {
                write!(f, "column '{}' is in the sheet but not the roster; written blank", c)
            }
            ColumnWarning::NotInSheet(c) => {
                write!(f, "column '{}' is in the roster but not the sheet; skipped", c)
            }
        }
    }
}

/// The outgoing column layout: one source per remote column, in remote order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub sources: Vec<ColumnSource>,
    pub warnings: Vec<ColumnWarning>,
}

impl ColumnPlan {
    /// Map the remote header onto local columns. The remote header fixes the order.
    pub fn reconcile(remote: &[String], local: &[String]) -> Self {
        let sources: Vec<ColumnSource> = remote
            .iter()
            .map(|column| match local.iter().position(|c| c == column) {
                Some(idx) => ColumnSource::Local(idx),
                None => ColumnSource::Blank,
            })
            .collect();

        let mut warnings: Vec<ColumnWarning> = remote
            .iter()
            .zip(&sources)
            .filter(|(_, source)| **source == ColumnSource::Blank)
            .map(|(column, _)| ColumnWarning::MissingLocally(column.clone()))
            .collect();
        warnings.extend(
            local
                .iter()
                .filter(|column| !remote.contains(column))
                .map(|column| ColumnWarning::NotInSheet(column.clone())),
        );

        Self { sources, warnings }
    }

    /// Number of remote columns fed from the roster.
    pub fn matched(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s, ColumnSource::Local(_)))
            .count()
    }

    /// Lay out local rows in remote column order, with every cell as sheet-safe text.
    pub fn project(&self, rows: &[Vec<String>]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| {
                self.sources
                    .iter()
                    .map(|source| match source {
                        ColumnSource::Local(idx) => {
                            clean_cell(row.get(*idx).map(String::as_str).unwrap_or(""))
                        }
                        ColumnSource::Blank => String::new(),
                    })
                    .collect()
            })
            .collect()
    }
}

/// Non-finite numeric markers become blank cells.
fn clean_cell(value: &str) -> String {
    match value {
        "NaN" | "nan" | "inf" | "+inf" | "-inf" | "Infinity" | "-Infinity" => String::new(),
        other => other.to_string(),
    }
}
