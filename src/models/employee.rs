//! Employee roster model matching the columns of the roster spreadsheet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Column names the roster always carries, in their canonical order.
pub const EMPLOYEE_ID: &str = "employeeId";
pub const VNNAME: &str = "vnname";
pub const ENGLISHNAME: &str = "englishname";
pub const AVATAR: &str = "avatar";
pub const GENDER: &str = "gender";
pub const VOTECOUNT: &str = "votecount";
pub const DAILYVOTE: &str = "dailyvote";

pub const KNOWN_COLUMNS: [&str; 7] = [
    EMPLOYEE_ID,
    VNNAME,
    ENGLISHNAME,
    AVATAR,
    GENDER,
    VOTECOUNT,
    DAILYVOTE,
];

/// One row of the roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub employee_id: String,
    pub vnname: String,
    pub englishname: String,
    pub avatar: String,
    pub gender: String,
    /// Votes received (cached aggregate of the ledger)
    pub votecount: u64,
    /// Votes this employee may still cast
    pub dailyvote: u64,
    /// Columns the roster carries beyond the known ones, kept verbatim
    #[serde(skip)]
    pub extra: BTreeMap<String, String>,
}

impl Employee {
    /// Build an employee from a header and one data row. Missing cells read as empty.
    pub fn from_cells(header: &[String], cells: &[String]) -> Self {
        let mut employee = Employee::default();
        for (idx, column) in header.iter().enumerate() {
            let value = cells.get(idx).map(String::as_str).unwrap_or("");
            employee.set_cell(column, value);
        }
        employee
    }

    /// Textual value of a column, empty if the employee has none.
    pub fn cell(&self, column: &str) -> String {
        match column {
            EMPLOYEE_ID => self.employee_id.clone(),
            VNNAME => self.vnname.clone(),
            ENGLISHNAME => self.englishname.clone(),
            AVATAR => self.avatar.clone(),
            GENDER => self.gender.clone(),
            VOTECOUNT => self.votecount.to_string(),
            DAILYVOTE => self.dailyvote.to_string(),
            other => self.extra.get(other).cloned().unwrap_or_default(),
        }
    }

    pub fn set_cell(&mut self, column: &str, value: &str) {
        match column {
            EMPLOYEE_ID => self.employee_id = value.trim().to_string(),
            VNNAME => self.vnname = value.to_string(),
            ENGLISHNAME => self.englishname = value.to_string(),
            AVATAR => self.avatar = value.to_string(),
            GENDER => self.gender = value.to_string(),
            VOTECOUNT => self.votecount = parse_count(column, value),
            DAILYVOTE => self.dailyvote = parse_count(column, value),
            other => {
                self.extra.insert(other.to_string(), value.to_string());
            }
        }
    }
}

/// Coerce a numeric cell to a non-negative count. Blank, negative, non-finite and
/// unparseable values read as 0.
pub fn parse_count(column: &str, raw: &str) -> u64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    if let Ok(n) = raw.parse::<u64>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => f.trunc() as u64,
        Ok(_) => 0,
        Err(_) => {
            tracing::warn!("Column {} has non-numeric value '{}', reading as 0", column, raw);
            0
        }
    }
}

/// The full employee table: column order plus rows, loaded and saved as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    /// Header order as found in the backing file
    pub columns: Vec<String>,
    pub employees: Vec<Employee>,
}

impl Roster {
    pub fn from_rows(columns: Vec<String>, rows: &[Vec<String>]) -> Self {
        let employees = rows
            .iter()
            .map(|cells| Employee::from_cells(&columns, cells))
            .collect();
        Self { columns, employees }
    }

    /// Header to write: the file's own order, then any known column it lacks.
    pub fn output_columns(&self) -> Vec<String> {
        let mut columns = self.columns.clone();
        for known in KNOWN_COLUMNS {
            if !columns.iter().any(|c| c == known) {
                columns.push(known.to_string());
            }
        }
        columns
    }

    /// Render every employee as a row of cells matching `output_columns`.
    pub fn to_rows(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let columns = self.output_columns();
        let rows = self
            .employees
            .iter()
            .map(|e| columns.iter().map(|c| e.cell(c)).collect())
            .collect();
        (columns, rows)
    }

    pub fn position(&self, employee_id: &str) -> Option<usize> {
        self.employees
            .iter()
            .position(|e| e.employee_id == employee_id)
    }

    pub fn find(&self, employee_id: &str) -> Option<&Employee> {
        self.position(employee_id).map(|idx| &self.employees[idx])
    }

    pub fn find_mut(&mut self, employee_id: &str) -> Option<&mut Employee> {
        self.employees
            .iter_mut()
            .find(|e| e.employee_id == employee_id)
    }

    /// IDs that appear on more than one row.
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut dups = Vec::new();
        for e in &self.employees {
            if !seen.insert(e.employee_id.as_str()) && !dups.contains(&e.employee_id) {
                dups.push(e.employee_id.clone());
            }
        }
        dups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_count_coercion() {
        assert_eq!(parse_count(VOTECOUNT, ""), 0);
        assert_eq!(parse_count(VOTECOUNT, " 7 "), 7);
        assert_eq!(parse_count(VOTECOUNT, "12.0"), 12);
        assert_eq!(parse_count(VOTECOUNT, "-3"), 0);
        assert_eq!(parse_count(VOTECOUNT, "NaN"), 0);
        assert_eq!(parse_count(VOTECOUNT, "inf"), 0);
        assert_eq!(parse_count(VOTECOUNT, "abc"), 0);
    }

    #[test]
    fn test_roster_keeps_extra_columns_and_order() {
        let header = strings(&["team", "employeeId", "vnname", "votecount"]);
        let rows = vec![strings(&["Ops", "E1", "An", "4"]), strings(&["Dev", "E2"])];
        let roster = Roster::from_rows(header, &rows);

        assert_eq!(roster.employees[0].extra.get("team").unwrap(), "Ops");
        assert_eq!(roster.employees[1].vnname, "");
        assert_eq!(roster.employees[1].votecount, 0);

        let (columns, out) = roster.to_rows();
        assert_eq!(
            columns,
            strings(&[
                "team",
                "employeeId",
                "vnname",
                "votecount",
                "englishname",
                "avatar",
                "gender",
                "dailyvote"
            ])
        );
        assert_eq!(out[0], strings(&["Ops", "E1", "An", "4", "", "", "", "0"]));
    }

    #[test]
    fn test_duplicate_ids() {
        let header = strings(&["employeeId"]);
        let rows = vec![strings(&["E1"]), strings(&["E2"]), strings(&["E1"])];
        let roster = Roster::from_rows(header, &rows);
        assert_eq!(roster.duplicate_ids(), vec!["E1".to_string()]);
        assert_eq!(roster.position("E1"), Some(0));
    }
}
