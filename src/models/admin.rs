//! Request bodies for administrative roster adjustments.

use serde::Deserialize;

use super::deserialize_id;

/// Request body for POST /api/admin/update-name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNameRequest {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub employee_id: String,
    #[serde(default)]
    pub new_name: String,
}

/// Request body for POST /api/admin/increase-vote.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncreaseVoteRequest {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub employee_id: String,
    /// Integer or numeric string added to the employee's daily quota
    #[serde(default)]
    pub vote_increase: Option<serde_json::Value>,
}

/// One entry of an employee ID remapping file. Spreadsheet exports often write IDs as numbers.
#[derive(Debug, Clone, Deserialize)]
pub struct IdMapping {
    #[serde(rename = "employeeId", default, deserialize_with = "deserialize_id")]
    pub old_id: String,
    #[serde(rename = "FinalID", default, deserialize_with = "deserialize_id")]
    pub new_id: String,
}
