//! Google Sheets v4 backend authenticated with a service account.

use std::path::Path;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::backend::SheetBackend;
use crate::errors::AppError;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh a cached token this long before it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// The fields of a service-account credentials file this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    TOKEN_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetails {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Long-lived client for one worksheet. Build once at startup and share.
pub struct GoogleSheets {
    http: Client,
    base_url: String,
    sheet_id: String,
    worksheet: String,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheets {
    pub fn new(
        key: ServiceAccountKey,
        sheet_id: impl Into<String>,
        worksheet: impl Into<String>,
    ) -> Result<Self, AppError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            AppError::Internal(format!("Invalid service account private key: {}", e))
        })?;

        Ok(Self {
            http: Client::new(),
            base_url: SHEETS_BASE_URL.to_string(),
            sheet_id: sheet_id.into(),
            worksheet: worksheet.into(),
            key,
            encoding_key,
            token: Mutex::new(None),
        })
    }

    /// Load the credentials file and build the client.
    pub async fn from_credentials_file(
        path: &Path,
        sheet_id: impl Into<String>,
        worksheet: impl Into<String>,
    ) -> Result<Self, AppError> {
        let raw = tokio::fs::read(path).await.map_err(|e| {
            AppError::Internal(format!(
                "Cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_slice(&raw).map_err(|e| {
            AppError::Internal(format!(
                "Invalid credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::new(key, sheet_id, worksheet)
    }

    async fn access_token(&self) -> Result<String, AppError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_REFRESH_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let header = Header::new(Algorithm::RS256);
        let assertion = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token request: {}", e)))?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;
        let token: TokenResponse = response.json().await?;

        tracing::debug!("Obtained sheets access token, valid for {}s", token.expires_in);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: now + token.expires_in,
        });
        Ok(token.access_token)
    }

    fn values_url(&self, range: &str) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::Internal(format!("Invalid sheets base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Sheets base URL cannot hold a path".to_string()))?
            .extend(["v4", "spreadsheets", self.sheet_id.as_str(), "values", range]);
        Ok(url)
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, AppError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.values_url(range)?)
            .bearer_auth(token)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: ValueRange = response.json().await?;
        Ok(body.values)
    }

    async fn put_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), AppError> {
        let token = self.access_token().await?;
        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        });
        let response = self
            .http
            .put(self.values_url(range)?)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

impl SheetBackend for GoogleSheets {
    fn header_row(&self) -> BoxFuture<'_, Result<Vec<String>, AppError>> {
        async move {
            let range = a1_range(&self.worksheet, "1:1");
            let mut rows = self.get_values(&range).await?;
            Ok(if rows.is_empty() {
                Vec::new()
            } else {
                rows.swap_remove(0)
            })
        }
        .boxed()
    }

    fn all_rows(&self) -> BoxFuture<'_, Result<Vec<Vec<String>>, AppError>> {
        async move {
            let range = quoted_sheet(&self.worksheet);
            self.get_values(&range).await
        }
        .boxed()
    }

    fn write_below_header(&self, rows: Vec<Vec<String>>) -> BoxFuture<'_, Result<(), AppError>> {
        async move {
            let range = a1_range(&self.worksheet, "A2");
            self.put_values(&range, rows).await
        }
        .boxed()
    }
}

fn quoted_sheet(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

fn a1_range(worksheet: &str, cells: &str) -> String {
    format!("{}!{}", quoted_sheet(worksheet), cells)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body))
}

/// Quota exhaustion is a soft failure the caller may retry; everything else is hard.
fn classify_error(status: StatusCode, body: &str) -> AppError {
    let (message, api_status) = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => (parsed.error.message, parsed.error.status),
        Err(_) => (body.to_string(), String::new()),
    };

    if status == StatusCode::TOO_MANY_REQUESTS
        || api_status == "RESOURCE_EXHAUSTED"
        || message.contains("Quota exceeded")
    {
        AppError::RateLimited(format!("Sheets API quota exhausted: {}", message))
    } else {
        AppError::Remote(format!("Sheets API error {}: {}", status.as_u16(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded for quota metric 'Write requests'","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, body),
            AppError::RateLimited(_)
        ));

        let body = r#"{"error":{"code":403,"message":"Quota exceeded","status":"PERMISSION_DENIED"}}"#;
        assert!(classify_error(StatusCode::FORBIDDEN, body).is_retryable());
    }

    #[test]
    fn test_classify_hard_failure() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        let err = classify_error(StatusCode::NOT_FOUND, body);
        assert!(matches!(err, AppError::Remote(_)));
        assert!(err.message().contains("404"));

        let err = classify_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(err, AppError::Remote(_)));
    }

    #[test]
    fn test_a1_range_quotes_sheet_name() {
        assert_eq!(a1_range("Employees", "A2"), "'Employees'!A2");
        assert_eq!(a1_range("Bob's list", "1:1"), "'Bob''s list'!1:1");
    }

    #[test]
    fn test_rejects_bad_private_key() {
        let key = ServiceAccountKey {
            client_email: "svc@example.iam.gserviceaccount.com".to_string(),
            private_key: "not a pem".to_string(),
            token_uri: default_token_uri(),
        };
        assert!(GoogleSheets::new(key, "sheet", "Employees").is_err());
    }
}
