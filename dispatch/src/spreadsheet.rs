//! SPREADSHEET integration: appends one row per submission to a Google
//! Sheet, tolerating schema drift in the submission payload.
//!
//! The sheet's header row is the source of truth for column order. An empty
//! sheet is initialized as `[SubmissionID, SubmittedAt, ...data keys]`; keys
//! the sheet has not seen before are appended to the header row. Existing
//! columns are never reordered or removed.

use crate::errors::DispatchError;
use crate::handler::{
    DispatchContext, ExecuteOutcome, IntegrationHandler, ValidationOutcome, response_snippet,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use store::IntegrationKind;
use url::Url;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

const SUBMISSION_ID_COLUMN: &str = "SubmissionID";
const SUBMITTED_AT_COLUMN: &str = "SubmittedAt";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpreadsheetConfig {
    /// Long-lived OAuth refresh credential obtained out of band.
    pub refresh_token: String,
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

/// OAuth client identity used to redeem refresh tokens.
#[derive(Clone, Debug, Deserialize)]
pub struct GoogleOauth {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize, Default)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

pub struct SpreadsheetHandler {
    client: reqwest::Client,
    oauth: Option<GoogleOauth>,
    token_url: String,
    sheets_base_url: String,
}

impl SpreadsheetHandler {
    pub fn new(oauth: Option<GoogleOauth>) -> Self {
        SpreadsheetHandler {
            client: reqwest::Client::new(),
            oauth,
            token_url: TOKEN_URL.to_string(),
            sheets_base_url: SHEETS_BASE_URL.to_string(),
        }
    }

    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        sheets_base_url: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.sheets_base_url = sheets_base_url.into();
        self
    }

    fn values_url(&self, spreadsheet_id: &str, segment: &str) -> Result<Url, String> {
        let mut url = Url::parse(&self.sheets_base_url)
            .map_err(|e| format!("bad sheets base URL: {e}"))?;
        url.path_segments_mut()
            .map_err(|_| "sheets base URL cannot be a base".to_string())?
            .push(spreadsheet_id)
            .push("values")
            .push(segment);
        Ok(url)
    }

    async fn fetch_access_token(&self, config: &SpreadsheetConfig) -> Result<String, String> {
        let oauth = self
            .oauth
            .as_ref()
            .ok_or_else(|| "Google OAuth client is not configured".to_string())?;

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", oauth.client_id.as_str()),
                ("client_secret", oauth.client_secret.as_str()),
                ("refresh_token", config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| format!("token refresh failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "token refresh failed with status {}: {}",
                status.as_u16(),
                response_snippet(&body)
            ));
        }

        response
            .json::<TokenResponse>()
            .await
            .map(|t| t.access_token)
            .map_err(|e| format!("token refresh returned an unexpected body: {e}"))
    }

    async fn read_header_row(
        &self,
        token: &str,
        config: &SpreadsheetConfig,
    ) -> Result<Vec<String>, String> {
        let range = format!("{}!1:1", config.sheet_name);
        let url = self.values_url(&config.spreadsheet_id, &range)?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| format!("failed to read header row: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "failed to read header row, status {}: {}",
                status.as_u16(),
                response_snippet(&body)
            ));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| format!("failed to read header row: unexpected body: {e}"))?;
        Ok(range.values.into_iter().next().unwrap_or_default())
    }

    async fn write_header_row(
        &self,
        token: &str,
        config: &SpreadsheetConfig,
        headers: &[String],
    ) -> Result<(), String> {
        let range = format!("{}!1:1", config.sheet_name);
        let url = self.values_url(&config.spreadsheet_id, &range)?;

        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": [headers] }))
            .send()
            .await
            .map_err(|e| format!("failed to update header row: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "failed to update header row, status {}: {}",
                status.as_u16(),
                response_snippet(&body)
            ));
        }
        Ok(())
    }

    async fn append_row(
        &self,
        token: &str,
        config: &SpreadsheetConfig,
        row: &[String],
    ) -> Result<(), String> {
        let segment = format!("{}:append", config.sheet_name);
        let url = self.values_url(&config.spreadsheet_id, &segment)?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .map_err(|e| format!("failed to append row: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "failed to append row, status {}: {}",
                status.as_u16(),
                response_snippet(&body)
            ));
        }
        Ok(())
    }

    async fn run(&self, ctx: &DispatchContext, config: &SpreadsheetConfig) -> Result<String, String> {
        let token = self.fetch_access_token(config).await?;

        let mut headers = self.read_header_row(&token, config).await?;
        let data_keys: Vec<&String> = ctx
            .data
            .as_object()
            .map(|m| m.keys().collect())
            .unwrap_or_default();

        let mut headers_dirty = false;
        if headers.is_empty() {
            headers.push(SUBMISSION_ID_COLUMN.to_string());
            headers.push(SUBMITTED_AT_COLUMN.to_string());
            headers_dirty = true;
        }
        for key in data_keys {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
                headers_dirty = true;
            }
        }
        if headers_dirty {
            self.write_header_row(&token, config, &headers).await?;
        }

        // One cell per header column, in header order. Columns this
        // submission has no value for stay blank.
        let row: Vec<String> = headers
            .iter()
            .map(|column| match column.as_str() {
                SUBMISSION_ID_COLUMN => ctx.submission_id.clone(),
                SUBMITTED_AT_COLUMN => ctx.submitted_at.clone(),
                key => ctx.data.get(key).map(cell_value).unwrap_or_default(),
            })
            .collect();

        self.append_row(&token, config, &row).await?;
        Ok(format!("appended row to {}", config.sheet_name))
    }
}

/// Scalars become their plain string form; arrays and objects keep their
/// JSON representation.
fn cell_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl IntegrationHandler for SpreadsheetHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Spreadsheet
    }

    fn validate(&self, config: &Value) -> ValidationOutcome {
        let config: SpreadsheetConfig = match serde_json::from_value(config.clone()) {
            Ok(c) => c,
            Err(e) => {
                return ValidationOutcome::invalid(format!("malformed spreadsheet config: {e}"));
            }
        };

        if config.refresh_token.is_empty() {
            return ValidationOutcome::invalid("refresh_token is required");
        }
        if config.spreadsheet_id.is_empty() {
            return ValidationOutcome::invalid("spreadsheet_id is required");
        }
        if config.sheet_name.is_empty() {
            return ValidationOutcome::invalid("sheet_name is required");
        }

        ValidationOutcome::ok()
    }

    async fn execute(
        &self,
        ctx: &DispatchContext,
        config: Value,
    ) -> Result<ExecuteOutcome, DispatchError> {
        let config: SpreadsheetConfig = match serde_json::from_value(config) {
            Ok(c) => c,
            Err(e) => {
                return Ok(ExecuteOutcome::failure(format!(
                    "malformed spreadsheet config: {e}"
                )));
            }
        };

        match self.run(ctx, &config).await {
            Ok(message) => Ok(ExecuteOutcome::success(message)),
            Err(message) => Ok(ExecuteOutcome::failure(message)),
        }
    }
}
