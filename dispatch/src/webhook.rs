//! WEBHOOK integration: posts a fixed submission envelope to a configured
//! URL, optionally signing the exact serialized body with HMAC-SHA256.

use crate::errors::DispatchError;
use crate::handler::{
    DispatchContext, ExecuteOutcome, IntegrationHandler, ValidationOutcome, response_snippet,
};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use store::IntegrationKind;

pub const SIGNATURE_HEADER: &str = "x-formdrop-signature";
pub const USER_AGENT: &str = concat!("formdrop/", env!("CARGO_PKG_VERSION"));

const TIMEOUT: Duration = Duration::from_secs(30);

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Static extra headers merged into every delivery.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub secret: Option<String>,
}

fn default_method() -> String {
    "POST".to_string()
}

pub struct WebhookHandler {
    client: reqwest::Client,
}

impl WebhookHandler {
    pub fn new() -> Self {
        WebhookHandler {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebhookHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// HMAC-SHA256 hex digest over the exact serialized request body. The
/// receiver recomputes this over the bytes it received; the two must match
/// byte for byte.
pub fn sign_body(secret: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[async_trait]
impl IntegrationHandler for WebhookHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Webhook
    }

    fn validate(&self, config: &Value) -> ValidationOutcome {
        let config: WebhookConfig = match serde_json::from_value(config.clone()) {
            Ok(c) => c,
            Err(e) => return ValidationOutcome::invalid(format!("malformed webhook config: {e}")),
        };

        match url::Url::parse(&config.url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return ValidationOutcome::invalid(format!(
                    "unsupported URL scheme: {}",
                    parsed.scheme()
                ));
            }
            Err(e) => return ValidationOutcome::invalid(format!("invalid URL: {e}")),
        }

        if Method::from_bytes(config.method.to_uppercase().as_bytes()).is_err() {
            return ValidationOutcome::invalid(format!("invalid HTTP method: {}", config.method));
        }

        for name in config.headers.keys() {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return ValidationOutcome::invalid(format!("invalid header name: {name}"));
            }
        }

        ValidationOutcome::ok()
    }

    async fn execute(
        &self,
        ctx: &DispatchContext,
        config: Value,
    ) -> Result<ExecuteOutcome, DispatchError> {
        let config: WebhookConfig = match serde_json::from_value(config) {
            Ok(c) => c,
            Err(e) => {
                return Ok(ExecuteOutcome::failure(format!(
                    "malformed webhook config: {e}"
                )));
            }
        };

        let method = match Method::from_bytes(config.method.to_uppercase().as_bytes()) {
            Ok(m) => m,
            Err(_) => {
                return Ok(ExecuteOutcome::failure(format!(
                    "invalid HTTP method: {}",
                    config.method
                )));
            }
        };

        let envelope = json!({
            "event": "form.submission",
            "formId": ctx.form_id,
            "formName": ctx.form_name,
            "submissionId": ctx.submission_id,
            "submittedAt": ctx.submitted_at,
            "data": ctx.data,
        });
        // Serialized exactly once; the signature is computed over these bytes.
        let body = serde_json::to_string(&envelope)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(USER_AGENT),
        );
        for (name, value) in &config.headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                return Ok(ExecuteOutcome::failure(format!(
                    "invalid header name: {name}"
                )));
            };
            let Ok(value) = HeaderValue::from_str(value) else {
                return Ok(ExecuteOutcome::failure(format!(
                    "invalid value for header: {name}"
                )));
            };
            headers.insert(name, value);
        }
        if let Some(secret) = config.secret.as_deref().filter(|s| !s.is_empty()) {
            let signature = sign_body(secret, &body);
            headers.insert(
                HeaderName::from_static(SIGNATURE_HEADER),
                HeaderValue::from_str(&signature)
                    .map_err(|e| DispatchError::Internal(e.to_string()))?,
            );
        }

        let response = self
            .client
            .request(method, &config.url)
            .headers(headers)
            .timeout(TIMEOUT)
            .body(body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Ok(ExecuteOutcome::failure(format!(
                    "webhook timed out after {}s",
                    TIMEOUT.as_secs()
                )));
            }
            Err(e) => {
                return Ok(ExecuteOutcome::failure(format!(
                    "webhook request failed: {e}"
                )));
            }
        };

        let status = response.status();
        if status.is_success() {
            Ok(ExecuteOutcome::success(format!(
                "delivered with status {}",
                status.as_u16()
            )))
        } else {
            let body = response.text().await.unwrap_or_default();
            Ok(ExecuteOutcome::failure(format!(
                "webhook responded with status {}: {}",
                status.as_u16(),
                response_snippet(&body)
            )))
        }
    }
}
