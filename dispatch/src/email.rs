//! EMAIL integration: renders the submission as an HTML table and sends one
//! message to all configured recipients through a transactional email API.

use crate::errors::DispatchError;
use crate::handler::{
    DispatchContext, ExecuteOutcome, IntegrationHandler, ValidationOutcome, is_valid_email,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use store::IntegrationKind;

const RESEND_API_URL: &str = "https://api.resend.com";

/// Sentinel api_key value meaning "use the account-level default".
const ACCOUNT_DEFAULT: &str = "default";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmailConfig {
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    pub to: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Account-level fallbacks from service configuration.
#[derive(Clone, Debug, Default)]
pub struct EmailDefaults {
    pub api_key: Option<String>,
    pub from: Option<String>,
}

pub struct EmailHandler {
    client: reqwest::Client,
    defaults: EmailDefaults,
    base_url: String,
}

impl EmailHandler {
    pub fn new(defaults: EmailDefaults) -> Self {
        EmailHandler {
            client: reqwest::Client::new(),
            defaults,
            base_url: RESEND_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn resolve_api_key<'a>(&'a self, config: &'a EmailConfig) -> Option<&'a str> {
        match config.api_key.as_deref() {
            Some("") | Some(ACCOUNT_DEFAULT) | None => self.defaults.api_key.as_deref(),
            Some(key) => Some(key),
        }
    }
}

#[async_trait]
impl IntegrationHandler for EmailHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Email
    }

    fn validate(&self, config: &Value) -> ValidationOutcome {
        let config: EmailConfig = match serde_json::from_value(config.clone()) {
            Ok(c) => c,
            Err(e) => return ValidationOutcome::invalid(format!("malformed email config: {e}")),
        };

        if config.provider.is_empty() {
            return ValidationOutcome::invalid("provider is required");
        }
        if config.to.is_empty() {
            return ValidationOutcome::invalid("at least one recipient is required");
        }
        for recipient in &config.to {
            if !is_valid_email(recipient) {
                return ValidationOutcome::invalid(format!("invalid recipient address: {recipient}"));
            }
        }
        if let Some(from) = &config.from
            && !is_valid_email(from)
        {
            return ValidationOutcome::invalid(format!("invalid from address: {from}"));
        }

        ValidationOutcome::ok()
    }

    async fn execute(
        &self,
        ctx: &DispatchContext,
        config: Value,
    ) -> Result<ExecuteOutcome, DispatchError> {
        let config: EmailConfig = match serde_json::from_value(config) {
            Ok(c) => c,
            Err(e) => return Ok(ExecuteOutcome::failure(format!("malformed email config: {e}"))),
        };

        if config.provider != "resend" {
            return Ok(ExecuteOutcome::failure(format!(
                "email provider not supported: {}",
                config.provider
            )));
        }

        let Some(api_key) = self.resolve_api_key(&config) else {
            return Ok(ExecuteOutcome::failure("no email API key configured"));
        };
        let Some(from) = config.from.as_deref().or(self.defaults.from.as_deref()) else {
            return Ok(ExecuteOutcome::failure("no from address configured"));
        };

        let subject = config
            .subject
            .as_deref()
            .unwrap_or("New submission to {form}")
            .replace("{form}", &ctx.form_name);
        let recipient_count = config.to.len();

        let body = json!({
            "from": from,
            "to": config.to,
            "subject": subject,
            "html": render_html(ctx),
        });

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                return Ok(ExecuteOutcome::failure(format!(
                    "email API request failed: {e}"
                )));
            }
        };

        let status = response.status();
        if status.is_success() {
            Ok(ExecuteOutcome::success(format!(
                "sent to {recipient_count} recipient(s)"
            )))
        } else {
            let body = response.text().await.unwrap_or_default();
            Ok(ExecuteOutcome::failure(format!(
                "email API responded with status {}: {}",
                status.as_u16(),
                crate::handler::response_snippet(&body)
            )))
        }
    }
}

/// HTML table of all submission fields plus a submission-id footer.
/// Field keys and values are HTML-escaped.
fn render_html(ctx: &DispatchContext) -> String {
    let mut rows = String::new();
    if let Some(fields) = ctx.data.as_object() {
        for (key, value) in fields {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rows.push_str(&format!(
                "<tr><td><strong>{}</strong></td><td>{}</td></tr>",
                escape_html(key),
                escape_html(&rendered)
            ));
        }
    }

    format!(
        "<h2>New submission to {}</h2><table>{}</table><p>Submission ID: {}</p>",
        escape_html(&ctx.form_name),
        rows,
        escape_html(&ctx.submission_id)
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use store::Form;

    #[derive(Default)]
    struct Captured {
        auth: Option<String>,
        body: Option<Value>,
    }

    async fn spawn_email_api(status: u16) -> (String, Arc<Mutex<Captured>>) {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let state = captured.clone();

        let app = Router::new()
            .route(
                "/emails",
                post(
                    move |State(state): State<Arc<Mutex<Captured>>>,
                          headers: HeaderMap,
                          Json(body): Json<Value>| async move {
                        let mut captured = state.lock();
                        captured.auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        captured.body = Some(body);
                        (
                            axum::http::StatusCode::from_u16(status).unwrap(),
                            Json(json!({"id": "email_1"})),
                        )
                    },
                ),
            )
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), captured)
    }

    fn ctx() -> DispatchContext {
        let form = Form::new("o1", "Contact");
        let mut ctx = DispatchContext::sample(&form);
        ctx.data = json!({"name": "A <b>bold</b> name", "count": 3});
        ctx
    }

    #[tokio::test]
    async fn test_sends_one_message_to_all_recipients() {
        let (base, captured) = spawn_email_api(200).await;
        let handler = EmailHandler::new(EmailDefaults {
            api_key: Some("default-key".into()),
            from: Some("forms@example.com".into()),
        })
        .with_base_url(base);

        let ctx = ctx();
        let outcome = handler
            .execute(
                &ctx,
                json!({
                    "provider": "resend",
                    "api_key": "override-key",
                    "to": ["a@example.com", "b@example.com"],
                    "subject": "[{form}] new entry",
                }),
            )
            .await
            .unwrap();

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.message, "sent to 2 recipient(s)");

        let captured = captured.lock();
        assert_eq!(captured.auth.as_deref(), Some("Bearer override-key"));
        let body = captured.body.as_ref().unwrap();
        assert_eq!(body["from"], "forms@example.com");
        assert_eq!(body["to"], json!(["a@example.com", "b@example.com"]));
        assert_eq!(body["subject"], "[Contact] new entry");

        let html = body["html"].as_str().unwrap();
        // Field values are escaped and the footer carries the submission id
        assert!(html.contains("A &lt;b&gt;bold&lt;/b&gt; name"));
        assert!(html.contains("<td>3</td>"));
        assert!(html.contains(&format!("Submission ID: {}", ctx.submission_id)));
    }

    #[tokio::test]
    async fn test_account_default_key_sentinel() {
        let (base, captured) = spawn_email_api(200).await;
        let handler = EmailHandler::new(EmailDefaults {
            api_key: Some("account-key".into()),
            from: Some("forms@example.com".into()),
        })
        .with_base_url(base);

        let outcome = handler
            .execute(
                &ctx(),
                json!({
                    "provider": "resend",
                    "api_key": "default",
                    "to": ["a@example.com"],
                }),
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(captured.lock().auth.as_deref(), Some("Bearer account-key"));
    }

    #[tokio::test]
    async fn test_unsupported_provider_is_a_clear_failure() {
        let handler = EmailHandler::new(EmailDefaults::default());

        let outcome = handler
            .execute(
                &ctx(),
                json!({"provider": "sendgrid", "to": ["a@example.com"]}),
            )
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.message, "email provider not supported: sendgrid");
    }

    #[tokio::test]
    async fn test_remote_error_becomes_failure_outcome() {
        let (base, _captured) = spawn_email_api(402).await;
        let handler = EmailHandler::new(EmailDefaults {
            api_key: Some("k".into()),
            from: Some("forms@example.com".into()),
        })
        .with_base_url(base);

        let outcome = handler
            .execute(
                &ctx(),
                json!({"provider": "resend", "to": ["a@example.com"]}),
            )
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.message.contains("402"), "{}", outcome.message);
    }

    #[test]
    fn test_validate() {
        let handler = EmailHandler::new(EmailDefaults::default());

        assert!(
            handler
                .validate(&json!({"provider": "resend", "to": ["a@example.com"]}))
                .valid
        );

        let outcome = handler.validate(&json!({"provider": "resend", "to": []}));
        assert!(!outcome.valid);
        assert_eq!(outcome.error.as_deref(), Some("at least one recipient is required"));

        assert!(
            !handler
                .validate(&json!({"provider": "resend", "to": ["not-an-email"]}))
                .valid
        );
        assert!(
            !handler
                .validate(&json!({
                    "provider": "resend",
                    "from": "bad",
                    "to": ["a@example.com"],
                }))
                .valid
        );
    }
}
