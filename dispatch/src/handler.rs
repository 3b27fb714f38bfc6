use crate::email::EmailHandler;
use crate::errors::DispatchError;
use crate::spreadsheet::SpreadsheetHandler;
use crate::webhook::WebhookHandler;
use async_trait::async_trait;
use serde_json::{Value, json};
use store::{Form, IntegrationKind, Submission};

/// Everything a handler may know about the submission being dispatched.
///
/// The same shape is used for production dispatch and for the management
/// surface's synthetic "test integration" path; handlers cannot tell the
/// two apart.
#[derive(Clone, Debug)]
pub struct DispatchContext {
    pub submission_id: String,
    pub form_id: String,
    pub form_name: String,
    /// Opaque key/value payload.
    pub data: Value,
    /// ISO-8601 submission timestamp.
    pub submitted_at: String,
}

impl DispatchContext {
    pub fn for_submission(form: &Form, submission: &Submission) -> Self {
        DispatchContext {
            submission_id: submission.id.clone(),
            form_id: form.id.clone(),
            form_name: form.name.clone(),
            data: submission.data.clone(),
            submitted_at: submission.created_at.to_rfc3339(),
        }
    }

    /// Canned sample data for the synchronous integration test path. No
    /// Submission record backs this context.
    pub fn sample(form: &Form) -> Self {
        DispatchContext {
            submission_id: format!("test-{}", store::new_id()),
            form_id: form.id.clone(),
            form_name: form.name.clone(),
            data: json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "message": "This is a test submission.",
            }),
            submitted_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Result of structural config validation. Runs before persistence,
/// independent of execution.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub error: Option<String>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        ValidationOutcome {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        ValidationOutcome {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Result of one execution attempt against the external system.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecuteOutcome {
    pub success: bool,
    pub message: String,
}

impl ExecuteOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        ExecuteOutcome {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ExecuteOutcome {
            success: false,
            message: message.into(),
        }
    }
}

/// One downstream integration kind.
///
/// `execute` must fold expected failure modes (bad credentials, unreachable
/// endpoint, remote 4xx/5xx, timeout) into a failed outcome rather than
/// returning an error; `Err` is reserved for defects, which the orchestrator
/// records exactly like a failed outcome.
#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    fn kind(&self) -> IntegrationKind;

    /// Pure structural validation of a decrypted config.
    fn validate(&self, config: &Value) -> ValidationOutcome;

    async fn execute(
        &self,
        ctx: &DispatchContext,
        config: Value,
    ) -> Result<ExecuteOutcome, DispatchError>;
}

/// Handler lookup seam; the orchestrator only sees this trait.
pub trait HandlerLookup: Send + Sync {
    fn get(&self, kind: IntegrationKind) -> &dyn IntegrationHandler;
}

/// The closed set of production handlers, one per `IntegrationKind`.
/// Adding a kind extends the exhaustive match below at compile time.
pub struct HandlerRegistry {
    email: EmailHandler,
    webhook: WebhookHandler,
    spreadsheet: SpreadsheetHandler,
}

impl HandlerRegistry {
    pub fn new(
        email: EmailHandler,
        webhook: WebhookHandler,
        spreadsheet: SpreadsheetHandler,
    ) -> Self {
        HandlerRegistry {
            email,
            webhook,
            spreadsheet,
        }
    }
}

impl HandlerLookup for HandlerRegistry {
    fn get(&self, kind: IntegrationKind) -> &dyn IntegrationHandler {
        match kind {
            IntegrationKind::Email => &self.email,
            IntegrationKind::Webhook => &self.webhook,
            IntegrationKind::Spreadsheet => &self.spreadsheet,
        }
    }
}

/// Truncated remote response body for failure messages. Keeps audit log
/// rows bounded while preserving enough of the upstream error to act on.
pub(crate) fn response_snippet(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        body.chars().take(MAX).collect()
    }
}

/// Pragmatic address syntax check: one `@`, a non-empty local part, and a
/// dotted domain. Deliverability is the provider's problem.
pub fn is_valid_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !address.contains(char::is_whitespace)
}
