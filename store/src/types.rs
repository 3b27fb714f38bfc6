use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type FormId = String;
pub type OwnerId = String;
pub type SubmissionId = String;
pub type IntegrationId = String;

/// Generates an opaque record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generates an unguessable public slug for a form endpoint.
///
/// Slugs are globally unique and immutable after creation; they are the only
/// public handle on a form.
pub fn new_slug() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// A tenant-configured public submission endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: FormId,
    pub owner_id: OwnerId,
    pub name: String,
    pub slug: String,
    pub active: bool,
    /// Origins allowed to submit. Empty means any origin is permitted, which
    /// matches the embed-anywhere default.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    pub redirect_url: Option<String>,
    /// Hidden field name used to silently detect bots.
    pub honeypot_field: Option<String>,
    /// Per-form CAPTCHA secret; verification is skipped when absent.
    pub captcha_secret: Option<String>,
    /// Requests per minute per client IP.
    pub rate_limit_per_minute: u32,
    pub submission_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Form {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Form {
            id: new_id(),
            owner_id: owner_id.into(),
            name: name.into(),
            slug: new_slug(),
            active: true,
            allowed_origins: Vec::new(),
            redirect_url: None,
            honeypot_field: None,
            captcha_secret: None,
            rate_limit_per_minute: 60,
            submission_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Request metadata captured alongside a submission payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub origin: Option<String>,
}

/// One accepted payload. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub form_id: FormId,
    /// Denormalized from the form at accept time.
    pub owner_id: OwnerId,
    /// Caller-defined key/value payload; the shape is never validated
    /// against a schema.
    pub data: serde_json::Value,
    pub meta: RequestMeta,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(form: &Form, data: serde_json::Value, meta: RequestMeta) -> Self {
        Submission {
            id: new_id(),
            form_id: form.id.clone(),
            owner_id: form.owner_id.clone(),
            data,
            meta,
            created_at: Utc::now(),
        }
    }
}

/// Downstream action kinds. Adding a kind is a compile-time-checked
/// extension of every `match` on this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrationKind {
    #[serde(rename = "EMAIL")]
    Email,
    #[serde(rename = "WEBHOOK")]
    Webhook,
    #[serde(rename = "SPREADSHEET")]
    Spreadsheet,
}

impl IntegrationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            IntegrationKind::Email => "EMAIL",
            IntegrationKind::Webhook => "WEBHOOK",
            IntegrationKind::Spreadsheet => "SPREADSHEET",
        }
    }
}

impl std::fmt::Display for IntegrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured downstream action for a form.
///
/// At most one integration exists per (form, kind) pair; creation upserts by
/// that composite key. The config blob is encrypted at rest and only
/// decrypted at the point of use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: IntegrationId,
    pub form_id: FormId,
    pub kind: IntegrationKind,
    pub name: String,
    /// Base64-encoded AEAD ciphertext of the type-specific config JSON.
    pub encrypted_config: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Integration {
    pub fn new(
        form_id: impl Into<String>,
        kind: IntegrationKind,
        name: impl Into<String>,
        encrypted_config: String,
    ) -> Self {
        Integration {
            id: new_id(),
            form_id: form_id.into(),
            kind,
            name: name.into(),
            encrypted_config,
            enabled: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failed,
}

/// Append-only audit record of one dispatch attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegrationLog {
    pub id: String,
    pub integration_id: IntegrationId,
    pub submission_id: SubmissionId,
    pub status: LogStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl IntegrationLog {
    pub fn new(
        integration_id: impl Into<String>,
        submission_id: impl Into<String>,
        status: LogStatus,
        message: impl Into<String>,
    ) -> Self {
        IntegrationLog {
            id: new_id(),
            integration_id: integration_id.into(),
            submission_id: submission_id.into(),
            status,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Account-level quota state for a form owner.
///
/// `usage_month` is a `%Y-%m` marker; the counter resets lazily on the first
/// accepted submission of a new month rather than via a scheduled job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub email: String,
    pub monthly_limit: u64,
    pub monthly_used: u64,
    pub usage_month: String,
}

impl Owner {
    /// Submissions counted against the current month, accounting for a
    /// not-yet-applied lazy reset.
    pub fn effective_used(&self, month: &str) -> u64 {
        if self.usage_month == month {
            self.monthly_used
        } else {
            0
        }
    }
}

/// The current UTC billing-month marker.
pub fn current_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_is_unguessable_token() {
        let a = new_slug();
        let b = new_slug();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_integration_kind_tags() {
        assert_eq!(
            serde_json::to_string(&IntegrationKind::Email).unwrap(),
            "\"EMAIL\""
        );
        assert_eq!(
            serde_json::from_str::<IntegrationKind>("\"SPREADSHEET\"").unwrap(),
            IntegrationKind::Spreadsheet
        );
        assert!(serde_json::from_str::<IntegrationKind>("\"SLACK\"").is_err());
    }

    #[test]
    fn test_effective_used_resets_on_new_month() {
        let owner = Owner {
            id: "o1".into(),
            email: "owner@example.com".into(),
            monthly_limit: 100,
            monthly_used: 42,
            usage_month: "2026-07".into(),
        };

        assert_eq!(owner.effective_used("2026-07"), 42);
        assert_eq!(owner.effective_used("2026-08"), 0);
    }
}
