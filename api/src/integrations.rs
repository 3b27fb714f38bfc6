use crate::errors::{ApiError, Result};
use crate::forms::owned_form;
use crate::{ApiState, OwnerPrincipal};
use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use dispatch::DispatchContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use store::{Form, Integration, IntegrationKind};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route(
            "/forms/{id}/integrations",
            put(upsert_integration).get(list_integrations),
        )
        .route(
            "/integrations/{id}",
            get(get_integration)
                .patch(update_integration)
                .delete(delete_integration),
        )
        .route("/integrations/{id}/test", post(test_integration))
}

/// What the management surface exposes about an integration. The encrypted
/// blob never leaves storage and the plaintext config is never echoed back.
#[derive(Serialize)]
struct IntegrationView {
    id: String,
    form_id: String,
    kind: IntegrationKind,
    name: String,
    enabled: bool,
    created_at: DateTime<Utc>,
}

impl From<Integration> for IntegrationView {
    fn from(integration: Integration) -> Self {
        IntegrationView {
            id: integration.id,
            form_id: integration.form_id,
            kind: integration.kind,
            name: integration.name,
            enabled: integration.enabled,
            created_at: integration.created_at,
        }
    }
}

#[derive(Deserialize)]
struct UpsertIntegration {
    kind: IntegrationKind,
    name: String,
    config: Value,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Deserialize)]
struct UpdateIntegration {
    name: Option<String>,
    enabled: Option<bool>,
    config: Option<Value>,
}

#[derive(Serialize)]
struct TestOutcome {
    success: bool,
    message: String,
}

/// Loads an integration and its form, enforcing ownership through the form.
async fn owned_integration(
    state: &ApiState,
    owner_id: &str,
    integration_id: &str,
) -> Result<(Integration, Form)> {
    let integration = state
        .store
        .integration(integration_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let form = owned_form(state, owner_id, &integration.form_id).await?;
    Ok((integration, form))
}

/// Validates a config against its handler, then encrypts it for storage.
fn validate_and_encrypt(state: &ApiState, kind: IntegrationKind, config: &Value) -> Result<String> {
    let outcome = state.registry.get(kind).validate(config);
    if !outcome.valid {
        return Err(ApiError::Validation(
            outcome.error.unwrap_or_else(|| "invalid config".into()),
        ));
    }
    Ok(state.codec.encrypt_json(config)?)
}

async fn upsert_integration(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(form_id): Path<String>,
    Json(body): Json<UpsertIntegration>,
) -> Result<Json<IntegrationView>> {
    let form = owned_form(&state, &owner_id, &form_id).await?;
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("integration name is required".into()));
    }

    let encrypted_config = validate_and_encrypt(&state, body.kind, &body.config)?;
    let mut integration = Integration::new(&form.id, body.kind, body.name, encrypted_config);
    integration.enabled = body.enabled;

    let integration = state.store.upsert_integration(integration).await?;
    tracing::info!(
        form_id = %form.id,
        kind = %integration.kind,
        "integration configured"
    );
    Ok(Json(integration.into()))
}

async fn list_integrations(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(form_id): Path<String>,
) -> Result<Json<Vec<IntegrationView>>> {
    let form = owned_form(&state, &owner_id, &form_id).await?;
    let integrations = state.store.integrations_by_form(&form.id).await?;
    Ok(Json(integrations.into_iter().map(Into::into).collect()))
}

async fn get_integration(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(id): Path<String>,
) -> Result<Json<IntegrationView>> {
    let (integration, _form) = owned_integration(&state, &owner_id, &id).await?;
    Ok(Json(integration.into()))
}

async fn update_integration(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(id): Path<String>,
    Json(body): Json<UpdateIntegration>,
) -> Result<Json<IntegrationView>> {
    let (mut integration, _form) = owned_integration(&state, &owner_id, &id).await?;

    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("integration name is required".into()));
        }
        integration.name = name;
    }
    if let Some(enabled) = body.enabled {
        integration.enabled = enabled;
    }
    if let Some(config) = body.config {
        integration.encrypted_config = validate_and_encrypt(&state, integration.kind, &config)?;
    }

    let integration = state.store.update_integration(integration).await?;
    Ok(Json(integration.into()))
}

async fn delete_integration(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    owned_integration(&state, &owner_id, &id).await?;
    state.store.delete_integration(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Runs one synchronous execute against canned sample data. No Submission
/// record and no audit log row are created; the outcome goes straight back
/// to the owner.
async fn test_integration(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(id): Path<String>,
) -> Result<Json<TestOutcome>> {
    let (integration, form) = owned_integration(&state, &owner_id, &id).await?;

    let config: Value = state.codec.decrypt_json(&integration.encrypted_config)?;
    let ctx = DispatchContext::sample(&form);

    let outcome = match state.registry.get(integration.kind).execute(&ctx, config).await {
        Ok(outcome) => outcome,
        Err(e) => dispatch::ExecuteOutcome::failure(format!("integration error: {e}")),
    };

    Ok(Json(TestOutcome {
        success: outcome.success,
        message: outcome.message,
    }))
}
