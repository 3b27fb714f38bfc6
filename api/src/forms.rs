use crate::errors::{ApiError, Result};
use crate::{ApiState, OwnerPrincipal};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use store::Form;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/forms", post(create_form).get(list_forms))
        .route(
            "/forms/{id}",
            get(get_form).patch(update_form).delete(delete_form),
        )
}

#[derive(Deserialize)]
struct CreateForm {
    name: String,
    #[serde(default)]
    allowed_origins: Vec<String>,
    redirect_url: Option<String>,
    honeypot_field: Option<String>,
    captcha_secret: Option<String>,
    rate_limit_per_minute: Option<u32>,
}

/// Partial update; absent fields keep their value. The slug is immutable
/// and deliberately not accepted here.
#[derive(Deserialize)]
struct UpdateForm {
    name: Option<String>,
    active: Option<bool>,
    allowed_origins: Option<Vec<String>>,
    redirect_url: Option<Option<String>>,
    honeypot_field: Option<Option<String>>,
    captcha_secret: Option<Option<String>>,
    rate_limit_per_minute: Option<u32>,
}

/// Loads a form and enforces ownership. A foreign form is indistinguishable
/// from a missing one.
pub(crate) async fn owned_form(state: &ApiState, owner_id: &str, form_id: &str) -> Result<Form> {
    match state.store.form(form_id).await? {
        Some(form) if form.owner_id == owner_id => Ok(form),
        _ => Err(ApiError::NotFound),
    }
}

async fn create_form(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Json(body): Json<CreateForm>,
) -> Result<Json<Form>> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("form name is required".into()));
    }

    let mut form = Form::new(owner_id, body.name);
    form.allowed_origins = body.allowed_origins;
    form.redirect_url = body.redirect_url;
    form.honeypot_field = body.honeypot_field;
    form.captcha_secret = body.captcha_secret;
    if let Some(limit) = body.rate_limit_per_minute {
        form.rate_limit_per_minute = limit;
    }

    let form = state.store.create_form(form).await?;
    tracing::info!(form_id = %form.id, slug = %form.slug, "form created");
    Ok(Json(form))
}

async fn list_forms(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
) -> Result<Json<Vec<Form>>> {
    Ok(Json(state.store.forms_by_owner(&owner_id).await?))
}

async fn get_form(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Form>> {
    Ok(Json(owned_form(&state, &owner_id, &id).await?))
}

async fn update_form(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(id): Path<String>,
    Json(body): Json<UpdateForm>,
) -> Result<Json<Form>> {
    let mut form = owned_form(&state, &owner_id, &id).await?;

    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("form name is required".into()));
        }
        form.name = name;
    }
    if let Some(active) = body.active {
        form.active = active;
    }
    if let Some(allowed_origins) = body.allowed_origins {
        form.allowed_origins = allowed_origins;
    }
    if let Some(redirect_url) = body.redirect_url {
        form.redirect_url = redirect_url;
    }
    if let Some(honeypot_field) = body.honeypot_field {
        form.honeypot_field = honeypot_field;
    }
    if let Some(captcha_secret) = body.captcha_secret {
        form.captcha_secret = captcha_secret;
    }
    if let Some(limit) = body.rate_limit_per_minute {
        form.rate_limit_per_minute = limit;
    }

    Ok(Json(state.store.update_form(form).await?))
}

async fn delete_form(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    owned_form(&state, &owner_id, &id).await?;
    state.store.delete_form(&id).await?;
    tracing::info!(form_id = %id, "form deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}
