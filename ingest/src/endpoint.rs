//! Public submission endpoint: `POST /f/{slug}` and its CORS preflight.
//!
//! The request walks a strict sequence of checks (resolve, origin, rate,
//! quota, parse, honeypot, captcha), any of which can short-circuit to a
//! terminal response. Once the submission is persisted, integration dispatch
//! is handed to a background task so the HTTP response is never delayed by
//! downstream deliveries.

use crate::body::{self, insert_flat};
use crate::captcha::{self, CaptchaVerifier};
use crate::cors;
use crate::errors::IngestError;
use crate::metrics_defs::{
    HONEYPOT_DROPS, RATE_LIMITED, SUBMISSIONS_ACCEPTED, SUBMISSIONS_REJECTED,
};
use crate::rate_limit::FixedWindowLimiter;
use axum::extract::{ConnectInfo, FromRequest, Multipart, Path, Request, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::{Json, Router};
use dispatch::Dispatcher;
use http::HeaderMap;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde_json::{Map, Value, json};
use shared::counter;
use shared::http::client_ip;
use std::net::SocketAddr;
use std::sync::Arc;
use store::{Form, RequestMeta, Store, StoreError, Submission};

/// Largest body the endpoint will buffer.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct IngestState {
    pub store: Arc<dyn Store>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub captcha: Arc<CaptchaVerifier>,
    pub dispatcher: Dispatcher,
}

pub fn router(state: IngestState) -> Router {
    Router::new()
        .route("/f/{slug}", post(submit).options(preflight))
        .with_state(state)
}

async fn submit(
    State(state): State<IngestState>,
    Path(slug): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    let headers = req.headers().clone();
    let origin = cors::request_origin(&headers);

    // Step 1: resolve. Inactive forms are indistinguishable from unknown
    // slugs.
    let form = match state.store.form_by_slug(&slug).await {
        Ok(Some(form)) if form.active => form,
        Ok(_) => {
            let mut response = IngestError::FormNotFound.into_response();
            cors::apply_cors(&mut response, origin.as_deref(), None);
            return response;
        }
        Err(e) => {
            let mut response = IngestError::from(e).into_response();
            cors::apply_cors(&mut response, origin.as_deref(), None);
            return response;
        }
    };

    let allowed_origins =
        (!form.allowed_origins.is_empty()).then(|| form.allowed_origins.clone());

    let mut response = match handle_submission(&state, form, &headers, peer, req).await {
        Ok(response) => response,
        Err(error) => {
            counter!(SUBMISSIONS_REJECTED).increment(1);
            error.into_response()
        }
    };
    cors::apply_cors(&mut response, origin.as_deref(), allowed_origins.as_deref());
    response
}

/// Steps 2-10 of the submission state machine. The form has already been
/// resolved and is known to be active.
async fn handle_submission(
    state: &IngestState,
    form: Form,
    headers: &HeaderMap,
    peer: SocketAddr,
    req: Request,
) -> Result<Response, IngestError> {
    // Step 2: origin. Only enforced when the form declares an allow-list
    // and the request actually carries an Origin header.
    if !form.allowed_origins.is_empty()
        && let Some(origin) = cors::request_origin(headers)
        && !form.allowed_origins.contains(&origin)
    {
        return Err(IngestError::OriginNotAllowed);
    }

    // Step 3: per-(form, client) rate window
    let ip = client_ip(headers, peer);
    let decision = state
        .limiter
        .check(&format!("{}:{}", form.id, ip), form.rate_limit_per_minute);
    if !decision.allowed {
        counter!(RATE_LIMITED).increment(1);
        return Err(IngestError::RateLimited {
            retry_after_secs: decision.retry_after_secs(),
        });
    }

    // Step 4: monthly quota with lazy-reset-aware read. The write side
    // (consume_quota below) applies the reset atomically.
    let month = store::current_month();
    let owner = state
        .store
        .owner(&form.owner_id)
        .await?
        .ok_or(StoreError::NotFound("owner"))?;
    if owner.effective_used(&month) >= owner.monthly_limit {
        return Err(IngestError::QuotaExceeded);
    }

    // Step 5: content-type-driven body parse
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let wants_json = wants_json(headers, content_type.as_deref());
    let mut payload = read_payload(content_type.as_deref(), req).await?;

    // Step 6: honeypot. Bots get the normal success response but nothing is
    // persisted and nothing dispatched.
    if let Some(honeypot) = &form.honeypot_field
        && field_is_filled(payload.get(honeypot.as_str()))
    {
        counter!(HONEYPOT_DROPS).increment(1);
        tracing::debug!(form_id = %form.id, "honeypot field filled, dropping submission");
        return Ok(success_response(&form, wants_json));
    }

    // Step 7: captcha. Token fields are stripped from the stored payload
    // regardless of outcome.
    if let Some(secret) = &form.captcha_secret {
        let token = captcha::extract_token(&payload);
        captcha::strip_tokens(&mut payload);
        let Some(token) = token else {
            return Err(IngestError::CaptchaMissing);
        };
        if !state.captcha.verify(secret, &token).await {
            return Err(IngestError::CaptchaFailed);
        }
    }

    // Step 8: persist and count against the owner's month
    if let Some(honeypot) = &form.honeypot_field {
        payload.remove(honeypot.as_str());
    }
    let meta = RequestMeta {
        client_ip: ip.to_string(),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        origin: cors::request_origin(headers),
    };
    let submission = state
        .store
        .create_submission(Submission::new(&form, Value::Object(payload), meta))
        .await?;
    state.store.consume_quota(&form.owner_id, &month).await?;
    counter!(SUBMISSIONS_ACCEPTED).increment(1);

    // Step 9: fire-and-forget dispatch. The task owns its error boundary;
    // nothing past this point can affect the response.
    let dispatcher = state.dispatcher.clone();
    let dispatch_form = form.clone();
    let dispatch_submission = submission.clone();
    tokio::spawn(async move {
        dispatcher
            .dispatch(&dispatch_form, &dispatch_submission)
            .await;
    });

    // Step 10
    Ok(success_response(&form, wants_json))
}

async fn preflight(
    State(state): State<IngestState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    let origin = cors::request_origin(&headers);
    let allowed_origins = match state.store.form_by_slug(&slug).await {
        Ok(Some(form)) if !form.allowed_origins.is_empty() => Some(form.allowed_origins),
        _ => None,
    };
    cors::preflight_response(origin.as_deref(), allowed_origins.as_deref())
}

async fn read_payload(
    content_type: Option<&str>,
    req: Request,
) -> Result<Map<String, Value>, IngestError> {
    let is_multipart = content_type
        .map(|c| c.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if is_multipart {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| IngestError::MalformedBody(e.to_string()))?;
        read_multipart(multipart).await
    } else {
        let bytes = axum::body::to_bytes(req.into_body(), BODY_LIMIT)
            .await
            .map_err(|e| IngestError::MalformedBody(e.to_string()))?;
        body::parse_bytes(content_type, &bytes)
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<Map<String, Value>, IngestError> {
    let mut map = Map::new();
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| IngestError::MalformedBody(e.to_string()))?;
        let Some(field) = field else { break };
        let Some(name) = field.name().map(String::from) else {
            continue;
        };

        if let Some(file_name) = field.file_name().map(String::from) {
            // Uploads are not stored; a placeholder records that a file
            // arrived under this field.
            insert_flat(&mut map, &name, Value::String(format!("[file: {file_name}]")));
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| IngestError::MalformedBody(e.to_string()))?;
            insert_flat(&mut map, &name, Value::String(text));
        }
    }
    Ok(map)
}

/// A caller that signals JSON (via Accept or by sending JSON) gets the JSON
/// body even when the form configures a redirect.
fn wants_json(headers: &HeaderMap, content_type: Option<&str>) -> bool {
    let accepts_json = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false);
    let sent_json = content_type
        .map(|c| c.starts_with("application/json"))
        .unwrap_or(false);
    accepts_json || sent_json
}

fn field_is_filled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn success_response(form: &Form, wants_json: bool) -> Response {
    match form.redirect_url.as_deref() {
        Some(redirect) if !wants_json => Redirect::to(redirect).into_response(),
        _ => Json(json!({ "success": true })).into_response(),
    }
}
