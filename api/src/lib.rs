//! Owner-facing management surface.
//!
//! A thin collaborator around the core pipeline: CRUD on forms and
//! integrations, submission listing, and audit log lookup. Integration
//! configs are validated by the handler registry and encrypted by the codec
//! before they are persisted; no read endpoint ever returns a decrypted
//! config.
//!
//! Authentication is out of scope; the authenticated principal arrives as
//! an `X-Owner-Id` header installed by the surrounding web stack.

pub mod errors;
pub mod forms;
pub mod integrations;
pub mod submissions;
#[cfg(test)]
pub mod testutils;

use axum::Router;
use axum::extract::FromRequestParts;
use dispatch::{ConfigCodec, HandlerLookup};
use errors::ApiError;
use http::request::Parts;
use std::sync::Arc;
use store::Store;

pub const OWNER_HEADER: &str = "x-owner-id";

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn Store>,
    pub codec: ConfigCodec,
    pub registry: Arc<dyn HandlerLookup>,
}

/// The authenticated principal, as established by the surrounding stack.
pub struct OwnerPrincipal(pub String);

impl<S> FromRequestParts<S> for OwnerPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| OwnerPrincipal(v.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .merge(forms::routes())
        .merge(integrations::routes())
        .merge(submissions::routes())
        .with_state(state)
}
