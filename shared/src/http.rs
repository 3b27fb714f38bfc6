use axum::Json;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, StatusCode};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};

/// Builds a JSON error response with the shape `{"error": message}`.
///
/// Submitters only ever see coarse messages built through this helper;
/// internal error detail stays in logs.
pub fn make_error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Resolves the client address for a request.
///
/// The first hop of `X-Forwarded-For` wins when present (the service is
/// expected to run behind a reverse proxy), otherwise the peer address of
/// the socket is used.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .unwrap_or_else(|| peer.ip())
}
