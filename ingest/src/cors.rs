//! CORS headers for the public submission endpoint.
//!
//! Forms are meant to be embedded anywhere, so the permissive default is
//! `*`; a form with an origin allow-list echoes the caller's origin only
//! when it is a member. Headers are attached to every response, success or
//! error, and a dedicated preflight responder answers `OPTIONS` with a
//! 24-hour cache.

use axum::response::Response;
use http::header::{HeaderValue, ORIGIN};
use http::{HeaderMap, StatusCode};

pub const ALLOWED_METHODS: &str = "POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Accept, Origin";
pub const PREFLIGHT_MAX_AGE: &str = "86400";

pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// The `Access-Control-Allow-Origin` value for a request: echo the caller's
/// origin when the form's allow-list admits it (or no list is configured),
/// otherwise fall back to `*`.
fn allow_origin_value(origin: Option<&str>, allowed_origins: Option<&[String]>) -> HeaderValue {
    let echo = match (origin, allowed_origins) {
        (Some(origin), Some(list)) if !list.is_empty() => {
            list.iter().any(|allowed| allowed == origin)
        }
        (Some(_), _) => true,
        (None, _) => false,
    };

    match origin {
        Some(origin) if echo => {
            HeaderValue::from_str(origin).unwrap_or(HeaderValue::from_static("*"))
        }
        _ => HeaderValue::from_static("*"),
    }
}

/// Attaches CORS headers to an outgoing response.
pub fn apply_cors(
    response: &mut Response,
    origin: Option<&str>,
    allowed_origins: Option<&[String]>,
) {
    let headers = response.headers_mut();
    headers.insert(
        "access-control-allow-origin",
        allow_origin_value(origin, allowed_origins),
    );
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
}

/// Builds the 204 preflight response.
pub fn preflight_response(
    origin: Option<&str>,
    allowed_origins: Option<&[String]>,
) -> Response {
    let mut response = Response::new(axum::body::Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    apply_cors(&mut response, origin, allowed_origins);
    response.headers_mut().insert(
        "access-control-max-age",
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_allow_list_echoes_any_origin() {
        assert_eq!(
            allow_origin_value(Some("https://anywhere.example"), None),
            "https://anywhere.example"
        );
        assert_eq!(
            allow_origin_value(Some("https://anywhere.example"), Some(&[])),
            "https://anywhere.example"
        );
    }

    #[test]
    fn test_allow_list_gates_echo() {
        let list = vec!["https://good.example".to_string()];

        assert_eq!(
            allow_origin_value(Some("https://good.example"), Some(&list)),
            "https://good.example"
        );
        assert_eq!(
            allow_origin_value(Some("https://evil.example"), Some(&list)),
            "*"
        );
    }

    #[test]
    fn test_no_origin_header_falls_back_to_wildcard() {
        assert_eq!(allow_origin_value(None, None), "*");
    }

    #[test]
    fn test_preflight_shape() {
        let response = preflight_response(Some("https://a.example"), None);

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "https://a.example");
        assert_eq!(headers["access-control-allow-methods"], ALLOWED_METHODS);
        assert_eq!(headers["access-control-max-age"], PREFLIGHT_MAX_AGE);
    }
}
