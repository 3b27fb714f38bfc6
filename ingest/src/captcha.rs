//! Per-form CAPTCHA verification.
//!
//! The provider is selected by a secret-prefix heuristic: hCaptcha secrets
//! start with `0x`, anything else is treated as a Google reCAPTCHA secret.
//! Tokens arrive under either of the two well-known response field names and
//! are always stripped from the stored payload, whatever the outcome.

use serde::Deserialize;
use serde_json::{Map, Value};

const HCAPTCHA_VERIFY_URL: &str = "https://api.hcaptcha.com/siteverify";
const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Field names a CAPTCHA widget may put its response token under.
pub const TOKEN_FIELDS: [&str; 2] = ["g-recaptcha-response", "h-captcha-response"];

#[derive(Deserialize)]
struct VerifyResponse {
    success: bool,
}

pub struct CaptchaVerifier {
    client: reqwest::Client,
    hcaptcha_url: String,
    recaptcha_url: String,
}

impl CaptchaVerifier {
    pub fn new() -> Self {
        CaptchaVerifier {
            client: reqwest::Client::new(),
            hcaptcha_url: HCAPTCHA_VERIFY_URL.to_string(),
            recaptcha_url: RECAPTCHA_VERIFY_URL.to_string(),
        }
    }

    pub fn with_endpoints(
        mut self,
        hcaptcha_url: impl Into<String>,
        recaptcha_url: impl Into<String>,
    ) -> Self {
        self.hcaptcha_url = hcaptcha_url.into();
        self.recaptcha_url = recaptcha_url.into();
        self
    }

    /// Verifies a token against the provider matching the form's secret.
    /// Any transport or decode problem counts as a rejection; verification
    /// never fails open.
    pub async fn verify(&self, secret: &str, token: &str) -> bool {
        let url = if secret.starts_with("0x") {
            &self.hcaptcha_url
        } else {
            &self.recaptcha_url
        };

        let response = self
            .client
            .post(url)
            .form(&[("secret", secret), ("response", token)])
            .send()
            .await;

        match response {
            Ok(r) => match r.json::<VerifyResponse>().await {
                Ok(v) => v.success,
                Err(e) => {
                    tracing::warn!(error = %e, "captcha verification returned an unexpected body");
                    false
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "captcha verification request failed");
                false
            }
        }
    }
}

impl Default for CaptchaVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Pulls the first token out of the payload without modifying it.
pub fn extract_token(payload: &Map<String, Value>) -> Option<String> {
    TOKEN_FIELDS
        .iter()
        .find_map(|field| payload.get(*field))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Removes all token fields from the payload; they are never persisted.
pub fn strip_tokens(payload: &mut Map<String, Value>) {
    for field in TOKEN_FIELDS {
        payload.remove(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use serde_json::json;

    async fn spawn_verifier(succeed: bool) -> String {
        #[derive(Deserialize)]
        struct Params {
            secret: String,
            response: String,
        }

        let app = Router::new().route(
            "/siteverify",
            post(move |Form(params): Form<Params>| async move {
                assert!(!params.secret.is_empty());
                assert!(!params.response.is_empty());
                Json(json!({"success": succeed}))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/siteverify")
    }

    #[tokio::test]
    async fn test_verify_outcomes() {
        let ok = spawn_verifier(true).await;
        let verifier = CaptchaVerifier::new().with_endpoints(ok.clone(), ok);
        assert!(verifier.verify("0xsecret", "token").await);

        let no = spawn_verifier(false).await;
        let verifier = CaptchaVerifier::new().with_endpoints(no.clone(), no);
        assert!(!verifier.verify("secret", "token").await);
    }

    #[tokio::test]
    async fn test_unreachable_provider_fails_closed() {
        let verifier = CaptchaVerifier::new()
            .with_endpoints("http://127.0.0.1:1/siteverify", "http://127.0.0.1:1/siteverify");
        assert!(!verifier.verify("secret", "token").await);
    }

    #[test]
    fn test_token_extraction_and_strip() {
        let mut payload = Map::new();
        payload.insert("email".into(), json!("a@b.co"));
        payload.insert("h-captcha-response".into(), json!("tok-123"));

        assert_eq!(extract_token(&payload).as_deref(), Some("tok-123"));

        strip_tokens(&mut payload);
        assert!(!payload.contains_key("h-captcha-response"));
        assert!(payload.contains_key("email"));

        // Empty tokens count as missing
        let mut payload = Map::new();
        payload.insert("g-recaptcha-response".into(), json!(""));
        assert!(extract_token(&payload).is_none());
    }
}
