pub mod body;
pub mod captcha;
pub mod cors;
pub mod endpoint;
pub mod errors;
pub mod metrics_defs;
pub mod rate_limit;

pub use captcha::CaptchaVerifier;
pub use endpoint::{IngestState, router};
pub use errors::IngestError;
pub use rate_limit::{FixedWindowLimiter, RateDecision};
