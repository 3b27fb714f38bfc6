use dispatch::spreadsheet::GoogleOauth;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

/// Environment fallback for the config encryption key, so the secret can be
/// kept out of the config file.
pub const ENCRYPTION_KEY_ENV: &str = "FORMDROP_ENCRYPTION_KEY";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("port cannot be 0")]
    InvalidPort,

    #[error("rate limit window must be at least 1 second")]
    InvalidRateWindow,

    #[error(
        "no encryption key configured (set encryption_key or the {ENCRYPTION_KEY_ENV} environment variable)"
    )]
    MissingEncryptionKey,
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EmailConfig {
    /// Account-level transactional email API key.
    pub api_key: Option<String>,
    /// Default from address for integrations that rely on the account
    /// default.
    pub from: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_window_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Public submission listener
    pub listener: Listener,
    /// Owner-facing management listener
    pub management_listener: Listener,
    /// Base64-encoded 32-byte AES key; falls back to the
    /// `FORMDROP_ENCRYPTION_KEY` environment variable when absent.
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub email: EmailConfig,
    /// OAuth client used to redeem spreadsheet refresh tokens.
    pub google: Option<GoogleOauth>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.management_listener.validate()?;
        if self.rate_limit.window_secs == 0 {
            return Err(ValidationError::InvalidRateWindow);
        }
        Ok(())
    }

    /// The encryption key, from the file or the environment. Key length is
    /// checked by the codec at startup.
    pub fn resolve_encryption_key(&self) -> Result<String, ValidationError> {
        self.encryption_key
            .clone()
            .or_else(|| std::env::var(ENCRYPTION_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or(ValidationError::MissingEncryptionKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
            listener:
                host: 0.0.0.0
                port: 8080
            management_listener:
                host: 127.0.0.1
                port: 8081
            encryption_key: QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVowMTIzNDU=
            email:
                api_key: re_123
                from: forms@example.com
            google:
                client_id: cid.apps.googleusercontent.com
                client_secret: shhh
            rate_limit:
                window_secs: 30
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        config.validate().expect("valid config");

        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.management_listener.port, 8081);
        assert_eq!(config.email.api_key.as_deref(), Some("re_123"));
        assert_eq!(config.rate_limit.window_secs, 30);
        // Unset fields fall back to defaults
        assert_eq!(config.rate_limit.sweep_interval_secs, 300);
        assert!(config.logging.is_none());
        assert!(config.resolve_encryption_key().is_ok());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let yaml = r#"
            listener: {host: 0.0.0.0, port: 8080}
            management_listener: {host: 127.0.0.1, port: 8081}
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        config.validate().expect("valid config");

        assert!(config.email.api_key.is_none());
        assert!(config.google.is_none());
        assert_eq!(config.rate_limit.window_secs, 60);
    }

    #[test]
    fn test_validation_errors() {
        let yaml = r#"
            listener: {host: 0.0.0.0, port: 0}
            management_listener: {host: 127.0.0.1, port: 8081}
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPort
        ));

        let yaml = r#"
            listener: {host: 0.0.0.0, port: 8080}
            management_listener: {host: 127.0.0.1, port: 8081}
            rate_limit: {window_secs: 0}
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidRateWindow
        ));
    }

    #[test]
    fn test_parse_errors() {
        // Missing required listener
        let tmp = write_tmp_file("management_listener: {host: a, port: 1}");
        assert!(matches!(
            Config::from_file(tmp.path()).unwrap_err(),
            ConfigError::ParseError(_)
        ));

        // Invalid port type
        let tmp = write_tmp_file(
            r#"
            listener: {host: 0.0.0.0, port: not_a_number}
            management_listener: {host: 127.0.0.1, port: 8081}
            "#,
        );
        assert!(Config::from_file(tmp.path()).is_err());
    }
}
