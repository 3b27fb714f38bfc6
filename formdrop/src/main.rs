mod config;

use api::ApiState;
use clap::Parser;
use config::Config;
use dispatch::email::{EmailDefaults, EmailHandler};
use dispatch::spreadsheet::SpreadsheetHandler;
use dispatch::webhook::WebhookHandler;
use dispatch::{ConfigCodec, Dispatcher, HandlerRegistry, LogNotifier};
use ingest::rate_limit::spawn_sweeper;
use ingest::{CaptchaVerifier, FixedWindowLimiter, IngestState};
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::{MetricDef, MetricType};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use store::{MemoryStore, Store};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "formdrop", about = "Form submission backend")]
enum CliCommand {
    /// Run the public ingestion endpoint and the management API
    Serve {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(thiserror::Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Validation(#[from] config::ValidationError),
    #[error("invalid encryption key: {0}")]
    Codec(#[from] dispatch::CodecError),
    #[error("could not install metrics exporter: {0}")]
    Metrics(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let cli = CliCommand::parse();

    match cli {
        CliCommand::Serve { config } => {
            if let Err(e) = serve(&config).await {
                eprintln!("formdrop failed to start: {e}");
                std::process::exit(1);
            }
        }
    }
}

async fn serve(config_path: &Path) -> Result<(), StartupError> {
    let config = Config::from_file(config_path)?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Keep the guard alive for the lifetime of the process
    let _sentry_guard = config.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.clone(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    if let Some(metrics_config) = &config.metrics {
        install_metrics(metrics_config)?;
    }
    describe_metrics();

    // Fail fast: an absent or mis-sized key must stop startup, not surface
    // later as undecryptable configs.
    let key = config.resolve_encryption_key()?;
    let codec = ConfigCodec::from_base64(&key)?;

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

    let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_secs(
        config.rate_limit.window_secs,
    )));
    spawn_sweeper(
        limiter.clone(),
        Duration::from_secs(config.rate_limit.sweep_interval_secs),
    );

    let registry = Arc::new(HandlerRegistry::new(
        EmailHandler::new(EmailDefaults {
            api_key: config.email.api_key.clone(),
            from: config.email.from.clone(),
        }),
        WebhookHandler::new(),
        SpreadsheetHandler::new(config.google.clone()),
    ));
    let dispatcher = Dispatcher::new(
        store.clone(),
        codec.clone(),
        registry.clone(),
        Arc::new(LogNotifier),
    );

    let ingest_state = IngestState {
        store: store.clone(),
        limiter,
        captcha: Arc::new(CaptchaVerifier::new()),
        dispatcher,
    };
    let api_state = ApiState {
        store,
        codec,
        registry,
    };

    let public_listener =
        TcpListener::bind((config.listener.host.as_str(), config.listener.port)).await?;
    let management_listener = TcpListener::bind((
        config.management_listener.host.as_str(),
        config.management_listener.port,
    ))
    .await?;

    tracing::info!(
        public = %format!("{}:{}", config.listener.host, config.listener.port),
        management = %format!(
            "{}:{}",
            config.management_listener.host, config.management_listener.port
        ),
        "formdrop listening"
    );

    let public = axum::serve(
        public_listener,
        ingest::router(ingest_state).into_make_service_with_connect_info::<SocketAddr>(),
    );
    let management = axum::serve(management_listener, api::router(api_state));

    // Either server exiting takes the process down
    tokio::select! {
        result = async { public.await } => result?,
        result = async { management.await } => result?,
    }
    Ok(())
}

fn install_metrics(config: &config::MetricsConfig) -> Result<(), StartupError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some("formdrop"))
        .map_err(|e| StartupError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| StartupError::Metrics(e.to_string()))?;
    Ok(())
}

/// Registers descriptions for every metric the services emit.
fn describe_metrics() {
    let all = ingest::metrics_defs::ALL_METRICS
        .iter()
        .chain(dispatch::metrics_defs::ALL_METRICS);

    for def in all {
        register_metric(def);
    }
}

fn register_metric(def: &MetricDef) {
    match def.metric_type {
        MetricType::Counter => metrics::describe_counter!(def.name, def.description),
        MetricType::Gauge => metrics::describe_gauge!(def.name, def.description),
        MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
    }
}
