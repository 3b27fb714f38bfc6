//! Shared helpers for management API tests.

use crate::{ApiState, router};
use dispatch::email::{EmailDefaults, EmailHandler};
use dispatch::spreadsheet::SpreadsheetHandler;
use dispatch::webhook::WebhookHandler;
use dispatch::{ConfigCodec, HandlerRegistry};
use std::sync::Arc;
use store::MemoryStore;

pub fn test_codec() -> ConfigCodec {
    ConfigCodec::new([3u8; 32])
}

pub fn test_state() -> (ApiState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = ApiState {
        store: store.clone(),
        codec: test_codec(),
        registry: Arc::new(HandlerRegistry::new(
            EmailHandler::new(EmailDefaults::default()),
            WebhookHandler::new(),
            SpreadsheetHandler::new(None),
        )),
    };
    (state, store)
}

/// Serves the management router on an ephemeral port.
pub async fn spawn_api(state: ApiState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
