//! Concurrent fan-out of one submission across a form's enabled
//! integrations.
//!
//! Every integration runs independently; one integration's failure, timeout,
//! or panic never prevents a sibling from running or being logged. Exactly
//! one audit log row is written per (integration, submission) attempt, and
//! at most one aggregated failure notification is raised per dispatch.

use crate::codec::ConfigCodec;
use crate::handler::{DispatchContext, ExecuteOutcome, HandlerLookup};
use crate::metrics_defs::{FAILURE_NOTIFICATIONS, INTEGRATION_FAILURE, INTEGRATION_SUCCESS};
use crate::notify::FailureNotifier;
use serde_json::Value;
use shared::counter;
use std::collections::HashMap;
use std::sync::Arc;
use store::{Form, Integration, IntegrationKind, IntegrationLog, LogStatus, Store, Submission};
use tokio::task::JoinSet;

/// One failed integration, as reported to the owner notification.
#[derive(Clone, Debug)]
pub struct DispatchFailure {
    pub integration_id: String,
    pub integration_name: String,
    pub kind: IntegrationKind,
    pub message: String,
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn Store>,
    codec: ConfigCodec,
    handlers: Arc<dyn HandlerLookup>,
    notifier: Arc<dyn FailureNotifier>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        codec: ConfigCodec,
        handlers: Arc<dyn HandlerLookup>,
        notifier: Arc<dyn FailureNotifier>,
    ) -> Self {
        Dispatcher {
            store,
            codec,
            handlers,
            notifier,
        }
    }

    /// Runs all enabled integrations for one accepted submission.
    ///
    /// Intended to be spawned after the HTTP response is committed; nothing
    /// here can affect the response. All errors terminate inside this
    /// function.
    pub async fn dispatch(&self, form: &Form, submission: &Submission) {
        let integrations = match self.store.integrations_by_form(&form.id).await {
            Ok(integrations) => integrations,
            Err(e) => {
                tracing::error!(form_id = %form.id, error = %e, "could not load integrations");
                return;
            }
        };
        let enabled: Vec<Integration> =
            integrations.into_iter().filter(|i| i.enabled).collect();
        if enabled.is_empty() {
            return;
        }

        let ctx = Arc::new(DispatchContext::for_submission(form, submission));

        let mut join_set = JoinSet::new();
        // Task id -> integration identity, so a panicked task can still be
        // attributed and logged.
        let mut pending: HashMap<tokio::task::Id, (String, String, IntegrationKind)> =
            HashMap::new();

        for integration in enabled {
            let ctx = ctx.clone();
            let codec = self.codec.clone();
            let handlers = self.handlers.clone();

            let meta = (
                integration.id.clone(),
                integration.name.clone(),
                integration.kind,
            );
            let handle = join_set.spawn(async move {
                let outcome = match codec.decrypt_json::<Value>(&integration.encrypted_config) {
                    Ok(config) => {
                        match handlers.get(integration.kind).execute(&ctx, config).await {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                ExecuteOutcome::failure(format!("integration error: {e}"))
                            }
                        }
                    }
                    Err(e) => ExecuteOutcome::failure(format!(
                        "could not decrypt integration config: {e}"
                    )),
                };
                (integration, outcome)
            });
            pending.insert(handle.id(), meta);
        }

        let mut failures = Vec::new();

        while let Some(joined) = join_set.join_next_with_id().await {
            let (integration_id, integration_name, kind, outcome) = match joined {
                Ok((task_id, (integration, outcome))) => {
                    pending.remove(&task_id);
                    (integration.id, integration.name, integration.kind, outcome)
                }
                Err(join_error) => {
                    // A panicking handler is recorded exactly like a failed
                    // execution; siblings keep running.
                    let Some((id, name, kind)) = pending.remove(&join_error.id()) else {
                        tracing::error!(error = %join_error, "unattributable dispatch task failure");
                        continue;
                    };
                    let outcome =
                        ExecuteOutcome::failure(format!("integration task panicked: {join_error}"));
                    (id, name, kind, outcome)
                }
            };

            if outcome.success {
                counter!(INTEGRATION_SUCCESS).increment(1);
            } else {
                counter!(INTEGRATION_FAILURE).increment(1);
                tracing::warn!(
                    integration = %integration_name,
                    kind = %kind,
                    submission_id = %submission.id,
                    "integration failed: {}",
                    outcome.message
                );
                failures.push(DispatchFailure {
                    integration_id: integration_id.clone(),
                    integration_name: integration_name.clone(),
                    kind,
                    message: outcome.message.clone(),
                });
            }

            let status = if outcome.success {
                LogStatus::Success
            } else {
                LogStatus::Failed
            };
            let log =
                IntegrationLog::new(&integration_id, &submission.id, status, outcome.message);
            if let Err(e) = self.store.append_log(log).await {
                tracing::error!(
                    integration_id = %integration_id,
                    submission_id = %submission.id,
                    error = %e,
                    "could not write integration log"
                );
            }
        }

        if !failures.is_empty() {
            self.notify_owner(form, &failures).await;
        }
    }

    /// One aggregated notification per dispatch, regardless of how many
    /// integrations failed. Delivery problems are logged and swallowed.
    async fn notify_owner(&self, form: &Form, failures: &[DispatchFailure]) {
        let owner = match self.store.owner(&form.owner_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                tracing::error!(owner_id = %form.owner_id, "form owner missing, skipping notification");
                return;
            }
            Err(e) => {
                tracing::error!(owner_id = %form.owner_id, error = %e, "could not load form owner");
                return;
            }
        };

        counter!(FAILURE_NOTIFICATIONS).increment(1);
        if let Err(e) = self.notifier.notify_failures(&owner, form, failures).await {
            tracing::warn!(
                owner = %owner.id,
                form_id = %form.id,
                error = %e,
                "failure notification could not be delivered"
            );
        }
    }
}
