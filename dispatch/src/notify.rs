use crate::orchestrator::DispatchFailure;
use async_trait::async_trait;
use store::{Form, Owner};

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Call contract for the notification/audit sink.
///
/// The sink itself (notification records, failure emails) lives outside this
/// pipeline; the orchestrator invokes it exactly once per dispatch that had
/// at least one failure, and swallows delivery errors: a notification
/// problem must never affect the already-completed submission.
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    async fn notify_failures(
        &self,
        owner: &Owner,
        form: &Form,
        failures: &[DispatchFailure],
    ) -> Result<(), NotifyError>;
}

/// Default sink used when no external notification system is wired up.
pub struct LogNotifier;

#[async_trait]
impl FailureNotifier for LogNotifier {
    async fn notify_failures(
        &self,
        owner: &Owner,
        form: &Form,
        failures: &[DispatchFailure],
    ) -> Result<(), NotifyError> {
        for failure in failures {
            tracing::warn!(
                owner = %owner.id,
                form_id = %form.id,
                integration = %failure.integration_name,
                kind = %failure.kind,
                "integration failed: {}",
                failure.message
            );
        }
        Ok(())
    }
}
