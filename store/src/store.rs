use crate::types::{Form, Integration, IntegrationLog, Owner, Submission};
use async_trait::async_trait;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// One page of a listing, newest first.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// The persistence seam.
///
/// The pipeline treats storage as an external document store: four
/// collections (forms, submissions, integrations, integration_logs) plus the
/// owner quota state, keyed by opaque identifiers. Engine internals are out
/// of scope; `MemoryStore` is the in-process implementation used by tests
/// and single-node deployments.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_form(&self, form: Form) -> Result<Form>;
    async fn form(&self, id: &str) -> Result<Option<Form>>;
    async fn form_by_slug(&self, slug: &str) -> Result<Option<Form>>;
    async fn forms_by_owner(&self, owner_id: &str) -> Result<Vec<Form>>;
    /// Full-record replacement. The slug is immutable; an update that tries
    /// to change it is rejected by the management layer before it gets here.
    async fn update_form(&self, form: Form) -> Result<Form>;
    /// Deletes a form and cascades to its submissions, integrations, and
    /// their logs.
    async fn delete_form(&self, id: &str) -> Result<()>;

    async fn owner(&self, id: &str) -> Result<Option<Owner>>;
    async fn upsert_owner(&self, owner: Owner) -> Result<()>;
    /// Atomically applies the lazy monthly reset and increments the owner's
    /// counter, in one operation: if the stored month marker differs from
    /// `month`, the counter restarts at 1 under the new marker; otherwise it
    /// increments. Returns the post-increment count.
    ///
    /// Keeping reset and increment in a single store operation is what
    /// prevents two first-of-month submissions from both resetting and
    /// losing an increment.
    async fn consume_quota(&self, owner_id: &str, month: &str) -> Result<u64>;

    /// Persists a submission and increments the owning form's counter.
    async fn create_submission(&self, submission: Submission) -> Result<Submission>;
    async fn submission(&self, id: &str) -> Result<Option<Submission>>;
    async fn submissions_by_form(
        &self,
        form_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Submission>>;

    /// Creates or replaces the integration for the (form, kind) pair. The
    /// existing record's id is preserved on replace.
    async fn upsert_integration(&self, integration: Integration) -> Result<Integration>;
    async fn integration(&self, id: &str) -> Result<Option<Integration>>;
    async fn integrations_by_form(&self, form_id: &str) -> Result<Vec<Integration>>;
    async fn update_integration(&self, integration: Integration) -> Result<Integration>;
    async fn delete_integration(&self, id: &str) -> Result<()>;

    async fn append_log(&self, log: IntegrationLog) -> Result<()>;
    async fn logs_by_submission(&self, submission_id: &str) -> Result<Vec<IntegrationLog>>;
}
