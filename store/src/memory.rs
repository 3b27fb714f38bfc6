use crate::store::{Page, Result, Store, StoreError};
use crate::types::{Form, Integration, IntegrationLog, Owner, Submission};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct Collections {
    forms: HashMap<String, Form>,
    owners: HashMap<String, Owner>,
    submissions: HashMap<String, Submission>,
    integrations: HashMap<String, Integration>,
    logs: Vec<IntegrationLog>,
}

/// In-process document store.
///
/// All mutations run under one lock, which is what gives `consume_quota` and
/// `create_submission` their increment-in-place semantics under concurrent
/// load.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_form(&self, form: Form) -> Result<Form> {
        let mut inner = self.inner.lock();
        if inner.forms.values().any(|f| f.slug == form.slug) {
            return Err(StoreError::DuplicateSlug(form.slug));
        }
        inner.forms.insert(form.id.clone(), form.clone());
        Ok(form)
    }

    async fn form(&self, id: &str) -> Result<Option<Form>> {
        Ok(self.inner.lock().forms.get(id).cloned())
    }

    async fn form_by_slug(&self, slug: &str) -> Result<Option<Form>> {
        Ok(self
            .inner
            .lock()
            .forms
            .values()
            .find(|f| f.slug == slug)
            .cloned())
    }

    async fn forms_by_owner(&self, owner_id: &str) -> Result<Vec<Form>> {
        let mut forms: Vec<Form> = self
            .inner
            .lock()
            .forms
            .values()
            .filter(|f| f.owner_id == owner_id)
            .cloned()
            .collect();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(forms)
    }

    async fn update_form(&self, form: Form) -> Result<Form> {
        let mut inner = self.inner.lock();
        if !inner.forms.contains_key(&form.id) {
            return Err(StoreError::NotFound("form"));
        }
        inner.forms.insert(form.id.clone(), form.clone());
        Ok(form)
    }

    async fn delete_form(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner
            .forms
            .remove(id)
            .ok_or(StoreError::NotFound("form"))?;

        let submission_ids: Vec<String> = inner
            .submissions
            .values()
            .filter(|s| s.form_id == id)
            .map(|s| s.id.clone())
            .collect();
        inner.submissions.retain(|_, s| s.form_id != id);
        inner.integrations.retain(|_, i| i.form_id != id);
        inner
            .logs
            .retain(|l| !submission_ids.contains(&l.submission_id));
        Ok(())
    }

    async fn owner(&self, id: &str) -> Result<Option<Owner>> {
        Ok(self.inner.lock().owners.get(id).cloned())
    }

    async fn upsert_owner(&self, owner: Owner) -> Result<()> {
        self.inner.lock().owners.insert(owner.id.clone(), owner);
        Ok(())
    }

    async fn consume_quota(&self, owner_id: &str, month: &str) -> Result<u64> {
        let mut inner = self.inner.lock();
        let owner = inner
            .owners
            .get_mut(owner_id)
            .ok_or(StoreError::NotFound("owner"))?;

        if owner.usage_month != month {
            owner.usage_month = month.to_string();
            owner.monthly_used = 1;
        } else {
            owner.monthly_used += 1;
        }
        Ok(owner.monthly_used)
    }

    async fn create_submission(&self, submission: Submission) -> Result<Submission> {
        let mut inner = self.inner.lock();
        let form = inner
            .forms
            .get_mut(&submission.form_id)
            .ok_or(StoreError::NotFound("form"))?;
        form.submission_count += 1;
        inner
            .submissions
            .insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }

    async fn submission(&self, id: &str) -> Result<Option<Submission>> {
        Ok(self.inner.lock().submissions.get(id).cloned())
    }

    async fn submissions_by_form(
        &self,
        form_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Submission>> {
        let inner = self.inner.lock();
        let mut items: Vec<Submission> = inner
            .submissions
            .values()
            .filter(|s| s.form_id == form_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = items.len();
        let items = items.into_iter().skip(offset).take(limit).collect();
        Ok(Page { items, total })
    }

    async fn upsert_integration(&self, integration: Integration) -> Result<Integration> {
        let mut inner = self.inner.lock();
        // One integration per (form, kind); replacing keeps the original id.
        let existing_id = inner
            .integrations
            .values()
            .find(|i| i.form_id == integration.form_id && i.kind == integration.kind)
            .map(|i| i.id.clone());

        let mut integration = integration;
        if let Some(id) = existing_id {
            integration.id = id;
        }
        inner
            .integrations
            .insert(integration.id.clone(), integration.clone());
        Ok(integration)
    }

    async fn integration(&self, id: &str) -> Result<Option<Integration>> {
        Ok(self.inner.lock().integrations.get(id).cloned())
    }

    async fn integrations_by_form(&self, form_id: &str) -> Result<Vec<Integration>> {
        let mut items: Vec<Integration> = self
            .inner
            .lock()
            .integrations
            .values()
            .filter(|i| i.form_id == form_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn update_integration(&self, integration: Integration) -> Result<Integration> {
        let mut inner = self.inner.lock();
        if !inner.integrations.contains_key(&integration.id) {
            return Err(StoreError::NotFound("integration"));
        }
        inner
            .integrations
            .insert(integration.id.clone(), integration.clone());
        Ok(integration)
    }

    async fn delete_integration(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner
            .integrations
            .remove(id)
            .ok_or(StoreError::NotFound("integration"))?;
        Ok(())
    }

    async fn append_log(&self, log: IntegrationLog) -> Result<()> {
        self.inner.lock().logs.push(log);
        Ok(())
    }

    async fn logs_by_submission(&self, submission_id: &str) -> Result<Vec<IntegrationLog>> {
        Ok(self
            .inner
            .lock()
            .logs
            .iter()
            .filter(|l| l.submission_id == submission_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntegrationKind, LogStatus, RequestMeta};
    use serde_json::json;
    use std::sync::Arc;

    fn owner(id: &str) -> Owner {
        Owner {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            monthly_limit: 100,
            monthly_used: 0,
            usage_month: "2026-08".into(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let store = MemoryStore::new();
        let form = Form::new("o1", "contact");
        let mut clash = Form::new("o1", "other");
        clash.slug = form.slug.clone();

        store.create_form(form).await.unwrap();
        assert!(matches!(
            store.create_form(clash).await,
            Err(StoreError::DuplicateSlug(_))
        ));
    }

    #[tokio::test]
    async fn test_consume_quota_lazy_reset() {
        let store = MemoryStore::new();
        let mut o = owner("o1");
        o.monthly_used = 99;
        o.usage_month = "2026-07".into();
        store.upsert_owner(o).await.unwrap();

        // First submission of the new month resets to 1 instead of
        // continuing from the prior month.
        assert_eq!(store.consume_quota("o1", "2026-08").await.unwrap(), 1);
        assert_eq!(store.consume_quota("o1", "2026-08").await.unwrap(), 2);

        let o = store.owner("o1").await.unwrap().unwrap();
        assert_eq!(o.usage_month, "2026-08");
        assert_eq!(o.monthly_used, 2);
    }

    #[tokio::test]
    async fn test_consume_quota_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_owner(owner("o1")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.consume_quota("o1", "2026-08").await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let o = store.owner("o1").await.unwrap().unwrap();
        assert_eq!(o.monthly_used, 50);
    }

    #[tokio::test]
    async fn test_create_submission_increments_form_counter() {
        let store = MemoryStore::new();
        let form = store.create_form(Form::new("o1", "contact")).await.unwrap();

        let submission = Submission::new(&form, json!({"email": "a@b.c"}), RequestMeta::default());
        store.create_submission(submission).await.unwrap();

        let form = store.form(&form.id).await.unwrap().unwrap();
        assert_eq!(form.submission_count, 1);
    }

    #[tokio::test]
    async fn test_upsert_integration_replaces_by_form_and_kind() {
        let store = MemoryStore::new();
        let form = store.create_form(Form::new("o1", "contact")).await.unwrap();

        let first = store
            .upsert_integration(Integration::new(
                &form.id,
                IntegrationKind::Webhook,
                "hook v1",
                "blob1".into(),
            ))
            .await
            .unwrap();
        let second = store
            .upsert_integration(Integration::new(
                &form.id,
                IntegrationKind::Webhook,
                "hook v2",
                "blob2".into(),
            ))
            .await
            .unwrap();

        // Same composite key: record replaced, id preserved.
        assert_eq!(first.id, second.id);
        let all = store.integrations_by_form(&form.id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "hook v2");

        // A different kind gets its own row.
        store
            .upsert_integration(Integration::new(
                &form.id,
                IntegrationKind::Email,
                "mail",
                "blob3".into(),
            ))
            .await
            .unwrap();
        assert_eq!(store.integrations_by_form(&form.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_form_cascades() {
        let store = MemoryStore::new();
        let form = store.create_form(Form::new("o1", "contact")).await.unwrap();
        let submission = store
            .create_submission(Submission::new(
                &form,
                json!({"a": 1}),
                RequestMeta::default(),
            ))
            .await
            .unwrap();
        let integration = store
            .upsert_integration(Integration::new(
                &form.id,
                IntegrationKind::Email,
                "mail",
                "blob".into(),
            ))
            .await
            .unwrap();
        store
            .append_log(IntegrationLog::new(
                &integration.id,
                &submission.id,
                LogStatus::Success,
                "sent",
            ))
            .await
            .unwrap();

        store.delete_form(&form.id).await.unwrap();

        assert!(store.form(&form.id).await.unwrap().is_none());
        assert!(store.submission(&submission.id).await.unwrap().is_none());
        assert!(store.integration(&integration.id).await.unwrap().is_none());
        assert!(
            store
                .logs_by_submission(&submission.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_submissions_pagination_newest_first() {
        let store = MemoryStore::new();
        let form = store.create_form(Form::new("o1", "contact")).await.unwrap();

        for i in 0..5 {
            let mut s = Submission::new(&form, json!({ "n": i }), RequestMeta::default());
            // Distinct timestamps so ordering is deterministic.
            s.created_at += chrono::Duration::seconds(i);
            store.create_submission(s).await.unwrap();
        }

        let page = store.submissions_by_form(&form.id, 1, 2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].data["n"], 3);
        assert_eq!(page.items[1].data["n"], 2);
    }
}
