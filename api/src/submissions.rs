use crate::errors::{ApiError, Result};
use crate::forms::owned_form;
use crate::{ApiState, OwnerPrincipal};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use store::{IntegrationLog, Submission};

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/forms/{id}/submissions", get(list_submissions))
        .route("/submissions/{id}/logs", get(list_logs))
}

#[derive(Deserialize)]
struct Pagination {
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SubmissionPage {
    items: Vec<Submission>,
    total: usize,
    offset: usize,
}

async fn list_submissions(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(form_id): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<SubmissionPage>> {
    let form = owned_form(&state, &owner_id, &form_id).await?;

    let limit = pagination
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    let page = state
        .store
        .submissions_by_form(&form.id, pagination.offset, limit)
        .await?;

    Ok(Json(SubmissionPage {
        items: page.items,
        total: page.total,
        offset: pagination.offset,
    }))
}

async fn list_logs(
    State(state): State<ApiState>,
    OwnerPrincipal(owner_id): OwnerPrincipal,
    Path(submission_id): Path<String>,
) -> Result<Json<Vec<IntegrationLog>>> {
    let submission = state
        .store
        .submission(&submission_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    // Ownership runs through the submission's form
    owned_form(&state, &owner_id, &submission.form_id).await?;

    Ok(Json(state.store.logs_by_submission(&submission_id).await?))
}

#[cfg(test)]
mod tests {
    use crate::testutils::{spawn_api, test_state};
    use serde_json::{Value, json};
    use store::{Form, RequestMeta, Store};

    #[tokio::test]
    async fn test_pagination_and_ownership() {
        let (state, store) = test_state();
        let form = store.create_form(Form::new("o1", "Contact")).await.unwrap();
        for i in 0..7 {
            let mut s = store::Submission::new(&form, json!({ "n": i }), RequestMeta::default());
            s.created_at += chrono::Duration::seconds(i);
            store.create_submission(s).await.unwrap();
        }
        let base = spawn_api(state).await;
        let client = reqwest::Client::new();

        let page: Value = client
            .get(format!("{base}/forms/{}/submissions?offset=2&limit=3", form.id))
            .header(crate::OWNER_HEADER, "o1")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(page["total"], 7);
        assert_eq!(page["items"].as_array().unwrap().len(), 3);
        // Newest first: offset 2 of [6..0] is 4
        assert_eq!(page["items"][0]["data"]["n"], 4);

        // A different owner cannot see the form's submissions
        let response = client
            .get(format!("{base}/forms/{}/submissions", form.id))
            .header(crate::OWNER_HEADER, "other")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);

        // No principal header at all
        let response = client
            .get(format!("{base}/forms/{}/submissions", form.id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn test_logs_by_submission() {
        let (state, store) = test_state();
        let form = store.create_form(Form::new("o1", "Contact")).await.unwrap();
        let submission = store
            .create_submission(store::Submission::new(
                &form,
                json!({"a": 1}),
                RequestMeta::default(),
            ))
            .await
            .unwrap();
        store
            .append_log(store::IntegrationLog::new(
                "int-1",
                &submission.id,
                store::LogStatus::Failed,
                "remote said no",
            ))
            .await
            .unwrap();
        let base = spawn_api(state).await;

        let logs: Value = reqwest::Client::new()
            .get(format!("{base}/submissions/{}/logs", submission.id))
            .header(crate::OWNER_HEADER, "o1")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let logs = logs.as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["status"], "failed");
        assert_eq!(logs[0]["message"], "remote said no");
    }
}
