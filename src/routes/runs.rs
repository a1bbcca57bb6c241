use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use sqlx::types::Json as Jsonb;
use uuid::Uuid;

use super::{ApiResult, Body, Id};
use crate::{
    app::AppState,
    auth::Caller,
    error::ApiError,
    lifecycle::{required_text, Field},
    models::*,
    policy::{self, Access, Standing},
};

pub(super) async fn start_run(
    State(state): State<AppState>,
    caller: Caller,
    Id(activity_id): Id<Uuid>,
) -> ApiResult<(StatusCode, Json<ActivityRun>)> {
    let store = state.store.as_ref();
    let (activity, _, standing) = policy::activity(store, &caller, activity_id, Access::Read).await?;
    if standing != Standing::Enrolled {
        return Err(ApiError::forbidden("only enrolled students can start an activity"));
    }

    let run = ActivityRun {
        id: Uuid::new_v4(),
        activity_id: activity.id,
        student_id: caller.id,
        status: RunStatus::Created,
        messages: Jsonb(Vec::new()),
        started_at: Utc::now(),
        finished_at: None,
        duration_seconds: None,
    };
    let run = store.insert_run(&run).await?;
    tracing::info!(run_id = %run.id, activity_id = %activity_id, student_id = %caller.id, "run started");
    Ok((StatusCode::CREATED, Json(run)))
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    caller: Caller,
    Id(activity_id): Id<Uuid>,
) -> ApiResult<Json<Vec<ActivityRun>>> {
    let store = state.store.as_ref();
    let (_, _, standing) = policy::activity(store, &caller, activity_id, Access::Read).await?;
    let runs = store
        .runs_for_activity(activity_id)
        .await?
        .into_iter()
        .filter(|r| policy::authorize(r, &caller, standing, Access::Read).is_ok())
        .collect();
    Ok(Json(runs))
}

pub(super) async fn get_run(
    State(state): State<AppState>,
    caller: Caller,
    Id(run_id): Id<Uuid>,
) -> ApiResult<Json<ActivityRun>> {
    let (run, _, _) = policy::run(state.store.as_ref(), &caller, run_id, Access::Read).await?;
    Ok(Json(run))
}

pub(super) async fn append_message(
    State(state): State<AppState>,
    caller: Caller,
    Id(run_id): Id<Uuid>,
    Body(req): Body<AppendMessageReq>,
) -> ApiResult<Json<ActivityRun>> {
    let store = state.store.as_ref();
    let (mut run, _, _) = policy::run(store, &caller, run_id, Access::Write).await?;
    if !run.status.can_become(RunStatus::InProgress) {
        return Err(ApiError::validation("run is already completed"));
    }

    run.messages.0.push(ChatTurn {
        role: req.role,
        content: required_text(Field::Message, &req.content).map_err(ApiError::Validation)?,
        timestamp: Utc::now(),
    });
    run.status = RunStatus::InProgress;
    Ok(Json(store.update_run(&run).await?))
}

pub(super) async fn complete_run(
    State(state): State<AppState>,
    caller: Caller,
    Id(run_id): Id<Uuid>,
) -> ApiResult<Json<ActivityRun>> {
    let store = state.store.as_ref();
    let (mut run, _, _) = policy::run(store, &caller, run_id, Access::Write).await?;
    if !run.status.can_become(RunStatus::Completed) {
        return Err(ApiError::validation("run is already completed"));
    }

    let now = Utc::now();
    run.status = RunStatus::Completed;
    run.finished_at = Some(now);
    run.duration_seconds = Some((now - run.started_at).num_seconds().max(0));
    let run = store.update_run(&run).await?;
    tracing::info!(run_id = %run.id, turns = run.messages.len(), "run completed");
    Ok(Json(run))
}

#[cfg(test)]
mod tests {
    use super::super::harness::TestApp;
    use crate::models::Role;
    use http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn student_run_lifecycle() {
        let app = TestApp::new();
        let teacher = app.user(Role::Teacher, "Ms. Rivera").await;
        let student = app.user(Role::Student, "Sam").await;
        let course = app.course(teacher).await;
        app.enroll(teacher, &course, student).await;
        let activity = app.activity(teacher, &course, "published").await;

        let (status, run) = app
            .post(&format!("/api/activities/{activity}/runs"), student, json!({}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(run["status"], "created");
        let run_id = run["id"].as_str().unwrap().to_string();

        let (status, run) = app
            .post(
                &format!("/api/runs/{run_id}/messages"),
                student,
                json!({ "role": "user", "content": "Is x equal to 2?" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["status"], "in_progress");
        assert_eq!(run["messages"][0]["content"], "Is x equal to 2?");

        let (status, run) = app
            .post(&format!("/api/runs/{run_id}/complete"), student, json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["status"], "completed");
        assert!(run["finished_at"].is_string());
        assert!(run["duration_seconds"].as_i64().unwrap() >= 0);

        let (status, body) = app
            .post(
                &format!("/api/runs/{run_id}/messages"),
                student,
                json!({ "role": "user", "content": "one more" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "run is already completed");

        // The teacher can read the transcript but not write to it.
        let (status, _) = app.get(&format!("/api/runs/{run_id}"), teacher).await;
        assert_eq!(status, StatusCode::OK);
        let (_, runs) = app.get(&format!("/api/activities/{activity}/runs"), teacher).await;
        assert_eq!(runs.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn classmates_cannot_touch_each_others_runs() {
        let app = TestApp::new();
        let teacher = app.user(Role::Teacher, "Ms. Rivera").await;
        let sam = app.user(Role::Student, "Sam").await;
        let kim = app.user(Role::Student, "Kim").await;
        let course = app.course(teacher).await;
        app.enroll(teacher, &course, sam).await;
        app.enroll(teacher, &course, kim).await;
        let activity = app.activity(teacher, &course, "active").await;

        let (_, run) = app
            .post(&format!("/api/activities/{activity}/runs"), sam, json!({}))
            .await;
        let run_id = run["id"].as_str().unwrap();

        let (status, _) = app.get(&format!("/api/runs/{run_id}"), kim).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app
            .post(&format!("/api/runs/{run_id}/complete"), kim, json!({}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, kims) = app.get(&format!("/api/activities/{activity}/runs"), kim).await;
        assert!(kims.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn drafts_cannot_be_started() {
        let app = TestApp::new();
        let teacher = app.user(Role::Teacher, "Ms. Rivera").await;
        let student = app.user(Role::Student, "Sam").await;
        let course = app.course(teacher).await;
        app.enroll(teacher, &course, student).await;
        let activity = app.activity(teacher, &course, "draft").await;

        let (status, _) = app
            .post(&format!("/api/activities/{activity}/runs"), student, json!({}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .post(&format!("/api/activities/{activity}/runs"), teacher, json!({}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
