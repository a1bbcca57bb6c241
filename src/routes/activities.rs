use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use uuid::Uuid;

use super::{ApiResult, Body, Id};
use crate::{
    app::AppState,
    auth::Caller,
    error::ApiError,
    lifecycle::{optional_text, required_text, Field},
    models::*,
    policy::{self, Access},
};

fn text(field: Field, value: &str) -> Result<String, ApiError> {
    required_text(field, value).map_err(ApiError::Validation)
}

fn label(value: Option<&str>) -> Result<Option<String>, ApiError> {
    optional_text(Field::Label, value).map_err(ApiError::Validation)
}

pub(super) async fn list_activities(
    State(state): State<AppState>,
    caller: Caller,
    Id(course_id): Id<Uuid>,
) -> ApiResult<Json<Vec<Activity>>> {
    let store = state.store.as_ref();
    let (_, standing) = policy::course(store, &caller, course_id, Access::Read).await?;
    let activities = store
        .activities_for_course(course_id)
        .await?
        .into_iter()
        .filter(|a| policy::authorize(a, &caller, standing, Access::Read).is_ok())
        .collect();
    Ok(Json(activities))
}

pub(super) async fn create_activity(
    State(state): State<AppState>,
    caller: Caller,
    Id(course_id): Id<Uuid>,
    Body(req): Body<CreateActivityReq>,
) -> ApiResult<(StatusCode, Json<Activity>)> {
    let store = state.store.as_ref();
    policy::course(store, &caller, course_id, Access::Write).await?;

    let now = Utc::now();
    let activity = Activity {
        id: Uuid::new_v4(),
        course_id,
        title: text(Field::Title, &req.title)?,
        goal: text(Field::Goal, &req.goal)?,
        content: text(Field::ActivityContent, &req.content)?,
        difficulty: label(req.difficulty.as_deref())?,
        length: label(req.length.as_deref())?,
        status: req.status.unwrap_or(ActivityStatus::Draft),
        created_at: now,
        updated_at: now,
    };
    let activity = store.insert_activity(&activity).await?;
    tracing::info!(activity_id = %activity.id, course_id = %course_id, status = ?activity.status, "activity created");
    Ok((StatusCode::CREATED, Json(activity)))
}

pub(super) async fn get_activity(
    State(state): State<AppState>,
    caller: Caller,
    Id(activity_id): Id<Uuid>,
) -> ApiResult<Json<Activity>> {
    let (activity, _, _) = policy::activity(state.store.as_ref(), &caller, activity_id, Access::Read).await?;
    Ok(Json(activity))
}

pub(super) async fn update_activity(
    State(state): State<AppState>,
    caller: Caller,
    Id(activity_id): Id<Uuid>,
    Body(req): Body<UpdateActivityReq>,
) -> ApiResult<Json<Activity>> {
    let store = state.store.as_ref();
    let (mut activity, _, _) = policy::activity(store, &caller, activity_id, Access::Write).await?;

    if let Some(title) = req.title {
        activity.title = text(Field::Title, &title)?;
    }
    if let Some(goal) = req.goal {
        activity.goal = text(Field::Goal, &goal)?;
    }
    if let Some(content) = req.content {
        activity.content = text(Field::ActivityContent, &content)?;
    }
    if let Some(difficulty) = req.difficulty {
        activity.difficulty = label(difficulty.as_deref())?;
    }
    if let Some(length) = req.length {
        activity.length = label(length.as_deref())?;
    }
    if let Some(status) = req.status {
        if !activity.status.can_become(status) {
            return Err(ApiError::validation(format!(
                "cannot move activity from {:?} to {:?}",
                activity.status, status
            )));
        }
        activity.status = status;
    }
    activity.updated_at = Utc::now();

    Ok(Json(store.update_activity(&activity).await?))
}

pub(super) async fn delete_activity(
    State(state): State<AppState>,
    caller: Caller,
    Id(activity_id): Id<Uuid>,
) -> ApiResult<StatusCode> {
    let store = state.store.as_ref();
    policy::activity(store, &caller, activity_id, Access::Write).await?;
    store.delete_activity(activity_id).await?;
    tracing::info!(activity_id = %activity_id, "activity deleted");
    Ok(StatusCode::NO_CONTENT)
}
