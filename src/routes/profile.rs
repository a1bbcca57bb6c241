use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use super::{ApiResult, Body};
use crate::{
    app::AppState,
    auth::Caller,
    error::ApiError,
    lifecycle::{optional_text, required_text, Field},
    models::*,
};

pub(super) async fn get_profile(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Profile>> {
    let profile = state
        .store
        .profile(caller.id)
        .await?
        .ok_or(ApiError::NotFound("profile"))?;
    Ok(Json(profile))
}

pub(super) async fn create_profile(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<CreateProfileReq>,
) -> ApiResult<(StatusCode, Json<Profile>)> {
    if state.store.profile(caller.id).await?.is_some() {
        return Err(ApiError::validation("profile already exists"));
    }
    let now = Utc::now();
    let profile = Profile {
        id: caller.id,
        display_name: required_text(Field::DisplayName, &req.display_name).map_err(ApiError::Validation)?,
        role: req.role,
        avatar_url: None,
        created_at: now,
        updated_at: now,
    };
    let profile = state.store.insert_profile(&profile).await?;
    tracing::info!(user_id = %profile.id, role = ?profile.role, "profile created");
    Ok((StatusCode::CREATED, Json(profile)))
}

pub(super) async fn update_profile(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<UpdateProfileReq>,
) -> ApiResult<Json<Profile>> {
    let mut profile = state
        .store
        .profile(caller.id)
        .await?
        .ok_or(ApiError::NotFound("profile"))?;

    if let Some(name) = req.display_name {
        profile.display_name = required_text(Field::DisplayName, &name).map_err(ApiError::Validation)?;
    }
    if let Some(avatar) = req.avatar_url {
        profile.avatar_url = optional_text(Field::AvatarUrl, avatar.as_deref()).map_err(ApiError::Validation)?;
    }
    profile.updated_at = Utc::now();
    Ok(Json(state.store.update_profile(&profile).await?))
}
