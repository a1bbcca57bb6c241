use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as Jsonb;
use uuid::Uuid;

use super::{ApiResult, Body, Id};
use crate::{
    app::AppState,
    auth::Caller,
    error::ApiError,
    grading::{self, ActivityData, TranscriptEntry},
    llm::{CompletionRequest, ModelMessage, ModelRole, ASSESSMENT_SAMPLING},
    models::*,
    policy::{self, Access},
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct AssessReq {
    run_id: Uuid,
    #[serde(default)]
    chat_messages: Vec<TranscriptEntry>,
    activity_data: ActivityData,
}

#[derive(Serialize, Debug)]
pub(super) struct AssessRes {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    assessment: Option<Assessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

const ASSESSOR_ROLE: &str = "You assess tutoring sessions for teachers. Answer with one JSON object only.";

fn stored_transcript(run: &ActivityRun) -> Vec<TranscriptEntry> {
    run.messages
        .iter()
        .map(|turn| TranscriptEntry {
            content: turn.content.clone(),
            kind: match turn.role {
                TurnRole::User => "user".into(),
                TurnRole::Assistant => "ai".into(),
            },
            timestamp: Some(turn.timestamp.to_rfc3339()),
        })
        .collect()
}

pub(super) async fn create_assessment(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<AssessReq>,
) -> ApiResult<Json<AssessRes>> {
    if grading::is_exempt(&req.activity_data.title, &state.assessment_exempt_pattern) {
        tracing::info!(run_id = %req.run_id, title = %req.activity_data.title, "assessment skipped for exempt activity");
        return Ok(Json(AssessRes {
            success: true,
            assessment: None,
            message: Some("assessment skipped for teacher persona activity".into()),
        }));
    }

    let store = state.store.as_ref();
    let run = store.run(req.run_id).await?.ok_or(ApiError::NotFound("run"))?;
    let activity = store
        .activity(run.activity_id)
        .await?
        .ok_or_else(|| ApiError::Persistence("run has no activity".into()))?;
    let course = store
        .course(activity.course_id)
        .await?
        .ok_or_else(|| ApiError::Persistence("activity has no course".into()))?;
    let standing = policy::standing(store, &caller, &course).await?;
    policy::authorize(&run, &caller, standing, Access::Read)?;

    if run.status != RunStatus::Completed {
        return Err(ApiError::validation("run is not completed"));
    }
    if let Some(existing) = store.assessment_for_run(run.id).await? {
        return Ok(Json(AssessRes {
            success: true,
            assessment: Some(existing),
            message: Some("already assessed".into()),
        }));
    }

    let transcript = if req.chat_messages.is_empty() {
        stored_transcript(&run)
    } else {
        req.chat_messages
    };
    let prompt = grading::assessment_prompt(&req.activity_data, &transcript);
    tracing::info!(run_id = %run.id, turns = transcript.len(), "requesting assessment");
    let reply = state
        .model
        .complete(CompletionRequest {
            messages: vec![
                ModelMessage::new(ModelRole::System, ASSESSOR_ROLE),
                ModelMessage::new(ModelRole::User, prompt),
            ],
            sampling: ASSESSMENT_SAMPLING,
        })
        .await?;

    let graded = grading::parse_grading(&reply).map_err(|error| {
        tracing::error!(run_id = %run.id, error = %error, "unusable assessment from model");
        ApiError::Upstream(error.to_string())
    })?;

    let assessment = Assessment {
        id: Uuid::new_v4(),
        run_id: run.id,
        activity_id: activity.id,
        course_id: course.id,
        student_id: run.student_id,
        soft_skills: Jsonb(graded.soft_skills),
        content_areas: Jsonb(graded.content_areas),
        feedback: graded.feedback,
        recommendations: graded.recommendations,
        created_at: Utc::now(),
    };
    let assessment = store.insert_assessment(&assessment).await?;
    tracing::info!(assessment_id = %assessment.id, run_id = %run.id, "assessment stored");

    Ok(Json(AssessRes {
        success: true,
        assessment: Some(assessment),
        message: None,
    }))
}

pub(super) async fn get_assessment(
    State(state): State<AppState>,
    caller: Caller,
    Id(run_id): Id<Uuid>,
) -> ApiResult<Json<Assessment>> {
    let store = state.store.as_ref();
    let (_, _, course) = policy::run(store, &caller, run_id, Access::Read).await?;
    let assessment = store
        .assessment_for_run(run_id)
        .await?
        .ok_or(ApiError::NotFound("assessment"))?;
    let standing = policy::standing(store, &caller, &course).await?;
    policy::authorize(&assessment, &caller, standing, Access::Read)?;
    Ok(Json(assessment))
}
