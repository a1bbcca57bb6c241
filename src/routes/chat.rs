use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiResult, Body};
use crate::{
    app::AppState,
    auth::Caller,
    error::ApiError,
    lifecycle::{required_text, Field},
    llm::{CompletionRequest, CHAT_SAMPLING},
    policy::{self, Access},
    tutor::{self, HistoryTurn, Lesson},
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct ChatReq {
    activity_id: Uuid,
    message: String,
    #[serde(default)]
    conversation_history: Vec<HistoryTurn>,
}

#[derive(Serialize, Debug)]
pub(super) struct ChatRes {
    success: bool,
    response: String,
}

pub(super) async fn chat(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<ChatReq>,
) -> ApiResult<Json<ChatRes>> {
    let store = state.store.as_ref();
    let message = required_text(Field::Message, &req.message).map_err(ApiError::Validation)?;

    let (activity, course, _) = policy::activity(store, &caller, req.activity_id, Access::Read).await?;
    let teacher = store.profile(course.teacher_id).await?;
    let teacher_name = teacher.as_ref().map_or("your teacher", |p| p.display_name.as_str());

    let system = tutor::system_instruction(&Lesson {
        course: &course,
        activity: &activity,
        teacher_name,
    });
    let messages =
        tutor::conversation(system, &req.conversation_history, &message).map_err(ApiError::Validation)?;

    tracing::info!(
        activity_id = %activity.id,
        user_id = %caller.id,
        history = req.conversation_history.len(),
        forwarded = messages.len(),
        "tutoring chat"
    );
    let reply = state
        .model
        .complete(CompletionRequest { messages, sampling: CHAT_SAMPLING })
        .await?;

    Ok(Json(ChatRes {
        success: true,
        response: tutor::clean_reply(&reply),
    }))
}
