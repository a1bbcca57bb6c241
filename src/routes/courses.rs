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

pub(super) async fn list_courses(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<Course>>> {
    let store = state.store.as_ref();
    let profile = policy::profile_of(store, &caller).await?;
    let courses = match profile.role {
        Role::Teacher => store.courses_taught_by(caller.id).await?,
        Role::Student => store.courses_enrolled_in(caller.id).await?,
    };
    Ok(Json(courses))
}

pub(super) async fn create_course(
    State(state): State<AppState>,
    caller: Caller,
    Body(req): Body<CreateCourseReq>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    let store = state.store.as_ref();
    let profile = policy::profile_of(store, &caller).await?;
    if profile.role != Role::Teacher {
        return Err(ApiError::forbidden("only teachers can create courses"));
    }

    let now = Utc::now();
    let course = Course {
        id: Uuid::new_v4(),
        teacher_id: caller.id,
        title: text(Field::Title, &req.title)?,
        subject: text(Field::Subject, &req.subject)?,
        grade_level: text(Field::GradeLevel, &req.grade_level)?,
        description: optional_text(Field::Description, req.description.as_deref())
            .map_err(ApiError::Validation)?,
        created_at: now,
        updated_at: now,
    };
    let course = store.insert_course(&course).await?;
    tracing::info!(course_id = %course.id, teacher_id = %caller.id, "course created");
    Ok((StatusCode::CREATED, Json(course)))
}

pub(super) async fn get_course(
    State(state): State<AppState>,
    caller: Caller,
    Id(course_id): Id<Uuid>,
) -> ApiResult<Json<Course>> {
    let (course, _) = policy::course(state.store.as_ref(), &caller, course_id, Access::Read).await?;
    Ok(Json(course))
}

pub(super) async fn update_course(
    State(state): State<AppState>,
    caller: Caller,
    Id(course_id): Id<Uuid>,
    Body(req): Body<UpdateCourseReq>,
) -> ApiResult<Json<Course>> {
    let store = state.store.as_ref();
    let (mut course, _) = policy::course(store, &caller, course_id, Access::Write).await?;

    if let Some(title) = req.title {
        course.title = text(Field::Title, &title)?;
    }
    if let Some(subject) = req.subject {
        course.subject = text(Field::Subject, &subject)?;
    }
    if let Some(grade) = req.grade_level {
        course.grade_level = text(Field::GradeLevel, &grade)?;
    }
    if let Some(description) = req.description {
        course.description =
            optional_text(Field::Description, description.as_deref()).map_err(ApiError::Validation)?;
    }
    course.updated_at = Utc::now();

    Ok(Json(store.update_course(&course).await?))
}

pub(super) async fn delete_course(
    State(state): State<AppState>,
    caller: Caller,
    Id(course_id): Id<Uuid>,
) -> ApiResult<StatusCode> {
    let store = state.store.as_ref();
    policy::course(store, &caller, course_id, Access::Write).await?;
    store.delete_course(course_id).await?;
    tracing::info!(course_id = %course_id, "course deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_enrollments(
    State(state): State<AppState>,
    caller: Caller,
    Id(course_id): Id<Uuid>,
) -> ApiResult<Json<Vec<Enrollment>>> {
    let store = state.store.as_ref();
    policy::course(store, &caller, course_id, Access::Write).await?;
    Ok(Json(store.enrollments_for_course(course_id).await?))
}

pub(super) async fn enroll_student(
    State(state): State<AppState>,
    caller: Caller,
    Id(course_id): Id<Uuid>,
    Body(req): Body<EnrollReq>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    let store = state.store.as_ref();
    policy::course(store, &caller, course_id, Access::Write).await?;

    match store.profile(req.student_id).await? {
        Some(p) if p.role == Role::Student => {}
        _ => return Err(ApiError::validation("student_id does not name a student")),
    }
    if store.enrollment(course_id, req.student_id).await?.is_some() {
        return Err(ApiError::validation("student is already enrolled"));
    }

    let enrollment = Enrollment {
        course_id,
        student_id: req.student_id,
        enrolled_at: Utc::now(),
    };
    let enrollment = store.insert_enrollment(&enrollment).await?;
    tracing::info!(course_id = %course_id, student_id = %req.student_id, "student enrolled");
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub(super) async fn unenroll_student(
    State(state): State<AppState>,
    caller: Caller,
    Id((course_id, student_id)): Id<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let store = state.store.as_ref();
    let course = store.course(course_id).await?.ok_or(ApiError::NotFound("course"))?;
    // A student may always leave; anyone else needs the teacher's rights.
    if caller.id != student_id {
        let standing = policy::standing(store, &caller, &course).await?;
        policy::authorize(&course, &caller, standing, Access::Write)?;
    }
    if !store.delete_enrollment(course_id, student_id).await? {
        return Err(ApiError::NotFound("enrollment"));
    }
    Ok(StatusCode::NO_CONTENT)
}
