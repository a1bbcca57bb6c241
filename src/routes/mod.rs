use axum::{
    extract::{FromRequest, FromRequestParts},
    routing::{delete, get, post},
    Router,
};

use crate::{app::AppState, error::ApiError};

mod activities;
mod assessments;
mod chat;
mod courses;
mod dashboard;
mod profile;
mod runs;

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body whose rejections use the service's error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Body<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Id<T>(pub T);

pub fn router(state: AppState) -> Router {
    Router::new()
        // identity
        .route(
            "/api/profile",
            get(profile::get_profile)
                .post(profile::create_profile)
                .patch(profile::update_profile),
        )
        // courses + enrollments
        .route("/api/courses", get(courses::list_courses).post(courses::create_course))
        .route(
            "/api/courses/:course_id",
            get(courses::get_course)
                .patch(courses::update_course)
                .delete(courses::delete_course),
        )
        .route(
            "/api/courses/:course_id/enrollments",
            get(courses::list_enrollments).post(courses::enroll_student),
        )
        .route(
            "/api/courses/:course_id/enrollments/:student_id",
            delete(courses::unenroll_student),
        )
        // activities
        .route(
            "/api/courses/:course_id/activities",
            get(activities::list_activities).post(activities::create_activity),
        )
        .route(
            "/api/activities/:activity_id",
            get(activities::get_activity)
                .patch(activities::update_activity)
                .delete(activities::delete_activity),
        )
        // runs
        .route(
            "/api/activities/:activity_id/runs",
            get(runs::list_runs).post(runs::start_run),
        )
        .route("/api/runs/:run_id", get(runs::get_run))
        .route("/api/runs/:run_id/messages", post(runs::append_message))
        .route("/api/runs/:run_id/complete", post(runs::complete_run))
        .route("/api/runs/:run_id/assessment", get(assessments::get_assessment))
        // AI handlers
        .route("/api/chat", post(chat::chat))
        .route("/api/assessments", post(assessments::create_assessment))
        .route("/api/dashboard", get(dashboard::dashboard))
        .with_state(state)
}
