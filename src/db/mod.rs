use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub type Db = Pool<Postgres>;

pub async fn connect(url: &str) -> Result<Db, sqlx::Error> {
    Pool::<Postgres>::connect(url).await
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("referenced {0} does not exist")]
    MissingReference(&'static str),

    #[error("run is already completed")]
    RunCompleted,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Row access for every table the service owns.
///
/// Writers take a fully built row and return what was stored. Updates replace
/// the whole row, so concurrent writers resolve as last-write-wins, except that
/// a completed run is never overwritten ([`StoreError::RunCompleted`]).
#[async_trait]
pub trait Store: Send + Sync {
    async fn profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;
    async fn insert_profile(&self, profile: &Profile) -> StoreResult<Profile>;
    async fn update_profile(&self, profile: &Profile) -> StoreResult<Profile>;

    async fn course(&self, id: Uuid) -> StoreResult<Option<Course>>;
    async fn insert_course(&self, course: &Course) -> StoreResult<Course>;
    async fn update_course(&self, course: &Course) -> StoreResult<Course>;
    async fn delete_course(&self, id: Uuid) -> StoreResult<()>;
    async fn courses_taught_by(&self, teacher_id: Uuid) -> StoreResult<Vec<Course>>;
    async fn courses_enrolled_in(&self, student_id: Uuid) -> StoreResult<Vec<Course>>;

    async fn enrollment(&self, course_id: Uuid, student_id: Uuid) -> StoreResult<Option<Enrollment>>;
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> StoreResult<Enrollment>;
    async fn delete_enrollment(&self, course_id: Uuid, student_id: Uuid) -> StoreResult<bool>;
    async fn enrollments_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Enrollment>>;

    async fn activity(&self, id: Uuid) -> StoreResult<Option<Activity>>;
    async fn insert_activity(&self, activity: &Activity) -> StoreResult<Activity>;
    async fn update_activity(&self, activity: &Activity) -> StoreResult<Activity>;
    async fn delete_activity(&self, id: Uuid) -> StoreResult<()>;
    async fn activities_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Activity>>;

    async fn run(&self, id: Uuid) -> StoreResult<Option<ActivityRun>>;
    async fn insert_run(&self, run: &ActivityRun) -> StoreResult<ActivityRun>;
    async fn update_run(&self, run: &ActivityRun) -> StoreResult<ActivityRun>;
    async fn runs_for_activity(&self, activity_id: Uuid) -> StoreResult<Vec<ActivityRun>>;
    async fn runs_for_student(&self, student_id: Uuid) -> StoreResult<Vec<ActivityRun>>;

    async fn assessment_for_run(&self, run_id: Uuid) -> StoreResult<Option<Assessment>>;
    async fn insert_assessment(&self, assessment: &Assessment) -> StoreResult<Assessment>;
}
