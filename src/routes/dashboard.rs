use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::ApiResult;
use crate::{app::AppState, auth::Caller, db::Store, models::*, policy};

#[derive(Serialize, Debug)]
pub(super) struct CourseSummary {
    #[serde(flatten)]
    course: Course,
    activity_count: usize,
    student_count: usize,
}

#[derive(Serialize, Debug)]
pub(super) struct ActivitySummary {
    #[serde(flatten)]
    activity: Activity,
    course_title: String,
    latest_run_status: Option<RunStatus>,
}

#[derive(Serialize, Debug)]
#[serde(tag = "role", rename_all = "snake_case")]
pub(super) enum Dashboard {
    Teacher {
        courses: Vec<CourseSummary>,
        total_courses: usize,
        total_activities: usize,
        total_students: usize,
    },
    Student {
        courses: Vec<Course>,
        activities: Vec<ActivitySummary>,
        completed_runs: usize,
    },
}

async fn teacher_view(store: &dyn Store, teacher_id: Uuid) -> ApiResult<Dashboard> {
    let mut courses = Vec::new();
    let mut students = HashSet::new();
    let mut total_activities = 0;
    for course in store.courses_taught_by(teacher_id).await? {
        let activity_count = store.activities_for_course(course.id).await?.len();
        let enrollments = store.enrollments_for_course(course.id).await?;
        total_activities += activity_count;
        students.extend(enrollments.iter().map(|e| e.student_id));
        courses.push(CourseSummary {
            course,
            activity_count,
            student_count: enrollments.len(),
        });
    }
    Ok(Dashboard::Teacher {
        total_courses: courses.len(),
        total_activities,
        total_students: students.len(),
        courses,
    })
}

async fn student_view(store: &dyn Store, student_id: Uuid) -> ApiResult<Dashboard> {
    let courses = store.courses_enrolled_in(student_id).await?;
    let runs = store.runs_for_student(student_id).await?;
    let completed_runs = runs.iter().filter(|r| r.status == RunStatus::Completed).count();

    // Runs arrive newest first, so the first one seen per activity wins.
    let mut latest: HashMap<Uuid, RunStatus> = HashMap::new();
    for run in &runs {
        latest.entry(run.activity_id).or_insert(run.status);
    }

    let mut activities = Vec::new();
    for course in &courses {
        for activity in store.activities_for_course(course.id).await? {
            if !activity.status.visible_to_students() {
                continue;
            }
            activities.push(ActivitySummary {
                latest_run_status: latest.get(&activity.id).copied(),
                course_title: course.title.clone(),
                activity,
            });
        }
    }
    Ok(Dashboard::Student {
        courses,
        activities,
        completed_runs,
    })
}

pub(super) async fn dashboard(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Dashboard>> {
    let store = state.store.as_ref();
    let profile = policy::profile_of(store, &caller).await?;
    let view = match profile.role {
        Role::Teacher => teacher_view(store, profile.id).await?,
        Role::Student => student_view(store, profile.id).await?,
    };
    Ok(Json(view))
}
