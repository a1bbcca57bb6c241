use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::*;

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    courses: Vec<Course>,
    enrollments: Vec<Enrollment>,
    activities: Vec<Activity>,
    runs: Vec<ActivityRun>,
    assessments: Vec<Assessment>,
}

impl Tables {
    fn drop_activity(&mut self, id: Uuid) {
        let runs: Vec<Uuid> = self
            .runs
            .iter()
            .filter(|r| r.activity_id == id)
            .map(|r| r.id)
            .collect();
        self.assessments.retain(|a| !runs.contains(&a.run_id));
        self.runs.retain(|r| r.activity_id != id);
        self.activities.retain(|a| a.id != id);
    }
}

/// Same contract as the Postgres store, foreign keys and cascades included.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assessment_count(&self) -> usize {
        self.tables.read().await.assessments.len()
    }
}

fn replace<T: Clone>(rows: &mut [T], row: &T, same: impl Fn(&T) -> bool) -> StoreResult<T> {
    let slot = rows
        .iter_mut()
        .find(|r| same(r))
        .ok_or(StoreError::Sqlx(sqlx::Error::RowNotFound))?;
    *slot = row.clone();
    Ok(row.clone())
}

#[async_trait]
impl Store for MemoryStore {
    async fn profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let t = self.tables.read().await;
        Ok(t.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> StoreResult<Profile> {
        let mut t = self.tables.write().await;
        t.profiles.push(profile.clone());
        Ok(profile.clone())
    }

    async fn update_profile(&self, profile: &Profile) -> StoreResult<Profile> {
        let mut t = self.tables.write().await;
        replace(&mut t.profiles, profile, |p| p.id == profile.id)
    }

    async fn course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        let t = self.tables.read().await;
        Ok(t.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_course(&self, course: &Course) -> StoreResult<Course> {
        let mut t = self.tables.write().await;
        if !t.profiles.iter().any(|p| p.id == course.teacher_id) {
            return Err(StoreError::MissingReference("teacher profile"));
        }
        t.courses.push(course.clone());
        Ok(course.clone())
    }

    async fn update_course(&self, course: &Course) -> StoreResult<Course> {
        let mut t = self.tables.write().await;
        replace(&mut t.courses, course, |c| c.id == course.id)
    }

    async fn delete_course(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let activities: Vec<Uuid> = t
            .activities
            .iter()
            .filter(|a| a.course_id == id)
            .map(|a| a.id)
            .collect();
        for activity in activities {
            t.drop_activity(activity);
        }
        t.enrollments.retain(|e| e.course_id != id);
        t.courses.retain(|c| c.id != id);
        Ok(())
    }

    async fn courses_taught_by(&self, teacher_id: Uuid) -> StoreResult<Vec<Course>> {
        let t = self.tables.read().await;
        Ok(t.courses
            .iter()
            .filter(|c| c.teacher_id == teacher_id)
            .cloned()
            .collect())
    }

    async fn courses_enrolled_in(&self, student_id: Uuid) -> StoreResult<Vec<Course>> {
        let t = self.tables.read().await;
        Ok(t.courses
            .iter()
            .filter(|c| {
                t.enrollments
                    .iter()
                    .any(|e| e.course_id == c.id && e.student_id == student_id)
            })
            .cloned()
            .collect())
    }

    async fn enrollment(&self, course_id: Uuid, student_id: Uuid) -> StoreResult<Option<Enrollment>> {
        let t = self.tables.read().await;
        Ok(t.enrollments
            .iter()
            .find(|e| e.course_id == course_id && e.student_id == student_id)
            .cloned())
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> StoreResult<Enrollment> {
        let mut t = self.tables.write().await;
        if !t.courses.iter().any(|c| c.id == enrollment.course_id)
            || !t.profiles.iter().any(|p| p.id == enrollment.student_id)
        {
            return Err(StoreError::MissingReference("course or student"));
        }
        t.enrollments.push(enrollment.clone());
        Ok(enrollment.clone())
    }

    async fn delete_enrollment(&self, course_id: Uuid, student_id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let before = t.enrollments.len();
        t.enrollments
            .retain(|e| !(e.course_id == course_id && e.student_id == student_id));
        Ok(t.enrollments.len() < before)
    }

    async fn enrollments_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        let t = self.tables.read().await;
        Ok(t.enrollments
            .iter()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn activity(&self, id: Uuid) -> StoreResult<Option<Activity>> {
        let t = self.tables.read().await;
        Ok(t.activities.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_activity(&self, activity: &Activity) -> StoreResult<Activity> {
        let mut t = self.tables.write().await;
        if !t.courses.iter().any(|c| c.id == activity.course_id) {
            return Err(StoreError::MissingReference("course"));
        }
        t.activities.push(activity.clone());
        Ok(activity.clone())
    }

    async fn update_activity(&self, activity: &Activity) -> StoreResult<Activity> {
        let mut t = self.tables.write().await;
        replace(&mut t.activities, activity, |a| a.id == activity.id)
    }

    async fn delete_activity(&self, id: Uuid) -> StoreResult<()> {
        self.tables.write().await.drop_activity(id);
        Ok(())
    }

    async fn activities_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Activity>> {
        let t = self.tables.read().await;
        Ok(t.activities
            .iter()
            .filter(|a| a.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn run(&self, id: Uuid) -> StoreResult<Option<ActivityRun>> {
        let t = self.tables.read().await;
        Ok(t.runs.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_run(&self, run: &ActivityRun) -> StoreResult<ActivityRun> {
        let mut t = self.tables.write().await;
        if !t.activities.iter().any(|a| a.id == run.activity_id) {
            return Err(StoreError::MissingReference("activity"));
        }
        t.runs.push(run.clone());
        Ok(run.clone())
    }

    async fn update_run(&self, run: &ActivityRun) -> StoreResult<ActivityRun> {
        let mut t = self.tables.write().await;
        replace(&mut t.runs, run, |r| r.id == run.id && r.status != RunStatus::Completed)
            .map_err(|_| StoreError::RunCompleted)
    }

    async fn runs_for_activity(&self, activity_id: Uuid) -> StoreResult<Vec<ActivityRun>> {
        let t = self.tables.read().await;
        let mut runs: Vec<ActivityRun> = t
            .runs
            .iter()
            .filter(|r| r.activity_id == activity_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn runs_for_student(&self, student_id: Uuid) -> StoreResult<Vec<ActivityRun>> {
        let t = self.tables.read().await;
        let mut runs: Vec<ActivityRun> = t
            .runs
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn assessment_for_run(&self, run_id: Uuid) -> StoreResult<Option<Assessment>> {
        let t = self.tables.read().await;
        Ok(t.assessments.iter().find(|a| a.run_id == run_id).cloned())
    }

    async fn insert_assessment(&self, assessment: &Assessment) -> StoreResult<Assessment> {
        let mut t = self.tables.write().await;
        if !t.runs.iter().any(|r| r.id == assessment.run_id) {
            return Err(StoreError::MissingReference("run"));
        }
        t.assessments.push(assessment.clone());
        Ok(assessment.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    async fn seeded() -> (MemoryStore, ActivityRun) {
        let store = MemoryStore::new();
        let now = Utc::now();
        let teacher = Uuid::new_v4();
        store
            .insert_profile(&Profile {
                id: teacher,
                display_name: "Ms. Rivera".into(),
                role: Role::Teacher,
                avatar_url: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let course = store
            .insert_course(&Course {
                id: Uuid::new_v4(),
                teacher_id: teacher,
                title: "Algebra I".into(),
                subject: "Mathematics".into(),
                grade_level: "8".into(),
                description: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let activity = store
            .insert_activity(&Activity {
                id: Uuid::new_v4(),
                course_id: course.id,
                title: "Linear equations".into(),
                goal: "Solve for x".into(),
                content: "2x + 3 = 7".into(),
                difficulty: None,
                length: None,
                status: ActivityStatus::Published,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let run = store
            .insert_run(&ActivityRun {
                id: Uuid::new_v4(),
                activity_id: activity.id,
                student_id: Uuid::new_v4(),
                status: RunStatus::InProgress,
                messages: Json(vec![]),
                started_at: now,
                finished_at: None,
                duration_seconds: None,
            })
            .await
            .unwrap();
        (store, run)
    }

    #[tokio::test]
    async fn stale_write_cannot_reopen_completed_run() {
        let (store, run) = seeded().await;
        let stale = run.clone();

        let mut done = run;
        done.status = RunStatus::Completed;
        done.finished_at = Some(Utc::now());
        done.duration_seconds = Some(0);
        store.update_run(&done).await.unwrap();

        let mut late = stale;
        late.messages.0.push(ChatTurn {
            role: TurnRole::User,
            content: "one more".into(),
            timestamp: Utc::now(),
        });
        let err = store.update_run(&late).await.unwrap_err();
        assert!(matches!(err, StoreError::RunCompleted));

        let stored = store.run(done.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert!(stored.finished_at.is_some());
        assert!(stored.messages.is_empty());
    }
}
