use async_trait::async_trait;
use sqlx::{query, query_as};
use uuid::Uuid;

use super::{Db, Store, StoreError, StoreResult};
use crate::models::*;

#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

// Foreign key failures on insert surface as a missing parent rather than a raw driver error.
fn parent_missing(parent: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_foreign_key_violation() {
                return StoreError::MissingReference(parent);
            }
        }
        StoreError::Sqlx(e)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(query_as::<_, Profile>("SELECT * FROM profiles WHERE id=$1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn insert_profile(&self, p: &Profile) -> StoreResult<Profile> {
        Ok(query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, display_name, role, avatar_url, created_at, updated_at)
            VALUES ($1,$2,$3,$4,$5,$6)
            RETURNING *
            "#,
        )
        .bind(p.id)
        .bind(&p.display_name)
        .bind(p.role)
        .bind(&p.avatar_url)
        .bind(p.created_at)
        .bind(p.updated_at)
        .fetch_one(&self.db)
        .await?)
    }

    async fn update_profile(&self, p: &Profile) -> StoreResult<Profile> {
        Ok(query_as::<_, Profile>(
            r#"
            UPDATE profiles SET display_name=$2, avatar_url=$3, updated_at=$4
            WHERE id=$1
            RETURNING *
            "#,
        )
        .bind(p.id)
        .bind(&p.display_name)
        .bind(&p.avatar_url)
        .bind(p.updated_at)
        .fetch_one(&self.db)
        .await?)
    }

    async fn course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(query_as::<_, Course>("SELECT * FROM courses WHERE id=$1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn insert_course(&self, c: &Course) -> StoreResult<Course> {
        query_as::<_, Course>(
            r#"
            INSERT INTO courses (id, teacher_id, title, subject, grade_level, description, created_at, updated_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            RETURNING *
            "#,
        )
        .bind(c.id)
        .bind(c.teacher_id)
        .bind(&c.title)
        .bind(&c.subject)
        .bind(&c.grade_level)
        .bind(&c.description)
        .bind(c.created_at)
        .bind(c.updated_at)
        .fetch_one(&self.db)
        .await
        .map_err(parent_missing("teacher profile"))
    }

    async fn update_course(&self, c: &Course) -> StoreResult<Course> {
        Ok(query_as::<_, Course>(
            r#"
            UPDATE courses SET title=$2, subject=$3, grade_level=$4, description=$5, updated_at=$6
            WHERE id=$1
            RETURNING *
            "#,
        )
        .bind(c.id)
        .bind(&c.title)
        .bind(&c.subject)
        .bind(&c.grade_level)
        .bind(&c.description)
        .bind(c.updated_at)
        .fetch_one(&self.db)
        .await?)
    }

    async fn delete_course(&self, id: Uuid) -> StoreResult<()> {
        query("DELETE FROM courses WHERE id=$1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn courses_taught_by(&self, teacher_id: Uuid) -> StoreResult<Vec<Course>> {
        Ok(
            query_as::<_, Course>("SELECT * FROM courses WHERE teacher_id=$1 ORDER BY created_at")
                .bind(teacher_id)
                .fetch_all(&self.db)
                .await?,
        )
    }

    async fn courses_enrolled_in(&self, student_id: Uuid) -> StoreResult<Vec<Course>> {
        Ok(query_as::<_, Course>(
            r#"
            SELECT c.* FROM courses c
            JOIN enrollments e ON e.course_id = c.id
            WHERE e.student_id=$1
            ORDER BY c.created_at
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn enrollment(&self, course_id: Uuid, student_id: Uuid) -> StoreResult<Option<Enrollment>> {
        Ok(query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE course_id=$1 AND student_id=$2",
        )
        .bind(course_id)
        .bind(student_id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn insert_enrollment(&self, e: &Enrollment) -> StoreResult<Enrollment> {
        query_as::<_, Enrollment>(
            r#"
            INSERT INTO enrollments (course_id, student_id, enrolled_at)
            VALUES ($1,$2,$3)
            RETURNING *
            "#,
        )
        .bind(e.course_id)
        .bind(e.student_id)
        .bind(e.enrolled_at)
        .fetch_one(&self.db)
        .await
        .map_err(parent_missing("course or student"))
    }

    async fn delete_enrollment(&self, course_id: Uuid, student_id: Uuid) -> StoreResult<bool> {
        let done = query("DELETE FROM enrollments WHERE course_id=$1 AND student_id=$2")
            .bind(course_id)
            .bind(student_id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn enrollments_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        Ok(query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE course_id=$1 ORDER BY enrolled_at",
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn activity(&self, id: Uuid) -> StoreResult<Option<Activity>> {
        Ok(query_as::<_, Activity>("SELECT * FROM activities WHERE id=$1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn insert_activity(&self, a: &Activity) -> StoreResult<Activity> {
        query_as::<_, Activity>(
            r#"
            INSERT INTO activities (id, course_id, title, goal, content, difficulty, length, status, created_at, updated_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            RETURNING *
            "#,
        )
        .bind(a.id)
        .bind(a.course_id)
        .bind(&a.title)
        .bind(&a.goal)
        .bind(&a.content)
        .bind(&a.difficulty)
        .bind(&a.length)
        .bind(a.status)
        .bind(a.created_at)
        .bind(a.updated_at)
        .fetch_one(&self.db)
        .await
        .map_err(parent_missing("course"))
    }

    async fn update_activity(&self, a: &Activity) -> StoreResult<Activity> {
        Ok(query_as::<_, Activity>(
            r#"
            UPDATE activities
            SET title=$2, goal=$3, content=$4, difficulty=$5, length=$6, status=$7, updated_at=$8
            WHERE id=$1
            RETURNING *
            "#,
        )
        .bind(a.id)
        .bind(&a.title)
        .bind(&a.goal)
        .bind(&a.content)
        .bind(&a.difficulty)
        .bind(&a.length)
        .bind(a.status)
        .bind(a.updated_at)
        .fetch_one(&self.db)
        .await?)
    }

    async fn delete_activity(&self, id: Uuid) -> StoreResult<()> {
        query("DELETE FROM activities WHERE id=$1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn activities_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Activity>> {
        Ok(query_as::<_, Activity>(
            "SELECT * FROM activities WHERE course_id=$1 ORDER BY created_at",
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn run(&self, id: Uuid) -> StoreResult<Option<ActivityRun>> {
        Ok(query_as::<_, ActivityRun>("SELECT * FROM activity_runs WHERE id=$1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn insert_run(&self, r: &ActivityRun) -> StoreResult<ActivityRun> {
        query_as::<_, ActivityRun>(
            r#"
            INSERT INTO activity_runs (id, activity_id, student_id, status, messages, started_at, finished_at, duration_seconds)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            RETURNING *
            "#,
        )
        .bind(r.id)
        .bind(r.activity_id)
        .bind(r.student_id)
        .bind(r.status)
        .bind(&r.messages)
        .bind(r.started_at)
        .bind(r.finished_at)
        .bind(r.duration_seconds)
        .fetch_one(&self.db)
        .await
        .map_err(parent_missing("activity"))
    }

    async fn update_run(&self, r: &ActivityRun) -> StoreResult<ActivityRun> {
        query_as::<_, ActivityRun>(
            r#"
            UPDATE activity_runs
            SET status=$2, messages=$3, finished_at=$4, duration_seconds=$5
            WHERE id=$1 AND status <> 'completed'
            RETURNING *
            "#,
        )
        .bind(r.id)
        .bind(r.status)
        .bind(&r.messages)
        .bind(r.finished_at)
        .bind(r.duration_seconds)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::RunCompleted)
    }

    async fn runs_for_activity(&self, activity_id: Uuid) -> StoreResult<Vec<ActivityRun>> {
        Ok(query_as::<_, ActivityRun>(
            "SELECT * FROM activity_runs WHERE activity_id=$1 ORDER BY started_at DESC",
        )
        .bind(activity_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn runs_for_student(&self, student_id: Uuid) -> StoreResult<Vec<ActivityRun>> {
        Ok(query_as::<_, ActivityRun>(
            "SELECT * FROM activity_runs WHERE student_id=$1 ORDER BY started_at DESC",
        )
        .bind(student_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn assessment_for_run(&self, run_id: Uuid) -> StoreResult<Option<Assessment>> {
        Ok(query_as::<_, Assessment>("SELECT * FROM assessments WHERE run_id=$1")
            .bind(run_id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn insert_assessment(&self, a: &Assessment) -> StoreResult<Assessment> {
        query_as::<_, Assessment>(
            r#"
            INSERT INTO assessments
                (id, run_id, activity_id, course_id, student_id, soft_skills, content_areas, feedback, recommendations, created_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            RETURNING *
            "#,
        )
        .bind(a.id)
        .bind(a.run_id)
        .bind(a.activity_id)
        .bind(a.course_id)
        .bind(a.student_id)
        .bind(&a.soft_skills)
        .bind(&a.content_areas)
        .bind(&a.feedback)
        .bind(&a.recommendations)
        .bind(a.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(parent_missing("run"))
    }
}
