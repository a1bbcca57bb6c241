use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Student,
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "activity_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Draft,
    Active,
    Published,
    Archived,
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "run_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    InProgress,
    Completed,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Course {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    pub subject: String,
    pub grade_level: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub goal: String,
    pub content: String,
    pub difficulty: Option<String>,
    pub length: Option<String>,
    pub status: ActivityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One entry of a run transcript.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActivityRun {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub student_id: Uuid,
    pub status: RunStatus,
    pub messages: Json<Vec<ChatTurn>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoftSkill {
    #[serde(alias = "cognitive")]
    Cognitive,
    #[serde(alias = "emotional")]
    Emotional,
    #[serde(alias = "social")]
    Social,
    #[serde(alias = "motivational")]
    Motivational,
    #[serde(alias = "behavioral", alias = "behavioural")]
    Behavioral,
}

impl SoftSkill {
    pub const ALL: [SoftSkill; 5] = [
        SoftSkill::Cognitive,
        SoftSkill::Emotional,
        SoftSkill::Social,
        SoftSkill::Motivational,
        SoftSkill::Behavioral,
    ];
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SoftSkillRow {
    pub dimension: SoftSkill,
    pub score: u8,
    pub evidence: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContentAreaRow {
    pub area: String,
    pub score: u8,
    pub evidence: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Assessment {
    pub id: Uuid,
    pub run_id: Uuid,
    pub activity_id: Uuid,
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub soft_skills: Json<Vec<SoftSkillRow>>,
    pub content_areas: Json<Vec<ContentAreaRow>>,
    pub feedback: String,
    pub recommendations: String,
    pub created_at: DateTime<Utc>,
}

// --- request bodies ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateProfileReq {
    pub display_name: String,
    pub role: Role,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateProfileReq {
    pub display_name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub avatar_url: Option<Option<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateCourseReq {
    pub title: String,
    pub subject: String,
    pub grade_level: String,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateCourseReq {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EnrollReq {
    pub student_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateActivityReq {
    pub title: String,
    pub goal: String,
    pub content: String,
    pub difficulty: Option<String>,
    pub length: Option<String>,
    pub status: Option<ActivityStatus>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateActivityReq {
    pub title: Option<String>,
    pub goal: Option<String>,
    pub content: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub difficulty: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub length: Option<Option<String>>,
    pub status: Option<ActivityStatus>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppendMessageReq {
    pub role: TurnRole,
    pub content: String,
}
