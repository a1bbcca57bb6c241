// Status transitions and field limits for course content

use crate::models::{ActivityStatus, RunStatus};

impl ActivityStatus {
    /// Students only ever see activities in one of these states.
    pub fn visible_to_students(self) -> bool {
        matches!(self, ActivityStatus::Active | ActivityStatus::Published)
    }

    pub fn can_become(self, next: ActivityStatus) -> bool {
        use ActivityStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Draft, Active | Published | Archived)
                | (Active, Published | Archived)
                | (Published, Active | Archived)
        )
    }
}

impl RunStatus {
    pub fn can_become(self, next: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, next),
            (Created, InProgress | Completed) | (InProgress, InProgress | Completed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Subject,
    GradeLevel,
    Description,
    Goal,
    ActivityContent,
    Label,
    DisplayName,
    AvatarUrl,
    Message,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Subject => "subject",
            Field::GradeLevel => "grade_level",
            Field::Description => "description",
            Field::Goal => "goal",
            Field::ActivityContent => "content",
            Field::Label => "label",
            Field::DisplayName => "display_name",
            Field::AvatarUrl => "avatar_url",
            Field::Message => "message",
        }
    }

    pub fn max_len(self) -> usize {
        match self {
            Field::Title => 200,
            Field::Subject | Field::GradeLevel | Field::DisplayName | Field::Label => 100,
            Field::Goal => 2000,
            Field::Description => 5000,
            Field::Message => 4000,
            Field::AvatarUrl => 2048,
            Field::ActivityContent => 20000,
        }
    }
}

/// Returns the trimmed value, or a message naming the broken limit.
pub fn required_text(field: Field, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} is required", field.name()));
    }
    limit(field, trimmed).map(str::to_string)
}

pub fn optional_text(field: Field, value: Option<&str>) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => limit(field, v).map(|v| Some(v.to_string())),
    }
}

fn limit(field: Field, value: &str) -> Result<&str, String> {
    if value.chars().count() > field.max_len() {
        Err(format!(
            "{} exceeds {} characters",
            field.name(),
            field.max_len()
        ))
    } else {
        Ok(value)
    }
}
