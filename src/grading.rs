//! Pedagogical assessment of a finished tutoring transcript.
//!
//! The model is asked for a single JSON object; anything that does not match
//! the expected shape is rejected rather than patched up.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use thiserror::Error;

use crate::models::{ContentAreaRow, SoftSkill, SoftSkillRow};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActivityData {
    pub title: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub grade_level: String,
}

/// Case-insensitive substring match; an empty pattern exempts nothing.
pub fn is_exempt(title: &str, pattern: &str) -> bool {
    let pattern = pattern.trim().to_lowercase();
    !pattern.is_empty() && title.to_lowercase().contains(&pattern)
}

pub fn assessment_prompt(activity: &ActivityData, transcript: &[TranscriptEntry]) -> String {
    let mut prompt = format!(
        "You are an experienced teacher assessing a student's work in a tutoring session.\n\
\n\
Activity: {title}\n\
Goal: {goal}\n\
Subject: {subject}\n\
Grade level: {grade}\n\
\n\
Score every row from {MIN_SCORE} (emerging) to {MAX_SCORE} (exemplary) and cite evidence from the transcript.\n\
\n\
SOFT table: one row for each of the five dimensions Cognitive, Emotional, Social, Motivational, Behavioral.\n\
- Cognitive: reasoning, problem solving, metacognition.\n\
- Emotional: confidence, frustration tolerance, self-regulation.\n\
- Social: communication with the teacher, asking for help.\n\
- Motivational: curiosity, persistence, engagement.\n\
- Behavioral: focus, following instructions, task completion.\n\
\n\
CRA table: one row per content area of {subject} the session touched, at least one.\n\
\n\
Respond with a single JSON object and nothing else, shaped exactly like:\n\
{{\"soft_skills\": [{{\"dimension\": \"Cognitive\", \"score\": 3, \"evidence\": \"...\"}}, ...],\n \
\"content_areas\": [{{\"area\": \"...\", \"score\": 3, \"evidence\": \"...\"}}],\n \
\"feedback\": \"feedback addressed to the student\",\n \
\"recommendations\": \"next steps for the teacher\"}}\n\
\n\
Transcript:\n",
        title = activity.title,
        goal = activity.goal,
        subject = activity.subject,
        grade = activity.grade_level,
    );
    for entry in transcript {
        let speaker = if entry.kind.eq_ignore_ascii_case("user") { "Student" } else { "Teacher" };
        let _ = writeln!(prompt, "{speaker}: {}", entry.content.trim());
    }
    prompt
}

#[derive(Debug, Error)]
pub enum GradingError {
    #[error("assessment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("assessment is missing the {0:?} dimension")]
    MissingDimension(SoftSkill),

    #[error("assessment repeats the {0:?} dimension")]
    DuplicateDimension(SoftSkill),

    #[error("score {score} for {row} is outside {}..={}", MIN_SCORE, MAX_SCORE)]
    ScoreOutOfRange { row: String, score: u8 },

    #[error("assessment has no content areas")]
    NoContentAreas,

    #[error("assessment field {0} is blank")]
    Blank(&'static str),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Text {
    One(String),
    Many(Vec<String>),
}

impl Text {
    fn joined(self) -> String {
        match self {
            Text::One(s) => s,
            Text::Many(items) => items.join("\n"),
        }
    }
}

#[derive(Deserialize)]
struct RawGrading {
    soft_skills: Vec<SoftSkillRow>,
    content_areas: Vec<ContentAreaRow>,
    feedback: String,
    recommendations: Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grading {
    pub soft_skills: Vec<SoftSkillRow>,
    pub content_areas: Vec<ContentAreaRow>,
    pub feedback: String,
    pub recommendations: String,
}

fn strip_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Any language tag (`json`, `JSON`, ...) runs up to the first newline.
    let rest = match rest.split_once('\n') {
        Some((tag, body)) if !tag.trim_start().starts_with(['{', '[']) => body,
        _ => rest,
    };
    rest.trim().strip_suffix("```").unwrap_or(rest).trim()
}

fn check_score(row: &str, score: u8) -> Result<(), GradingError> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(GradingError::ScoreOutOfRange { row: row.to_string(), score })
    }
}

pub fn parse_grading(reply: &str) -> Result<Grading, GradingError> {
    let raw: RawGrading = serde_json::from_str(strip_fence(reply))?;

    let mut seen = HashSet::new();
    for row in &raw.soft_skills {
        if !seen.insert(row.dimension) {
            return Err(GradingError::DuplicateDimension(row.dimension));
        }
        check_score(&format!("{:?}", row.dimension), row.score)?;
    }
    if let Some(missing) = SoftSkill::ALL.into_iter().find(|d| !seen.contains(d)) {
        return Err(GradingError::MissingDimension(missing));
    }

    if raw.content_areas.is_empty() {
        return Err(GradingError::NoContentAreas);
    }
    for row in &raw.content_areas {
        if row.area.trim().is_empty() {
            return Err(GradingError::Blank("content_areas.area"));
        }
        check_score(&row.area, row.score)?;
    }

    let feedback = raw.feedback.trim().to_string();
    if feedback.is_empty() {
        return Err(GradingError::Blank("feedback"));
    }

    // Rows are stored in the fixed dimension order.
    let mut soft_skills = raw.soft_skills;
    soft_skills.sort_by_key(|r| SoftSkill::ALL.iter().position(|d| *d == r.dimension));

    Ok(Grading {
        soft_skills,
        content_areas: raw.content_areas,
        feedback,
        recommendations: raw.recommendations.joined().trim().to_string(),
    })
}
