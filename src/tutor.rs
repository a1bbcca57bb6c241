//! Tutoring conversation: system instruction, history window and reply cleanup.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::llm::{ModelMessage, ModelRole};
use crate::models::{Activity, Course};

/// Turns of prior conversation forwarded to the model.
pub const HISTORY_WINDOW: usize = 10;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

/// Context the tutor speaks from.
pub struct Lesson<'a> {
    pub course: &'a Course,
    pub activity: &'a Activity,
    pub teacher_name: &'a str,
}

pub fn system_instruction(lesson: &Lesson<'_>) -> String {
    let Lesson { course, activity, teacher_name } = lesson;
    format!(
        "You are {teacher_name}, the teacher of the course \"{title}\" ({subject}, grade {grade}). \
Speak as the teacher in the first person and guide your student through the activity below.\n\
\n\
Activity: {activity_title}\n\
Goal: {goal}\n\
Material:\n{content}\n\
\n\
Rules:\n\
- Stay on {subject}. If the student drifts to another topic, steer back to the activity.\n\
- Ask guiding questions instead of handing over final answers.\n\
- Keep replies short and suited to grade {grade}.\n\
- Reply in plain text without markdown formatting.",
        title = course.title,
        subject = course.subject,
        grade = course.grade_level,
        activity_title = activity.title,
        goal = activity.goal,
        content = activity.content,
    )
}

pub fn model_role(role: &str) -> Option<ModelRole> {
    match role.trim().to_ascii_lowercase().as_str() {
        "user" | "student" => Some(ModelRole::User),
        "assistant" | "ai" | "teacher" | "bot" => Some(ModelRole::Assistant),
        _ => None,
    }
}

/// System instruction, the last [`HISTORY_WINDOW`] turns, then the new message.
pub fn conversation(system: String, history: &[HistoryTurn], message: &str) -> Result<Vec<ModelMessage>, String> {
    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(ModelMessage::new(ModelRole::System, system));
    for turn in recent {
        let role = model_role(&turn.role).ok_or_else(|| format!("unknown conversation role {:?}", turn.role))?;
        messages.push(ModelMessage::new(role, turn.content.as_str()));
    }
    messages.push(ModelMessage::new(ModelRole::User, message));
    Ok(messages)
}

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\s](?:[^\n]*?[^*\s])?)\*\*").expect("bold regex is invalid"));
// Underscore bold needs more than one word so identifiers like `__init__` stay intact.
static UNDERSCORE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b__([^_\s][^\n]*?\s[^\n]*?[^_\s])__\b").expect("underscore regex is invalid"));
// Markers must hug the text and sit outside words, so `3 * 4 * 5` and `2*x*y` survive.
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\B\*([^*\s](?:[^*\n]*[^*\s])?)\*\B").expect("italic regex is invalid"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:#+[ \t]*)+").expect("heading regex is invalid"));
static TRAILING_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").expect("space regex is invalid"));
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("newline regex is invalid"));

/// Strips markdown the chat UI would show literally.
pub fn clean_reply(reply: &str) -> String {
    let text = reply.replace("\r\n", "\n");
    let text = BOLD.replace_all(&text, "$1");
    let text = UNDERSCORE_BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = text.replace("**", "");
    let text = HEADING.replace_all(&text, "");
    let text = TRAILING_SPACE.replace_all(&text, "");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn turns(n: usize) -> Vec<HistoryTurn> {
        (0..n)
            .map(|i| HistoryTurn {
                role: if i % 2 == 0 { "user" } else { "ai" }.into(),
                content: format!("turn {i}"),
            })
            .collect()
    }

    #[test]
    fn strips_bold_italic_and_headings() {
        let raw = "## Let's begin\n\nThis is **important** and *subtle*.\n# Step 1\nTry __once more__.";
        assert_eq!(
            clean_reply(raw),
            "Let's begin\n\nThis is important and subtle.\nStep 1\nTry once more."
        );
    }

    #[test]
    fn arithmetic_and_identifiers_are_left_alone() {
        let raw = "So 3 * 4 * 5 = 60 and 2*x*y stays.\nCall __init__ first.";
        assert_eq!(clean_reply(raw), raw);
    }

    #[test]
    fn nested_heading_markers_are_removed() {
        assert_eq!(clean_reply("# # Step one\nok"), "Step one\nok");
        assert_eq!(clean_reply("#\t## Step two"), "Step two");
    }

    #[test]
    fn collapses_blank_runs() {
        let raw = "First\n\n\n\nSecond\r\n\r\n\r\nThird   \n \n \n\nFourth";
        let cleaned = clean_reply(raw);
        assert_eq!(cleaned, "First\n\nSecond\n\nThird\n\nFourth");
    }

    #[test]
    fn stray_markers_never_survive() {
        for raw in [
            "***wow***",
            "a ** b",
            "**unclosed",
            "#####",
            "  ### deep\n####nested",
            "# # x",
            "#\t## x",
        ] {
            let cleaned = clean_reply(raw);
            assert!(!cleaned.contains("**"), "{raw:?} -> {cleaned:?}");
            assert!(
                cleaned.lines().all(|l| !l.trim_start().starts_with('#')),
                "{raw:?} -> {cleaned:?}"
            );
            assert!(!cleaned.contains("\n\n\n"));
        }
    }

    #[test]
    fn keeps_only_recent_history() {
        let history = turns(14);
        let messages = conversation("sys".into(), &history, "now").unwrap();
        assert_eq!(messages.len(), HISTORY_WINDOW + 2);
        assert_eq!(messages[0].role, ModelRole::System);
        assert_eq!(messages[1].content, "turn 4");
        assert_eq!(messages[1].role, ModelRole::User);
        assert_eq!(messages[2].role, ModelRole::Assistant);
        assert_eq!(messages[HISTORY_WINDOW].content, "turn 13");
        assert_eq!(messages.last().unwrap(), &ModelMessage::new(ModelRole::User, "now"));
    }

    #[test]
    fn short_history_is_kept_whole() {
        let messages = conversation("sys".into(), &turns(3), "now").unwrap();
        assert_eq!(messages.len(), 5);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let history = vec![HistoryTurn { role: "narrator".into(), content: "x".into() }];
        assert_eq!(
            conversation("sys".into(), &history, "now").unwrap_err(),
            "unknown conversation role \"narrator\""
        );
    }

    #[test]
    fn instruction_embeds_course_and_activity() {
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            title: "Algebra I".into(),
            subject: "Mathematics".into(),
            grade_level: "8".into(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        let activity = Activity {
            id: Uuid::new_v4(),
            course_id: course.id,
            title: "Linear equations".into(),
            goal: "Solve for x".into(),
            content: "2x + 3 = 7".into(),
            difficulty: None,
            length: None,
            status: crate::models::ActivityStatus::Published,
            created_at: now,
            updated_at: now,
        };
        let text = system_instruction(&Lesson {
            course: &course,
            activity: &activity,
            teacher_name: "Ms. Rivera",
        });
        assert!(text.starts_with("You are Ms. Rivera, the teacher of the course \"Algebra I\""));
        assert!(text.contains("Goal: Solve for x"));
        assert!(text.contains("2x + 3 = 7"));
        assert!(text.contains("Stay on Mathematics."));
    }
}
