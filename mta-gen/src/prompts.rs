//! Prompt builders for the content generator
//!
//! Every prompt asks for a single JSON object with RU and RO text for each
//! localized field, matching the shapes in [`crate::drafts`].

use crate::drafts::DraftKind;
use crate::error::{GenError, Result};

pub const DEFAULT_QUESTION_COUNT: u8 = 5;
pub const MIN_QUESTION_COUNT: u8 = 3;
pub const MAX_QUESTION_COUNT: u8 = 20;

/// Longest accepted subject, in characters
const MAX_SUBJECT_LEN: usize = 300;

const SYSTEM_PROMPT: &str = "You are an instructor at a massage therapy academy. \
You write accurate, practical course material on anatomy, physiology and massage \
techniques for students in Moldova. Every text you produce is written twice: in \
Russian (\"ru\") and in Romanian (\"ro\"). Respond with a single JSON object and \
nothing else.";

/// A system + user prompt pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Parameters shared by all prompt kinds
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    pub question_count: Option<u8>,
    /// Audience level, e.g. "beginner"
    pub level: Option<String>,
    pub instructions: Option<String>,
}

pub fn resolve_question_count(requested: Option<u8>) -> Result<u8> {
    let count = requested.unwrap_or(DEFAULT_QUESTION_COUNT);
    if !(MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT).contains(&count) {
        return Err(GenError::InvalidRequest(format!(
            "question_count must be between {} and {}",
            MIN_QUESTION_COUNT, MAX_QUESTION_COUNT
        )));
    }
    Ok(count)
}

pub fn build_prompt(kind: DraftKind, subject: &str, options: &PromptOptions) -> Result<Prompt> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(GenError::InvalidRequest("Subject must not be empty".to_string()));
    }
    if subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(GenError::InvalidRequest(format!(
            "Subject must be at most {} characters",
            MAX_SUBJECT_LEN
        )));
    }

    let mut user = match kind {
        DraftKind::Topic => topic_prompt(subject),
        DraftKind::Quiz => quiz_prompt(subject, resolve_question_count(options.question_count)?),
        DraftKind::Protocol => protocol_prompt(subject),
    };

    if let Some(level) = options.level.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        user.push_str(&format!("\n\nTarget audience level: {}.", level));
    }
    if let Some(extra) = options
        .instructions
        .as_deref()
        .map(str::trim)
        .filter(|i| !i.is_empty())
    {
        user.push_str(&format!("\n\nAdditional instructions: {}", extra));
    }

    Ok(Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    })
}

fn topic_prompt(subject: &str) -> String {
    format!(
        r#"Write a lesson about: {subject}

Return JSON of exactly this shape:
{{
  "title": {{"ru": "...", "ro": "..."}},
  "summary": {{"ru": "two or three sentences", "ro": "..."}},
  "body": {{"ru": "lesson text in Markdown", "ro": "..."}}
}}"#
    )
}

fn quiz_prompt(subject: &str, count: u8) -> String {
    format!(
        r#"Write a multiple-choice quiz about: {subject}

The quiz has exactly {count} questions. Each question has between 2 and 8 options
and exactly one correct option, identified by its zero-based index.

Return JSON of exactly this shape:
{{
  "title": {{"ru": "...", "ro": "..."}},
  "description": {{"ru": "...", "ro": "..."}},
  "questions": [
    {{
      "prompt": {{"ru": "...", "ro": "..."}},
      "options": [{{"ru": "...", "ro": "..."}}, {{"ru": "...", "ro": "..."}}],
      "correct_index": 0,
      "explanation": {{"ru": "why the answer is correct", "ro": "..."}}
    }}
  ]
}}"#
    )
}

fn protocol_prompt(subject: &str) -> String {
    format!(
        r#"Write a step-by-step massage protocol for: {subject}

Return JSON of exactly this shape:
{{
  "title": {{"ru": "...", "ro": "..."}},
  "summary": {{"ru": "indications and goals", "ro": "..."}},
  "steps": [
    {{
      "name": {{"ru": "...", "ro": "..."}},
      "instructions": {{"ru": "...", "ro": "..."}},
      "duration_minutes": 5
    }}
  ],
  "contraindications": [{{"ru": "...", "ro": "..."}}]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_count_default_and_bounds() {
        assert_eq!(resolve_question_count(None).unwrap(), 5);
        assert_eq!(resolve_question_count(Some(3)).unwrap(), 3);
        assert_eq!(resolve_question_count(Some(20)).unwrap(), 20);
        assert!(resolve_question_count(Some(2)).is_err());
        assert!(resolve_question_count(Some(21)).is_err());
    }

    #[test]
    fn test_quiz_prompt_mentions_count() {
        let options = PromptOptions {
            question_count: Some(7),
            ..Default::default()
        };
        let prompt = build_prompt(DraftKind::Quiz, "Shoulder girdle", &options).unwrap();
        assert!(prompt.user.contains("exactly 7 questions"));
        assert!(prompt.user.contains("Shoulder girdle"));
    }

    #[test]
    fn test_level_and_instructions_appended() {
        let options = PromptOptions {
            level: Some("beginner".to_string()),
            instructions: Some("Mention posture.".to_string()),
            ..Default::default()
        };
        let prompt = build_prompt(DraftKind::Protocol, "Lower back", &options).unwrap();
        assert!(prompt.user.contains("Target audience level: beginner."));
        assert!(prompt.user.ends_with("Additional instructions: Mention posture."));
        assert!(prompt.system.contains("Romanian"));
    }

    #[test]
    fn test_blank_subject_rejected() {
        assert!(build_prompt(DraftKind::Topic, "  ", &PromptOptions::default()).is_err());
    }
}
