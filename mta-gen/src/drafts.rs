//! Generated content drafts
//!
//! LLM output is parsed into one of three bilingual draft shapes and
//! validated before anything reaches the database.

use mta_common::{Locale, LocalizedText};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::{GenError, Result};

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 8;
/// Longest single protocol step, in minutes
pub const MAX_STEP_MINUTES: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftKind {
    Topic,
    Quiz,
    Protocol,
}

impl DraftKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftKind::Topic => "topic",
            DraftKind::Quiz => "quiz",
            DraftKind::Protocol => "protocol",
        }
    }
}

impl FromStr for DraftKind {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "topic" => Ok(DraftKind::Topic),
            "quiz" => Ok(DraftKind::Quiz),
            "protocol" => Ok(DraftKind::Protocol),
            other => Err(GenError::InvalidRequest(format!("Unknown draft kind: {}", other))),
        }
    }
}

/// Article-style topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDraft {
    pub title: LocalizedText,
    pub summary: LocalizedText,
    pub body: LocalizedText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub prompt: LocalizedText,
    pub options: Vec<LocalizedText>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: LocalizedText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDraft {
    pub title: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolStep {
    pub name: LocalizedText,
    pub instructions: LocalizedText,
    pub duration_minutes: u32,
}

/// Massage protocol: ordered steps with durations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDraft {
    pub title: LocalizedText,
    pub summary: LocalizedText,
    pub steps: Vec<ProtocolStep>,
    #[serde(default)]
    pub contraindications: Vec<LocalizedText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Draft {
    Topic(TopicDraft),
    Quiz(QuizDraft),
    Protocol(ProtocolDraft),
}

impl Draft {
    pub fn kind(&self) -> DraftKind {
        match self {
            Draft::Topic(_) => DraftKind::Topic,
            Draft::Quiz(_) => DraftKind::Quiz,
            Draft::Protocol(_) => DraftKind::Protocol,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Draft::Topic(d) => d.validate(),
            Draft::Quiz(d) => d.validate(),
            Draft::Protocol(d) => d.validate(),
        }
    }
}

fn require_complete(field: &str, text: &LocalizedText) -> Result<()> {
    if text.is_complete() {
        Ok(())
    } else {
        Err(GenError::InvalidDraft(format!(
            "'{}' must be present in both languages",
            field
        )))
    }
}

impl TopicDraft {
    pub fn validate(&self) -> Result<()> {
        require_complete("title", &self.title)?;
        require_complete("summary", &self.summary)?;
        require_complete("body", &self.body)
    }
}

impl QuizDraft {
    /// Title, prompts, options and explanations must be bilingual;
    /// the description may be blank.
    pub fn validate(&self) -> Result<()> {
        require_complete("title", &self.title)?;
        if self.questions.is_empty() {
            return Err(GenError::InvalidDraft("Quiz has no questions".to_string()));
        }

        for (i, question) in self.questions.iter().enumerate() {
            let n = i + 1;
            require_complete(&format!("questions[{}].prompt", n), &question.prompt)?;
            require_complete(&format!("questions[{}].explanation", n), &question.explanation)?;

            let count = question.options.len();
            if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
                return Err(GenError::InvalidDraft(format!(
                    "Question {} has {} options (expected {}..={})",
                    n, count, MIN_OPTIONS, MAX_OPTIONS
                )));
            }
            if question.correct_index >= count {
                return Err(GenError::InvalidDraft(format!(
                    "Question {} correct_index {} out of range",
                    n, question.correct_index
                )));
            }
            for (j, option) in question.options.iter().enumerate() {
                require_complete(&format!("questions[{}].options[{}]", n, j), option)?;
            }
        }
        Ok(())
    }
}

impl ProtocolDraft {
    pub fn validate(&self) -> Result<()> {
        require_complete("title", &self.title)?;
        require_complete("summary", &self.summary)?;
        if self.steps.is_empty() {
            return Err(GenError::InvalidDraft("Protocol has no steps".to_string()));
        }
        for (i, step) in self.steps.iter().enumerate() {
            require_complete(&format!("steps[{}].name", i + 1), &step.name)?;
            require_complete(&format!("steps[{}].instructions", i + 1), &step.instructions)?;
            if !(1..=MAX_STEP_MINUTES).contains(&step.duration_minutes) {
                return Err(GenError::InvalidDraft(format!(
                    "Step {} duration {} min is outside 1..={}",
                    i + 1,
                    step.duration_minutes,
                    MAX_STEP_MINUTES
                )));
            }
        }
        Ok(())
    }

    pub fn total_minutes(&self) -> u64 {
        self.steps.iter().map(|s| u64::from(s.duration_minutes)).sum()
    }

    /// Markdown body in one language
    pub fn render_markdown(&self, locale: Locale) -> String {
        let (steps_heading, total_label, contra_heading) = match locale {
            Locale::Ru => ("Этапы", "Общая продолжительность", "Противопоказания"),
            Locale::Ro => ("Etape", "Durata totală", "Contraindicații"),
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.summary.get(locale).trim());
        let _ = writeln!(out, "**{}:** {} min\n", total_label, self.total_minutes());
        let _ = writeln!(out, "## {}\n", steps_heading);

        for (i, step) in self.steps.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. **{}** ({} min)",
                i + 1,
                step.name.get(locale).trim(),
                step.duration_minutes
            );
            let _ = writeln!(out, "   {}", step.instructions.get(locale).trim());
        }

        if !self.contraindications.is_empty() {
            let _ = writeln!(out, "\n## {}\n", contra_heading);
            for item in &self.contraindications {
                let _ = writeln!(out, "- {}", item.get(locale).trim());
            }
        }

        out.trim_end().to_string()
    }

    /// Rendered body in both languages
    pub fn body(&self) -> LocalizedText {
        LocalizedText::new(
            self.render_markdown(Locale::Ru),
            self.render_markdown(Locale::Ro),
        )
    }
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. "json") up to the first newline
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Outermost JSON object in a model response
pub fn extract_json(raw: &str) -> Result<&str> {
    let text = strip_code_fences(raw);
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(GenError::Parse("No JSON object in model response".to_string())),
    }
}

/// Parse and validate a model response as a draft of `kind`
pub fn parse_draft(kind: DraftKind, raw: &str) -> Result<Draft> {
    let json = extract_json(raw)?;
    let parse_err = |e: serde_json::Error| GenError::Parse(format!("{} draft: {}", kind.as_str(), e));

    let draft = match kind {
        DraftKind::Topic => Draft::Topic(serde_json::from_str(json).map_err(parse_err)?),
        DraftKind::Quiz => Draft::Quiz(serde_json::from_str(json).map_err(parse_err)?),
        DraftKind::Protocol => Draft::Protocol(serde_json::from_str(json).map_err(parse_err)?),
    };
    draft.validate()?;
    Ok(draft)
}
