//! Content generator tests against a scripted LLM client

use async_trait::async_trait;
use mta_gen::drafts::DraftKind;
use mta_gen::prompts::PromptOptions;
use mta_gen::{ContentGenerator, Draft, GenError, GenerationRequest, LlmClient};
use std::sync::{Arc, Mutex};

/// Returns a fixed response and records the prompts it was given
struct ScriptedLlm {
    response: String,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, system: &str, prompt: &str) -> mta_gen::Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        Ok(self.response.clone())
    }
}

struct FailingLlm;

#[async_trait]
impl LlmClient for FailingLlm {
    async fn complete(&self, _system: &str, _prompt: &str) -> mta_gen::Result<String> {
        Err(GenError::Api {
            status: 529,
            message: "Overloaded".to_string(),
        })
    }
}

fn request(kind: DraftKind, subject: &str) -> GenerationRequest {
    GenerationRequest {
        kind,
        subject: subject.to_string(),
        options: PromptOptions::default(),
    }
}

const QUIZ_RESPONSE: &str = r#"Sure! Here is the quiz:
```json
{
  "title": {"ru": "Мышцы спины", "ro": "Mușchii spatelui"},
  "questions": [
    {
      "prompt": {"ru": "Какая мышца самая широкая?", "ro": "Care mușchi este cel mai lat?"},
      "options": [
        {"ru": "Трапециевидная", "ro": "Trapez"},
        {"ru": "Широчайшая", "ro": "Marele dorsal"}
      ],
      "correct_index": 1,
      "explanation": {"ru": "Широчайшая мышца спины", "ro": "Marele dorsal acoperă spatele"}
    }
  ]
}
```"#;

#[tokio::test]
async fn test_generates_quiz_from_fenced_response() {
    let llm = ScriptedLlm::new(QUIZ_RESPONSE);
    let generator = ContentGenerator::new(llm.clone());

    let draft = generator
        .generate(&request(DraftKind::Quiz, "Back muscles"))
        .await
        .unwrap();

    match draft {
        Draft::Quiz(quiz) => {
            assert_eq!(quiz.questions.len(), 1);
            assert_eq!(quiz.questions[0].correct_index, 1);
        }
        other => panic!("expected quiz, got {:?}", other.kind()),
    }

    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].1.contains("exactly 5 questions"));
}

#[tokio::test]
async fn test_invalid_draft_rejected() {
    let llm = ScriptedLlm::new(r#"{"title": {"ru": "Тема", "ro": ""}, "summary": {"ru": "a", "ro": "b"}, "body": {"ru": "a", "ro": "b"}}"#);
    let generator = ContentGenerator::new(llm);

    let result = generator.generate(&request(DraftKind::Topic, "Posture")).await;
    assert!(matches!(result, Err(GenError::InvalidDraft(_))));
}

#[tokio::test]
async fn test_non_json_response_is_parse_error() {
    let llm = ScriptedLlm::new("I cannot help with that.");
    let generator = ContentGenerator::new(llm);

    let result = generator.generate(&request(DraftKind::Protocol, "Neck")).await;
    assert!(matches!(result, Err(GenError::Parse(_))));
}

#[tokio::test]
async fn test_question_count_checked_before_calling_llm() {
    let llm = ScriptedLlm::new(QUIZ_RESPONSE);
    let generator = ContentGenerator::new(llm.clone());

    let mut req = request(DraftKind::Quiz, "Back muscles");
    req.options.question_count = Some(40);

    let result = generator.generate(&req).await;
    assert!(matches!(result, Err(GenError::InvalidRequest(_))));
    assert!(llm.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upstream_error_propagates() {
    let generator = ContentGenerator::new(Arc::new(FailingLlm));

    let result = generator.generate(&request(DraftKind::Topic, "Skin")).await;
    assert!(matches!(result, Err(GenError::Api { status: 529, .. })));
}
