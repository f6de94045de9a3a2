//! # MTA content generation and import
//!
//! Outbound integrations of the academy backend:
//! - [`llm`]: LLM client abstraction and the Anthropic Messages API client
//! - [`prompts`], [`drafts`], [`generator`]: AI-assisted drafting of topics,
//!   quizzes and massage protocols in both content languages
//! - [`import`]: Wikipedia, Wikimedia Commons and PubMed search clients

pub mod drafts;
pub mod error;
pub mod generator;
pub mod import;
pub mod llm;
pub mod prompts;

pub use drafts::{Draft, DraftKind, ProtocolDraft, QuizDraft, TopicDraft};
pub use error::{GenError, Result};
pub use generator::{ContentGenerator, GenerationRequest};
pub use llm::{AnthropicClient, AnthropicConfig, LlmClient};
