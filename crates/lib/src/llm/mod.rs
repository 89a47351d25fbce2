//! Remote reply collaborator: Gemini client and the assistant reply policy.
//!
//! [`LlmBackend`] is the transport seam (one generate call per reply, no streaming, no
//! retry). [`Assistant`] wraps an optional backend and always resolves to reply text,
//! substituting fixed fallbacks. [`Responder`] is what the controller depends on.

mod assistant;
mod gemini;

pub use assistant::{
    Assistant, DEFAULT_SYSTEM_INSTRUCTION, EMPTY_REPLY, MISSING_CREDENTIAL_REPLY,
    UNAVAILABLE_REPLY,
};
pub use gemini::{GeminiClient, DEFAULT_BASE_URL, DEFAULT_MODEL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Speaker of one turn in the history sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The human viewer.
    User,
    /// The assistant.
    Model,
}

/// One role-tagged utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("llm api error: {0}")]
    Api(String),
}

/// Text generation against a remote chat model.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// `history` is prior context; `prompt` is the new user turn. Returns the model's text
    /// (possibly empty).
    async fn generate(
        &self,
        system_instruction: Option<&str>,
        history: &[ChatTurn],
        prompt: &str,
    ) -> Result<String, LlmError>;
}

/// Produces the assistant's reply to a conversation whose last element is the new prompt.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, history: &[ChatTurn]) -> Result<String, LlmError>;
}
