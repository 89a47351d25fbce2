//! Assistant reply policy: fixed fallbacks around an optional model backend.

use async_trait::async_trait;
use std::sync::Arc;

use super::{ChatTurn, GeminiClient, LlmBackend, LlmError, Responder};
use crate::config::{self, Config};

/// Returned without any call when no API key is configured.
pub const MISSING_CREDENTIAL_REPLY: &str =
    "Please set GEMINI_API_KEY (or API_KEY) in the environment to use the AI assistant.";

/// Returned when the remote call fails.
pub const UNAVAILABLE_REPLY: &str =
    "The AI service is temporarily unavailable, please try again later.";

/// Returned when the model answers with no text.
pub const EMPTY_REPLY: &str = "Sorry, I can't answer that right now.";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful, friendly, and concise chat assistant.";

/// The AI correspondent. Never fails: every outcome resolves to reply text.
pub struct Assistant {
    backend: Option<Arc<dyn LlmBackend>>,
    system_instruction: String,
}

impl Assistant {
    pub fn new(backend: Option<Arc<dyn LlmBackend>>) -> Self {
        Self {
            backend,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Gemini-backed assistant when an API key resolves; otherwise one that only answers
    /// with [`MISSING_CREDENTIAL_REPLY`].
    pub fn from_config(config: &Config) -> Self {
        let backend: Option<Arc<dyn LlmBackend>> = match config::resolve_api_key(config) {
            Some(key) => {
                let client = GeminiClient::new(
                    key,
                    config.assistant.model.clone(),
                    config.assistant.base_url.clone(),
                );
                log::info!("assistant: using gemini model {}", client.model());
                Some(Arc::new(client))
            }
            None => {
                log::warn!("assistant: no API key configured, replies will be a setup hint");
                None
            }
        };
        let assistant = Self::new(backend);
        match config.assistant.system_instruction.as_deref() {
            Some(s) if !s.trim().is_empty() => assistant.with_system_instruction(s),
            _ => assistant,
        }
    }

    /// Reply to `history`, whose last element is the new prompt and the rest prior context.
    pub async fn reply(&self, history: &[ChatTurn]) -> String {
        let Some(backend) = self.backend.as_ref() else {
            return MISSING_CREDENTIAL_REPLY.to_string();
        };
        let Some((prompt, context)) = history.split_last() else {
            log::warn!("assistant: asked to reply to an empty history");
            return UNAVAILABLE_REPLY.to_string();
        };
        match backend
            .generate(Some(&self.system_instruction), context, &prompt.text)
            .await
        {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                log::error!("assistant: gemini call failed: {}", e);
                UNAVAILABLE_REPLY.to_string()
            }
        }
    }
}

#[async_trait]
impl Responder for Assistant {
    async fn respond(&self, history: &[ChatTurn]) -> Result<String, LlmError> {
        Ok(self.reply(history).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records what it was asked and answers from a script.
    struct Scripted {
        answer: Result<String, String>,
        seen: Mutex<Vec<(Option<String>, Vec<ChatTurn>, String)>>,
    }

    impl Scripted {
        fn new(answer: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.map(str::to_string).map_err(str::to_string),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for Scripted {
        async fn generate(
            &self,
            system_instruction: Option<&str>,
            history: &[ChatTurn],
            prompt: &str,
        ) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push((
                system_instruction.map(str::to_string),
                history.to_vec(),
                prompt.to_string(),
            ));
            self.answer.clone().map_err(LlmError::Api)
        }
    }

    #[tokio::test]
    async fn no_backend_returns_credential_hint() {
        let a = Assistant::new(None);
        assert_eq!(a.reply(&[ChatTurn::user("hi")]).await, MISSING_CREDENTIAL_REPLY);
    }

    #[tokio::test]
    async fn last_turn_is_prompt_and_rest_is_context() {
        let backend = Scripted::new(Ok("fine"));
        let a = Assistant::new(Some(backend.clone() as Arc<dyn LlmBackend>))
            .with_system_instruction("sys");
        let history = vec![
            ChatTurn::user("hi"),
            ChatTurn::model("hello"),
            ChatTurn::user("how are you"),
        ];
        assert_eq!(a.reply(&history).await, "fine");
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("sys"));
        assert_eq!(seen[0].1, history[..2].to_vec());
        assert_eq!(seen[0].2, "how are you");
    }

    #[tokio::test]
    async fn backend_error_becomes_unavailable_reply() {
        let a = Assistant::new(Some(Scripted::new(Err("500 boom")) as Arc<dyn LlmBackend>));
        assert_eq!(a.reply(&[ChatTurn::user("hi")]).await, UNAVAILABLE_REPLY);
    }

    #[tokio::test]
    async fn empty_text_becomes_empty_reply() {
        let a = Assistant::new(Some(Scripted::new(Ok("  ")) as Arc<dyn LlmBackend>));
        assert_eq!(a.reply(&[ChatTurn::user("hi")]).await, EMPTY_REPLY);
    }

    #[tokio::test]
    async fn empty_history_does_not_call_backend() {
        let backend = Scripted::new(Ok("x"));
        let a = Assistant::new(Some(backend.clone() as Arc<dyn LlmBackend>));
        assert_eq!(a.reply(&[]).await, UNAVAILABLE_REPLY);
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn responder_never_errors() {
        let a = Assistant::new(None);
        let r = a.respond(&[ChatTurn::user("hi")]).await.unwrap();
        assert_eq!(r, MISSING_CREDENTIAL_REPLY);
    }
}
