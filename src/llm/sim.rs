//! `ScriptedChatProvider` - deterministic chat provider for tests.
//!
//! `TigerStyle`: Primary implementation; wire clients are secondary.
//!
//! Replies are drained in order from a script; each entry is either a
//! canned completion or an injected provider error. When the script runs
//! dry the provider returns a `stop` step so tick loops terminate
//! predictably instead of hanging on an empty queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatMessage, ChatProvider, ChatResponse, ProviderError};

/// Model name reported by every scripted response.
const SCRIPT_MODEL: &str = "scripted-sim";

type ScriptEntry = Result<ChatResponse, ProviderError>;

/// Deterministic chat provider driven by a pre-loaded reply script.
#[derive(Debug, Default)]
pub struct ScriptedChatProvider {
    script: Mutex<VecDeque<ScriptEntry>>,
    calls: AtomicUsize,
}

impl ScriptedChatProvider {
    /// Create an empty provider; every call returns the exhausted-script stop.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider from plain-text replies, in order.
    #[must_use]
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for reply in replies {
            provider.push_reply(reply);
        }
        provider
    }

    /// Queue one text reply.
    pub fn push_reply(&self, content: impl Into<String>) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Ok(ChatResponse::text(content, SCRIPT_MODEL)));
    }

    /// Queue one text reply with exact usage counts.
    pub fn push_reply_with_usage(
        &self,
        content: impl Into<String>,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Ok(
                ChatResponse::text(content, SCRIPT_MODEL).with_usage(prompt_tokens, completion_tokens)
            ));
    }

    /// Queue one injected failure.
    pub fn push_error(&self, error: ProviderError) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Err(error));
    }

    /// Number of chat calls served so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn exhausted_reply() -> ChatResponse {
        ChatResponse::text(
            r#"{"step_summary":"Script exhausted, stopping.","action":"stop","stop_reason":"script_exhausted"}"#,
            SCRIPT_MODEL,
        )
    }
}

#[async_trait]
impl ChatProvider for ScriptedChatProvider {
    #[tracing::instrument(skip(self, messages, _tools), fields(transcript_len = messages.len()))]
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[serde_json::Value]>,
    ) -> Result<ChatResponse, ProviderError> {
        debug_assert!(!messages.is_empty(), "transcript must not be empty");
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        match next {
            Some(entry) => entry,
            None => Ok(Self::exhausted_reply()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_simulation(&self) -> bool {
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_drain_in_order() {
        let provider = ScriptedChatProvider::with_replies(["first", "second"]);
        let messages = [ChatMessage::user("go")];

        let a = provider.chat(&messages, None).await.unwrap();
        let b = provider.chat(&messages, None).await.unwrap();
        assert_eq!(a.content.as_deref(), Some("first"));
        assert_eq!(b.content.as_deref(), Some("second"));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_returns_stop() {
        let provider = ScriptedChatProvider::new();
        let response = provider.chat(&[ChatMessage::user("go")], None).await.unwrap();
        assert!(response.content.unwrap().contains("script_exhausted"));
    }

    #[tokio::test]
    async fn test_injected_error_surfaces() {
        let provider = ScriptedChatProvider::new();
        provider.push_error(ProviderError::Timeout);
        let result = provider.chat(&[ChatMessage::user("go")], None).await;
        assert!(matches!(result, Err(ProviderError::Timeout)));
    }

    #[tokio::test]
    async fn test_usage_passthrough() {
        let provider = ScriptedChatProvider::new();
        provider.push_reply_with_usage("counted", 100, 20);
        let response = provider.chat(&[ChatMessage::user("go")], None).await.unwrap();
        assert_eq!(response.usage.unwrap().total_tokens, 120);
    }
}
