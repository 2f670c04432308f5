//! Chat Provider Trait - Unified Interface for Sim and Production
//!
//! `TigerStyle`: Simulation-first model abstraction.
//!
//! # Architecture
//!
//! ```text
//! ChatProvider (trait)
//! └── ScriptedChatProvider   (always available, deterministic)
//! ```
//!
//! The runtime consumes this capability and never implements a wire
//! client itself. Providers must tolerate `usage` being absent from a
//! response; the metering layer falls back to a character-count estimate.
//!
//! # Usage
//!
//! ```rust
//! use vigil::llm::{ChatMessage, ChatProvider, Role, ScriptedChatProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = ScriptedChatProvider::with_replies(["hello from the script"]);
//!     let messages = [ChatMessage::user("hi")];
//!     let response = provider.chat(&messages, None).await.unwrap();
//!     assert_eq!(response.content.as_deref(), Some("hello from the script"));
//! }
//! ```

mod sim;

pub use sim::ScriptedChatProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all chat providers.
///
/// `TigerStyle`: Explicit variants for all failure modes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?}s")]
    RateLimit {
        /// Seconds until rate limit resets (if known)
        retry_after_secs: Option<u64>,
    },

    /// Invalid response from provider
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of what was invalid
        message: String,
    },

    /// Service unavailable
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Reason for unavailability
        message: String,
    },

    /// Authentication failed
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Network error
    #[error("Network error: {message}")]
    NetworkError {
        /// Description of the network error
        message: String,
    },
}

impl ProviderError {
    /// Create an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create a service unavailable error.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create a network error.
    #[must_use]
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimit { .. } | Self::ServiceUnavailable { .. }
        )
    }
}

// =============================================================================
// Message Types
// =============================================================================

/// Chat role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// User turns (including tool results fed back)
    User,
    /// Model turns
    Assistant,
}

/// One message in a chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Exact token counts reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u64,
    /// Tokens in the completion
    pub completion_tokens: u64,
    /// Total billed tokens
    pub total_tokens: u64,
}

/// A provider-native tool invocation request.
///
/// Carried for providers that do native tool calling; the burst runtime
/// itself drives tools through structured JSON steps and ignores these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id
    pub call_id: String,
    /// Requested tool name
    pub tool: String,
    /// Argument object
    pub arguments: serde_json::Value,
}

/// Provider-agnostic response from one chat completion call.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Completion text, if any
    pub content: Option<String>,
    /// Native tool-call requests, if the provider produced any
    pub tool_calls: Vec<ToolCallRequest>,
    /// Model that served the call
    pub model: String,
    /// Exact usage, when the provider reports it; metering estimates otherwise
    pub usage: Option<ChatUsage>,
}

impl ChatResponse {
    /// Create a text-only response.
    #[must_use]
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            model: model.into(),
            usage: None,
        }
    }

    /// Attach exact usage counts.
    #[must_use]
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.usage = Some(ChatUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        });
        self
    }
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Trait for chat-completion providers.
///
/// `TigerStyle`: Unified interface for simulation and production.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a chat transcript and return a normalized response.
    ///
    /// `tools` carries native tool definitions for providers that support
    /// them; providers without native tool calling ignore it. Responses
    /// must tolerate `usage` being absent.
    ///
    /// # Errors
    /// Returns `ProviderError` on failure.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[serde_json::Value]>,
    ) -> Result<ChatResponse, ProviderError>;

    /// Get the provider name for logging/debugging.
    fn name(&self) -> &'static str;

    /// Check if this is a simulation provider.
    fn is_simulation(&self) -> bool;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::user("u").role, Role::User);
        assert_eq!(ChatMessage::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn test_response_with_usage() {
        let response = ChatResponse::text("hi", "sim-model").with_usage(10, 5);
        let usage = response.usage.unwrap();
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_error_retryability() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::RateLimit {
            retry_after_secs: Some(30)
        }
        .is_retryable());
        assert!(ProviderError::service_unavailable("down").is_retryable());
        assert!(!ProviderError::AuthenticationFailed.is_retryable());
        assert!(!ProviderError::invalid_response("bad").is_retryable());
    }
}
