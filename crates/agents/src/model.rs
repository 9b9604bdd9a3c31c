use async_trait::async_trait;

// ── Typed chat messages ─────────────────────────────────────────────────────

/// Typed chat message for the LLM provider interface.
///
/// Ticket metadata (author ids, timestamps) never appears here, so it cannot
/// leak into provider requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::System { content } | Self::User { content } | Self::Assistant { content } => {
                content
            },
        }
    }

    /// Convert to the OpenAI Chat Completions message shape.
    #[must_use]
    pub fn to_openai_value(&self) -> serde_json::Value {
        serde_json::json!({ "role": self.role(), "content": self.content() })
    }
}

/// LLM provider trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Model identifier (e.g. "gpt-4o-mini").
    fn id(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<CompletionResponse>;
}

/// Response from an LLM completion call.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub text: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
