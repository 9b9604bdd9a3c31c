use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, trace, warn},
};

use crate::model::{ChatMessage, CompletionResponse, LlmProvider, Usage};

/// Client for any endpoint speaking the OpenAI Chat Completions API.
pub struct OpenAiProvider {
    api_key: Secret<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Build a provider whose every request is bounded by `timeout`.
    pub fn new(
        api_key: Secret<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

fn parse_usage(resp: &serde_json::Value) -> Usage {
    let field = |name: &str| {
        resp["usage"][name]
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    Usage {
        input_tokens: field("prompt_tokens"),
        output_tokens: field("completion_tokens"),
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<CompletionResponse> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages.iter().map(ChatMessage::to_openai_value).collect::<Vec<_>>(),
        });

        debug!(
            model = %self.model,
            messages_count = messages.len(),
            "openai complete request"
        );
        trace!(body = %body, "openai request body");

        let http_resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = http_resp.status();
        if !status.is_success() {
            let retry_after_ms = super::retry_after_ms_from_headers(http_resp.headers());
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(
                status = %status,
                model = %self.model,
                provider = self.name(),
                body = %body_text,
                "openai API error"
            );
            anyhow::bail!(
                "{}",
                super::with_retry_after_marker(
                    format!("OpenAI API error HTTP {}: {body_text}", status.as_u16()),
                    retry_after_ms,
                )
            );
        }

        let resp = http_resp.json::<serde_json::Value>().await?;
        trace!(response = %resp, "openai raw response");

        let text = resp["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);

        Ok(CompletionResponse {
            text,
            usage: parse_usage(&resp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new(
            Secret::new("sk-test".into()),
            "gpt-4o-mini",
            base_url,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn complete_parses_text_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [{ "role": "user", "content": "I need help" }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":" Sure, what happened? "}}],
                    "usage":{"prompt_tokens":12,"completion_tokens":5}}"#,
            )
            .create_async()
            .await;

        let resp = provider(&server.url())
            .complete(&[ChatMessage::user("I need help")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(resp.text.as_deref(), Some(" Sure, what happened? "));
        assert_eq!(resp.usage, Usage {
            input_tokens: 12,
            output_tokens: 5
        });
    }

    #[tokio::test]
    async fn http_error_carries_status_and_retry_hint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "3")
            .with_body(r#"{"error":{"message":"rate limited"}}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("HTTP 429"), "{msg}");
        assert!(msg.contains("retry_after_ms=3000"), "{msg}");
    }

    #[tokio::test]
    async fn blank_content_maps_to_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"   "}}]}"#)
            .create_async()
            .await;

        let resp = provider(&server.url())
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap();
        assert!(resp.text.is_none());
        assert_eq!(resp.usage, Usage::default());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let p = provider("https://api.example.com/v1/");
        assert_eq!(p.base_url, "https://api.example.com/v1");
        assert_eq!(p.id(), "gpt-4o-mini");
        assert_eq!(p.name(), "openai");
    }
}
