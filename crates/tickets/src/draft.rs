//! Turns a session into a prompt and the model's answer into a reply.

use std::{sync::Arc, time::Duration};

use {
    otis_agents::{ChatMessage, LlmProvider},
    otis_common::types::ChannelId,
    tracing::{debug, warn},
};

use crate::{
    error::DraftError,
    reference::ReferenceTexts,
    session::{Session, Speaker},
};

const PREAMBLE: &str = "You are the support assistant for this server's ticket channels. Answer \
                        the member's latest message using only the reference material below. \
                        If the answer is not covered, ask for the details you need or say that \
                        a moderator will follow up.";

/// A reply ready to be sent into a ticket channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub channel_id: ChannelId,
    pub text: String,
}

pub struct DraftingAdapter {
    provider: Arc<dyn LlmProvider>,
    window: usize,
    timeout: Duration,
}

impl DraftingAdapter {
    /// `window` is how many trailing turns go into each prompt; `timeout`
    /// bounds one draft including the client's retries.
    pub fn new(provider: Arc<dyn LlmProvider>, window: usize, timeout: Duration) -> Self {
        Self {
            provider,
            window: window.max(1),
            timeout,
        }
    }

    /// Build the bounded prompt: one system preamble carrying the reference
    /// texts, then the most recent turns of the conversation.
    #[must_use]
    pub fn build_prompt(&self, session: &Session, texts: &ReferenceTexts) -> Vec<ChatMessage> {
        let mut system = String::from(PREAMBLE);
        for (title, body) in texts.sections() {
            if body.trim().is_empty() {
                continue;
            }
            system.push_str("\n\n## ");
            system.push_str(title);
            system.push('\n');
            system.push_str(body);
        }

        let mut messages = Vec::with_capacity(self.window + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(session.recent(self.window).filter_map(|turn| {
            match &turn.speaker {
                Speaker::Member { name, .. } => {
                    Some(ChatMessage::user(format!("{name}: {}", turn.text)))
                },
                Speaker::Staff { name, .. } => {
                    Some(ChatMessage::user(format!("[staff] {name}: {}", turn.text)))
                },
                Speaker::Assistant => Some(ChatMessage::assistant(turn.text.clone())),
                Speaker::System => None,
            }
        }));
        messages
    }

    /// Ask the model for a reply to the session's latest turns.
    pub async fn draft(
        &self,
        session: &Session,
        texts: &ReferenceTexts,
    ) -> Result<OutgoingMessage, DraftError> {
        let messages = self.build_prompt(session, texts);
        debug!(
            channel_id = %session.channel_id(),
            model = self.provider.id(),
            messages = messages.len(),
            "requesting draft"
        );

        let response = tokio::time::timeout(self.timeout, self.provider.complete(&messages))
            .await
            .map_err(|_| DraftError::Timeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| {
                warn!(
                    channel_id = %session.channel_id(),
                    provider = self.provider.name(),
                    error = %e,
                    "draft request failed"
                );
                DraftError::Unavailable(format!("{e:#}"))
            })?;

        let text = response.text.ok_or(DraftError::Empty)?;
        debug!(
            channel_id = %session.channel_id(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "draft produced"
        );
        Ok(OutgoingMessage {
            channel_id: session.channel_id(),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{machine::Event, session::Turn},
        async_trait::async_trait,
        chrono::{DateTime, TimeZone, Utc},
        otis_agents::CompletionResponse,
        otis_common::types::UserId,
        std::sync::Mutex,
    };

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    enum Reply {
        Text(&'static str),
        Blank,
        Fail,
        Hang,
    }

    struct ScriptedProvider {
        reply: Reply,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl ScriptedProvider {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn id(&self) -> &str {
            "scripted-model"
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
        ) -> anyhow::Result<CompletionResponse> {
            *self.seen.lock().unwrap() = messages.to_vec();
            match self.reply {
                Reply::Text(text) => Ok(CompletionResponse {
                    text: Some(text.into()),
                    ..Default::default()
                }),
                Reply::Blank => Ok(CompletionResponse::default()),
                Reply::Fail => anyhow::bail!("HTTP 503 service unavailable"),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                },
            }
        }
    }

    fn texts() -> ReferenceTexts {
        ReferenceTexts::new("Be kind.", "No spam.", "", "Raffle on Friday.")
    }

    fn session_with(turns: &[(Speaker, &str)]) -> Session {
        let mut s = Session::new(ChannelId(7), 50, at(0));
        for (i, (speaker, text)) in turns.iter().enumerate() {
            let turn = Turn::new(speaker.clone(), *text, at(i as i64 + 1));
            let event = match speaker {
                Speaker::Member { .. } => Event::MemberMessage(turn),
                _ => Event::StaffMessage(turn),
            };
            let _ = s.apply(event);
        }
        s
    }

    fn member(name: &str) -> Speaker {
        Speaker::Member {
            id: UserId(1),
            name: name.into(),
        }
    }

    #[test]
    fn prompt_has_preamble_then_window() {
        let provider = ScriptedProvider::new(Reply::Blank);
        let adapter = DraftingAdapter::new(provider, 2, Duration::from_secs(5));
        let session = session_with(&[
            (member("ana"), "first"),
            (member("ana"), "second"),
            (
                Speaker::Staff {
                    id: UserId(2),
                    name: "mod".into(),
                },
                "checking",
            ),
        ]);

        let prompt = adapter.build_prompt(&session, &texts());
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt[0].role(), "system");
        let system = prompt[0].content();
        assert!(system.contains("## Style guide\nBe kind."));
        assert!(system.contains("## Raffle information\nRaffle on Friday."));
        assert!(!system.contains("## Domain guide"));
        assert_eq!(prompt[1], ChatMessage::user("ana: second"));
        assert_eq!(prompt[2], ChatMessage::user("[staff] mod: checking"));
    }

    #[test]
    fn system_notices_stay_out_of_the_prompt() {
        let provider = ScriptedProvider::new(Reply::Blank);
        let adapter = DraftingAdapter::new(provider, 10, Duration::from_secs(5));
        let mut session = session_with(&[(member("ana"), "help")]);
        let _ = session.apply(Event::DraftFailed {
            reason: "timeout",
            at: at(5),
        });

        let prompt = adapter.build_prompt(&session, &texts());
        assert_eq!(prompt.len(), 2);
        assert!(prompt.iter().all(|m| !m.content().contains("draft failed")));
    }

    #[tokio::test]
    async fn successful_draft_is_verbatim() {
        let provider = ScriptedProvider::new(Reply::Text("Have you tried turning it off?"));
        let adapter = DraftingAdapter::new(provider.clone(), 5, Duration::from_secs(5));
        let session = session_with(&[(member("ana"), "I need help")]);

        let out = adapter.draft(&session, &texts()).await.unwrap();
        assert_eq!(out, OutgoingMessage {
            channel_id: ChannelId(7),
            text: "Have you tried turning it off?".into(),
        });
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&ChatMessage::user("ana: I need help")));
    }

    #[tokio::test]
    async fn provider_error_is_unavailable() {
        let adapter = DraftingAdapter::new(
            ScriptedProvider::new(Reply::Fail),
            5,
            Duration::from_secs(5),
        );
        let session = session_with(&[(member("ana"), "hi")]);
        let err = adapter.draft(&session, &texts()).await.unwrap_err();
        assert!(matches!(err, DraftError::Unavailable(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn blank_answer_is_empty() {
        let adapter = DraftingAdapter::new(
            ScriptedProvider::new(Reply::Blank),
            5,
            Duration::from_secs(5),
        );
        let session = session_with(&[(member("ana"), "hi")]);
        assert!(matches!(
            adapter.draft(&session, &texts()).await,
            Err(DraftError::Empty)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let adapter = DraftingAdapter::new(
            ScriptedProvider::new(Reply::Hang),
            5,
            Duration::from_secs(120),
        );
        let session = session_with(&[(member("ana"), "hi")]);
        assert!(matches!(
            adapter.draft(&session, &texts()).await,
            Err(DraftError::Timeout { secs: 120 })
        ));
    }
}
