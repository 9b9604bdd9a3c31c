use std::sync::Arc;

use {
    async_trait::async_trait,
    serenity::{all::ChannelId as DiscordChannelId, http::Http},
    tracing::debug,
};

use {otis_common::types::ChannelId, otis_tickets::MessageSender};

/// Discord's per-message content limit.
pub const DISCORD_MAX_MESSAGE_LEN: usize = 2000;

/// Sends ticket replies and moderator alerts through the Discord REST API.
pub struct DiscordSender {
    http: Arc<Http>,
}

impl DiscordSender {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MessageSender for DiscordSender {
    async fn send_text(&self, channel_id: ChannelId, text: &str) -> anyhow::Result<()> {
        let target = DiscordChannelId::new(channel_id.get());
        let chunks = chunk_message(text, DISCORD_MAX_MESSAGE_LEN);
        debug!(channel_id = %channel_id, chunks = chunks.len(), "sending discord message");
        for chunk in chunks {
            target.say(self.http.as_ref(), chunk).await?;
        }
        Ok(())
    }
}

/// Split text into pieces of at most `max_len` bytes, preferring line
/// breaks, then spaces, and never cutting inside a character.
#[must_use]
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
    let text = text.trim();
    if max_len == 0 || text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > max_len {
        let window = match rest.floor_char_boundary(max_len) {
            0 => rest.chars().next().map_or(rest.len(), char::len_utf8),
            end => end,
        };
        let head = &rest[..window];
        let cut = head
            .rfind('\n')
            .or_else(|| head.rfind(' '))
            .filter(|&at| at > 0)
            .unwrap_or(window);
        chunks.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}
