use async_trait::async_trait;

use otis_common::types::ChannelId;

/// Send text into a channel on the chat platform.
///
/// The router never talks to the platform directly; it is handed one of
/// these at wiring time.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, channel_id: ChannelId, text: &str) -> anyhow::Result<()>;
}
