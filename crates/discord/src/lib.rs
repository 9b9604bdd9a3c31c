//! Discord transport: gateway events in, REST messages out.

pub mod handler;
pub mod outbound;

pub use {
    handler::{DiscordBridge, DiscordHandler, to_inbound},
    outbound::{DISCORD_MAX_MESSAGE_LEN, DiscordSender, chunk_message},
};
