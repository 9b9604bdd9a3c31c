use thiserror::Error;

use otis_common::types::ChannelId;

/// Why a draft could not be produced. Never shown to the ticket author.
#[derive(Debug, Error)]
pub enum DraftError {
    /// The draft did not complete within the configured bound.
    #[error("draft timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The AI client failed after its own retries.
    #[error("ai client unavailable: {0}")]
    Unavailable(String),

    /// The model answered with no usable text.
    #[error("ai client returned an empty draft")]
    Empty,
}

impl DraftError {
    /// Short label used in logs and moderator alerts.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Unavailable(_) => "unavailable",
            Self::Empty => "empty",
        }
    }
}

/// A bridge subsystem failed to start.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("bridge {bridge} failed to start: {source}")]
    Failed {
        bridge: String,
        #[source]
        source: anyhow::Error,
    },
}

impl BootstrapError {
    #[must_use]
    pub fn bridge(&self) -> &str {
        match self {
            Self::Failed { bridge, .. } => bridge,
        }
    }
}

/// Faults inside the router itself. Caught at the dispatch boundary.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The session kept closing underneath us while we tried to lock it.
    #[error("session for channel {channel_id} unavailable")]
    SessionUnavailable { channel_id: ChannelId },

    #[error("router panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;
