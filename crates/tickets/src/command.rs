//! Control commands issued by AI-control role holders inside a ticket.
//!
//! A command is the whole message: a bare keyword (`close`) or the keyword
//! behind the configured prefix (`!close`), case-insensitive. Anything longer
//! is conversation, so "please close the door" never closes a ticket.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    Close,
    Escalate,
    Resume,
    Mute,
    Unmute,
}

impl ControlCommand {
    pub const ALL: &'static [ControlCommand] = &[
        Self::Close,
        Self::Escalate,
        Self::Resume,
        Self::Mute,
        Self::Unmute,
    ];

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Escalate => "escalate",
            Self::Resume => "resume",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
        }
    }

    /// Parse a message body as a control command.
    #[must_use]
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let trimmed = text.trim();
        let word = if !prefix.is_empty() {
            trimmed.strip_prefix(prefix).unwrap_or(trimmed)
        } else {
            trimmed
        };
        let word = word.trim();
        if word.is_empty() || word.contains(char::is_whitespace) {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|cmd| cmd.keyword().eq_ignore_ascii_case(word))
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
