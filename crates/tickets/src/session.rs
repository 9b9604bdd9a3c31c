//! The per-channel session record.
//!
//! Fields are read through accessors; the state and flags only change through
//! [`Session::apply`](crate::machine), and history only grows at the back and
//! shrinks at the front.

use std::collections::VecDeque;

use {
    chrono::{DateTime, Utc},
    otis_common::types::{ChannelId, UserId},
};

/// Conversation state of one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    AwaitingUserInfo,
    AwaitingAiReply,
    Escalated,
    Closed,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Speaker {
    /// A ticket participant without a control role.
    Member { id: UserId, name: String },
    /// A control-role holder talking in the ticket.
    Staff { id: UserId, name: String },
    Assistant,
    /// Notices the router records for auditing; never sent to the model.
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            speaker,
            text: text.into(),
            at,
        }
    }
}

/// Flags only control-role holders can change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlags {
    pub ai_muted: bool,
    pub escalated: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    channel_id: ChannelId,
    pub(crate) state: SessionState,
    history: VecDeque<Turn>,
    history_cap: usize,
    pub(crate) last_activity: DateTime<Utc>,
    pub(crate) flags: ControlFlags,
    pub(crate) consecutive_failures: u32,
}

impl Session {
    /// A fresh `Idle` session with empty history. A cap of zero is raised to one.
    #[must_use]
    pub fn new(channel_id: ChannelId, history_cap: usize, now: DateTime<Utc>) -> Self {
        let history_cap = history_cap.max(1);
        Self {
            channel_id,
            state: SessionState::Idle,
            history: VecDeque::with_capacity(history_cap.min(64)),
            history_cap,
            last_activity: now,
            flags: ControlFlags::default(),
            consecutive_failures: 0,
        }
    }

    #[must_use]
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn flags(&self) -> ControlFlags {
        self.flags
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    #[must_use]
    pub fn history_cap(&self) -> usize {
        self.history_cap
    }

    /// Draft failures since the last successful draft.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// The most recent `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Turn> {
        self.history.iter().skip(self.history.len().saturating_sub(n))
    }

    /// Append a turn, evicting from the front past the cap.
    pub(crate) fn record(&mut self, turn: Turn) {
        if turn.at > self.last_activity {
            self.last_activity = turn.at;
        }
        self.history.push_back(turn);
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_activity {
            self.last_activity = at;
        }
    }
}
