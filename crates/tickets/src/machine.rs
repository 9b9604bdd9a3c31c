//! Conversation state machine.
//!
//! [`Session::apply`] is the only place a session's state or control flags
//! change. It records turns and reports what the caller should do next; it
//! never performs I/O.

use chrono::{DateTime, Utc};

use crate::{
    command::ControlCommand,
    session::{Session, SessionState, Speaker, Turn},
};

/// Something that happened to a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A message from an author without a control role.
    MemberMessage(Turn),
    /// A non-command message from a control-role holder.
    StaffMessage(Turn),
    /// A message that parses as a control command. `authorized` is whether
    /// the author holds a control role. An authorized command is applied and
    /// its turn discarded; an unauthorized one is plain member conversation.
    Command {
        command: ControlCommand,
        authorized: bool,
        turn: Turn,
    },
    DraftProduced {
        text: String,
        at: DateTime<Utc>,
    },
    DraftFailed {
        reason: &'static str,
        at: DateTime<Utc>,
    },
    /// The session sat idle past the configured limit.
    Expired,
}

/// What the caller should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing changed.
    Ignored,
    /// A turn was recorded; no further work.
    Recorded,
    /// A member turn was recorded and the assistant should draft a reply.
    RequestDraft,
    /// The draft was recorded and should be sent to the ticket.
    Deliver,
    /// A failure notice was recorded.
    DraftFailed { consecutive: u32 },
    /// Control flags changed.
    FlagsChanged,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub effect: Effect,
}

impl Session {
    /// Drive the session with one event.
    pub fn apply(&mut self, event: Event) -> Transition {
        let from = self.state;
        let effect = match event {
            Event::Expired => {
                self.state = SessionState::Closed;
                if from == SessionState::Closed {
                    Effect::Ignored
                } else {
                    Effect::Closed
                }
            },
            // A draft that finishes after the session closed is still kept
            // in history, but never delivered.
            Event::DraftProduced { text, at } => {
                self.record(Turn::new(Speaker::Assistant, text, at));
                self.consecutive_failures = 0;
                if from == SessionState::AwaitingAiReply {
                    self.state = SessionState::Idle;
                    Effect::Deliver
                } else {
                    Effect::Recorded
                }
            },
            Event::DraftFailed { reason, at } => {
                self.record(Turn::new(
                    Speaker::System,
                    format!("draft failed: {reason}"),
                    at,
                ));
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if from == SessionState::AwaitingAiReply {
                    self.state = SessionState::AwaitingUserInfo;
                }
                Effect::DraftFailed {
                    consecutive: self.consecutive_failures,
                }
            },
            _ if from.is_terminal() => Effect::Ignored,
            Event::MemberMessage(turn)
            | Event::Command {
                authorized: false,
                turn,
                ..
            } => self.apply_member_turn(turn),
            Event::StaffMessage(turn) => {
                self.record(turn);
                Effect::Recorded
            },
            Event::Command { command, turn, .. } => {
                self.touch(turn.at);
                self.apply_command(command)
            },
        };
        Transition {
            from,
            to: self.state,
            effect,
        }
    }

    // Muting is the one way an Idle ticket takes a member message and stays
    // Idle: the turn is kept for staff but no draft is requested.
    fn apply_member_turn(&mut self, turn: Turn) -> Effect {
        let from = self.state;
        self.record(turn);
        if self.flags.escalated || self.flags.ai_muted {
            return Effect::Recorded;
        }
        match from {
            SessionState::Idle | SessionState::AwaitingUserInfo | SessionState::AwaitingAiReply => {
                self.state = SessionState::AwaitingAiReply;
                Effect::RequestDraft
            },
            SessionState::Escalated | SessionState::Closed => Effect::Recorded,
        }
    }

    fn apply_command(&mut self, command: ControlCommand) -> Effect {
        match command {
            ControlCommand::Close => {
                self.state = SessionState::Closed;
                Effect::Closed
            },
            ControlCommand::Escalate => {
                self.flags.escalated = true;
                self.state = SessionState::Escalated;
                Effect::FlagsChanged
            },
            ControlCommand::Resume if self.state == SessionState::Escalated => {
                self.flags.escalated = false;
                self.state = SessionState::Idle;
                Effect::FlagsChanged
            },
            ControlCommand::Resume => Effect::Ignored,
            ControlCommand::Mute | ControlCommand::Unmute => {
                let muted = command == ControlCommand::Mute;
                if self.flags.ai_muted == muted {
                    Effect::Ignored
                } else {
                    self.flags.ai_muted = muted;
                    Effect::FlagsChanged
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        chrono::TimeZone,
        otis_common::types::{ChannelId, UserId},
        rstest::rstest,
    };

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn session() -> Session {
        Session::new(ChannelId(1), 20, at(0))
    }

    fn member(text: &str) -> Event {
        Event::MemberMessage(Turn::new(
            Speaker::Member {
                id: UserId(100),
                name: "ana".into(),
            },
            text,
            at(1),
        ))
    }

    fn staff(text: &str) -> Event {
        Event::StaffMessage(Turn::new(
            Speaker::Staff {
                id: UserId(200),
                name: "mod".into(),
            },
            text,
            at(1),
        ))
    }

    fn command(command: ControlCommand, authorized: bool) -> Event {
        Event::Command {
            command,
            authorized,
            turn: Turn::new(
                Speaker::Member {
                    id: UserId(100),
                    name: "ana".into(),
                },
                command.to_string(),
                at(2),
            ),
        }
    }

    fn in_state(state: SessionState) -> Session {
        let mut s = session();
        match state {
            SessionState::Idle => {},
            SessionState::AwaitingAiReply => {
                let _ = s.apply(member("hi"));
            },
            SessionState::AwaitingUserInfo => {
                let _ = s.apply(member("hi"));
                let _ = s.apply(Event::DraftFailed {
                    reason: "timeout",
                    at: at(2),
                });
            },
            SessionState::Escalated => {
                let _ = s.apply(command(ControlCommand::Escalate, true));
            },
            SessionState::Closed => {
                let _ = s.apply(command(ControlCommand::Close, true));
            },
        }
        assert_eq!(s.state(), state);
        s
    }

    #[test]
    fn member_message_from_idle_requests_draft() {
        let mut s = session();
        let t = s.apply(member("I need help"));
        assert_eq!(t.from, SessionState::Idle);
        assert_eq!(t.to, SessionState::AwaitingAiReply);
        assert_eq!(t.effect, Effect::RequestDraft);
        assert_eq!(s.history_len(), 1);
        assert_eq!(s.last_activity(), at(1));
    }

    #[test]
    fn idle_member_message_stays_idle_only_when_muted() {
        for event in [
            member("hi"),
            command(ControlCommand::Escalate, false),
            command(ControlCommand::Close, true),
        ] {
            let t = session().apply(event);
            assert!(
                matches!(t.to, SessionState::AwaitingAiReply | SessionState::Closed),
                "{t:?}"
            );
        }

        let mut muted = session();
        let _ = muted.apply(command(ControlCommand::Mute, true));
        let t = muted.apply(member("hi"));
        assert_eq!((t.from, t.to), (SessionState::Idle, SessionState::Idle));
        assert_eq!(t.effect, Effect::Recorded);
    }

    #[test]
    fn close_from_idle() {
        let mut s = session();
        let t = s.apply(command(ControlCommand::Close, true));
        assert_eq!(t.to, SessionState::Closed);
        assert_eq!(t.effect, Effect::Closed);
        assert_eq!(s.history_len(), 0);
    }

    #[test]
    fn produced_draft_returns_to_idle_and_delivers() {
        let mut s = in_state(SessionState::AwaitingAiReply);
        let t = s.apply(Event::DraftProduced {
            text: "Try restarting.".into(),
            at: at(5),
        });
        assert_eq!(t.to, SessionState::Idle);
        assert_eq!(t.effect, Effect::Deliver);
        assert_eq!(s.last_activity(), at(5));
        let last = s.history().last().unwrap();
        assert_eq!(last.speaker, Speaker::Assistant);
        assert_eq!(last.text, "Try restarting.");
    }

    #[test]
    fn failed_draft_waits_for_user_info() {
        let mut s = in_state(SessionState::AwaitingAiReply);
        let t = s.apply(Event::DraftFailed {
            reason: "timeout",
            at: at(3),
        });
        assert_eq!(t.to, SessionState::AwaitingUserInfo);
        assert_eq!(t.effect, Effect::DraftFailed { consecutive: 1 });
        assert_eq!(s.history().last().unwrap().speaker, Speaker::System);
    }

    #[test]
    fn further_message_retries_draft() {
        let mut s = in_state(SessionState::AwaitingUserInfo);
        let t = s.apply(member("more details"));
        assert_eq!(t.to, SessionState::AwaitingAiReply);
        assert_eq!(t.effect, Effect::RequestDraft);
    }

    #[test]
    fn failures_accumulate_until_a_draft_succeeds() {
        let mut s = session();
        for n in 1..=3 {
            let _ = s.apply(member("hello?"));
            let t = s.apply(Event::DraftFailed {
                reason: "unavailable",
                at: at(3),
            });
            assert_eq!(t.effect, Effect::DraftFailed { consecutive: n });
        }
        let _ = s.apply(member("hello?"));
        let _ = s.apply(Event::DraftProduced {
            text: "Here.".into(),
            at: at(4),
        });
        assert_eq!(s.consecutive_failures(), 0);
    }

    #[rstest]
    #[case(SessionState::Idle)]
    #[case(SessionState::AwaitingUserInfo)]
    #[case(SessionState::AwaitingAiReply)]
    fn escalate_from_non_terminal(#[case] state: SessionState) {
        let mut s = in_state(state);
        let t = s.apply(command(ControlCommand::Escalate, true));
        assert_eq!(t.to, SessionState::Escalated);
        assert!(s.flags().escalated);
    }

    #[test]
    fn escalated_session_suppresses_drafting() {
        let mut s = in_state(SessionState::Escalated);
        let t = s.apply(member("anyone there?"));
        assert_eq!(t.to, SessionState::Escalated);
        assert_eq!(t.effect, Effect::Recorded);
        assert_eq!(s.history_len(), 1);
    }

    #[test]
    fn resume_clears_escalation() {
        let mut s = in_state(SessionState::Escalated);
        let t = s.apply(command(ControlCommand::Resume, true));
        assert_eq!(t.to, SessionState::Idle);
        assert!(!s.flags().escalated);
    }

    #[test]
    fn resume_outside_escalation_is_ignored() {
        let mut s = session();
        let t = s.apply(command(ControlCommand::Resume, true));
        assert_eq!(t.effect, Effect::Ignored);
        assert_eq!(t.to, SessionState::Idle);
    }

    #[rstest]
    #[case(ControlCommand::Close)]
    #[case(ControlCommand::Escalate)]
    #[case(ControlCommand::Mute)]
    fn unauthorized_commands_are_conversation(#[case] cmd: ControlCommand) {
        let mut s = session();
        let t = s.apply(command(cmd, false));
        assert_eq!(t.effect, Effect::RequestDraft);
        assert_eq!(t.to, SessionState::AwaitingAiReply);
        assert_eq!(s.flags(), crate::session::ControlFlags::default());
        assert_eq!(s.history_len(), 1);
        assert_eq!(s.last_activity(), at(2));
    }

    #[test]
    fn muted_session_records_without_drafting() {
        let mut s = session();
        assert_eq!(
            s.apply(command(ControlCommand::Mute, true)).effect,
            Effect::FlagsChanged
        );
        let t = s.apply(member("hello"));
        assert_eq!(t.effect, Effect::Recorded);
        assert_eq!(t.to, SessionState::Idle);

        let _ = s.apply(command(ControlCommand::Unmute, true));
        assert_eq!(s.apply(member("hello again")).effect, Effect::RequestDraft);
    }

    #[test]
    fn staff_messages_never_draft() {
        let mut s = session();
        let t = s.apply(staff("looking into it"));
        assert_eq!(t.effect, Effect::Recorded);
        assert_eq!(t.to, SessionState::Idle);
    }

    #[rstest]
    #[case(SessionState::Idle)]
    #[case(SessionState::AwaitingUserInfo)]
    #[case(SessionState::AwaitingAiReply)]
    #[case(SessionState::Escalated)]
    fn expiry_closes_any_state(#[case] state: SessionState) {
        let mut s = in_state(state);
        let t = s.apply(Event::Expired);
        assert_eq!(t.to, SessionState::Closed);
        assert_eq!(t.effect, Effect::Closed);
    }

    #[test]
    fn closed_session_ignores_conversation() {
        let mut s = in_state(SessionState::Closed);
        assert_eq!(s.apply(member("hello")).effect, Effect::Ignored);
        assert_eq!(
            s.apply(command(ControlCommand::Escalate, true)).effect,
            Effect::Ignored
        );
        assert_eq!(s.history_len(), 0);
        assert_eq!(s.state(), SessionState::Closed);
    }

    #[test]
    fn late_draft_after_expiry_is_kept_but_not_delivered() {
        let mut s = in_state(SessionState::AwaitingAiReply);
        let _ = s.apply(Event::Expired);
        let t = s.apply(Event::DraftProduced {
            text: "late".into(),
            at: at(9),
        });
        assert_eq!(t.to, SessionState::Closed);
        assert_eq!(t.effect, Effect::Recorded);
        assert_eq!(s.history().last().unwrap().text, "late");
    }
}
