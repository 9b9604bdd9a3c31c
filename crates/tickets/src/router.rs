//! Ticket message router.
//!
//! [`TicketRouter::handle_message`] is called for every guild message. It
//! returns `true` when the message belonged to a ticket and was consumed;
//! the caller then skips its generic command handling.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use {
    chrono::Utc,
    futures::FutureExt,
    otis_common::types::{ChannelId, InboundMessage},
    otis_config::TicketsConfig,
    tracing::{debug, error, info, warn},
};

use crate::{
    command::ControlCommand,
    draft::DraftingAdapter,
    eligibility::Eligibility,
    error::{DraftError, Result, RouterError},
    machine::{Effect, Event},
    outbound::MessageSender,
    reference::ReferenceTexts,
    session::{Speaker, Turn},
    table::{SessionGuard, SessionTable},
};

/// Attempts to find a live session before giving up on a message.
const MAX_SESSION_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Optional prefix in front of control commands.
    pub command_prefix: String,
    /// Where repeated draft failures are reported.
    pub alert_channel_id: Option<ChannelId>,
    /// Consecutive failures in one ticket that trigger the alert. Zero disables it.
    pub failure_alert_threshold: u32,
}

impl RouterSettings {
    #[must_use]
    pub fn from_config(config: &TicketsConfig) -> Self {
        Self {
            command_prefix: config.command_prefix.clone(),
            alert_channel_id: config.alert_channel_id,
            failure_alert_threshold: config.failure_alert_threshold,
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from_config(&TicketsConfig::default())
    }
}

pub struct TicketRouter {
    eligibility: Eligibility,
    table: Arc<SessionTable>,
    drafter: DraftingAdapter,
    texts: Arc<ReferenceTexts>,
    sender: Arc<dyn MessageSender>,
    settings: RouterSettings,
}

impl TicketRouter {
    pub fn new(
        eligibility: Eligibility,
        table: Arc<SessionTable>,
        drafter: DraftingAdapter,
        texts: Arc<ReferenceTexts>,
        sender: Arc<dyn MessageSender>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            eligibility,
            table,
            drafter,
            texts,
            sender,
            settings,
        }
    }

    #[must_use]
    pub fn table(&self) -> &Arc<SessionTable> {
        &self.table
    }

    /// Route one inbound message. Returns whether it was handled as a ticket
    /// message.
    ///
    /// Never fails: internal faults and panics are logged and reported as
    /// "not handled" for this message only.
    pub async fn handle_message(&self, msg: &InboundMessage) -> bool {
        if msg.author.is_bot {
            return false;
        }
        if !self.eligibility.is_ticket(msg.category_id) {
            debug!(
                channel_id = %msg.channel_id,
                category_id = ?msg.category_id,
                "not a ticket channel"
            );
            return false;
        }

        match AssertUnwindSafe(self.route(msg)).catch_unwind().await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(channel_id = %msg.channel_id, error = %e, "ticket routing failed");
                false
            },
            Err(payload) => {
                let e = RouterError::Panicked(panic_message(&*payload));
                error!(channel_id = %msg.channel_id, error = %e, "ticket routing failed");
                false
            },
        }
    }

    async fn route(&self, msg: &InboundMessage) -> Result<()> {
        let event = self.classify(msg);
        for _ in 0..MAX_SESSION_ATTEMPTS {
            let handle = self.table.get_or_create(msg.channel_id, msg.timestamp);
            let mut session = handle.lock().await;
            if session.expired() {
                let _ = session.apply(Event::Expired);
            }
            if session.state().is_terminal() {
                debug!(channel_id = %msg.channel_id, "session closed while waiting, retrying");
                continue;
            }
            return self.drive(&mut session, event).await;
        }
        Err(RouterError::SessionUnavailable {
            channel_id: msg.channel_id,
        })
    }

    /// Turn a platform message into a state machine event. Whether a
    /// command word takes effect is decided by the state machine.
    fn classify(&self, msg: &InboundMessage) -> Event {
        let author = &msg.author;
        let authorized = self.eligibility.is_control(&author.roles);
        let speaker = if authorized {
            Speaker::Staff {
                id: author.id,
                name: author.name.clone(),
            }
        } else {
            Speaker::Member {
                id: author.id,
                name: author.name.clone(),
            }
        };
        let turn = Turn::new(speaker, msg.text.clone(), msg.timestamp);

        match ControlCommand::parse(&msg.text, &self.settings.command_prefix) {
            Some(command) => Event::Command {
                command,
                authorized,
                turn,
            },
            None if authorized => Event::StaffMessage(turn),
            None => Event::MemberMessage(turn),
        }
    }

    async fn drive(&self, session: &mut SessionGuard<'_>, event: Event) -> Result<()> {
        let channel_id = session.channel_id();
        let transition = session.apply(event);
        debug!(
            channel_id = %channel_id,
            from = ?transition.from,
            to = ?transition.to,
            effect = ?transition.effect,
            "ticket transition"
        );
        session.commit();
        match transition.effect {
            Effect::RequestDraft => {},
            Effect::Closed => {
                info!(channel_id = %channel_id, "ticket session closed");
                return Ok(());
            },
            _ => return Ok(()),
        }

        let drafted = self.drafter.draft(&**session, &self.texts).await;
        if session.expired() {
            debug!(channel_id = %channel_id, "session expired during draft");
            let _ = session.apply(Event::Expired);
        }

        match drafted {
            Ok(reply) => {
                let transition = session.apply(Event::DraftProduced {
                    text: reply.text.clone(),
                    at: Utc::now(),
                });
                if transition.effect != Effect::Deliver {
                    debug!(channel_id = %channel_id, state = ?transition.to, "draft kept, not delivered");
                    return Ok(());
                }
                if let Err(e) = self.sender.send_text(reply.channel_id, &reply.text).await {
                    warn!(channel_id = %channel_id, error = %e, "failed to send ticket reply");
                }
            },
            Err(e) => {
                warn!(channel_id = %channel_id, kind = e.kind(), error = %e, "draft failed");
                let transition = session.apply(Event::DraftFailed {
                    reason: e.kind(),
                    at: Utc::now(),
                });
                if let Effect::DraftFailed { consecutive } = transition.effect {
                    self.maybe_alert(channel_id, consecutive, &e).await;
                }
            },
        }
        Ok(())
    }

    /// Tell moderators once a ticket's drafts keep failing. The alert goes to
    /// the configured moderator channel, never into the ticket.
    async fn maybe_alert(&self, channel_id: ChannelId, consecutive: u32, err: &DraftError) {
        let threshold = self.settings.failure_alert_threshold;
        if threshold == 0 || consecutive != threshold {
            return;
        }
        warn!(
            channel_id = %channel_id,
            consecutive,
            kind = err.kind(),
            "ticket drafts keep failing"
        );
        let Some(alert_channel) = self.settings.alert_channel_id else {
            return;
        };
        let text = format!(
            "Ticket <#{channel_id}>: AI drafting failed {consecutive} times in a row ({}). A moderator may need to take over.",
            err.kind()
        );
        if let Err(e) = self.sender.send_text(alert_channel, &text).await {
            warn!(channel_id = %alert_channel, error = %e, "failed to send moderator alert");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}
