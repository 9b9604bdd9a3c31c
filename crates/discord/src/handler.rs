//! Discord event handler for serenity.
//!
//! Normalizes guild messages for the ticket router and drives the startup
//! guard from `ready` events.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    serenity::{
        all::{Channel, Context, EventHandler, GatewayIntents, GuildId, Message, Ready},
        async_trait,
        http::Http,
    },
    tracing::{debug, info, warn},
};

use {
    otis_common::types::{Author, CategoryId, ChannelId, InboundMessage, RoleId, UserId},
    otis_tickets::{Bridge, StartupGuard, StartupOutcome, TicketRouter},
};

/// A bridge subsystem that receives the bot's REST client when started.
pub type DiscordBridge = Arc<dyn Bridge<Arc<Http>>>;

/// Handler for Discord gateway events.
pub struct DiscordHandler {
    router: Arc<TicketRouter>,
    startup: Arc<StartupGuard>,
    console_bridge: Option<DiscordBridge>,
    position_bridge: Option<DiscordBridge>,
}

impl DiscordHandler {
    pub fn new(router: Arc<TicketRouter>, startup: Arc<StartupGuard>) -> Self {
        Self {
            router,
            startup,
            console_bridge: None,
            position_bridge: None,
        }
    }

    /// Attach the remote-console and position-printing bridges. Either may be
    /// absent.
    #[must_use]
    pub fn with_bridges(
        mut self,
        console: Option<DiscordBridge>,
        position: Option<DiscordBridge>,
    ) -> Self {
        self.console_bridge = console;
        self.position_bridge = position;
        self
    }

    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::MESSAGE_CONTENT
    }

    /// Start the attached bridges unless an earlier ready event already did.
    pub async fn start_bridges(&self, http: Arc<Http>) -> StartupOutcome {
        let outcome = self
            .startup
            .ensure_started(
                http,
                self.console_bridge.as_deref(),
                self.position_bridge.as_deref(),
            )
            .await;
        if let StartupOutcome::Started { failures } = &outcome {
            info!(failed = failures.len(), "bridge startup finished");
        }
        outcome
    }

    /// The category the channel sits in, if any.
    async fn channel_category(ctx: &Context, msg: &Message) -> Option<CategoryId> {
        match msg.channel_id.to_channel(ctx).await {
            Ok(Channel::Guild(channel)) => channel.parent_id.map(|id| CategoryId(id.get())),
            Ok(_) => None,
            Err(e) => {
                warn!(channel_id = %msg.channel_id, error = %e, "failed to resolve channel");
                None
            },
        }
    }
}

/// Convert a serenity message into the platform-neutral shape.
pub fn to_inbound(msg: &Message, category_id: Option<CategoryId>) -> InboundMessage {
    let roles = msg
        .member
        .as_ref()
        .map(|member| member.roles.iter().map(|r| RoleId(r.get())).collect())
        .unwrap_or_default();
    let name = msg
        .author
        .global_name
        .clone()
        .unwrap_or_else(|| msg.author.name.clone());
    let timestamp =
        DateTime::<Utc>::from_timestamp(msg.timestamp.unix_timestamp(), 0).unwrap_or_else(Utc::now);

    InboundMessage {
        channel_id: ChannelId(msg.channel_id.get()),
        category_id,
        author: Author {
            id: UserId(msg.author.id.get()),
            name,
            roles,
            is_bot: msg.author.bot,
        },
        text: msg.content.clone(),
        timestamp,
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );

        self.start_bridges(Arc::clone(&ctx.http)).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Skip bot messages to prevent loops
        if msg.author.bot {
            return;
        }
        // DMs are never tickets.
        if msg.guild_id.is_none() {
            return;
        }

        let category_id = Self::channel_category(&ctx, &msg).await;
        let inbound = to_inbound(&msg, category_id);
        let handled = self.router.handle_message(&inbound).await;
        debug!(
            channel_id = %inbound.channel_id,
            handled,
            "ticket router verdict"
        );
    }

    async fn cache_ready(&self, _ctx: Context, guilds: Vec<GuildId>) {
        debug!(guild_count = guilds.len(), "discord cache ready");
    }
}
