//! Config schema: Discord account, OpenAI client, ticket routing and
//! reference text locations.
use std::{path::PathBuf, time::Duration};

use {
    otis_common::types::{CategoryId, ChannelId, RoleId},
    secrecy::Secret,
    serde::Deserialize,
};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OtisConfig {
    pub discord: DiscordConfig,
    pub openai: OpenAiConfig,
    pub tickets: TicketsConfig,
    pub references: ReferencesConfig,
}

/// Discord bot account.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token from the developer portal.
    pub token: Secret<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
        }
    }
}

/// OpenAI-compatible chat completions endpoint used for drafting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Secret<String>,
    /// Model identifier sent with every draft request.
    pub model: String,
    pub base_url: String,
    /// Per-attempt request timeout.
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub initial_backoff_ms: u64,
    /// Cap on any single retry delay, including server `Retry-After` hints.
    pub max_backoff_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            timeout_secs: 30,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 20_000,
        }
    }
}

impl OpenAiConfig {
    /// Longest a single completion can take once every retry is spent: each
    /// attempt runs to its timeout and each retry waits the full backoff cap.
    #[must_use]
    pub fn retry_budget(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        Duration::from_secs(self.timeout_secs)
            .saturating_mul(attempts)
            .saturating_add(
                Duration::from_millis(self.max_backoff_ms).saturating_mul(self.max_retries),
            )
    }
}

/// Ticket routing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TicketsConfig {
    /// Channel categories whose channels are support tickets.
    pub category_ids: Vec<CategoryId>,
    /// Roles allowed to issue `close`, `escalate`, `resume`, `mute`, `unmute`.
    pub control_role_ids: Vec<RoleId>,
    /// Maximum turns kept per session; oldest turns are evicted first.
    pub history_cap: usize,
    /// Trailing turns included in each draft prompt.
    pub draft_window: usize,
    /// Upper bound on one draft, retries included. Must cover
    /// `OpenAiConfig::retry_budget` or retries are cut short.
    pub draft_timeout_secs: u64,
    /// Sessions idle for longer than this are closed by the sweeper.
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    /// Optional prefix for control commands, e.g. `!close`. Bare words are
    /// always accepted.
    pub command_prefix: String,
    /// Moderator channel that receives repeated draft failure alerts.
    pub alert_channel_id: Option<ChannelId>,
    /// Consecutive draft failures in one ticket before an alert is posted.
    pub failure_alert_threshold: u32,
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            category_ids: Vec::new(),
            control_role_ids: Vec::new(),
            history_cap: 40,
            draft_window: 12,
            draft_timeout_secs: 200,
            idle_timeout_secs: 3600,
            sweep_interval_secs: 60,
            command_prefix: "!".into(),
            alert_channel_id: None,
            failure_alert_threshold: 3,
        }
    }
}

/// Where the four reference texts are read from at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReferencesConfig {
    /// Directory the file names below are resolved against.
    pub dir: PathBuf,
    pub style: String,
    pub rules: String,
    pub domain_guide: String,
    pub raffle: String,
    /// Each text is truncated to this many characters.
    pub max_chars: usize,
}

impl ReferencesConfig {
    #[must_use]
    pub fn style_path(&self) -> PathBuf {
        self.dir.join(&self.style)
    }

    #[must_use]
    pub fn rules_path(&self) -> PathBuf {
        self.dir.join(&self.rules)
    }

    #[must_use]
    pub fn domain_guide_path(&self) -> PathBuf {
        self.dir.join(&self.domain_guide)
    }

    #[must_use]
    pub fn raffle_path(&self) -> PathBuf {
        self.dir.join(&self.raffle)
    }
}

impl Default for ReferencesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("texts"),
            style: "style.txt".into(),
            rules: "rules.txt".into(),
            domain_guide: "zorp_guide.txt".into(),
            raffle: "raffle.txt".into(),
            max_chars: 12_000,
        }
    }
}
