use std::{sync::Arc, time::Duration};

use {
    anyhow::bail,
    secrecy::ExposeSecret,
    serenity::{Client, http::Http},
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

use {
    otis_agents::{LlmProvider, RetryPolicy, RetryingProvider, providers::openai::OpenAiProvider},
    otis_config::{OtisConfig, Severity, validate},
    otis_discord::{DiscordHandler, DiscordSender},
    otis_tickets::{
        DraftingAdapter, Eligibility, ReferenceTexts, RouterSettings, SessionTable,
        StartupGuard, TicketRouter, spawn_idle_sweeper,
    },
};

/// Wire everything together and serve until the gateway stops or Ctrl-C.
pub async fn run(config: OtisConfig) -> anyhow::Result<()> {
    let report = validate(&config);
    for d in &report.diagnostics {
        match d.severity {
            Severity::Error => error!(path = d.path, "{}", d.message),
            Severity::Warning => warn!(path = d.path, "{}", d.message),
        }
    }
    if report.has_errors() {
        bail!(
            "configuration has {} error(s); run `otis check` for details",
            report.count(Severity::Error)
        );
    }

    let texts = Arc::new(ReferenceTexts::load(&config.references));
    let missing = texts.missing();
    if !missing.is_empty() {
        warn!(?missing, "some reference texts are empty");
    }

    let openai = &config.openai;
    let base = OpenAiProvider::new(
        openai.api_key.clone(),
        &openai.model,
        &openai.base_url,
        Duration::from_secs(openai.timeout_secs),
    )?;
    let provider: Arc<dyn LlmProvider> = Arc::new(RetryingProvider::new(
        Arc::new(base),
        RetryPolicy {
            max_retries: openai.max_retries,
            initial_backoff: Duration::from_millis(openai.initial_backoff_ms),
            max_backoff: Duration::from_millis(openai.max_backoff_ms),
        },
    ));

    let tickets = &config.tickets;
    let table = Arc::new(SessionTable::new(tickets.history_cap));
    let drafter = DraftingAdapter::new(
        provider,
        tickets.draft_window,
        Duration::from_secs(tickets.draft_timeout_secs),
    );

    let token = config.discord.token.expose_secret();
    let sender = Arc::new(DiscordSender::new(Arc::new(Http::new(token))));
    let router = Arc::new(TicketRouter::new(
        Eligibility::from_config(tickets),
        Arc::clone(&table),
        drafter,
        texts,
        sender,
        RouterSettings::from_config(tickets),
    ));

    let cancel = CancellationToken::new();
    let sweeper = spawn_idle_sweeper(
        Arc::clone(&table),
        Duration::from_secs(tickets.idle_timeout_secs),
        Duration::from_secs(tickets.sweep_interval_secs),
        cancel.clone(),
    );

    // This build ships without the remote-console and position-printing
    // bridges; the guard still latches on the first ready event.
    info!("no bridge subsystems configured");
    let handler = DiscordHandler::new(router, Arc::new(StartupGuard::new()));

    let mut client = Client::builder(token, DiscordHandler::intents())
        .event_handler(handler)
        .await?;
    let shard_manager = Arc::clone(&client.shard_manager);

    info!(
        model = %openai.model,
        ticket_categories = tickets.category_ids.len(),
        control_roles = tickets.control_role_ids.len(),
        "connecting to discord"
    );

    let result = tokio::select! {
        res = client.start() => res.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            shard_manager.shutdown_all().await;
            Ok(())
        }
    };

    cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "idle sweeper task ended abnormally");
    }
    result
}
