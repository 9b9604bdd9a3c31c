mod check_command;
mod run_command;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    otis_config::OtisConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "otis", about = "Otis: AI-assisted support tickets for Discord")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/otis/).
    #[arg(long, global = true, env = "OTIS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and serve tickets (default when no subcommand is provided).
    Run,
    /// Validate the configuration and reference texts, then exit.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// File config (explicit path or discovered), then environment overrides.
fn load_config(path: Option<&Path>) -> anyhow::Result<OtisConfig> {
    let mut config = match path {
        Some(path) => otis_config::load_config(path)?,
        None => otis_config::discover_and_load(),
    };
    otis_config::apply_process_env(&mut config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "otis starting");

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        None | Some(Commands::Run) => run_command::run(config).await,
        Some(Commands::Check) => check_command::check(&config),
    }
}
