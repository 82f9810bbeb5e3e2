use anyhow::Context;
use clap::{Parser, Subcommand};
use lib::config::{ProcessEnv, RelaySettings, TelegramSettings};
use lib::relay::{Relay, INBOUND_CAPACITY};
use lib::webhook::WebhookSender;
use std::path::PathBuf;
use std::sync::Arc;
use telegram_session::TelegramSession;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "tg-relay")]
#[command(about = "Forward Telegram messages from allowed chats to an n8n webhook", long_about = None)]
struct Cli {
    /// Config file path (default: TG_RELAY_CONFIG_PATH or ~/.tg-relay/config.json)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Environment file to load (default: .env in the working directory, if present)
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Sign in to Telegram interactively and save the session file. Needed once before `run`.
    Login,

    /// List your chats with their IDs, to help fill TELEGRAM_WHITELIST_CHATS.
    Chats,

    /// Listen for new messages and forward allowed ones to the webhook until interrupted.
    Run,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Before the logger, so RUST_LOG from the env file applies.
    let dotenv = lib::config::load_dotenv(cli.env_file.as_deref());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match dotenv {
        Ok(Some(path)) => log::debug!("loaded environment from {}", path.display()),
        Ok(None) => log::debug!("no .env file found"),
        Err(e) if cli.env_file.is_some() => {
            log::error!("loading env file: {}", e);
            std::process::exit(1);
        }
        Err(e) => log::warn!("ignoring malformed .env file: {}", e),
    }

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("tg-relay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Login) => run_login(cli.config).await,
        Some(Commands::Chats) => run_chats(cli.config).await,
        Some(Commands::Run) => run_relay(cli.config).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };
    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn telegram_settings(config_path: Option<PathBuf>) -> anyhow::Result<TelegramSettings> {
    let (config, _) = lib::config::load_config(config_path)?;
    TelegramSettings::resolve(&config, &ProcessEnv).context("invalid configuration")
}

fn prompt_line(question: &str) -> std::io::Result<String> {
    use std::io::{self, Write};

    let mut stdout = io::stdout();
    write!(stdout, "{}", question)?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

async fn run_login(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = telegram_settings(config_path)?;
    let session = TelegramSession::connect(&settings).await?;
    session.login_interactive(&settings.phone, prompt_line).await?;
    println!("logged in; session saved to {}", session.session_path().display());
    Ok(())
}

async fn run_chats(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = telegram_settings(config_path)?;
    let session = TelegramSession::connect(&settings).await?;
    session.require_authorized().await?;
    let dialogs = session.list_dialogs().await?;
    print!("{}", lib::discover::render_dialogs(&dialogs));
    Ok(())
}

async fn run_relay(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let settings = RelaySettings::resolve(&config, &ProcessEnv).context("invalid configuration")?;

    if settings.allow_list.is_empty() {
        log::warn!(
            "no allow-list configured - ALL chats are forwarded; set TELEGRAM_WHITELIST_CHATS to restrict"
        );
    } else {
        log::info!(
            "monitoring {} allowed chats: {:?}",
            settings.allow_list.len(),
            settings.allow_list.ids_sorted()
        );
    }

    let sender = WebhookSender::new(&settings.webhook_url, settings.webhook_timeout)?;
    log::info!("webhook endpoint: {}", sender.url());

    let session = TelegramSession::connect(&settings.telegram).await?;
    session.require_authorized().await?;
    log::info!("connected to telegram");

    let relay = Relay::new(Arc::new(settings.allow_list), sender);
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let updates = session.start_inbound(inbound_tx);
    log::info!("listening for messages (Ctrl+C to stop)");

    relay.run(inbound_rx, lib::relay::shutdown_signal()).await;

    let update_result = lib::relay::stop_producer(updates).await;
    if let Err(e) = session.save() {
        log::warn!("saving session on shutdown failed: {}", e);
    }
    log::info!("relay stopped");
    update_result.context("telegram update loop failed")
}
