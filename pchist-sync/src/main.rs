//! pchist-sync - Main entry point
//!
//! Pulls the Pocket Casts listening history and appends newly listened
//! episodes to the local SQLite database. Also offers a few read-only
//! commands against the store and the Pocket Casts API.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pchist_common::config::{
    resolve_config_path, DataFolderInitializer, DataFolderResolver, TomlConfig,
};
use pchist_sync::config::{resolve_credentials, Credentials};
use pchist_sync::services::history_sync::{HistorySource, HistorySync};
use pchist_sync::services::pocketcasts_client::{AuthToken, ClientSettings, PocketCastsClient};
use pchist_sync::services::reconciler::RetentionPolicy;
use pchist_sync::HistoryStore;
use tracing::{error, info, info_span, warn, Span};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for pchist-sync
#[derive(Parser, Debug)]
#[command(name = "pchist-sync")]
#[command(about = "Sync Pocket Casts listening history into SQLite")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding pocketcasts.db
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Pocket Casts account email
    #[arg(short, long)]
    username: Option<String>,

    /// Pocket Casts account password
    #[arg(short, long)]
    password: Option<String>,

    /// Keep only this many most recent records after a sync
    #[arg(long)]
    max_records: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Fetch history and save new episodes (default)
    Sync {
        /// Read the history from a saved JSON response instead of the API
        #[arg(long, env = "PCHIST_SAMPLE_FILE")]
        sample: Option<PathBuf>,
    },
    /// Print the most recently saved records
    Show {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Search the Pocket Casts catalogue
    Search { term: String },
    /// List podcast subscriptions
    Subscriptions,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env may hold POCKETCASTS_USERNAME / POCKETCASTS_PASSWORD
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let (config, loaded_from) =
        TomlConfig::load_or_default(config_path.clone()).context("Failed to load config file")?;

    init_tracing(&config)?;

    info!("Starting pchist-sync v{}", env!("CARGO_PKG_VERSION"));
    match (&loaded_from, &config_path) {
        (Some(path), _) => info!("Loaded config from {}", path.display()),
        (None, Some(path)) => warn!("Config file {} not found, using defaults", path.display()),
        (None, None) => warn!("No config file found, using defaults"),
    }

    let command = args.command.clone().unwrap_or(Command::Sync { sample: None });

    // Credentials are checked before any network or storage work
    let credentials = match command {
        Command::Show { .. } => None,
        _ => match resolve_credentials(
            args.username.clone(),
            args.password.clone(),
            &config.credentials,
        ) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                error!("{}", e);
                return Err(e.into());
            }
        },
    };

    let root_span = info_span!("pchist");
    let client_settings = ClientSettings::from_config(&config.api);

    match (command, credentials) {
        (Command::Sync { sample }, Some(credentials)) => {
            let store = open_store(&args, &config, &root_span).await?;
            let retention =
                RetentionPolicy::from_max_records(args.max_records.or(config.retention.max_records));
            info!("Retention policy: {:?}", retention);

            let source = match sample {
                Some(path) => HistorySource::SampleFile(path),
                None => HistorySource::Api {
                    client: new_client(client_settings, &root_span)?,
                    credentials,
                },
            };

            let sync = HistorySync::new(store, retention, info_span!(parent: &root_span, "sync"));
            let report = sync.sync(&source).await.context("History sync failed")?;
            info!(
                "Sync finished: {} fetched, {} new, {} pruned",
                report.fetched, report.new, report.pruned
            );
            sync.store().pool().close().await;
        }
        (Command::Show { limit }, _) => {
            let store = open_store(&args, &config, &root_span).await?;
            let records = store.get_records(limit).await.context("Failed to read history")?;
            for record in &records {
                let saved_at = record
                    .saved_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {} - {} [{}]",
                    saved_at, record.podcast_title, record.title, record.episode_uuid
                );
            }
            info!("{} records shown", records.len());
            store.pool().close().await;
        }
        (Command::Search { term }, Some(credentials)) => {
            let client = new_client(client_settings, &root_span)?;
            let token = login(&client, &credentials).await?;
            for podcast in client.search_podcasts(&token, &term).await {
                println!("{}  {} ({})", podcast.uuid, podcast.title, podcast.author);
            }
        }
        (Command::Subscriptions, Some(credentials)) => {
            let client = new_client(client_settings, &root_span)?;
            let token = login(&client, &credentials).await?;
            for podcast in client.get_subscriptions(&token).await {
                println!("{}  {} ({})", podcast.uuid, podcast.title, podcast.author);
            }
        }
        (_, None) => anyhow::bail!("Pocket Casts credentials are required for this command"),
    }

    Ok(())
}

/// Install the global subscriber: env filter, stderr, optional log file
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

/// Resolve and prepare the data folder, then open the database
async fn open_store(args: &Args, config: &TomlConfig, root_span: &Span) -> Result<HistoryStore> {
    let data_folder = DataFolderResolver::new()
        .with_cli_arg(args.data_folder.clone())
        .with_toml_folder(config.data_folder.clone())
        .resolve();
    info!("Data folder: {}", data_folder.display());

    let initializer = DataFolderInitializer::new(data_folder);
    initializer
        .ensure_directory_exists()
        .context("Data folder is not usable")?;

    let store = pchist_sync::db::open_store(
        &initializer.database_path(),
        info_span!(parent: root_span, "store"),
    )
    .await
    .context("Failed to open database")?;

    Ok(store)
}

fn new_client(settings: ClientSettings, root_span: &Span) -> Result<PocketCastsClient> {
    PocketCastsClient::new(settings, info_span!(parent: root_span, "pocketcasts"))
        .context("Failed to build HTTP client")
}

async fn login(client: &PocketCastsClient, credentials: &Credentials) -> Result<AuthToken> {
    client
        .login(credentials)
        .await
        .context("Login to Pocket Casts failed")
}
