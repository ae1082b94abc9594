//! PopFlix CLI - headless front end for the PopFlix catalog.
//!
//! # Usage
//!
//! ```bash
//! # Sign in with an identity-provider credential
//! popflix login --credential "$GOOGLE_ID_TOKEN"
//!
//! # Browse and search
//! popflix popular movie
//! popflix search "the matrix"
//!
//! # Play the third episode of season two
//! popflix play tv 1399 --season 2 --episode 3
//!
//! # Titles outside the popular list are found by search
//! popflix play movie 27205 --title "inception"
//!
//! # Upgrade to premium, then confirm once paid
//! popflix upgrade
//! popflix payment-status cs_test_123 --confirm
//! ```
//!
//! # Commands
//!
//! - `whoami`, `login`, `logout` - Session
//! - `popular`, `search` - Catalog
//! - `play`, `favorite`, `favorites`, `unfavorite`, `history` - Library
//! - `comments`, `comment` - Discussion
//! - `upgrade`, `payment-status` - Premium checkout
//!
//! Every command restores the stored session first.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use popflix_client::{ClientConfig, ClientError, ConfigError, PopflixClient, SentryConfig};
use popflix_core::{ContentType, ExternalId};

mod commands;

#[derive(Parser)]
#[command(name = "popflix")]
#[command(author, version, about = "PopFlix headless client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the signed-in user
    Whoami,
    /// Sign in with an identity-provider credential
    Login {
        /// ID token issued by the identity provider
        #[arg(short, long)]
        credential: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// List popular titles (both lists when no type is given)
    Popular {
        /// `movie` or `tv`
        content_type: Option<ContentType>,
    },
    /// Search movies and shows
    Search {
        /// Search text
        query: String,
    },
    /// Resolve a stream and record it in watch history
    Play {
        /// `movie` or `tv`
        content_type: ContentType,
        /// Catalog id
        id: ExternalId,
        /// Season number (shows only)
        #[arg(short, long, default_value_t = 1)]
        season: u32,
        /// Episode number (shows only)
        #[arg(short, long, default_value_t = 1)]
        episode: u32,
        /// Search text to find the title when it is not in the popular list
        #[arg(long)]
        title: Option<String>,
    },
    /// Add a title to favorites
    Favorite {
        content_type: ContentType,
        id: ExternalId,
        /// Search text to find the title when it is not in the popular list
        #[arg(long)]
        title: Option<String>,
    },
    /// List favorites
    Favorites,
    /// Remove a title from favorites
    Unfavorite {
        content_type: ContentType,
        id: ExternalId,
    },
    /// List watch history
    History,
    /// List comments on a title
    Comments {
        content_type: ContentType,
        id: ExternalId,
    },
    /// Comment on a title (premium)
    Comment {
        content_type: ContentType,
        id: ExternalId,
        /// Comment text
        text: String,
        /// Reply to this comment id
        #[arg(long)]
        reply_to: Option<String>,
    },
    /// Start a premium upgrade checkout
    Upgrade {
        /// Origin the payment provider returns to (defaults to configuration)
        #[arg(long)]
        origin: Option<String>,
    },
    /// Check a checkout session
    PaymentStatus {
        /// Checkout session id
        session_id: String,
        /// Refresh the profile once the payment is complete
        #[arg(long)]
        confirm: bool,
    },
}

/// Errors that end the process.
#[derive(Debug, Error)]
enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SentryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(std::borrow::Cow::Owned(config.environment.clone())),
            sample_rate: config.sample_rate,
            traces_sample_rate: config.traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", CliError::from(e));
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config.sentry);

    // Logs go to stderr so command output stays clean
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "popflix_client=info,popflix_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        if let CliError::Client(ref err) = e {
            err.report();
            eprintln!("{}", err.user_message());
        } else {
            eprintln!("{e}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), CliError> {
    let client = PopflixClient::new(config)?;
    client.session().initialize().await;

    match cli.command {
        Commands::Whoami => commands::session::whoami(&client),
        Commands::Login { credential } => commands::session::login(&client, &credential).await?,
        Commands::Logout => commands::session::logout(&client),
        Commands::Popular {
            content_type: Some(content_type),
        } => commands::catalog::popular(&client, content_type).await?,
        Commands::Popular { content_type: None } => commands::catalog::home(&client).await,
        Commands::Search { query } => commands::catalog::search(&client, &query).await?,
        Commands::Play {
            content_type,
            id,
            season,
            episode,
            title,
        } => {
            commands::library::play(&client, content_type, id, season, episode, title.as_deref())
                .await?;
        }
        Commands::Favorite {
            content_type,
            id,
            title,
        } => commands::library::favorite(&client, content_type, id, title.as_deref()).await?,
        Commands::Favorites => commands::library::favorites(&client).await?,
        Commands::Unfavorite { content_type, id } => {
            commands::library::unfavorite(&client, content_type, id).await?;
        }
        Commands::History => commands::library::history(&client).await?,
        Commands::Comments { content_type, id } => {
            commands::comments::list(&client, content_type, id).await?;
        }
        Commands::Comment {
            content_type,
            id,
            text,
            reply_to,
        } => commands::comments::post(&client, content_type, id, &text, reply_to).await?,
        Commands::Upgrade { origin } => {
            commands::upgrade::start(&client, origin.as_deref()).await?;
        }
        Commands::PaymentStatus {
            session_id,
            confirm,
        } => commands::upgrade::status(&client, &session_id, confirm).await?,
    }
    Ok(())
}
