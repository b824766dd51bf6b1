//! Amicale CLI - Storefront, account and back-office from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse the shop and fill the cart (kept in AMICALE_DATA_DIR)
//! amicale cart catalog
//! amicale cart add 6c1f0e1c-... --size M --quantity 2
//!
//! # Place the order
//! amicale --email member@example.org cart checkout
//!
//! # Back-office
//! amicale --email editor@example.org admin posts list
//! amicale --email editor@example.org admin events create --json @event.json --image poster.jpg
//! amicale --email admin@example.org admin orders status 9b2d... paid
//! ```
//!
//! # Environment Variables
//!
//! - `AMICALE_REMOTE_URL`, `AMICALE_REMOTE_ANON_KEY` - Remote store endpoint and key
//! - `AMICALE_EMAIL`, `AMICALE_PASSWORD` - Credentials used to sign in before the command
//! - `AMICALE_DATA_DIR` - Where the cart and language preference are kept
//! - `SENTRY_DSN` - Error tracking (optional)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use amicale_storefront::config::StorefrontConfig;
use amicale_storefront::state::AppState;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;

use commands::{admin::AdminCommand, auth::AuthCommand, cart::CartCommand, lang::LangCommand};
use error::CliError;

#[derive(Parser)]
#[command(name = "amicale")]
#[command(author, version, about = "Amicale storefront and back-office")]
struct Cli {
    /// Sign in with this email before running the command
    #[arg(long, global = true, env = "AMICALE_EMAIL")]
    email: Option<String>,

    /// Password for --email
    #[arg(long, global = true, env = "AMICALE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shopping cart and checkout
    Cart {
        #[command(subcommand)]
        action: CartCommand,
    },
    /// Account: sign in/up/out, password
    Auth {
        #[command(subcommand)]
        action: AuthCommand,
    },
    /// Interface language
    Lang {
        #[command(subcommand)]
        action: LangCommand,
    },
    /// Back-office
    Admin {
        #[command(subcommand)]
        action: AdminCommand,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// ERROR and WARN become Sentry events; INFO and DEBUG become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Defaults to warnings only so command output stays readable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "amicale=warn,amicale_storefront=warn,amicale_admin=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let _sentry_guard = init_sentry(&config);

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            e.capture();
            tracing::error!(error = %e, "Failed to start");
            return ExitCode::FAILURE;
        }
    };

    let result = run(cli, &state).await;
    state.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            e.capture();
            output::error(format_args!("error: {}", e.user_message()));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, state: &AppState) -> Result<(), CliError> {
    state.gate().ready().await;
    if let Some(email) = &cli.email {
        sign_in(state, email, cli.password.as_deref()).await?;
    }

    match cli.command {
        Commands::Cart { action } => commands::cart::run(state, action).await,
        Commands::Auth { action } => commands::auth::run(state, action).await,
        Commands::Lang { action } => commands::lang::run(state, action),
        Commands::Admin { action } => commands::admin::run(state, action, cli.yes).await,
    }
}

async fn sign_in(state: &AppState, email: &str, password: Option<&str>) -> Result<(), CliError> {
    let password = password.ok_or_else(|| {
        CliError::Usage("--password (or AMICALE_PASSWORD) is required with --email".to_owned())
    })?;
    let gate = state.gate();
    gate.sign_in(email, &SecretString::from(password.to_owned()))
        .await?;
    gate.wait_until(|s| s.principal().is_some()).await;
    tracing::debug!(role = %gate.role(), "Signed in");
    Ok(())
}
