//! Bulkcart CLI - inspect and edit the session cart from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart (restored from CART_STORAGE_DIR, synced when remote)
//! bulkcart show
//!
//! # Add 24 cases of a product
//! bulkcart add P-1001 --price 12.50 --name "Nitrile Gloves (case)" -q 24
//!
//! # Remove a line, empty the cart, or finish a checkout
//! bulkcart remove P-1001
//! bulkcart clear
//! bulkcart checkout ORD-2291
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart, optionally as JSON
//! - `add` - Add a product (remote first, local merge on failure)
//! - `remove` - Delete a line locally
//! - `clear` - Empty the cart locally and remotely
//! - `sync` - Reconcile with the remote cart service
//! - `checkout` - Record a completed checkout and empty the cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use bulkcart_cart::{CartConfig, CartError, CartSession, FileStorage, HttpCartApi, OfflineApi};
use bulkcart_core::{OrderReference, ProductId};

use crate::commands::cart::CommandError;

mod commands;

#[derive(Parser)]
#[command(name = "bulkcart")]
#[command(author, version, about = "Bulkcart session cart tools")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show {
        /// Print the cart view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a product to the cart
    Add {
        /// Product identifier
        product_id: ProductId,

        /// Unit price
        #[arg(short, long)]
        price: Decimal,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: u32,

        /// Product display name
        #[arg(short, long)]
        name: String,

        /// Stock keeping unit
        #[arg(long)]
        sku: Option<String>,

        /// Product image URL
        #[arg(long)]
        image: Option<String>,
    },
    /// Remove a product line from the cart
    Remove {
        /// Product identifier
        product_id: ProductId,
    },
    /// Empty the cart
    Clear,
    /// Reconcile with the remote cart service
    Sync,
    /// Record a completed checkout and empty the cart
    Checkout {
        /// Order reference returned by the checkout
        order_reference: OrderReference,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
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

/// Logs go to stderr so `show --json` output stays machine-readable.
fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bulkcart_cart=info,bulkcart_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.json_logs);
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing(cli.json_logs);

    if let Err(e) = run(cli.command, config).await {
        tracing::error!("Command failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(command: Commands, config: CartConfig) -> Result<(), CommandError> {
    tracing::debug!(
        remote = config.is_remote(),
        currency = config.currency.code(),
        "Configuration loaded"
    );

    let storage = FileStorage::open(&config.storage_dir).map_err(CartError::from)?;
    tracing::debug!(storage_dir = %storage.dir().display(), "Cart storage ready");

    match (config.api, config.session_token) {
        (Some(api_config), Some(token)) => {
            let api = HttpCartApi::new(&api_config).map_err(CartError::from)?;
            let session = CartSession::begin(api, storage, Some(token), config.currency);
            commands::cart::execute(command, session).await?;
        }
        (api_config, token) => {
            if api_config.is_some() || token.is_some() {
                tracing::warn!(
                    "CART_API_URL and CART_SESSION_TOKEN must both be set for remote sync; running local-only"
                );
            }
            let session = CartSession::begin(OfflineApi, storage, None, config.currency);
            commands::cart::execute(command, session).await?;
        }
    }
    Ok(())
}
