//! Cartwright CLI - inspect and change a user's cart from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart for CART_USER_ID
//! cart show
//!
//! # Add two of product 12
//! cart add 12 -q 2
//!
//! # Set the quantity of product 12 to 5
//! cart update 12 5
//!
//! # Remove product 12
//! cart remove 12
//!
//! # Look up a catalog product
//! cart product 12
//! ```
//!
//! Configuration comes from the environment (see `cartwright_storefront::config`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use cartwright_core::ProductId;
use cartwright_storefront::CartConfig;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "cart")]
#[command(author, version, about = "Cartwright cart client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current cart
    Show,
    /// Add a product to the cart (replaces its quantity if present)
    Add {
        /// Catalog product ID
        product: ProductId,

        /// Quantity to store
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Set the quantity of a cart line
    Update {
        /// Catalog product ID
        product: ProductId,

        /// New quantity (at least 1)
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a product from the cart
    Remove {
        /// Catalog product ID
        product: ProductId,
    },
    /// Look up a product in the catalog
    Product {
        /// Catalog product ID
        id: ProductId,
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

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let config = CartConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartwright_storefront=info,cartwright_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => commands::run(cli.command, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}
