//! Subcommand implementations.

mod cart;
mod product;

use cartwright_storefront::catalog::CatalogError;
use cartwright_storefront::{CartConfig, CartError, CartProvider, ConfigError, ProviderError};
use thiserror::Error;

use crate::Commands;

/// Errors that can end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The session opened but the cart could not be loaded.
    #[error("{0}")]
    Unavailable(String),
}

/// Dispatch a parsed subcommand against the configured backend.
pub async fn run(command: Commands, config: &CartConfig) -> Result<(), CliError> {
    let provider = CartProvider::from_config(config)?;

    match command {
        Commands::Show => cart::show(&provider, config).await,
        Commands::Add { product, quantity } => {
            cart::add(&provider, config, product, quantity).await
        }
        Commands::Update { product, quantity } => {
            cart::update(&provider, config, product, quantity).await
        }
        Commands::Remove { product } => cart::remove(&provider, config, product).await,
        Commands::Product { id } => product::show(&provider, id).await,
    }
}
