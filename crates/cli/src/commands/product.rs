//! Catalog lookup command.

use cartwright_core::{Price, ProductId};
use cartwright_storefront::CartProvider;
use cartwright_storefront::catalog::CatalogLookup;

use super::CliError;

/// Log one catalog product.
pub async fn show(provider: &CartProvider, id: ProductId) -> Result<(), CliError> {
    let product = provider.catalog().get_product(id).await?;

    tracing::info!(
        product_id = %product.id,
        price = %Price::new(product.price, provider.currency()).display(),
        stock = product.stock,
        category = product.category.as_deref().unwrap_or("-"),
        "{}",
        product.name
    );
    Ok(())
}
