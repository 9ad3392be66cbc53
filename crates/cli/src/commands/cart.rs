//! Cart commands.
//!
//! Each command opens a session for `CART_USER_ID`, applies at most one
//! intent, logs the resulting cart and closes the session.

use cartwright_core::ProductId;
use cartwright_storefront::{CartConfig, CartEngine, CartProvider, CartView};

use super::CliError;

/// Show the cart.
///
/// Fails if the cart cannot be loaded.
pub async fn show(provider: &CartProvider, config: &CartConfig) -> Result<(), CliError> {
    let engine = provider.open_session(config.user_id).await;
    let view = provider.view(&engine);
    provider.close_session(&engine);

    if let Some(message) = view.error {
        return Err(CliError::Unavailable(message));
    }
    log_cart(&view);
    Ok(())
}

pub async fn add(
    provider: &CartProvider,
    config: &CartConfig,
    product: ProductId,
    quantity: i64,
) -> Result<(), CliError> {
    with_session(provider, config, |engine| async move {
        engine.add_item(product, quantity).await
    })
    .await
}

pub async fn update(
    provider: &CartProvider,
    config: &CartConfig,
    product: ProductId,
    quantity: i64,
) -> Result<(), CliError> {
    with_session(provider, config, |engine| async move {
        engine.update_item(product, quantity).await
    })
    .await
}

pub async fn remove(
    provider: &CartProvider,
    config: &CartConfig,
    product: ProductId,
) -> Result<(), CliError> {
    with_session(provider, config, |engine| async move {
        engine.remove_item(product).await
    })
    .await
}

/// Run one intent in a fresh session and log the cart it leaves behind.
async fn with_session<F, Fut>(
    provider: &CartProvider,
    config: &CartConfig,
    intent: F,
) -> Result<(), CliError>
where
    F: FnOnce(CartEngine) -> Fut,
    Fut: Future<Output = Result<(), cartwright_storefront::CartError>>,
{
    let engine = provider.open_session(config.user_id).await;
    let result = intent(engine.clone()).await;

    if result.is_ok() {
        log_cart(&provider.view(&engine));
    }
    provider.close_session(&engine);
    result.map_err(CliError::from)
}

fn log_cart(view: &CartView) {
    if view.items.is_empty() {
        tracing::info!("Cart is empty");
        return;
    }

    for item in &view.items {
        tracing::info!(
            product_id = %item.product_id,
            quantity = item.quantity,
            price = %item.price,
            line_price = %item.line_price,
            "{}",
            item.title
        );
    }
    tracing::info!(
        item_count = view.item_count,
        subtotal = %view.subtotal,
        "Cart total"
    );
}
