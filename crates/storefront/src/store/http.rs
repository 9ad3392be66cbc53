//! REST cart store client.
//!
//! Uses `reqwest` with a bearer token. Every call maps non-success statuses
//! onto [`StoreError`] so transport details stop at this boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cartwright_core::{LineItem, ProductId, Quantity, UserId};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use super::conversions::{
    CartLineRecord, ErrorBody, UpdateQuantityRequest, UpsertLineRequest, convert_cart_lines,
};
use super::{CartStore, StoreError, StoreOperation};
use crate::config::CartConfig;

/// Characters of a raw error body kept in logs and messages.
const BODY_EXCERPT_LEN: usize = 200;

/// Client for a REST cart store.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpCartStore {
    inner: Arc<HttpCartStoreInner>,
}

struct HttpCartStoreInner {
    client: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl HttpCartStore {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CartConfig) -> Result<Self, StoreError> {
        Self::with_base_url(
            config.api_url.clone(),
            config.api_token.clone(),
            config.request_timeout,
        )
    }

    /// Create a client for an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: Url,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(HttpCartStoreInner {
                client,
                base_url: with_trailing_slash(base_url),
                token,
            }),
        })
    }

    fn cart_url(&self, user_id: UserId, product_id: Option<ProductId>) -> Result<Url, StoreError> {
        let path = match product_id {
            Some(product_id) => format!("users/{user_id}/cart/{product_id}"),
            None => format!("users/{user_id}/cart"),
        };
        self.inner
            .base_url
            .join(&path)
            .map_err(|e| StoreError::Contract(format!("invalid cart URL {path}: {e}")))
    }

    /// Send a request and return the successful response.
    async fn send<B: Serialize + Sync>(
        &self,
        operation: StoreOperation,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, StoreError> {
        let mut request = self
            .inner
            .client
            .request(method, url)
            .bearer_auth(self.inner.token.expose_secret());

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        // Deleting an absent line is a no-op
        if status == StatusCode::NOT_FOUND && operation == StoreOperation::Delete {
            debug!("Line already absent");
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(StoreError::RateLimited(retry_after));
        }

        let body = response.text().await?;
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| body.chars().take(BODY_EXCERPT_LEN).collect());

        tracing::warn!(
            %operation,
            status = %status,
            message = %message,
            "Cart store returned non-success status"
        );

        Err(match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                StoreError::Validation(message)
            }
            StatusCode::CONFLICT => StoreError::Conflict(message),
            _ => StoreError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl CartStore for HttpCartStore {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn fetch_cart(&self, user_id: UserId) -> Result<Vec<LineItem>, StoreError> {
        let url = self.cart_url(user_id, None)?;
        let response = self
            .send::<()>(StoreOperation::Fetch, Method::GET, url, None)
            .await?;

        let text = response.text().await?;
        let records: Vec<CartLineRecord> = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(BODY_EXCERPT_LEN).collect::<String>(),
                "Failed to parse cart response"
            );
            StoreError::Parse(e)
        })?;

        debug!(lines = records.len(), "Fetched cart");
        convert_cart_lines(records)
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn upsert_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), StoreError> {
        let url = self.cart_url(user_id, None)?;
        let body = UpsertLineRequest {
            product_id,
            quantity: i64::from(quantity.get()),
        };
        self.send(StoreOperation::Upsert, Method::POST, url, Some(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn update_line_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), StoreError> {
        let url = self.cart_url(user_id, Some(product_id))?;
        let body = UpdateQuantityRequest {
            quantity: i64::from(quantity.get()),
        };
        self.send(StoreOperation::UpdateQuantity, Method::PUT, url, Some(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn delete_line(&self, user_id: UserId, product_id: ProductId) -> Result<(), StoreError> {
        let url = self.cart_url(user_id, Some(product_id))?;
        self.send::<()>(StoreOperation::Delete, Method::DELETE, url, None)
            .await?;
        Ok(())
    }
}

/// `Url::join` drops the last segment unless the base ends in a slash.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store(base: &str) -> HttpCartStore {
        HttpCartStore::with_base_url(
            Url::parse(base).unwrap(),
            SecretString::from("tok"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_cart_url_keeps_base_path() {
        let store = store("https://api.example.com/v1");
        let user: UserId = "0b7e7c3e-9a4d-4a51-9a3c-3f1f1d0f4e2a".parse().unwrap();

        let url = store.cart_url(user, None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/users/0b7e7c3e-9a4d-4a51-9a3c-3f1f1d0f4e2a/cart"
        );

        let url = store.cart_url(user, Some(ProductId::new(9))).unwrap();
        assert!(url.as_str().ends_with("/cart/9"));
    }

    #[test]
    fn test_with_trailing_slash_is_idempotent() {
        let url = with_trailing_slash(Url::parse("http://localhost:3000/api/").unwrap());
        assert_eq!(url.as_str(), "http://localhost:3000/api/");
    }
}
