//! REST catalog client.
//!
//! Caches product records using `moka`. The cart itself is never cached:
//! prices shown in the cart always come from the store's latest read.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cartwright_core::{ProductId, ProductRecord};
use moka::future::Cache;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};
use url::Url;

use super::{CatalogError, CatalogLookup};
use crate::config::CartConfig;
use crate::store::http::with_trailing_slash;

const CACHE_CAPACITY: u64 = 1000;

/// Client for the catalog's product endpoint.
#[derive(Clone)]
pub struct HttpCatalog {
    inner: Arc<HttpCatalogInner>,
}

struct HttpCatalogInner {
    client: reqwest::Client,
    base_url: Url,
    token: SecretString,
    cache: Cache<ProductId, ProductRecord>,
}

impl HttpCatalog {
    /// Create a catalog client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CartConfig) -> Result<Self, CatalogError> {
        Self::with_base_url(
            config.catalog_url.clone(),
            config.api_token.clone(),
            config.request_timeout,
            config.catalog_cache_ttl,
        )
    }

    /// Create a catalog client for an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: Url,
        token: SecretString,
        timeout: Duration,
        cache_ttl: Duration,
    ) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(HttpCatalogInner {
                client,
                base_url: with_trailing_slash(base_url),
                token,
                cache,
            }),
        })
    }

    async fn fetch(&self, product_id: ProductId) -> Result<ProductRecord, CatalogError> {
        let url = self
            .inner
            .base_url
            .join(&format!("products/{product_id}"))
            .map_err(|e| CatalogError::Api {
                status: 0,
                message: format!("invalid product URL: {e}"),
            })?;

        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(self.inner.token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(product_id));
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl CatalogLookup for HttpCatalog {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: ProductId) -> Result<ProductRecord, CatalogError> {
        if let Some(product) = self.inner.cache.get(&product_id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let product = self.fetch(product_id).await?;

        self.inner.cache.insert(product_id, product.clone()).await;

        Ok(product)
    }
}
