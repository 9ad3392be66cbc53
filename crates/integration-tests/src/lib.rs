//! Integration test harness for Cartwright.
//!
//! Runs a fake REST cart backend in-process on `127.0.0.1:0`, backed by the
//! in-memory store and catalog, so the HTTP adapters and the engine can be
//! exercised end to end without external services.
//!
//! # Routes
//!
//! - `GET    /users/{user}/cart`
//! - `POST   /users/{user}/cart`
//! - `PUT    /users/{user}/cart/{product}`
//! - `DELETE /users/{user}/cart/{product}` (404 when the line is absent)
//! - `GET    /products/{id}`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Path, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cartwright_core::{ProductId, ProductRecord, Quantity, UserId};
use cartwright_storefront::CartConfig;
use cartwright_storefront::catalog::InMemoryCatalog;
use cartwright_storefront::store::{
    CartLineRecord, CartStore, ErrorBody, InMemoryCartStore, StoreError, UpdateQuantityRequest,
    UpsertLineRequest,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Bearer token the fake backend accepts.
pub const TEST_TOKEN: &str = "k3Qz8vN1pL-integration";

/// Catalog used by most tests: three products with plenty of stock.
#[must_use]
pub fn sample_catalog() -> InMemoryCatalog {
    InMemoryCatalog::with_products([
        product(1, "Lead Scorer", Decimal::new(1000, 2), 50),
        product(2, "Invoice Parser", Decimal::new(2550, 2), 50),
        product(3, "Slack Digest", Decimal::new(499, 2), 50),
    ])
}

/// Build a catalog product.
#[must_use]
pub fn product(id: i32, name: &str, price: Decimal, stock: u32) -> ProductRecord {
    ProductRecord {
        id: ProductId::new(id),
        name: name.to_string(),
        price,
        image: Some(format!("https://cdn.example.com/products/{id}.png")),
        category: Some("Automation".to_string()),
        stock,
    }
}

#[derive(Clone)]
struct BackendState {
    store: InMemoryCartStore,
    token: Arc<str>,
    product_requests: Arc<AtomicUsize>,
}

/// A fake cart backend listening on a random local port.
///
/// The server task is aborted on drop.
pub struct TestBackend {
    addr: SocketAddr,
    store: InMemoryCartStore,
    product_requests: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl TestBackend {
    /// Start a backend serving `store` and its catalog.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn(store: InMemoryCartStore) -> Self {
        let product_requests = Arc::new(AtomicUsize::new(0));
        let state = BackendState {
            store: store.clone(),
            token: Arc::from(TEST_TOKEN),
            product_requests: Arc::clone(&product_requests),
        };

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("test listener address");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router(state)).await {
                tracing::error!(error = %e, "Test backend stopped");
            }
        });

        Self {
            addr,
            store,
            product_requests,
            handle,
        }
    }

    /// Start a backend over a fresh store priced from [`sample_catalog`].
    pub async fn with_sample_catalog() -> Self {
        Self::spawn(InMemoryCartStore::new(sample_catalog())).await
    }

    /// Base URL of the backend.
    ///
    /// # Panics
    ///
    /// Never in practice: the address is always a valid host and port.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("socket address is a valid URL")
    }

    /// Client configuration pointing both APIs at this backend.
    #[must_use]
    pub fn config(&self, user_id: UserId) -> CartConfig {
        CartConfig::for_base_url(self.base_url(), SecretString::from(TEST_TOKEN), user_id)
    }

    /// The store behind the backend, for seeding and failure injection.
    #[must_use]
    pub const fn store(&self) -> &InMemoryCartStore {
        &self.store
    }

    /// Number of `GET /products/{id}` requests served.
    #[must_use]
    pub fn product_requests(&self) -> usize {
        self.product_requests.load(Ordering::SeqCst)
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: BackendState) -> Router {
    Router::new()
        .route("/users/{user_id}/cart", get(get_cart).post(upsert_line))
        .route(
            "/users/{user_id}/cart/{product_id}",
            axum::routing::put(update_line).delete(delete_line),
        )
        .route("/products/{product_id}", get(get_product))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}

async fn require_token(State(state): State<BackendState>, request: Request, next: Next) -> Response {
    let expected = format!("Bearer {}", state.token);
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    if authorized {
        next.run(request).await
    } else {
        error_response(StatusCode::UNAUTHORIZED, "invalid or missing token")
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn get_cart(
    State(state): State<BackendState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<CartLineRecord>>, BackendError> {
    let lines = state.store.fetch_cart(user_id).await?;
    let catalog = state.store.catalog();

    let records = lines
        .iter()
        .map(|line| {
            let stock = catalog.get(line.product_id).map_or(0, |p| p.stock);
            CartLineRecord::from_line(user_id, line, stock)
        })
        .collect();
    Ok(Json(records))
}

async fn upsert_line(
    State(state): State<BackendState>,
    Path(user_id): Path<UserId>,
    Json(body): Json<UpsertLineRequest>,
) -> Result<StatusCode, BackendError> {
    let quantity = parse_quantity(body.quantity)?;
    state
        .store
        .upsert_line(user_id, body.product_id, quantity)
        .await?;
    Ok(StatusCode::CREATED)
}

async fn update_line(
    State(state): State<BackendState>,
    Path((user_id, product_id)): Path<(UserId, ProductId)>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<StatusCode, BackendError> {
    let quantity = parse_quantity(body.quantity)?;
    state
        .store
        .update_line_quantity(user_id, product_id, quantity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_line(
    State(state): State<BackendState>,
    Path((user_id, product_id)): Path<(UserId, ProductId)>,
) -> Result<StatusCode, BackendError> {
    let present = state
        .store
        .lines(user_id)
        .await
        .iter()
        .any(|(id, _)| *id == product_id);

    state.store.delete_line(user_id, product_id).await?;
    Ok(if present {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    })
}

async fn get_product(
    State(state): State<BackendState>,
    Path(product_id): Path<ProductId>,
) -> Response {
    state.product_requests.fetch_add(1, Ordering::SeqCst);
    match state.store.catalog().get(product_id) {
        Some(product) => Json(product).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "product not found"),
    }
}

fn parse_quantity(raw: i64) -> Result<Quantity, BackendError> {
    Quantity::new(raw).map_err(|e| BackendError(StoreError::Validation(e.to_string())))
}

// =============================================================================
// Errors
// =============================================================================

/// Store error rendered the way the hosted backend reports it.
struct BackendError(StoreError);

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        match self.0 {
            StoreError::Validation(message) => {
                error_response(StatusCode::UNPROCESSABLE_ENTITY, &message)
            }
            StoreError::Conflict(message) => error_response(StatusCode::CONFLICT, &message),
            StoreError::RateLimited(secs) => {
                let mut response = error_response(StatusCode::TOO_MANY_REQUESTS, "slow down");
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                response
            }
            StoreError::Api { status, message } => error_response(
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                &message,
            ),
            other => error_response(StatusCode::INTERNAL_SERVER_ERROR, &other.to_string()),
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = ErrorBody {
        message: Some(message.to_string()),
    };
    (status, Json(body)).into_response()
}
