//! Remote cart service client.
//!
//! # Architecture
//!
//! - The remote service is the source of truth whenever a session credential
//!   is present; remote lines replace local lines, they are never merged
//! - [`CartApi`] is the seam between the store and the network so the store
//!   can be driven by an in-process fake in tests
//! - [`HttpCartApi`] speaks JSON over HTTP with a bearer token
//!
//! # Operations
//!
//! | Operation    | Request                  | Response            |
//! |--------------|--------------------------|---------------------|
//! | `get_cart`   | `GET {base}/cart`        | `{ "items": [...] }`|
//! | `add_item`   | `POST {base}/cart/items` | `{ "items": [...] }`|
//! | `clear_cart` | `DELETE {base}/cart`     | any 2xx             |
//!
//! # Example
//!
//! ```rust,ignore
//! use bulkcart_cart::api::{CartApi, HttpCartApi};
//!
//! let api = HttpCartApi::new(&config.api.unwrap())?;
//! let cart = api.get_cart(&token).await?;
//! ```

mod client;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;

pub use client::HttpCartApi;
pub use types::{AddItemInput, RemoteCart, RemoteLineItem};

/// Errors that can occur when talking to the remote cart service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Session credential was rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the cart service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Non-success status that has no more specific variant.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server message or truncated body.
        message: String,
    },

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Service is not reachable for a reason not covered above.
    #[error("Cart service unavailable: {0}")]
    Unavailable(String),
}

/// The three remote cart operations the store consumes.
///
/// Futures must be `Send` so reconciliation can run on a spawned task.
pub trait CartApi: Send + Sync + 'static {
    /// Fetch the authoritative cart for the session.
    fn get_cart(
        &self,
        token: &SecretString,
    ) -> impl Future<Output = Result<RemoteCart, ApiError>> + Send;

    /// Add a line (or increase its quantity) and return the resulting cart.
    fn add_item(
        &self,
        token: &SecretString,
        input: &AddItemInput,
    ) -> impl Future<Output = Result<RemoteCart, ApiError>> + Send;

    /// Empty the remote cart.
    fn clear_cart(&self, token: &SecretString)
    -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl<T: CartApi> CartApi for Arc<T> {
    fn get_cart(
        &self,
        token: &SecretString,
    ) -> impl Future<Output = Result<RemoteCart, ApiError>> + Send {
        (**self).get_cart(token)
    }

    fn add_item(
        &self,
        token: &SecretString,
        input: &AddItemInput,
    ) -> impl Future<Output = Result<RemoteCart, ApiError>> + Send {
        (**self).add_item(token, input)
    }

    fn clear_cart(&self, token: &SecretString) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).clear_cart(token)
    }
}

/// Placeholder API for sessions that never have a credential.
///
/// Every call fails with [`ApiError::Unavailable`]; the store only calls the
/// API when a token is present, so in practice it is never reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineApi;

impl CartApi for OfflineApi {
    async fn get_cart(&self, _token: &SecretString) -> Result<RemoteCart, ApiError> {
        Err(ApiError::Unavailable("offline mode".to_string()))
    }

    async fn add_item(
        &self,
        _token: &SecretString,
        _input: &AddItemInput,
    ) -> Result<RemoteCart, ApiError> {
        Err(ApiError::Unavailable("offline mode".to_string()))
    }

    async fn clear_cart(&self, _token: &SecretString) -> Result<(), ApiError> {
        Err(ApiError::Unavailable("offline mode".to_string()))
    }
}
