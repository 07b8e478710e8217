//! HTTP implementation of [`CartApi`].
//!
//! Uses `reqwest` with a bearer token per call; the token belongs to the
//! session, not the client, so one client can serve many sessions.

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use super::types::ErrorBody;
use super::{AddItemInput, ApiError, CartApi, RemoteCart};
use crate::config::CartApiConfig;

/// Longest body excerpt carried into errors and logs.
const BODY_EXCERPT_CHARS: usize = 200;

/// Client for the remote cart service.
#[derive(Clone)]
pub struct HttpCartApi {
    inner: Arc<HttpCartApiInner>,
}

struct HttpCartApiInner {
    client: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for HttpCartApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartApi")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpCartApi {
    /// Create a new cart API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the underlying HTTP client cannot be built.
    pub fn new(config: &CartApiConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            inner: Arc::new(HttpCartApiInner {
                client: builder.build()?,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        join_endpoint(&self.inner.base_url, path)
    }

    /// Send a request and return the body of a successful response.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        token: &SecretString,
    ) -> Result<String, ApiError> {
        let response = request
            .bearer_auth(token.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %excerpt(&body, 500),
                "Cart service returned non-success status"
            );
            return Err(failure_for_status(status, retry_after, &body));
        }

        Ok(body)
    }

    fn parse_cart(body: &str) -> Result<RemoteCart, ApiError> {
        serde_json::from_str(body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %excerpt(body, 500),
                "Failed to parse cart service response"
            );
            ApiError::Parse(e)
        })
    }
}

impl CartApi for HttpCartApi {
    #[instrument(skip_all)]
    async fn get_cart(&self, token: &SecretString) -> Result<RemoteCart, ApiError> {
        let request = self.inner.client.get(self.endpoint("cart"));
        let body = self.send(request, token).await?;
        let cart = Self::parse_cart(&body)?;
        debug!(lines = cart.items.len(), "Fetched remote cart");
        Ok(cart)
    }

    #[instrument(skip(self, token), fields(product_id = %input.product_id, quantity = input.quantity))]
    async fn add_item(
        &self,
        token: &SecretString,
        input: &AddItemInput,
    ) -> Result<RemoteCart, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("cart/items"))
            .json(input);
        let body = self.send(request, token).await?;
        let cart = Self::parse_cart(&body)?;
        debug!(lines = cart.items.len(), "Added item to remote cart");
        Ok(cart)
    }

    #[instrument(skip_all)]
    async fn clear_cart(&self, token: &SecretString) -> Result<(), ApiError> {
        let request = self.inner.client.delete(self.endpoint("cart"));
        self.send(request, token).await?;
        debug!("Cleared remote cart");
        Ok(())
    }
}

fn join_endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Map a non-success response onto the error taxonomy.
fn failure_for_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map_or_else(|_| excerpt(body, BODY_EXCERPT_CHARS), |b| b.message);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(retry_after.unwrap_or(1)),
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

fn excerpt(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}
