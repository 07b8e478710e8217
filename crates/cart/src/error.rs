//! Crate-level error type.
//!
//! Cart operations themselves never fail (remote and storage problems fall
//! back to local state and are logged). `CartError` covers what is left:
//! wiring a store up, and using one outside a provisioned session.

use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Errors from setting up or accessing a cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// The cart was requested outside a provisioned session.
    #[error("No cart session is active; begin a session before using the cart")]
    NotProvisioned,

    /// Storage backend could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote client could not be created.
    #[error("Cart API error: {0}")]
    Api(#[from] ApiError),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_provisioned_display() {
        assert_eq!(
            CartError::NotProvisioned.to_string(),
            "No cart session is active; begin a session before using the cart"
        );
    }

    #[test]
    fn test_storage_error_converts() {
        let err: CartError = StorageError::InvalidKey("../x".to_string()).into();
        assert_eq!(err.to_string(), "Storage error: Invalid storage key: ../x");
    }

    #[test]
    fn test_api_error_converts() {
        let err: CartError = ApiError::Unavailable("connection refused".to_string()).into();
        assert!(matches!(err, CartError::Api(ApiError::Unavailable(_))));
    }
}
