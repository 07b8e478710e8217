//! Bulkcart session cart.
//!
//! Client-side cart store for the Bulkcart wholesale storefront. It keeps
//! the buyer's cart lines, survives restarts through a key-value store, and
//! reconciles with the remote cart service whenever a session credential is
//! present.
//!
//! # Architecture
//!
//! - [`store::CartStore`] - Session cart state and the cart operations
//! - [`reconcile`] - Remote-wins and local-merge rules
//! - [`api`] - Remote cart service trait and HTTP client
//! - [`storage`] - Key-value persistence (in-memory and file-backed)
//! - [`session`] - Session lifecycle and the cart provider
//! - [`view`] - Pre-formatted display model
//!
//! # Example
//!
//! ```rust,ignore
//! use bulkcart_cart::{CartSession, FileStorage, HttpCartApi};
//!
//! let config = CartConfig::from_env()?;
//! let storage = FileStorage::open(&config.storage_dir)?;
//! let api = HttpCartApi::new(config.api.as_ref().unwrap())?;
//! let session = CartSession::begin(api, storage, config.session_token, config.currency);
//! session.store().add_to_cart(&product, 12).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod store;
pub mod view;

pub use api::{ApiError, CartApi, HttpCartApi, OfflineApi};
pub use config::{CartApiConfig, CartConfig, ConfigError};
pub use error::{CartError, Result};
pub use models::{
    CartLineItem, CartLines, DisplayMeta, LineTotalOverflow, MetadataCache, Product,
};
pub use session::{CartProvider, CartSession};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StorageError};
pub use store::{CartStore, SyncOutcome};
pub use view::{CartItemView, CartView};
