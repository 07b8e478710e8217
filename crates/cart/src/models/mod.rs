//! Domain models for the cart store.
//!
//! - [`line_item`] - Line items, products, and display metadata
//! - [`lines`] - Ordered product-keyed line collection and metadata cache
//! - [`snapshot`] - Persisted forms and load/save helpers

pub mod line_item;
pub mod lines;
pub mod snapshot;

pub use line_item::{
    CartLineItem, DisplayMeta, LineTotalOverflow, Product, UNKNOWN_PRODUCT_NAME,
};
pub use lines::{CartLines, MetadataCache};
