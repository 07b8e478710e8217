//! Persisted forms of cart state.
//!
//! Two independent blobs:
//! - [`CART_SNAPSHOT_KEY`]: ordered list of
//!   `{productId, quantity, price, total, name?, image?, sku?}`
//! - [`PRODUCT_META_KEY`]: map of `productId -> {name, image?, sku?}`
//!
//! Loading never fails: unreadable or corrupt blobs are logged and treated
//! as absent. Saving failures are logged and swallowed; in-memory state
//! stays authoritative.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use bulkcart_core::ProductId;

use super::line_item::{CartLineItem, DisplayMeta, LineTotalOverflow};
use super::lines::{CartLines, MetadataCache};
use crate::storage::KeyValueStore;

/// Storage key of the cart snapshot.
pub const CART_SNAPSHOT_KEY: &str = "bulkcart.cart";

/// Storage key of the product metadata cache.
pub const PRODUCT_META_KEY: &str = "bulkcart.product_meta";

/// Why a stored snapshot could not be restored.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Overflow(#[from] LineTotalOverflow),
}

/// One line of the persisted cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedLineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

impl From<&CartLineItem> for PersistedLineItem {
    fn from(line: &CartLineItem) -> Self {
        let display = line.display();
        Self {
            product_id: line.product_id().clone(),
            quantity: line.quantity(),
            price: line.unit_price(),
            total: Some(line.line_total()),
            name: Some(display.name.clone()),
            image: display.image.clone(),
            sku: display.sku.clone(),
        }
    }
}

impl PersistedLineItem {
    /// Rebuild a line. The total is recomputed; metadata missing from the
    /// snapshot is taken from `meta`, then from the placeholder.
    fn into_line(self, meta: &MetadataCache) -> Result<CartLineItem, LineTotalOverflow> {
        let display = match self.name {
            Some(name) => DisplayMeta {
                name,
                image: self.image,
                sku: self.sku,
            },
            None => meta
                .get(&self.product_id)
                .cloned()
                .unwrap_or_else(DisplayMeta::unknown),
        };
        CartLineItem::new(self.product_id, self.quantity, self.price, display)
    }
}

/// Encode lines for storage.
///
/// # Errors
///
/// Returns `serde_json::Error` if serialization fails.
pub fn encode_lines(lines: &CartLines) -> Result<String, serde_json::Error> {
    let persisted: Vec<PersistedLineItem> = lines.iter().map(PersistedLineItem::from).collect();
    serde_json::to_string(&persisted)
}

/// Decode a stored snapshot.
///
/// Zero-quantity entries are dropped and duplicate products collapsed.
///
/// # Errors
///
/// Returns `SnapshotError` if the blob is not a valid snapshot or any line
/// total, merged or not, does not fit in a `Decimal`.
pub fn decode_lines(raw: &str, meta: &MetadataCache) -> Result<CartLines, SnapshotError> {
    let persisted: Vec<PersistedLineItem> = serde_json::from_str(raw)?;
    let mut lines = CartLines::new();
    for entry in persisted {
        lines.merge(entry.into_line(meta)?)?;
    }
    Ok(lines)
}

/// Restore the metadata cache from storage.
pub fn load_meta(storage: &impl KeyValueStore) -> MetadataCache {
    let raw = match storage.get(PRODUCT_META_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return MetadataCache::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read product metadata, starting empty");
            return MetadataCache::new();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "Corrupt product metadata, starting empty");
        MetadataCache::new()
    })
}

/// Restore cart lines from storage.
pub fn load_lines(storage: &impl KeyValueStore, meta: &MetadataCache) -> CartLines {
    let raw = match storage.get(CART_SNAPSHOT_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return CartLines::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read cart snapshot, starting empty");
            return CartLines::new();
        }
    };

    match decode_lines(&raw, meta) {
        Ok(lines) => {
            debug!(lines = lines.len(), "Restored cart snapshot");
            lines
        }
        Err(e) => {
            warn!(error = %e, "Corrupt cart snapshot, starting empty");
            CartLines::new()
        }
    }
}

/// Write the full cart snapshot.
pub fn save_lines(storage: &impl KeyValueStore, lines: &CartLines) {
    let encoded = match encode_lines(lines) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(error = %e, "Failed to encode cart snapshot");
            return;
        }
    };
    if let Err(e) = storage.set(CART_SNAPSHOT_KEY, &encoded) {
        warn!(error = %e, "Failed to persist cart snapshot");
    }
}

/// Write the metadata cache. An empty cache is never written, so an earlier
/// non-empty blob cannot be replaced by an empty one.
pub fn save_meta(storage: &impl KeyValueStore, meta: &MetadataCache) {
    if meta.is_empty() {
        return;
    }
    let encoded = match serde_json::to_string(meta) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(error = %e, "Failed to encode product metadata");
            return;
        }
    };
    if let Err(e) = storage.set(PRODUCT_META_KEY, &encoded) {
        warn!(error = %e, "Failed to persist product metadata");
    }
}

/// Delete the persisted cart snapshot.
pub fn remove_lines(storage: &impl KeyValueStore) {
    if let Err(e) = storage.remove(CART_SNAPSHOT_KEY) {
        warn!(error = %e, "Failed to remove cart snapshot");
    }
}
