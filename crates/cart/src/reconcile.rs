//! Reconciliation rules between the local and remote cart tiers.
//!
//! The local tier is the in-memory [`CartLines`] plus its persisted snapshot.
//! The remote tier is whatever the cart service last returned. There are two
//! rules, and every cart mutation goes through exactly one of them:
//!
//! - **Remote wins**: a successful remote response replaces the local lines
//!   wholesale. Display metadata is taken from the local cache, falling back
//!   to the "Unknown Product" placeholder.
//! - **Local merge**: without a credential, or after a failed remote call,
//!   the change is applied to the local lines only.

use tracing::{debug, warn};

use crate::api::RemoteCart;
use crate::models::{CartLineItem, CartLines, DisplayMeta, MetadataCache, Product};

/// Build the local lines from an authoritative remote cart.
///
/// Lines with zero quantity or a total that does not fit in a `Decimal` are
/// dropped with a warning.
#[must_use]
pub fn reconcile_remote(remote: RemoteCart, meta: &MetadataCache) -> CartLines {
    remote
        .items
        .into_iter()
        .filter_map(|item| {
            if item.quantity == 0 {
                warn!(product_id = %item.product_id, "Dropping zero-quantity remote line");
                return None;
            }
            let display = meta
                .get(&item.product_id)
                .cloned()
                .unwrap_or_else(DisplayMeta::unknown);
            let line = match CartLineItem::new(item.product_id, item.quantity, item.price, display)
            {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Dropping remote line whose total overflows");
                    return None;
                }
            };
            if let Some(total) = item.total.filter(|total| *total != line.line_total()) {
                debug!(
                    product_id = %line.product_id(),
                    remote_total = %total,
                    expected = %line.line_total(),
                    "Remote line total differs from price x quantity, recomputing"
                );
            }
            Some(line)
        })
        .collect()
}

/// Apply an add to the local lines only. An add whose total would overflow
/// leaves the lines unchanged.
pub fn merge_local(lines: &mut CartLines, product: &Product, quantity: u32) {
    let merged = CartLineItem::from_product(product, quantity).and_then(|line| lines.merge(line));
    if let Err(e) = merged {
        warn!(error = %e, "Local add overflows the line total, cart unchanged");
    }
}
