//! Ordered, product-keyed collection of cart lines.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::warn;

use bulkcart_core::ProductId;

use super::line_item::{CartLineItem, DisplayMeta, LineTotalOverflow};

/// Display metadata cache, keyed by product.
///
/// Entries are never evicted.
pub type MetadataCache = BTreeMap<ProductId, DisplayMeta>;

/// Cart lines in insertion order with at most one line per product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartLines {
    lines: Vec<CartLineItem>,
}

impl CartLines {
    /// Create an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Add a line, merging into an existing line for the same product.
    ///
    /// Merging keeps the existing line's position, unit price and metadata
    /// and adds the incoming quantity. Zero-quantity lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns `LineTotalOverflow` and leaves the lines unchanged if the
    /// merged total does not fit in a `Decimal`.
    pub fn merge(&mut self, incoming: CartLineItem) -> Result<(), LineTotalOverflow> {
        if incoming.quantity() == 0 {
            return Ok(());
        }
        match self
            .lines
            .iter_mut()
            .find(|line| line.product_id() == incoming.product_id())
        {
            Some(existing) => existing.add_quantity(incoming.quantity())?,
            None => self.lines.push(incoming),
        }
        Ok(())
    }

    /// Delete the line for `product_id`. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_id() != product_id);
        self.lines.len() != before
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&CartLineItem> {
        self.lines.iter().find(|line| line.product_id() == product_id)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[CartLineItem] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CartLineItem> {
        self.lines.iter()
    }

    /// Sum of line totals, saturating at `Decimal::MAX`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines
            .iter()
            .fold(Decimal::ZERO, |sum, line| sum.saturating_add(line.line_total()))
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity())).sum()
    }
}

/// Merges each line in turn. A line whose merged total would overflow is
/// dropped with a warning.
impl FromIterator<CartLineItem> for CartLines {
    fn from_iter<I: IntoIterator<Item = CartLineItem>>(iter: I) -> Self {
        let mut lines = Self::new();
        for line in iter {
            if let Err(e) = lines.merge(line) {
                warn!(error = %e, "Dropping line whose merged total overflows");
            }
        }
        lines
    }
}

impl<'a> IntoIterator for &'a CartLines {
    type Item = &'a CartLineItem;
    type IntoIter = std::slice::Iter<'a, CartLineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: &str, quantity: u32, price: i64) -> CartLineItem {
        priced_line(id, quantity, Decimal::from(price))
    }

    fn priced_line(id: &str, quantity: u32, price: Decimal) -> CartLineItem {
        CartLineItem::new(
            ProductId::parse(id).unwrap(),
            quantity,
            price,
            DisplayMeta::unknown(),
        )
        .unwrap()
    }

    #[test]
    fn test_merge_same_product_sums_quantity() {
        let mut lines = CartLines::new();
        lines.merge(line("P1", 2, 10)).unwrap();
        lines.merge(line("P1", 3, 10)).unwrap();

        assert_eq!(lines.len(), 1);
        let p1 = lines.get(&ProductId::parse("P1").unwrap()).unwrap();
        assert_eq!(p1.quantity(), 5);
        assert_eq!(p1.line_total(), Decimal::from(50));
    }

    #[test]
    fn test_merge_preserves_insertion_order() {
        let lines: CartLines = [line("B", 1, 1), line("A", 1, 1), line("B", 1, 1)]
            .into_iter()
            .collect();
        let ids: Vec<_> = lines.iter().map(|l| l.product_id().as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn test_merge_ignores_zero_quantity() {
        let mut lines = CartLines::new();
        lines.merge(line("P1", 0, 10)).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut lines: CartLines = std::iter::once(line("P1", 1, 10)).collect();
        assert!(!lines.remove(&ProductId::parse("P9").unwrap()));
        assert_eq!(lines.len(), 1);
        assert!(lines.remove(&ProductId::parse("P1").unwrap()));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_totals() {
        let lines: CartLines = [line("P1", 2, 10), line("P2", 3, 7)].into_iter().collect();
        assert_eq!(lines.subtotal(), Decimal::from(41));
        assert_eq!(lines.item_count(), 5);
        assert_eq!(CartLines::new().subtotal(), Decimal::ZERO);
    }

    #[test]
    fn test_merge_overflow_keeps_existing_line() {
        let mut lines = CartLines::new();
        lines.merge(priced_line("P1", 1, Decimal::MAX)).unwrap();

        let err = lines.merge(priced_line("P1", 1, Decimal::MAX)).unwrap_err();

        assert_eq!(err.quantity, 2);
        let p1 = lines.get(&ProductId::parse("P1").unwrap()).unwrap();
        assert_eq!(p1.quantity(), 1);
        assert_eq!(p1.line_total(), Decimal::MAX);
    }

    #[test]
    fn test_collect_drops_overflowing_duplicate() {
        let lines: CartLines = [
            priced_line("P1", 1, Decimal::MAX),
            line("P2", 1, 5),
            priced_line("P1", 1, Decimal::MAX),
        ]
        .into_iter()
        .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.item_count(), 2);
    }

    #[test]
    fn test_subtotal_saturates() {
        let lines: CartLines = [priced_line("P1", 1, Decimal::MAX), line("P2", 1, 5)]
            .into_iter()
            .collect();
        assert_eq!(lines.subtotal(), Decimal::MAX);
    }
}
