//! Cart line items and the product data they are built from.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bulkcart_core::{ProductId, line_total};

/// Name shown for a line whose product metadata was never cached.
pub const UNKNOWN_PRODUCT_NAME: &str = "Unknown Product";

/// Denormalized product fields for rendering a line without a product lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

impl DisplayMeta {
    /// Placeholder metadata for products with nothing cached.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_PRODUCT_NAME.to_string(),
            image: None,
            sku: None,
        }
    }
}

/// A product as offered to the cart by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub sku: Option<String>,
    pub unit_price: Decimal,
}

impl Product {
    /// Metadata to cache for this product.
    #[must_use]
    pub fn display_meta(&self) -> DisplayMeta {
        DisplayMeta {
            name: self.name.clone(),
            image: self.image.clone(),
            sku: self.sku.clone(),
        }
    }
}

/// A line whose `unit_price x quantity` does not fit in a `Decimal`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line total overflows for product {product_id}: {quantity} x {unit_price}")]
pub struct LineTotalOverflow {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// One product entry in the cart.
///
/// Fields are private so `line_total` can only change together with
/// `quantity` or `unit_price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineItem {
    product_id: ProductId,
    quantity: u32,
    unit_price: Decimal,
    line_total: Decimal,
    display: DisplayMeta,
}

impl CartLineItem {
    /// Build a line, computing its total.
    ///
    /// # Errors
    ///
    /// Returns `LineTotalOverflow` if the total does not fit in a `Decimal`.
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        unit_price: Decimal,
        display: DisplayMeta,
    ) -> Result<Self, LineTotalOverflow> {
        let Some(total) = line_total(unit_price, quantity) else {
            return Err(LineTotalOverflow {
                product_id,
                quantity,
                unit_price,
            });
        };
        Ok(Self {
            product_id,
            quantity,
            unit_price,
            line_total: total,
            display,
        })
    }

    /// Build a line for `quantity` units of `product`.
    ///
    /// # Errors
    ///
    /// Returns `LineTotalOverflow` if the total does not fit in a `Decimal`.
    pub fn from_product(product: &Product, quantity: u32) -> Result<Self, LineTotalOverflow> {
        Self::new(
            product.id.clone(),
            quantity,
            product.unit_price,
            product.display_meta(),
        )
    }

    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    #[must_use]
    pub const fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    #[must_use]
    pub const fn line_total(&self) -> Decimal {
        self.line_total
    }

    #[must_use]
    pub const fn display(&self) -> &DisplayMeta {
        &self.display
    }

    /// Increase the quantity and recompute the total. The quantity saturates
    /// at `u32::MAX`.
    ///
    /// # Errors
    ///
    /// Returns `LineTotalOverflow` and leaves the line unchanged if the new
    /// total does not fit in a `Decimal`.
    pub fn add_quantity(&mut self, quantity: u32) -> Result<(), LineTotalOverflow> {
        let quantity = self.quantity.saturating_add(quantity);
        let total = line_total(self.unit_price, quantity).ok_or_else(|| LineTotalOverflow {
            product_id: self.product_id.clone(),
            quantity,
            unit_price: self.unit_price,
        })?;
        self.quantity = quantity;
        self.line_total = total;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn widget() -> Product {
        Product {
            id: ProductId::parse("P1").unwrap(),
            name: "Widget".to_string(),
            image: Some("https://cdn.example.com/w.png".to_string()),
            sku: Some("W-1".to_string()),
            unit_price: Decimal::new(1250, 2),
        }
    }

    #[test]
    fn test_new_line_computes_total() {
        let line = CartLineItem::from_product(&widget(), 4).unwrap();
        assert_eq!(line.quantity(), 4);
        assert_eq!(line.line_total(), Decimal::from(50));
        assert_eq!(line.display().sku.as_deref(), Some("W-1"));
    }

    #[test]
    fn test_add_quantity_recomputes_total() {
        let mut line = CartLineItem::from_product(&widget(), 2).unwrap();
        line.add_quantity(3).unwrap();
        assert_eq!(line.quantity(), 5);
        assert_eq!(line.line_total(), Decimal::new(6250, 2));
    }

    #[test]
    fn test_add_quantity_saturates() {
        let mut line = CartLineItem::from_product(&widget(), u32::MAX - 1).unwrap();
        line.add_quantity(5).unwrap();
        assert_eq!(line.quantity(), u32::MAX);
    }

    #[test]
    fn test_new_rejects_overflowing_total() {
        let mut product = widget();
        product.unit_price = Decimal::MAX;
        let err = CartLineItem::from_product(&product, 2).unwrap_err();
        assert_eq!(err.quantity, 2);
        assert_eq!(err.product_id.as_str(), "P1");
    }

    #[test]
    fn test_add_quantity_overflow_leaves_line_unchanged() {
        let mut product = widget();
        product.unit_price = Decimal::MAX;
        let mut line = CartLineItem::from_product(&product, 1).unwrap();

        assert!(line.add_quantity(1).is_err());
        assert_eq!(line.quantity(), 1);
        assert_eq!(line.line_total(), Decimal::MAX);
    }

    #[test]
    fn test_unknown_meta() {
        let meta = DisplayMeta::unknown();
        assert_eq!(meta.name, "Unknown Product");
        assert!(meta.image.is_none());
    }

    #[test]
    fn test_display_meta_omits_missing_fields() {
        let json = serde_json::to_string(&DisplayMeta::unknown()).unwrap();
        assert_eq!(json, r#"{"name":"Unknown Product"}"#);
    }
}
