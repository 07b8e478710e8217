//! Display model handed to the rendering layer.
//!
//! Prices are pre-formatted so templates never do arithmetic.

use serde::Serialize;

use bulkcart_core::{CurrencyCode, Price};

use crate::models::{CartLineItem, CartLines};

/// Cart line display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u64,
}

impl CartView {
    /// Build the view for `lines`, formatting prices in `currency`.
    #[must_use]
    pub fn from_lines(lines: &CartLines, currency: CurrencyCode) -> Self {
        Self {
            items: lines
                .iter()
                .map(|line| CartItemView::from_line(line, currency))
                .collect(),
            subtotal: Price::new(lines.subtotal(), currency).display(),
            item_count: lines.item_count(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CartItemView {
    fn from_line(line: &CartLineItem, currency: CurrencyCode) -> Self {
        let display = line.display();
        Self {
            product_id: line.product_id().to_string(),
            name: display.name.clone(),
            sku: display.sku.clone(),
            image: display.image.clone(),
            quantity: line.quantity(),
            price: Price::new(line.unit_price(), currency).display(),
            line_price: Price::new(line.line_total(), currency).display(),
        }
    }
}
