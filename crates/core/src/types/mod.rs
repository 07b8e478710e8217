//! Core types for Bulkcart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;

pub use id::{IdError, OrderReference, ProductId, SessionId};
pub use price::{CurrencyCode, CurrencyCodeError, Price, line_total};
