//! Bulkcart Core - Shared types library.
//!
//! This crate provides common types used across all Bulkcart components:
//! - `cart` - Session cart store with local/remote reconciliation
//! - `cli` - Command-line tool for inspecting and editing a cart
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
