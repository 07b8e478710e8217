//! Cart commands.
//!
//! Every command starts a session, waits for the initial sync when a session
//! credential is configured, runs against the provided cart, and ends the
//! session.
//!
//! # Environment Variables
//!
//! - `CART_STORAGE_DIR` - Directory holding the persisted cart (default `.bulkcart`)
//! - `CART_API_URL` - Remote cart service base URL
//! - `CART_SESSION_TOKEN` - Bearer token for the buyer session
//! - `CART_CURRENCY` - Display currency (default `USD`)

use thiserror::Error;
use tracing::{info, warn};

use bulkcart_cart::{
    CartApi, CartError, CartProvider, CartSession, CartStore, CartView, KeyValueStore, Product,
    SyncOutcome,
};

use crate::Commands;

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Cart could not be set up or obtained from the provider.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Cart view could not be rendered as JSON.
    #[error("Failed to render cart: {0}")]
    Render(#[from] serde_json::Error),
}

/// Run `command` against the cart owned by `session`.
///
/// # Errors
///
/// Returns an error if the cart cannot be rendered. Remote and storage
/// failures are logged and never fail a command.
pub async fn execute<A: CartApi, S: KeyValueStore>(
    command: Commands,
    session: CartSession<A, S>,
) -> Result<(), CommandError> {
    let mut provider = CartProvider::new();
    provider.provide(session);

    if let Some(outcome) = provider.session_mut()?.wait_for_initial_sync().await {
        report("restore", &outcome);
    }

    let cart = provider.cart()?;
    match command {
        Commands::Show { json } => print_cart(&cart.view(), json)?,
        Commands::Add {
            product_id,
            price,
            quantity,
            name,
            sku,
            image,
        } => {
            let product = Product {
                id: product_id,
                name,
                image,
                sku,
                unit_price: price,
            };
            report("add", &cart.add_to_cart(&product, quantity).await);
            print_cart(&cart.view(), false)?;
        }
        Commands::Remove { product_id } => {
            if !cart.remove_from_cart(&product_id) {
                warn!(product_id = %product_id, "Product is not in the cart");
            }
            print_cart(&cart.view(), false)?;
        }
        Commands::Clear => report("clear", &cart.clear_cart().await),
        Commands::Sync => {
            // The initial sync above already reconciled a remote session.
            log_sync_state(cart);
            print_cart(&cart.view(), false)?;
        }
        Commands::Checkout { order_reference } => {
            report("checkout", &cart.complete_checkout(&order_reference).await);
        }
    }

    provider.end_session();
    Ok(())
}

fn report(operation: &str, outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Synced { lines } => {
            info!(operation, lines, "Cart synced with remote service");
        }
        SyncOutcome::LocalOnly => info!(operation, "Cart updated locally"),
        SyncOutcome::LocalFallback(e) => {
            warn!(operation, error = %e, "Remote cart service failed, kept local cart");
        }
    }
}

fn log_sync_state<A: CartApi, S: KeyValueStore>(cart: &CartStore<A, S>) {
    if !cart.has_credential() {
        info!("No session credential configured, cart is local-only");
        return;
    }
    match cart.last_synced_at() {
        Some(at) => info!(last_synced_at = %at.to_rfc3339(), "Cart is in sync"),
        None => warn!("Cart has not been synced with the remote service"),
    }
}

#[allow(clippy::print_stdout)]
fn print_cart(view: &CartView, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    if view.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }

    for item in &view.items {
        println!(
            "{:>6} x {:<32} {:<16} {:>12} {:>12}",
            item.quantity,
            item.name,
            item.sku.as_deref().unwrap_or(&item.product_id),
            item.price,
            item.line_price
        );
    }
    println!("{} items, subtotal {}", view.item_count, view.subtotal);
    Ok(())
}
