//! Session cart store.
//!
//! Holds the ordered cart lines for one session, restores them from local
//! storage on creation, and reconciles with the remote cart service when a
//! session credential is present (see [`crate::reconcile`] for the rules).
//!
//! # Consistency
//!
//! Remote calls are not serialized against each other and are never
//! cancelled. If two adds race, whichever response arrives last replaces the
//! lines, including any local-only change made in between. Likewise a slow
//! response can land after `clear_cart` and repopulate the cart.
//!
//! `is_syncing` is a flag, not a counter: the first remote call to finish
//! resets it even if another call is still outstanding.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use bulkcart_core::{CurrencyCode, OrderReference, ProductId};

use crate::api::{AddItemInput, ApiError, CartApi, RemoteCart};
use crate::models::snapshot;
use crate::models::{CartLineItem, CartLines, DisplayMeta, MetadataCache, Product};
use crate::reconcile;
use crate::storage::KeyValueStore;
use crate::view::CartView;

/// Which path a cart operation took.
///
/// Remote failures are reported here rather than as `Err`: the cart stays
/// usable locally whatever the remote service does.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The remote service accepted the operation; `lines` is the resulting
    /// number of cart lines.
    Synced { lines: usize },
    /// No session credential, so only local state was touched.
    LocalOnly,
    /// The remote call failed and the operation fell back to local state.
    LocalFallback(ApiError),
}

/// Cart store for one session. Cheap to clone; clones share state.
pub struct CartStore<A, S> {
    inner: Arc<CartStoreInner<A, S>>,
}

impl<A, S> Clone for CartStore<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CartStoreInner<A, S> {
    api: A,
    storage: S,
    token: Option<SecretString>,
    currency: CurrencyCode,
    state: Mutex<CartState>,
}

#[derive(Debug, Default)]
struct CartState {
    lines: CartLines,
    meta: MetadataCache,
    is_syncing: bool,
    last_synced_at: Option<DateTime<Utc>>,
}

impl<A: CartApi, S: KeyValueStore> CartStore<A, S> {
    /// Create a store, restoring metadata and lines from `storage`.
    ///
    /// Corrupt or unreadable persisted state is logged and treated as empty.
    /// No remote call is made here; see [`Self::spawn_sync`].
    pub fn new(api: A, storage: S, token: Option<SecretString>, currency: CurrencyCode) -> Self {
        let meta = snapshot::load_meta(&storage);
        let lines = snapshot::load_lines(&storage, &meta);
        info!(
            lines = lines.len(),
            cached_products = meta.len(),
            remote = token.is_some(),
            "Cart store restored"
        );

        Self {
            inner: Arc::new(CartStoreInner {
                api,
                storage,
                token,
                currency,
                state: Mutex::new(CartState {
                    lines,
                    meta,
                    ..CartState::default()
                }),
            }),
        }
    }

    // =========================================================================
    // Remote reconciliation
    // =========================================================================

    /// Start the initial reconciliation on a background task.
    ///
    /// Returns `None` when there is no session credential. The handle may be
    /// dropped; the task keeps running.
    #[must_use]
    pub fn spawn_sync(&self) -> Option<JoinHandle<SyncOutcome>> {
        self.inner.token.as_ref()?;
        let store = self.clone();
        Some(tokio::spawn(async move { store.sync().await }))
    }

    /// Fetch the remote cart and replace the local lines with it.
    ///
    /// On failure the local lines are kept as they are.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> SyncOutcome {
        let Some(token) = self.inner.token.as_ref() else {
            return SyncOutcome::LocalOnly;
        };

        self.set_syncing(true);
        let result = self.inner.api.get_cart(token).await;
        self.set_syncing(false);

        match result {
            Ok(remote) => {
                let lines = self.apply_remote(remote);
                info!(lines, "Reconciled cart with remote");
                SyncOutcome::Synced { lines }
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch remote cart, keeping local cart");
                SyncOutcome::LocalFallback(e)
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `product`.
    ///
    /// The product's display metadata is cached first, whatever happens
    /// next. With a credential the remote cart is updated and its response
    /// replaces the local lines; otherwise, or if the remote call fails, the
    /// add is merged into the local lines.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(&self, product: &Product, quantity: u32) -> SyncOutcome {
        self.remember_meta(product);

        let outcome = match self.inner.token.as_ref() {
            None => SyncOutcome::LocalOnly,
            Some(token) => {
                let input = AddItemInput {
                    product_id: product.id.clone(),
                    quantity,
                };

                self.set_syncing(true);
                let result = self.inner.api.add_item(token, &input).await;
                self.set_syncing(false);

                match result {
                    Ok(remote) => {
                        let lines = self.apply_remote(remote);
                        return SyncOutcome::Synced { lines };
                    }
                    Err(e) => {
                        warn!(error = %e, "Remote add failed, applying locally");
                        SyncOutcome::LocalFallback(e)
                    }
                }
            }
        };

        self.apply_local_add(product, quantity);
        outcome
    }

    /// Delete the whole line for `product_id`. Local only; a missing product
    /// is a no-op. Returns whether a line was removed.
    #[instrument(skip(self))]
    pub fn remove_from_cart(&self, product_id: &ProductId) -> bool {
        let mut state = self.state();
        let removed = state.lines.remove(product_id);
        if removed {
            snapshot::save_lines(&self.inner.storage, &state.lines);
        }
        debug!(removed, "Remove from cart");
        removed
    }

    /// Empty the cart.
    ///
    /// Local lines and the persisted snapshot are cleared immediately. A
    /// remote clear failure is logged and not rolled back.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> SyncOutcome {
        self.clear_local();

        let Some(token) = self.inner.token.as_ref() else {
            return SyncOutcome::LocalOnly;
        };

        self.set_syncing(true);
        let result = self.inner.api.clear_cart(token).await;
        self.set_syncing(false);

        match result {
            Ok(()) => SyncOutcome::Synced { lines: 0 },
            Err(e) => {
                warn!(error = %e, "Remote clear failed, local cart stays cleared");
                SyncOutcome::LocalFallback(e)
            }
        }
    }

    /// Record a completed checkout and empty the cart.
    #[instrument(skip(self))]
    pub async fn complete_checkout(&self, order: &OrderReference) -> SyncOutcome {
        info!(
            order_reference = %order,
            items = self.item_count(),
            subtotal = %self.subtotal(),
            "Checkout completed, clearing cart"
        );
        self.clear_cart().await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current lines in display order.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.state().lines.as_slice().to_vec()
    }

    /// Sum of line totals, computed on every call.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.state().lines.subtotal()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.state().lines.item_count()
    }

    /// Whether a remote call is outstanding.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.state().is_syncing
    }

    /// Cached display metadata for a product.
    #[must_use]
    pub fn display_meta(&self, product_id: &ProductId) -> Option<DisplayMeta> {
        self.state().meta.get(product_id).cloned()
    }

    /// When the last successful reconciliation happened.
    #[must_use]
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.state().last_synced_at
    }

    /// Whether remote calls will be attempted.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.inner.token.is_some()
    }

    /// Display currency.
    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.currency
    }

    /// Display model for the current lines.
    #[must_use]
    pub fn view(&self) -> CartView {
        CartView::from_lines(&self.state().lines, self.inner.currency)
    }

    // =========================================================================
    // State helpers (never held across an await)
    // =========================================================================

    fn state(&self) -> MutexGuard<'_, CartState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_syncing(&self, syncing: bool) {
        self.state().is_syncing = syncing;
    }

    fn remember_meta(&self, product: &Product) {
        let mut state = self.state();
        state.meta.insert(product.id.clone(), product.display_meta());
        snapshot::save_meta(&self.inner.storage, &state.meta);
    }

    fn apply_remote(&self, remote: RemoteCart) -> usize {
        let mut state = self.state();
        state.lines = reconcile::reconcile_remote(remote, &state.meta);
        state.last_synced_at = Some(Utc::now());
        snapshot::save_lines(&self.inner.storage, &state.lines);
        state.lines.len()
    }

    fn apply_local_add(&self, product: &Product, quantity: u32) {
        let mut state = self.state();
        reconcile::merge_local(&mut state.lines, product, quantity);
        snapshot::save_lines(&self.inner.storage, &state.lines);
    }

    fn clear_local(&self) {
        let mut state = self.state();
        state.lines.clear();
        snapshot::remove_lines(&self.inner.storage);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::api::RemoteLineItem;
    use crate::models::snapshot::{CART_SNAPSHOT_KEY, PRODUCT_META_KEY};
    use crate::storage::MemoryStorage;

    /// In-memory cart service. `fail` makes every call return an error.
    #[derive(Default)]
    struct FakeApi {
        items: Mutex<Vec<RemoteLineItem>>,
        fail: AtomicBool,
    }

    impl FakeApi {
        fn failing() -> Arc<Self> {
            let api = Self::default();
            api.fail.store(true, Ordering::SeqCst);
            Arc::new(api)
        }

        fn seeded(items: Vec<RemoteLineItem>) -> Arc<Self> {
            Arc::new(Self {
                items: Mutex::new(items),
                fail: AtomicBool::new(false),
            })
        }

        fn check(&self) -> Result<(), ApiError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Unavailable("fake outage".to_string()));
            }
            Ok(())
        }

        fn cart(&self) -> RemoteCart {
            RemoteCart {
                items: self.items.lock().unwrap().clone(),
            }
        }
    }

    impl CartApi for FakeApi {
        async fn get_cart(&self, _token: &SecretString) -> Result<RemoteCart, ApiError> {
            self.check()?;
            Ok(self.cart())
        }

        async fn add_item(
            &self,
            _token: &SecretString,
            input: &AddItemInput,
        ) -> Result<RemoteCart, ApiError> {
            self.check()?;
            {
                let mut items = self.items.lock().unwrap();
                match items.iter_mut().find(|i| i.product_id == input.product_id) {
                    Some(item) => item.quantity += input.quantity,
                    None => items.push(RemoteLineItem {
                        product_id: input.product_id.clone(),
                        quantity: input.quantity,
                        price: Decimal::from(10),
                        total: None,
                    }),
                }
            }
            Ok(self.cart())
        }

        async fn clear_cart(&self, _token: &SecretString) -> Result<(), ApiError> {
            self.check()?;
            self.items.lock().unwrap().clear();
            Ok(())
        }
    }

    fn pid(id: &str) -> ProductId {
        ProductId::parse(id).unwrap()
    }

    fn product(id: &str, price: i64) -> Product {
        Product {
            id: pid(id),
            name: format!("Product {id}"),
            image: None,
            sku: Some(format!("SKU-{id}")),
            unit_price: Decimal::from(price),
        }
    }

    fn token() -> Option<SecretString> {
        Some(SecretString::from("session-token"))
    }

    fn offline_store(storage: MemoryStorage) -> CartStore<Arc<FakeApi>, MemoryStorage> {
        CartStore::new(Arc::new(FakeApi::default()), storage, None, CurrencyCode::USD)
    }

    #[tokio::test]
    async fn test_distinct_products_offline() {
        let store = offline_store(MemoryStorage::new());
        let adds = [("A", 3, 2), ("B", 5, 1), ("C", 7, 4)];
        for (id, price, qty) in adds {
            let outcome = store.add_to_cart(&product(id, price), qty).await;
            assert!(matches!(outcome, SyncOutcome::LocalOnly));
        }

        assert_eq!(store.item_count(), 7);
        assert_eq!(store.subtotal(), Decimal::from(3 * 2 + 5 + 7 * 4));
        assert_eq!(store.items().len(), 3);
    }

    #[tokio::test]
    async fn test_same_product_twice_merges() {
        let store = offline_store(MemoryStorage::new());
        store.add_to_cart(&product("P1", 4), 2).await;
        store.add_to_cart(&product("P1", 4), 3).await;

        let items = store.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity(), 5);
        assert_eq!(items[0].line_total(), Decimal::from(20));
    }

    #[tokio::test]
    async fn test_add_then_remove_scenario() {
        let store = offline_store(MemoryStorage::new());
        let p1 = product("P1", 10);

        store.add_to_cart(&p1, 2).await;
        assert_eq!(store.subtotal(), Decimal::from(20));
        assert_eq!(store.item_count(), 2);

        store.add_to_cart(&p1, 1).await;
        assert_eq!(store.subtotal(), Decimal::from(30));
        assert_eq!(store.item_count(), 3);

        assert!(store.remove_from_cart(&pid("P1")));
        assert_eq!(store.subtotal(), Decimal::ZERO);
        assert_eq!(store.item_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_unknown_product_is_noop() {
        let store = offline_store(MemoryStorage::new());
        store.add_to_cart(&product("P1", 1), 1).await;
        let before = store.items();

        assert!(!store.remove_from_cart(&pid("nope")));
        assert_eq!(store.items(), before);
    }

    #[tokio::test]
    async fn test_clear_survives_remote_failure() {
        let storage = MemoryStorage::new();
        let store = CartStore::new(
            FakeApi::failing(),
            storage.clone(),
            token(),
            CurrencyCode::USD,
        );
        store.add_to_cart(&product("P1", 10), 2).await;
        assert!(storage.get(CART_SNAPSHOT_KEY).unwrap().is_some());

        let outcome = store.clear_cart().await;

        assert!(matches!(outcome, SyncOutcome::LocalFallback(_)));
        assert!(store.items().is_empty());
        assert_eq!(storage.get(CART_SNAPSHOT_KEY).unwrap(), None);
        assert!(!store.is_syncing());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let storage = MemoryStorage::new();
        storage.set(CART_SNAPSHOT_KEY, "\u{0}garbage").unwrap();
        let store = offline_store(storage);
        assert!(store.items().is_empty());
        assert_eq!(store.item_count(), 0);
    }

    #[tokio::test]
    async fn test_overflowing_snapshot_starts_empty() {
        let storage = MemoryStorage::new();
        storage
            .set(
                CART_SNAPSHOT_KEY,
                r#"[{"productId":"P1","quantity":2,"price":"79228162514264337593543950335"}]"#,
            )
            .unwrap();
        let store = offline_store(storage);
        assert!(store.items().is_empty());
        assert_eq!(store.subtotal(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_sync_drops_overflowing_remote_line() {
        let api = FakeApi::seeded(vec![
            RemoteLineItem {
                product_id: pid("R1"),
                quantity: 3,
                price: Decimal::MAX,
                total: None,
            },
            RemoteLineItem {
                product_id: pid("R2"),
                quantity: 1,
                price: Decimal::from(4),
                total: None,
            },
        ]);
        let store = CartStore::new(api, MemoryStorage::new(), token(), CurrencyCode::USD);

        let outcome = store.sync().await;

        assert!(matches!(outcome, SyncOutcome::Synced { lines: 1 }));
        assert_eq!(store.items()[0].product_id(), &pid("R2"));
        assert_eq!(store.subtotal(), Decimal::from(4));
    }

    #[tokio::test]
    async fn test_offline_add_with_overflowing_total_is_ignored() {
        let store = offline_store(MemoryStorage::new());
        let mut huge = product("P1", 1);
        huge.unit_price = Decimal::MAX;

        let outcome = store.add_to_cart(&huge, 2).await;

        assert!(matches!(outcome, SyncOutcome::LocalOnly));
        assert!(store.items().is_empty());
        assert_eq!(store.view().subtotal, "$0.00");
    }

    #[tokio::test]
    async fn test_sync_labels_unknown_products() {
        let api = FakeApi::seeded(vec![RemoteLineItem {
            product_id: pid("R1"),
            quantity: 2,
            price: Decimal::from(3),
            total: Some(Decimal::from(6)),
        }]);
        let store = CartStore::new(api, MemoryStorage::new(), token(), CurrencyCode::USD);

        let outcome = store.sync().await;

        assert!(matches!(outcome, SyncOutcome::Synced { .. }));
        assert_eq!(store.items()[0].display().name, "Unknown Product");
        assert!(store.last_synced_at().is_some());
    }

    #[tokio::test]
    async fn test_sync_replaces_local_snapshot() {
        let storage = MemoryStorage::new();
        offline_store(storage.clone())
            .add_to_cart(&product("LOCAL", 1), 1)
            .await;

        let api = FakeApi::seeded(vec![RemoteLineItem {
            product_id: pid("REMOTE"),
            quantity: 1,
            price: Decimal::from(2),
            total: None,
        }]);
        let store = CartStore::new(api, storage, token(), CurrencyCode::USD);
        assert_eq!(store.items()[0].product_id().as_str(), "LOCAL");

        store.spawn_sync().unwrap().await.unwrap();

        let ids: Vec<_> = store
            .items()
            .iter()
            .map(|l| l.product_id().to_string())
            .collect();
        assert_eq!(ids, vec!["REMOTE".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_failure_keeps_local_snapshot() {
        let storage = MemoryStorage::new();
        offline_store(storage.clone())
            .add_to_cart(&product("LOCAL", 1), 4)
            .await;

        let store = CartStore::new(FakeApi::failing(), storage, token(), CurrencyCode::USD);
        let outcome = store.sync().await;

        assert!(matches!(outcome, SyncOutcome::LocalFallback(_)));
        assert_eq!(store.item_count(), 4);
        assert!(!store.is_syncing());
        assert!(store.last_synced_at().is_none());
    }

    #[tokio::test]
    async fn test_remote_add_uses_server_lines_and_fresh_meta() {
        let storage = MemoryStorage::new();
        let store = CartStore::new(
            Arc::new(FakeApi::default()),
            storage.clone(),
            token(),
            CurrencyCode::USD,
        );

        let outcome = store.add_to_cart(&product("P1", 99), 2).await;

        assert!(matches!(outcome, SyncOutcome::Synced { .. }));
        let items = store.items();
        // Server price wins over the caller's price.
        assert_eq!(items[0].unit_price(), Decimal::from(10));
        assert_eq!(items[0].display().name, "Product P1");
        assert_eq!(items[0].display().sku.as_deref(), Some("SKU-P1"));
        assert!(storage.get(CART_SNAPSHOT_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remote_add_failure_falls_back_to_local_merge() {
        let storage = MemoryStorage::new();
        let store = CartStore::new(
            FakeApi::failing(),
            storage.clone(),
            token(),
            CurrencyCode::USD,
        );

        let outcome = store.add_to_cart(&product("P1", 10), 2).await;
        store.add_to_cart(&product("P1", 10), 1).await;

        assert!(matches!(outcome, SyncOutcome::LocalFallback(_)));
        assert!(!store.is_syncing());
        assert_eq!(store.item_count(), 3);
        assert_eq!(store.subtotal(), Decimal::from(30));
        assert!(storage.get(PRODUCT_META_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_meta_cache_survives_clear_and_restart() {
        let storage = MemoryStorage::new();
        let store = offline_store(storage.clone());
        store.add_to_cart(&product("P1", 10), 1).await;
        store.clear_cart().await;

        let restarted = offline_store(storage);
        assert!(restarted.items().is_empty());
        assert_eq!(
            restarted.display_meta(&pid("P1")).unwrap().name,
            "Product P1"
        );
    }

    #[tokio::test]
    async fn test_snapshot_restored_on_new_store() {
        let storage = MemoryStorage::new();
        let store = offline_store(storage.clone());
        store.add_to_cart(&product("P1", 10), 2).await;
        store.add_to_cart(&product("P2", 1), 1).await;

        let restarted = offline_store(storage);
        assert_eq!(restarted.items(), store.items());
        assert_eq!(restarted.subtotal(), Decimal::from(21));
    }

    #[tokio::test]
    async fn test_complete_checkout_empties_cart() {
        let api = Arc::new(FakeApi::default());
        let store = CartStore::new(
            Arc::clone(&api),
            MemoryStorage::new(),
            token(),
            CurrencyCode::USD,
        );
        store.add_to_cart(&product("P1", 10), 2).await;

        let order = OrderReference::parse("PO-1001").unwrap();
        let outcome = store.complete_checkout(&order).await;

        assert!(matches!(outcome, SyncOutcome::Synced { lines: 0 }));
        assert!(store.items().is_empty());
        assert!(api.cart().items.is_empty());
    }

    #[test]
    fn test_spawn_sync_without_credential_is_none() {
        let store = offline_store(MemoryStorage::new());
        assert!(store.spawn_sync().is_none());
        assert!(!store.has_credential());
    }

    #[tokio::test]
    async fn test_view_reflects_lines() {
        let store = offline_store(MemoryStorage::new());
        assert_eq!(store.view().subtotal, "$0.00");
        store.add_to_cart(&product("P1", 10), 2).await;
        let view = store.view();
        assert_eq!(view.subtotal, "$20.00");
        assert_eq!(view.item_count, 2);
    }
}
