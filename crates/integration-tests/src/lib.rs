//! Integration test support for Bulkcart.
//!
//! # Running Tests
//!
//! ```bash
//! # Scripted and stub-server tests
//! cargo test -p bulkcart-integration-tests
//!
//! # Live cart service tests
//! CART_API_URL=https://... CART_SESSION_TOKEN=... \
//!     cargo test -p bulkcart-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_store` - Reconciliation scenarios against [`ScriptedApi`]
//! - `file_storage` - Restarting a session from a file-backed cart
//! - `http_client` - `HttpCartApi` against [`serve_once`] and a live service

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use bulkcart_cart::api::{AddItemInput, RemoteCart, RemoteLineItem};
use bulkcart_cart::{ApiError, CartApi, Product};
use bulkcart_core::ProductId;

/// Reply sent through an add gate.
pub type GatedReply = Result<RemoteCart, ApiError>;

/// In-process cart service for driving a store through exact interleavings.
///
/// Ungated calls behave like a real service holding one cart. An add for a
/// gated product instead waits until the test sends its reply.
#[derive(Clone, Default)]
pub struct ScriptedApi {
    inner: Arc<ScriptedInner>,
}

#[derive(Default)]
struct ScriptedInner {
    items: Mutex<Vec<RemoteLineItem>>,
    prices: Mutex<HashMap<ProductId, Decimal>>,
    gates: Mutex<HashMap<ProductId, oneshot::Receiver<GatedReply>>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the service know `product`'s price.
    pub fn stock(&self, product: &Product) {
        lock(&self.inner.prices).insert(product.id.clone(), product.unit_price);
    }

    /// Put a line straight into the remote cart.
    pub fn seed(&self, product_id: &ProductId, quantity: u32, price: Decimal) {
        lock(&self.inner.items).push(RemoteLineItem {
            product_id: product_id.clone(),
            quantity,
            price,
            total: None,
        });
    }

    /// Fail every subsequent ungated call.
    pub fn set_failing(&self, fail: bool) {
        self.inner.fail.store(fail, Ordering::SeqCst);
    }

    /// Hold the next add for `product_id` until a reply is sent.
    #[must_use]
    pub fn gate_add(&self, product_id: &ProductId) -> oneshot::Sender<GatedReply> {
        let (tx, rx) = oneshot::channel();
        lock(&self.inner.gates).insert(product_id.clone(), rx);
        tx
    }

    /// Remote calls started so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Current remote cart.
    #[must_use]
    pub fn remote_items(&self) -> Vec<RemoteLineItem> {
        lock(&self.inner.items).clone()
    }

    fn begin_call(&self) -> Result<(), ApiError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 503,
                message: "scripted outage".to_string(),
            });
        }
        Ok(())
    }

    fn take_gate(&self, product_id: &ProductId) -> Option<oneshot::Receiver<GatedReply>> {
        lock(&self.inner.gates).remove(product_id)
    }

    fn apply_add(&self, input: &AddItemInput) -> GatedReply {
        let price = lock(&self.inner.prices)
            .get(&input.product_id)
            .copied()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: format!("unknown product {}", input.product_id),
            })?;

        let mut items = lock(&self.inner.items);
        match items.iter_mut().find(|i| i.product_id == input.product_id) {
            Some(item) => item.quantity += input.quantity,
            None => items.push(RemoteLineItem {
                product_id: input.product_id.clone(),
                quantity: input.quantity,
                price,
                total: None,
            }),
        }
        Ok(RemoteCart {
            items: items.clone(),
        })
    }
}

impl CartApi for ScriptedApi {
    async fn get_cart(&self, _token: &SecretString) -> Result<RemoteCart, ApiError> {
        self.begin_call()?;
        Ok(RemoteCart {
            items: self.remote_items(),
        })
    }

    async fn add_item(
        &self,
        _token: &SecretString,
        input: &AddItemInput,
    ) -> Result<RemoteCart, ApiError> {
        if let Some(gate) = self.take_gate(&input.product_id) {
            self.inner.calls.fetch_add(1, Ordering::SeqCst);
            return gate
                .await
                .unwrap_or_else(|_| Err(ApiError::Unavailable("gate dropped".to_string())));
        }
        self.begin_call()?;
        self.apply_add(input)
    }

    async fn clear_cart(&self, _token: &SecretString) -> Result<(), ApiError> {
        self.begin_call()?;
        lock(&self.inner.items).clear();
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build a catalog product.
///
/// # Panics
///
/// Panics if `id` is not a valid product id.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn product(id: &str, name: &str, unit_price: Decimal) -> Product {
    Product {
        id: ProductId::parse(id).unwrap(),
        name: name.to_string(),
        image: Some(format!("https://cdn.example.com/{id}.jpg")),
        sku: Some(format!("SKU-{id}")),
        unit_price,
    }
}

/// A remote cart holding the given lines.
#[must_use]
pub fn remote_cart(lines: &[(&Product, u32)]) -> RemoteCart {
    RemoteCart {
        items: lines
            .iter()
            .map(|(product, quantity)| RemoteLineItem {
                product_id: product.id.clone(),
                quantity: *quantity,
                price: product.unit_price,
                total: None,
            })
            .collect(),
    }
}

/// Session token for tests.
#[must_use]
pub fn token() -> SecretString {
    SecretString::from("test-session-token")
}

/// Scratch directory removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    /// Reserve a fresh directory path under the system temp dir.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: std::env::temp_dir().join(format!("bulkcart-it-{}", uuid::Uuid::new_v4())),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for TempDir {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Serve one canned HTTP response on a local port.
///
/// Returns the base URL and a handle resolving to the raw request (head and
/// body) the server received.
///
/// # Errors
///
/// Returns an error if the listener cannot bind.
pub async fn serve_once(
    status_line: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> std::io::Result<(url::Url, JoinHandle<std::io::Result<String>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let mut response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (name, value) in headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");
    response.push_str(body);

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        let request = read_request(&mut socket).await?;
        socket.write_all(response.as_bytes()).await?;
        socket.shutdown().await?;
        Ok(request)
    });

    let url = url::Url::parse(&format!("http://{addr}/api/"))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    Ok((url, handle))
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 1024];

    let head_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(String::from_utf8_lossy(&buf).into_owned());
        }
        buf.extend_from_slice(chunk.get(..n).unwrap_or_default());
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(buf.get(..head_end).unwrap_or_default()).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(chunk.get(..n).unwrap_or_default());
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}
