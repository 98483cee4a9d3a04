//! # Query Cache & Optimistic Mutations
//!
//! Process-local read cache for the collections the station shows (sales,
//! stock, products, dishes, board lists), and the one mutation pattern every
//! workflow that changes shared order state goes through.
//!
//! ## Optimistic Mutation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    OptimisticMutation::run                              │
//! │                                                                         │
//! │  1. cancel(key)       in-flight fetches for the key can no longer land │
//! │  2. snapshot          clone of the cached collection                   │
//! │  3. patch             applied synchronously, UI shows it at once       │
//! │  4. mutation.await    the store call                                   │
//! │       │                                                                 │
//! │       ├── Err ──► restore snapshot verbatim                            │
//! │       ▼                                                                 │
//! │  5. settle            invalidate key + related keys (success or not)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Generations
//! Every key carries a generation counter. A fetch records the generation it
//! started under and its result is dropped if the counter moved meanwhile
//! (cancel, direct set, invalidate). This is what keeps a slow poll from
//! overwriting an optimistic patch.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use bistro_core::{Dish, Product, RestaurantMember, Sale, StockRow};

// =============================================================================
// Keys
// =============================================================================

/// Well-known cache key roots. Concrete keys append `/<scope>` segments,
/// e.g. `delivery-orders/<restaurant>/driver/<user>`.
pub mod keys {
    pub const SALES: &str = "sales";
    pub const STOCK: &str = "stock";
    pub const DASHBOARD: &str = "dashboard";
    pub const PRODUCTS: &str = "products";
    pub const DISHES: &str = "dishes";
    pub const KITCHEN_ORDERS: &str = "kitchen-orders";
    pub const DELIVERY_ORDERS: &str = "delivery-orders";
    pub const DRIVERS: &str = "drivers";

    /// Joins a root and scope segments with `/`.
    pub fn scoped(root: &str, parts: &[&str]) -> String {
        let mut key = root.to_string();
        for part in parts {
            key.push('/');
            key.push_str(part);
        }
        key
    }
}

/// `key` is `prefix` itself or lies below it.
fn under(key: &str, prefix: &str) -> bool {
    key == prefix
        || (key.starts_with(prefix) && key.as_bytes().get(prefix.len()) == Some(&b'/'))
}

// =============================================================================
// Query Cache
// =============================================================================

type Value = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct Entry {
    value: Option<Value>,
    generation: u64,
    stale: bool,
}

/// Proof that a fetch started; hand it back to [`QueryCache::complete_fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchToken {
    key: String,
    generation: u64,
}

/// Shared, cloneable cache. Clones see the same entries.
///
/// Locks are held only inside these methods, never across an `.await`.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached value for `key`, stale or not. `None` if absent or of another type.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let entries = self.lock();
        let value = entries.get(key)?.value.as_ref()?;
        value.downcast_ref::<T>().cloned()
    }

    /// Writes a value directly (optimistic patch, restore). Moves the
    /// generation so older fetches cannot land on top of it.
    pub fn set<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        let mut entries = self.lock();
        let entry = entries.entry(key.to_string()).or_default();
        entry.value = Some(Arc::new(value));
        entry.generation += 1;
        entry.stale = false;
    }

    pub fn remove(&self, key: &str) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.value = None;
            entry.generation += 1;
            entry.stale = true;
        }
    }

    /// Registers a fetch for `key`.
    pub fn begin_fetch(&self, key: &str) -> FetchToken {
        let mut entries = self.lock();
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            stale: true,
            ..Entry::default()
        });
        FetchToken {
            key: key.to_string(),
            generation: entry.generation,
        }
    }

    /// Stores a fetch result unless the key was cancelled, set or
    /// invalidated since [`begin_fetch`](Self::begin_fetch).
    ///
    /// Returns whether the value landed.
    pub fn complete_fetch<T: Send + Sync + 'static>(&self, token: FetchToken, value: T) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(token.key.clone()).or_default();
        if entry.generation != token.generation {
            debug!(key = %token.key, "Dropping superseded fetch result");
            return false;
        }
        entry.value = Some(Arc::new(value));
        entry.stale = false;
        true
    }

    /// Cancels in-flight fetches for exactly this key.
    pub fn cancel(&self, key: &str) {
        let mut entries = self.lock();
        entries.entry(key.to_string()).or_default().generation += 1;
    }

    /// Marks `prefix` and every key below it stale, and cancels their
    /// in-flight fetches. Values stay readable until refetched.
    pub fn invalidate(&self, prefix: &str) -> usize {
        let mut entries = self.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if under(key, prefix) {
                entry.stale = true;
                entry.generation += 1;
                count += 1;
            }
        }
        debug!(prefix = %prefix, count, "Invalidated cache keys");
        count
    }

    /// Missing keys count as stale.
    pub fn is_stale(&self, key: &str) -> bool {
        self.lock().get(key).map(|e| e.stale || e.value.is_none()).unwrap_or(true)
    }

    /// Returns the cached value when fresh, otherwise runs `fetch` and stores
    /// its result (if nothing superseded it meanwhile).
    pub async fn fetch<T, E, F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.is_stale(key) {
            if let Some(value) = self.get::<T>(key) {
                return Ok(value);
            }
        }
        self.refetch(key, fetch).await
    }

    /// Always runs `fetch`, bypassing any cached value.
    pub async fn refetch<T, E, F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Ok(self.refetch_tracked(key, fetch).await?.0)
    }

    /// Like [`refetch`](Self::refetch), and also says whether the result
    /// landed in the cache. `false` means a cancel, set or invalidate
    /// overtook the fetch and the value is already out of date.
    pub async fn refetch_tracked<T, E, F, Fut>(&self, key: &str, fetch: F) -> Result<(T, bool), E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let token = self.begin_fetch(key);
        let value = fetch().await?;
        let landed = self.complete_fetch(token, value.clone());
        Ok((value, landed))
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.lock();
        f.debug_struct("QueryCache").field("keys", &entries.len()).finish()
    }
}

// =============================================================================
// Patches
// =============================================================================

/// Something a cached collection can be patched by id.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Sale {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Product {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Dish {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for StockRow {
    fn id(&self) -> &str {
        &self.product_id
    }
}

impl Identified for RestaurantMember {
    fn id(&self) -> &str {
        &self.user_id
    }
}

/// A synchronous edit of a cached collection.
pub type PatchFn<T> = Box<dyn FnOnce(&mut Vec<T>) + Send>;

/// Common collection patches.
pub struct Patch;

impl Patch {
    /// Drops the item with this id (e.g. an order that just became delivered).
    pub fn remove<T: Identified + 'static>(id: impl Into<String>) -> PatchFn<T> {
        let id = id.into();
        Box::new(move |items: &mut Vec<T>| items.retain(|item| item.id() != id))
    }

    /// Edits the item with this id in place.
    pub fn update<T, F>(id: impl Into<String>, edit: F) -> PatchFn<T>
    where
        T: Identified + 'static,
        F: FnOnce(&mut T) + Send + 'static,
    {
        let id = id.into();
        Box::new(move |items: &mut Vec<T>| {
            if let Some(item) = items.iter_mut().find(|item| item.id() == id) {
                edit(item);
            }
        })
    }

    /// Replaces the item with the same id, or appends it.
    pub fn upsert<T: Identified + Send + 'static>(item: T) -> PatchFn<T> {
        Box::new(move |items: &mut Vec<T>| {
            match items.iter().position(|existing| existing.id() == item.id()) {
                Some(i) => items[i] = item,
                None => items.push(item),
            }
        })
    }
}

// =============================================================================
// Optimistic Mutation
// =============================================================================

/// One optimistic edit of the collection cached under `key`.
///
/// ## Example
/// ```rust,ignore
/// OptimisticMutation::new(key, Patch::remove::<Sale>(&sale.id))
///     .invalidates(keys::SALES)
///     .run(&cache, async { source.set_delivery_status(&sale.id, to, expected).await })
///     .await?;
/// ```
pub struct OptimisticMutation<T> {
    key: String,
    patch: PatchFn<T>,
    invalidates: Vec<String>,
}

impl<T: Clone + Send + Sync + 'static> OptimisticMutation<T> {
    pub fn new(key: impl Into<String>, patch: PatchFn<T>) -> Self {
        OptimisticMutation {
            key: key.into(),
            patch,
            invalidates: Vec::new(),
        }
    }

    /// Another key to invalidate when the mutation settles.
    pub fn invalidates(mut self, key: impl Into<String>) -> Self {
        self.invalidates.push(key.into());
        self
    }

    /// Runs the mutation. On failure the cached collection is restored to
    /// the snapshot taken before the patch, then the error is returned.
    pub async fn run<R, E, Fut>(self, cache: &QueryCache, mutation: Fut) -> Result<R, E>
    where
        Fut: Future<Output = Result<R, E>>,
        E: Display,
    {
        let OptimisticMutation { key, patch, invalidates } = self;

        cache.cancel(&key);
        let snapshot: Option<Vec<T>> = cache.get(&key);
        if let Some(mut patched) = snapshot.clone() {
            patch(&mut patched);
            cache.set(&key, patched);
        }

        let result = mutation.await;

        if let Err(e) = &result {
            warn!(key = %key, error = %e, "Mutation failed, restoring cached snapshot");
            match snapshot {
                Some(previous) => cache.set(&key, previous),
                None => cache.remove(&key),
            }
        }

        cache.invalidate(&key);
        for related in &invalidates {
            cache.invalidate(related);
        }

        result
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
