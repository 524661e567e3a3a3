//! Wishlist ("likes") manager.
//!
//! Likes are stored per identity partition: `guest` before login, the
//! customer id afterwards. On login the guest partition is merged into the
//! customer's and then cleared; on logout only the guest partition and the
//! in-memory list are cleared, so the customer's likes are back after the
//! next login.
//!
//! In [`WishlistMode::Remote`] the customer's list is taken from the
//! backend wishlist instead, falling back to the local partition whenever
//! the backend call fails.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use furniture_core::{CurrencyCode, Price, ProductId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::client::StorefrontError;
use crate::client::gateway::{ApiGateway, ApiRequest};
use crate::client::identity::Identity;
use crate::shopware::{WishlistMergeRequest, WishlistProduct, WishlistResponse};
use crate::storage::{KeyValueStore, KeyValueStoreExt};

/// Partition used before login.
const GUEST_PARTITION: &str = "guest";

/// Storage key of a partition.
#[must_use]
pub fn storage_key(partition: &str) -> String {
    format!("furniture-likes-{partition}")
}

// =============================================================================
// Mode
// =============================================================================

/// Where a logged-in customer's wishlist lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WishlistMode {
    /// Local partition keyed by the customer id.
    #[default]
    Local,
    /// Backend wishlist, with the local partition as fallback.
    Remote,
}

#[derive(Debug, Error)]
#[error("invalid wishlist mode '{0}' (expected 'local' or 'remote')")]
pub struct ParseWishlistModeError(String);

impl FromStr for WishlistMode {
    type Err = ParseWishlistModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            _ => Err(ParseWishlistModeError(s.to_string())),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// Cover image of a liked product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoverImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

/// A product snapshot as shown in the wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedProduct {
    pub key: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowest_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<CoverImage>,
    /// Insertion time in epoch milliseconds.
    #[serde(default)]
    pub added_at: i64,
}

impl LikedProduct {
    /// Fill display fields that are missing here from `other`.
    fn backfill_from(&mut self, other: &Self) {
        if self.name.is_none() {
            self.name.clone_from(&other.name);
        }
        if self.price.is_none() {
            self.price.clone_from(&other.price);
        }
        if self.lowest_price.is_none() {
            self.lowest_price.clone_from(&other.lowest_price);
        }
        if self.cover.is_none() {
            self.cover.clone_from(&other.cover);
        }
    }

    fn from_remote(product: WishlistProduct, added_at: i64) -> Self {
        let src = product
            .cover
            .and_then(|cover| cover.media)
            .map(|media| media.url)
            .filter(|url| !url.is_empty());

        Self {
            key: product.id,
            name: product.name,
            price: product
                .calculated_price
                .map(|p| Price::from_decimal(p.unit_price, CurrencyCode::EUR)),
            lowest_price: None,
            cover: src.map(|src| CoverImage {
                src: Some(src),
                ..CoverImage::default()
            }),
            added_at,
        }
    }
}

/// Product data handed to [`WishlistManager::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub key: ProductId,
    pub name: Option<String>,
    pub price: Option<Price>,
    pub lowest_price: Option<Price>,
    pub cover: Option<CoverImage>,
}

impl ProductSnapshot {
    #[must_use]
    pub fn new(key: impl Into<ProductId>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    fn into_liked(self, added_at: i64) -> LikedProduct {
        LikedProduct {
            key: self.key,
            name: self.name,
            price: self.price,
            lowest_price: self.lowest_price,
            cover: self.cover,
            added_at,
        }
    }
}

/// Union of two partitions.
///
/// Target records come first and keep their identity; a guest copy of the
/// same key only fills the target's missing display fields. Guest records
/// whose key the target lacks are appended in guest order.
#[must_use]
pub fn merge_likes(target: Vec<LikedProduct>, guest: &[LikedProduct]) -> Vec<LikedProduct> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(target.len() + guest.len());

    for mut item in target {
        if !seen.insert(item.key.clone()) {
            continue;
        }
        if let Some(guest_copy) = guest.iter().find(|g| g.key == item.key) {
            item.backfill_from(guest_copy);
        }
        merged.push(item);
    }

    for item in guest {
        if seen.insert(item.key.clone()) {
            merged.push(item.clone());
        }
    }

    merged
}

// =============================================================================
// WishlistManager
// =============================================================================

/// Liked products of the current identity.
#[derive(Clone)]
pub struct WishlistManager {
    inner: Arc<WishlistManagerInner>,
}

struct WishlistManagerInner {
    gateway: ApiGateway,
    storage: Arc<dyn KeyValueStore>,
    identity: Arc<Identity>,
    mode: WishlistMode,
    items: RwLock<Vec<LikedProduct>>,
    syncing: AtomicBool,
    initialized: AtomicBool,
}

impl WishlistManager {
    #[must_use]
    pub fn new(
        gateway: ApiGateway,
        storage: Arc<dyn KeyValueStore>,
        identity: Arc<Identity>,
        mode: WishlistMode,
    ) -> Self {
        Self {
            inner: Arc::new(WishlistManagerInner {
                gateway,
                storage,
                identity,
                mode,
                items: RwLock::new(Vec::new()),
                syncing: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn mode(&self) -> WishlistMode {
        self.inner.mode
    }

    fn items(&self) -> std::sync::RwLockReadGuard<'_, Vec<LikedProduct>> {
        self.inner.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_items(&self, items: Vec<LikedProduct>) {
        *self.inner.items.write().unwrap_or_else(PoisonError::into_inner) = items;
    }

    /// Partition of the current identity.
    fn partition(&self) -> String {
        self.inner
            .identity
            .customer_id()
            .map_or_else(|| GUEST_PARTITION.to_string(), |id| id.into_inner())
    }

    fn uses_remote(&self) -> bool {
        self.inner.mode == WishlistMode::Remote && self.inner.identity.is_logged_in()
    }

    fn load_partition(&self, partition: &str) -> Vec<LikedProduct> {
        match self
            .inner
            .storage
            .get_json::<Vec<LikedProduct>>(&storage_key(partition))
        {
            Ok(items) => merge_likes(items.unwrap_or_default(), &[]),
            Err(e) => {
                warn!(partition, error = %e, "Failed to read likes, starting empty");
                Vec::new()
            }
        }
    }

    fn save_partition(&self, partition: &str, items: &[LikedProduct]) {
        if let Err(e) = self.inner.storage.set_json(&storage_key(partition), items) {
            warn!(partition, error = %e, "Failed to persist likes");
        }
    }

    fn persist(&self) {
        let items = self.items().clone();
        self.save_partition(&self.partition(), &items);
    }

    fn clear_guest_partition(&self) {
        if let Err(e) = self.inner.storage.remove(&storage_key(GUEST_PARTITION)) {
            warn!(error = %e, "Failed to clear guest likes");
        }
    }

    /// Insertion timestamp, strictly after every existing entry.
    fn next_added_at(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.items()
            .iter()
            .map(|item| item.added_at + 1)
            .fold(now, i64::max)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Load the list for the current identity. Runs at most once.
    pub async fn initialize(&self) {
        if self.inner.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.inner.identity.is_logged_in() {
            self.sync().await;
        } else {
            self.replace_items(self.load_partition(GUEST_PARTITION));
        }
    }

    /// Merge the guest partition into the customer's list.
    ///
    /// Without a logged-in customer this only reloads the guest partition.
    #[instrument(skip(self))]
    pub async fn sync(&self) {
        let Some(customer_id) = self.inner.identity.customer_id() else {
            self.replace_items(self.load_partition(GUEST_PARTITION));
            return;
        };

        self.inner.syncing.store(true, Ordering::Release);
        let guest = self.load_partition(GUEST_PARTITION);

        let target = match self.inner.mode {
            WishlistMode::Remote => match self.load_remote(&guest).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, "Remote wishlist unavailable, using local list");
                    self.load_partition(customer_id.as_str())
                }
            },
            WishlistMode::Local => self.load_partition(customer_id.as_str()),
        };

        let merged = merge_likes(target, &guest);
        info!(
            guest = guest.len(),
            merged = merged.len(),
            "Wishlist merged"
        );

        self.save_partition(customer_id.as_str(), &merged);
        self.replace_items(merged);
        self.clear_guest_partition();
        self.inner.syncing.store(false, Ordering::Release);
    }

    /// Forget the in-memory list and the guest partition.
    ///
    /// The customer's partition is left untouched.
    pub fn clear_on_logout(&self) {
        self.replace_items(Vec::new());
        self.clear_guest_partition();
        debug!("Wishlist cleared on logout");
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Like a product. Liking an already-liked product does nothing.
    pub async fn add(&self, product: ProductSnapshot) {
        if self.is_liked(&product.key) {
            return;
        }
        if self.uses_remote() {
            self.remote_add(&product.key).await;
        }

        let added_at = self.next_added_at();
        self.inner
            .items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(product.into_liked(added_at));
        self.persist();
    }

    /// Unlike a product. Removing an absent product does nothing.
    pub async fn remove(&self, key: &ProductId) {
        if !self.is_liked(key) {
            return;
        }
        if self.uses_remote() {
            self.remote_remove(key).await;
        }

        self.inner
            .items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|item| &item.key != key);
        self.persist();
    }

    /// Flip the liked state; returns the new state.
    pub async fn toggle(&self, product: ProductSnapshot) -> bool {
        if self.is_liked(&product.key) {
            self.remove(&product.key).await;
            false
        } else {
            self.add(product).await;
            true
        }
    }

    /// Unlike everything.
    pub async fn clear_all(&self) {
        if self.uses_remote() {
            let keys: Vec<ProductId> = self.items().iter().map(|item| item.key.clone()).collect();
            for key in &keys {
                self.remote_remove(key).await;
            }
        }
        self.replace_items(Vec::new());
        self.persist();
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn is_liked(&self, key: &ProductId) -> bool {
        self.items().iter().any(|item| &item.key == key)
    }

    #[must_use]
    pub fn like_count(&self) -> usize {
        self.items().len()
    }

    /// Likes in insertion order.
    #[must_use]
    pub fn liked_products(&self) -> Vec<LikedProduct> {
        self.items().clone()
    }

    /// Likes, newest first.
    #[must_use]
    pub fn sorted_likes(&self) -> Vec<LikedProduct> {
        let mut items = self.liked_products();
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        items
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::Acquire)
    }

    // -------------------------------------------------------------------------
    // Remote wishlist
    // -------------------------------------------------------------------------

    /// Push guest likes to the backend, then read the backend list back.
    async fn load_remote(&self, guest: &[LikedProduct]) -> Result<Vec<LikedProduct>, StorefrontError> {
        if !guest.is_empty() {
            let product_ids: Vec<ProductId> = guest.iter().map(|item| item.key.clone()).collect();
            let request = WishlistMergeRequest { product_ids };
            let merged = self
                .inner
                .gateway
                .execute(
                    ApiRequest::post("customer/wishlist/merge").json(serde_json::to_value(&request)?),
                )
                .await;

            if let Err(e) = merged {
                warn!(error = %e, "Bulk wishlist merge failed, adding items one by one");
                for product_id in &request.product_ids {
                    self.remote_add(product_id).await;
                }
            }
        }

        let response: WishlistResponse = self
            .inner
            .gateway
            .call(ApiRequest::post("customer/wishlist").json(json!({
                "associations": {"products": {"associations": {"cover": {"associations": {"media": {}}}}}}
            })))
            .await?;

        let added_at = Utc::now().timestamp_millis();
        Ok(response
            .into_products()
            .into_iter()
            .map(|product| LikedProduct::from_remote(product, added_at))
            .collect())
    }

    /// Add to the backend wishlist; "already present" (400) counts as done.
    async fn remote_add(&self, product_id: &ProductId) -> bool {
        match self
            .inner
            .gateway
            .execute(ApiRequest::post(format!("customer/wishlist/add/{product_id}")))
            .await
        {
            Ok(_) => true,
            Err(e) if e.status() == Some(400) => true,
            Err(e) => {
                warn!(product_id = %product_id, error = %e, "Remote wishlist add failed");
                false
            }
        }
    }

    async fn remote_remove(&self, product_id: &ProductId) -> bool {
        match self
            .inner
            .gateway
            .execute(ApiRequest::delete(format!("customer/wishlist/delete/{product_id}")))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(product_id = %product_id, error = %e, "Remote wishlist remove failed");
                false
            }
        }
    }
}
