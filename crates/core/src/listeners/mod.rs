//! Listeners for rank lifecycle events
//!
//! Callbacks are stored in a slotmap behind a lock and invoked when the
//! corresponding event occurs. Each [`PermissionEngine`](crate::PermissionEngine)
//! owns one registry, so independent engines (and tests) never see each
//! other's callbacks.
//!
//! # Example
//!
//! ```ignore
//! let key = engine.on_rank_expired(|event| {
//!     tracing::info!("Rank of {} expired", event.player_id);
//! });
//!
//! // Later, unregister if needed
//! engine.remove_listener(key);
//! ```

mod rank;

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

pub use rank::{RankExpired, RankExpiredCallback};

new_key_type! {
    /// Key for registered listeners, used for removal
    pub struct ListenerKey;
}

/// Registry of rank lifecycle callbacks
#[derive(Default)]
pub struct Listeners {
    rank_expired: RwLock<SlotMap<ListenerKey, RankExpiredCallback>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    // === OnRankExpired ===

    /// Register a callback fired after a player is demoted for an expired rank
    ///
    /// # Returns
    /// A key that can be used to unregister the callback via `remove_listener`.
    pub fn on_rank_expired<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(&RankExpired) + Send + Sync + 'static,
    {
        self.rank_expired.write().insert(Box::new(callback))
    }

    /// Remove a listener by its key
    ///
    /// Returns `true` if the listener was found and removed.
    pub fn remove_listener(&self, key: ListenerKey) -> bool {
        self.rank_expired.write().remove(key).is_some()
    }

    /// Fire all rank-expired callbacks
    pub fn fire_rank_expired(&self, event: &RankExpired) {
        let callbacks = self.rank_expired.read();
        for (_, callback) in callbacks.iter() {
            callback(event);
        }
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.rank_expired.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
