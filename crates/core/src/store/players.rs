//! Player store - cached records of connected players
//!
//! Records are loaded (or provisioned) on first use and evicted on disconnect;
//! storage keeps them. Mutators only touch the cache: callers pair them with
//! the matching storage write.
//!
//! A player who disconnects while their load is still running is marked as
//! departed, and the load drops its record instead of caching it.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};

use super::flight::SingleFlight;
use crate::player::{GroupAssignment, PlayerId, PlayerRecord, RankExpiry};
use crate::storage::{PermissionStorage, PlayerRow};

fn record_from_row(row: PlayerRow) -> Arc<PlayerRecord> {
    Arc::new(PlayerRecord::new(row.id, row.group, row.expiry))
}

/// Fetch a player, provisioning a new row if storage has none, and cache it
///
/// On storage failure a transient default record is returned without caching,
/// so the next lookup retries.
async fn fetch_player(
    storage: Arc<dyn PermissionStorage>,
    players: Arc<DashMap<PlayerId, Arc<PlayerRecord>>>,
    departed: Arc<DashSet<PlayerId>>,
    id: PlayerId,
) -> Option<Arc<PlayerRecord>> {
    let row = match storage.fetch_player(id).await {
        Ok(Some(row)) => row,
        Ok(None) => match storage.create_player(id).await {
            Ok(row) => {
                tracing::debug!("Provisioned new player {}", id);
                row
            }
            Err(e) => {
                tracing::warn!("Could not persist new player {}: {}", id, e);
                return Some(Arc::new(PlayerRecord::provisioned(id)));
            }
        },
        Err(e) => {
            tracing::warn!("Could not load player {}: {}", id, e);
            return Some(Arc::new(PlayerRecord::provisioned(id)));
        }
    };

    let record = record_from_row(row);
    // Insert before checking the marker; `evict` marks before removing
    players.insert(id, Arc::clone(&record));
    if departed.remove(&id).is_some() {
        players.remove(&id);
        tracing::debug!("Player {} left during load, not cached", id);
    }
    Some(record)
}

/// In-memory cache of connected players' records
pub struct PlayerStore {
    storage: Arc<dyn PermissionStorage>,
    players: Arc<DashMap<PlayerId, Arc<PlayerRecord>>>,
    departed: Arc<DashSet<PlayerId>>,
    loads: SingleFlight<PlayerId, Arc<PlayerRecord>>,
}

impl PlayerStore {
    /// Create an empty store loading from `storage`
    pub fn new(storage: Arc<dyn PermissionStorage>) -> Self {
        Self {
            storage,
            players: Arc::new(DashMap::new()),
            departed: Arc::new(DashSet::new()),
            loads: SingleFlight::new(),
        }
    }

    /// Get a player's record, loading or provisioning it on a miss
    ///
    /// Never absent: a player storage has never seen gets a new record on the
    /// default group with no expiry.
    pub async fn get_or_load(&self, id: PlayerId) -> Arc<PlayerRecord> {
        if let Some(record) = self.get_cached(id) {
            return record;
        }

        // A new login supersedes an earlier disconnect
        self.departed.remove(&id);

        let storage = Arc::clone(&self.storage);
        let players = Arc::clone(&self.players);
        let departed = Arc::clone(&self.departed);

        self.loads
            .load(
                id,
                || self.get_cached(id),
                move || fetch_player(storage, players, departed, id),
            )
            .await
            .unwrap_or_else(|| Arc::new(PlayerRecord::provisioned(id)))
    }

    /// Get a cached record without touching storage
    pub fn get_cached(&self, id: PlayerId) -> Option<Arc<PlayerRecord>> {
        self.players.get(&id).map(|record| Arc::clone(record.value()))
    }

    /// Check if a player is cached
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Change a cached player's group; returns `false` if not cached
    pub fn update_group(&self, id: PlayerId, group: GroupAssignment) -> bool {
        match self.get_cached(id) {
            Some(record) => {
                record.set_group(group);
                true
            }
            None => false,
        }
    }

    /// Change a cached player's expiry; returns `false` if not cached
    pub fn update_expiry(&self, id: PlayerId, expiry: RankExpiry) -> bool {
        match self.get_cached(id) {
            Some(record) => {
                record.set_expiry(expiry);
                true
            }
            None => false,
        }
    }

    /// Change group and expiry of a cached player together
    pub fn update_rank(&self, id: PlayerId, group: GroupAssignment, expiry: RankExpiry) -> bool {
        match self.get_cached(id) {
            Some(record) => {
                record.set_rank(group, expiry);
                true
            }
            None => false,
        }
    }

    /// Drop a player from cache (on disconnect); storage keeps the record
    ///
    /// A load still running for the player will not cache its result.
    pub fn evict(&self, id: PlayerId) -> Option<Arc<PlayerRecord>> {
        if self.loads.is_pending(&id) {
            self.departed.insert(id);
        }
        let (_, record) = self.players.remove(&id)?;
        tracing::debug!("Evicted player {} from cache", id);
        Some(record)
    }

    /// Snapshot of every cached record
    pub fn records(&self) -> Vec<Arc<PlayerRecord>> {
        self.players
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of cached players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Check if no player is cached
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
