//! Permission engine - the entry point for hosts and command handlers
//!
//! Owns every store and wires them together:
//!
//! ```text
//!            ┌───────────────────────── PermissionEngine ─────────────────────────┐
//!  checks ──►│ OverrideResolver ─► PlayerStore ─► GroupStore ─► PatternCache       │
//!            │                         ▲             ▲                           │
//!  admin  ──►│ storage write first ────┴─────────────┴── then cache mutation      │
//!            │                                                                   │
//!  timer  ──►│ ExpirySweeper ─► Listeners (on_rank_expired)                       │
//!            └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Checks are synchronous and read caches only. Every mutation writes storage
//! first and touches the cache only once that write succeeded, so a failed
//! write leaves cache and storage in agreement.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{EngineError, EngineResult, StorageError};
use crate::expiry::{demote_expired, ExpirySweeper, SweeperHandle};
use crate::listeners::{ListenerKey, Listeners, RankExpired};
use crate::permissions::{HostFallback, OverrideResolver, PatternCache, PatternKind, PermissionGroup};
use crate::player::{current_millis, GroupAssignment, PlayerId, PlayerRecord, RankExpiry};
use crate::storage::{PermissionStorage, PlayerRow};
use crate::store::{GroupStore, PlayerStore};

/// Group-based permission engine with host fallback
pub struct PermissionEngine {
    storage: Arc<dyn PermissionStorage>,
    groups: Arc<GroupStore>,
    players: Arc<PlayerStore>,
    resolver: OverrideResolver,
    listeners: Arc<Listeners>,
    sweeper: Arc<ExpirySweeper>,
}

impl PermissionEngine {
    /// Create an engine with a fresh pattern cache
    pub fn new(storage: Arc<dyn PermissionStorage>) -> Self {
        Self::with_pattern_cache(storage, Arc::new(PatternCache::new()))
    }

    /// Create an engine compiling patterns through `patterns`
    pub fn with_pattern_cache(
        storage: Arc<dyn PermissionStorage>,
        patterns: Arc<PatternCache>,
    ) -> Self {
        let groups = Arc::new(GroupStore::new(Arc::clone(&storage), patterns));
        let players = Arc::new(PlayerStore::new(Arc::clone(&storage)));
        let listeners = Arc::new(Listeners::new());
        let resolver = OverrideResolver::new(Arc::clone(&groups), Arc::clone(&players));
        let sweeper = Arc::new(ExpirySweeper::new(
            Arc::clone(&storage),
            Arc::clone(&players),
            Arc::clone(&listeners),
        ));

        Self {
            storage,
            groups,
            players,
            resolver,
            listeners,
            sweeper,
        }
    }

    pub fn storage(&self) -> &Arc<dyn PermissionStorage> {
        &self.storage
    }

    pub fn group_store(&self) -> &Arc<GroupStore> {
        &self.groups
    }

    pub fn player_store(&self) -> &Arc<PlayerStore> {
        &self.players
    }

    pub fn pattern_cache(&self) -> &Arc<PatternCache> {
        self.groups.patterns()
    }

    pub fn resolver(&self) -> &OverrideResolver {
        &self.resolver
    }

    pub fn expiry_sweeper(&self) -> &Arc<ExpirySweeper> {
        &self.sweeper
    }

    // ========================================================================
    // Permission Checks
    // ========================================================================

    /// Does `player` have `permission`, given the host's own answer
    pub fn check_permission<H: HostFallback + ?Sized>(
        &self,
        player: PlayerId,
        permission: &str,
        host: &H,
    ) -> bool {
        self.resolver.check_permission(player, permission, host)
    }

    /// Is `permission` set for `player` in either layer
    pub fn is_permission_set<H: HostFallback + ?Sized>(
        &self,
        player: PlayerId,
        permission: &str,
        host: &H,
    ) -> bool {
        self.resolver.is_permission_set(player, permission, host)
    }

    // ========================================================================
    // Startup And Background Work
    // ========================================================================

    /// Load every group from storage into the group cache
    pub async fn build_initial_cache(&self) -> usize {
        self.groups.build_initial_cache().await
    }

    /// Start the periodic expiry sweep
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        Arc::clone(&self.sweeper).spawn(interval)
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a callback fired whenever a lapsed rank is demoted
    pub fn on_rank_expired<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(&RankExpired) + Send + Sync + 'static,
    {
        self.listeners.on_rank_expired(callback)
    }

    /// Remove a listener by its key
    pub fn remove_listener(&self, key: ListenerKey) -> bool {
        self.listeners.remove_listener(key)
    }

    // ========================================================================
    // Player Lifecycle
    // ========================================================================

    /// Load (or provision) a connecting player's record
    ///
    /// A rank that lapsed while the player was offline is demoted right away,
    /// before the first permission check.
    pub async fn handle_login(&self, player: PlayerId) -> Arc<PlayerRecord> {
        let record = self.players.get_or_load(player).await;

        if let Some(event) = demote_expired(self.storage.as_ref(), &record, current_millis()).await
        {
            self.listeners.fire_rank_expired(&event);
        }

        record
    }

    /// Make sure the player's group is cached and return its display prefix
    ///
    /// `None` if no group resolves or its prefix is empty.
    pub async fn handle_join(&self, player: PlayerId) -> Option<String> {
        let prefix = self.load_prefix(player).await;
        debug!("Player {} joined with prefix {:?}", player, prefix);
        prefix
    }

    /// Display prefix of the player's resolved group, loading record and group
    /// on a miss
    pub async fn load_prefix(&self, player: PlayerId) -> Option<String> {
        let record = self.players.get_or_load(player).await;

        let group = match record.group() {
            GroupAssignment::Named(name) => self.groups.get_or_load(&name).await,
            GroupAssignment::Default => None,
        };

        group
            .or_else(|| self.groups.default_group())
            .map(|group| group.prefix())
            .filter(|prefix| !prefix.is_empty())
    }

    /// Evict a disconnecting player's record; storage keeps it
    pub fn handle_disconnect(&self, player: PlayerId) -> bool {
        self.players.evict(player).is_some()
    }

    /// Display prefix of a cached player's resolved group
    pub fn player_prefix(&self, player: PlayerId) -> Option<String> {
        self.players
            .get_cached(player)?
            .resolve_group(&self.groups)
            .map(|group| group.prefix())
            .filter(|prefix| !prefix.is_empty())
    }

    // ========================================================================
    // Player Administration
    // ========================================================================

    /// Load a player's stored row, bypassing the cache
    pub async fn player_info(&self, player: PlayerId) -> EngineResult<PlayerRow> {
        self.storage
            .fetch_player(player)
            .await?
            .ok_or(EngineError::PlayerNotFound(player))
    }

    /// Assign a player to a group, optionally for a limited time
    ///
    /// # Arguments
    /// * `player` - A player storage already knows
    /// * `group` - The group to assign; [`GroupAssignment::Default`] to unassign
    /// * `duration` - How long the rank lasts; `None` for a permanent rank
    ///
    /// # Returns
    /// The expiry written to storage.
    pub async fn assign_rank(
        &self,
        player: PlayerId,
        group: GroupAssignment,
        duration: Option<Duration>,
    ) -> EngineResult<RankExpiry> {
        self.player_info(player).await?;
        if let GroupAssignment::Named(name) = &group {
            self.require_group(name).await?;
        }

        let expiry = RankExpiry::after(current_millis(), duration);
        self.storage
            .update_player_group(player, &group, expiry)
            .await?;

        // Online players only; offline players pick it up on next login
        self.players.update_rank(player, group.clone(), expiry);

        info!(
            "Assigned player {} to group {:?} ({:?})",
            player,
            group.name().unwrap_or("<default>"),
            expiry
        );
        Ok(expiry)
    }

    // ========================================================================
    // Group Administration
    // ========================================================================

    async fn require_group(&self, name: &str) -> EngineResult<Arc<PermissionGroup>> {
        self.groups
            .get_or_load(name)
            .await
            .ok_or_else(|| EngineError::GroupNotFound(name.to_string()))
    }

    /// Create an empty group
    pub async fn create_group(&self, name: &str) -> EngineResult<Arc<PermissionGroup>> {
        if self.groups.get_or_load(name).await.is_some() {
            return Err(EngineError::GroupExists(name.to_string()));
        }

        self.storage
            .create_group(name)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(_) => EngineError::GroupExists(name.to_string()),
                other => EngineError::Storage(other),
            })?;

        let group = Arc::new(PermissionGroup::empty(name, Arc::clone(self.pattern_cache())));
        self.groups.insert(Arc::clone(&group));
        info!("Created group {}", name);
        Ok(group)
    }

    /// Delete a group from storage and cache
    ///
    /// Players assigned to it fall back to the default group.
    pub async fn delete_group(&self, name: &str) -> EngineResult<()> {
        self.require_group(name).await?;
        self.storage.delete_group(name).await?;
        self.groups.remove(name);
        info!("Deleted group {}", name);
        Ok(())
    }

    pub async fn set_group_prefix(&self, name: &str, prefix: &str) -> EngineResult<()> {
        let group = self.require_group(name).await?;
        self.storage.set_group_prefix(name, prefix).await?;
        group.set_prefix(prefix);
        debug!("Set prefix of group {} to {:?}", name, prefix);
        Ok(())
    }

    /// Make a group the single default group
    pub async fn set_default_group(&self, name: &str) -> EngineResult<()> {
        self.require_group(name).await?;
        self.storage.set_group_default(name).await?;
        self.groups.set_default(name);
        info!("Group {} is now the default group", name);
        Ok(())
    }

    /// Append a pattern to a group's allow or deny list
    ///
    /// Returns `false` if the list already holds the pattern.
    pub async fn add_group_permission(
        &self,
        name: &str,
        pattern: &str,
        kind: PatternKind,
    ) -> EngineResult<bool> {
        let group = self.require_group(name).await?;
        if group.contains_pattern(kind, pattern) {
            return Ok(false);
        }

        self.storage
            .add_group_permission(name, pattern, kind)
            .await?;
        let added = group.add_pattern(kind, pattern);
        debug!("Added {:?} pattern {} to group {}", kind, pattern, name);
        Ok(added)
    }

    /// Remove a pattern from a group's allow or deny list
    ///
    /// Returns `false` if the list does not hold the pattern.
    pub async fn remove_group_permission(
        &self,
        name: &str,
        pattern: &str,
        kind: PatternKind,
    ) -> EngineResult<bool> {
        let group = self.require_group(name).await?;
        if !group.contains_pattern(kind, pattern) {
            return Ok(false);
        }

        self.storage
            .remove_group_permission(name, pattern, kind)
            .await?;
        let removed = group.remove_pattern(kind, pattern);
        debug!("Removed {:?} pattern {} from group {}", kind, pattern, name);
        Ok(removed)
    }
}
