//! In-process storage backend

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{GroupPermissions, GroupRecord, GroupRow, PermissionStorage, PlayerRow};
use crate::error::{StorageError, StorageResult};
use crate::permissions::PatternKind;
use crate::player::{GroupAssignment, PlayerId, Rank, RankExpiry};

/// Concurrency-safe in-memory [`PermissionStorage`]
///
/// Updates addressing a missing row are no-ops, as an SQL `UPDATE` would be.
/// The backend can be switched unavailable to exercise failure paths, and an
/// artificial latency can be added so concurrent loads overlap.
#[derive(Debug)]
pub struct MemoryStorage {
    players: DashMap<PlayerId, PlayerRow>,
    groups: DashMap<String, GroupRecord>,
    available: AtomicBool,
    latency: Option<Duration>,
    player_fetches: AtomicUsize,
    group_fetches: AtomicUsize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            players: DashMap::new(),
            groups: DashMap::new(),
            available: AtomicBool::new(true),
            latency: None,
            player_fetches: AtomicUsize::new(0),
            group_fetches: AtomicUsize::new(0),
        }
    }
}

impl MemoryStorage {
    /// Create an empty, available backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every operation by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every subsequent operation fail with [`StorageError::Unavailable`]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Seed a group row with permissions
    pub fn insert_group(&self, row: GroupRow, permissions: GroupPermissions) {
        self.groups
            .insert(row.name.clone(), GroupRecord { row, permissions });
    }

    /// Seed a player row
    pub fn insert_player(&self, row: PlayerRow) {
        self.players.insert(row.id, row);
    }

    /// Inspect a stored player row
    pub fn player(&self, id: PlayerId) -> Option<PlayerRow> {
        self.players.get(&id).map(|row| row.clone())
    }

    /// Inspect a stored group
    pub fn group(&self, name: &str) -> Option<GroupRecord> {
        self.groups.get(name).map(|record| record.clone())
    }

    /// Number of `fetch_player` calls served so far
    pub fn player_fetch_count(&self) -> usize {
        self.player_fetches.load(Ordering::SeqCst)
    }

    /// Number of `fetch_group` calls served so far
    pub fn group_fetch_count(&self) -> usize {
        self.group_fetches.load(Ordering::SeqCst)
    }

    async fn begin(&self) -> StorageResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("memory storage switched off".into()))
        }
    }
}

#[async_trait]
impl PermissionStorage for MemoryStorage {
    async fn fetch_player(&self, id: PlayerId) -> StorageResult<Option<PlayerRow>> {
        self.player_fetches.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;
        Ok(self.player(id))
    }

    async fn create_player(&self, id: PlayerId) -> StorageResult<PlayerRow> {
        self.begin().await?;
        match self.players.entry(id) {
            Entry::Occupied(_) => {
                Err(StorageError::Conflict(format!("player {id} already exists")))
            }
            Entry::Vacant(entry) => Ok(entry.insert(PlayerRow::provisioned(id)).clone()),
        }
    }

    async fn update_player_group(
        &self,
        id: PlayerId,
        group: &GroupAssignment,
        expiry: RankExpiry,
    ) -> StorageResult<()> {
        self.begin().await?;
        if let Some(mut row) = self.players.get_mut(&id) {
            row.group = group.clone();
            row.expiry = expiry;
        }
        Ok(())
    }

    async fn demote_player(&self, id: PlayerId, lapsed: &Rank) -> StorageResult<bool> {
        self.begin().await?;
        match self.players.get_mut(&id) {
            Some(mut row) if row.group == lapsed.group && row.expiry == lapsed.expiry => {
                row.group = GroupAssignment::Default;
                row.expiry = RankExpiry::Never;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fetch_all_groups(&self) -> StorageResult<Vec<GroupRecord>> {
        self.begin().await?;
        Ok(self.groups.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn fetch_group(&self, name: &str) -> StorageResult<Option<GroupRow>> {
        self.group_fetches.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;
        Ok(self.groups.get(name).map(|record| record.row.clone()))
    }

    async fn fetch_group_permissions(&self, name: &str) -> StorageResult<GroupPermissions> {
        self.begin().await?;
        Ok(self
            .groups
            .get(name)
            .map(|record| record.permissions.clone())
            .unwrap_or_default())
    }

    async fn create_group(&self, name: &str) -> StorageResult<()> {
        self.begin().await?;
        match self.groups.entry(name.to_string()) {
            Entry::Occupied(_) => {
                Err(StorageError::Conflict(format!("group {name} already exists")))
            }
            Entry::Vacant(entry) => {
                entry.insert(GroupRecord {
                    row: GroupRow::new(name),
                    permissions: GroupPermissions::default(),
                });
                Ok(())
            }
        }
    }

    async fn delete_group(&self, name: &str) -> StorageResult<()> {
        self.begin().await?;
        self.groups.remove(name);
        Ok(())
    }

    async fn set_group_prefix(&self, name: &str, prefix: &str) -> StorageResult<()> {
        self.begin().await?;
        if let Some(mut record) = self.groups.get_mut(name) {
            record.row.prefix = prefix.to_string();
        }
        Ok(())
    }

    async fn set_group_default(&self, name: &str) -> StorageResult<()> {
        self.begin().await?;
        if !self.groups.contains_key(name) {
            return Ok(());
        }
        for mut record in self.groups.iter_mut() {
            record.row.is_default = record.row.name == name;
        }
        Ok(())
    }

    async fn add_group_permission(
        &self,
        name: &str,
        pattern: &str,
        kind: PatternKind,
    ) -> StorageResult<()> {
        self.begin().await?;
        if let Some(mut record) = self.groups.get_mut(name) {
            let list = match kind {
                PatternKind::Allow => &mut record.permissions.allowed,
                PatternKind::Deny => &mut record.permissions.denied,
            };
            if !list.iter().any(|p| p == pattern) {
                list.push(pattern.to_string());
            }
        }
        Ok(())
    }

    async fn remove_group_permission(
        &self,
        name: &str,
        pattern: &str,
        kind: PatternKind,
    ) -> StorageResult<()> {
        self.begin().await?;
        if let Some(mut record) = self.groups.get_mut(name) {
            let list = match kind {
                PatternKind::Allow => &mut record.permissions.allowed,
                PatternKind::Deny => &mut record.permissions.denied,
            };
            list.retain(|p| p != pattern);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_player_roundtrip() {
        let storage = MemoryStorage::new();
        let id = PlayerId::new_v4();

        assert_eq!(storage.fetch_player(id).await.unwrap(), None);

        let created = storage.create_player(id).await.unwrap();
        assert_eq!(created, PlayerRow::provisioned(id));
        assert!(storage.create_player(id).await.is_err());

        storage
            .update_player_group(id, &GroupAssignment::Named("vip".into()), RankExpiry::At(5))
            .await
            .unwrap();

        let row = storage.fetch_player(id).await.unwrap().unwrap();
        assert_eq!(row.group, GroupAssignment::Named("vip".into()));
        assert_eq!(row.expiry, RankExpiry::At(5));
        assert_eq!(storage.player_fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_demote_player_only_matching_rank() {
        let storage = MemoryStorage::new();
        let id = PlayerId::new_v4();
        let lapsed = Rank {
            group: GroupAssignment::Named("vip".into()),
            expiry: RankExpiry::At(5),
        };

        assert!(!storage.demote_player(id, &lapsed).await.unwrap());

        storage.insert_player(PlayerRow {
            id,
            group: GroupAssignment::Named("admin".into()),
            expiry: RankExpiry::Never,
        });
        assert!(!storage.demote_player(id, &lapsed).await.unwrap());
        assert_eq!(
            storage.player(id).map(|row| row.group),
            Some(GroupAssignment::Named("admin".into()))
        );

        storage.insert_player(PlayerRow {
            id,
            group: lapsed.group.clone(),
            expiry: lapsed.expiry,
        });
        assert!(storage.demote_player(id, &lapsed).await.unwrap());
        assert_eq!(storage.player(id), Some(PlayerRow::provisioned(id)));
    }

    #[tokio::test]
    async fn test_single_default_group() {
        let storage = MemoryStorage::new();
        storage.create_group("a").await.unwrap();
        storage.create_group("b").await.unwrap();

        storage.set_group_default("a").await.unwrap();
        storage.set_group_default("b").await.unwrap();

        assert!(!storage.group("a").unwrap().row.is_default);
        assert!(storage.group("b").unwrap().row.is_default);

        // Unknown group leaves the current default alone
        storage.set_group_default("missing").await.unwrap();
        assert!(storage.group("b").unwrap().row.is_default);
    }

    #[tokio::test]
    async fn test_group_permissions() {
        let storage = MemoryStorage::new();
        storage.create_group("mod").await.unwrap();
        assert!(storage.create_group("mod").await.is_err());

        storage
            .add_group_permission("mod", "kick.*", PatternKind::Allow)
            .await
            .unwrap();
        storage
            .add_group_permission("mod", "kick.*", PatternKind::Allow)
            .await
            .unwrap();
        storage
            .add_group_permission("mod", "ban.*", PatternKind::Deny)
            .await
            .unwrap();

        let perms = storage.fetch_group_permissions("mod").await.unwrap();
        assert_eq!(perms.allowed, vec!["kick.*".to_string()]);
        assert_eq!(perms.denied, vec!["ban.*".to_string()]);

        storage
            .remove_group_permission("mod", "ban.*", PatternKind::Deny)
            .await
            .unwrap();
        let perms = storage.fetch_group_permissions("mod").await.unwrap();
        assert!(perms.denied.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let storage = MemoryStorage::new();
        storage.set_available(false);

        let err = storage.fetch_group("any").await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert_eq!(storage.group_fetch_count(), 1);

        storage.set_available(true);
        assert_eq!(storage.fetch_group("any").await.unwrap(), None);
    }
}
