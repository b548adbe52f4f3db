//! Storage collaborator contract
//!
//! The engine never talks to a database directly. Everything it persists or
//! loads goes through a [`PermissionStorage`] backend, whose operations are all
//! asynchronous and fallible. Stores absorb failures into "absent" results;
//! only the mutating engine operations report them upward.
//!
//! [`MemoryStorage`] is the in-process backend used when no external database
//! is configured, and in tests.

mod memory;

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::permissions::PatternKind;
use crate::player::{GroupAssignment, PlayerId, Rank, RankExpiry};

pub use memory::MemoryStorage;

/// A stored player row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRow {
    pub id: PlayerId,
    pub group: GroupAssignment,
    pub expiry: RankExpiry,
}

impl PlayerRow {
    /// Row for a newly provisioned player
    pub fn provisioned(id: PlayerId) -> Self {
        Self {
            id,
            group: GroupAssignment::Default,
            expiry: RankExpiry::Never,
        }
    }
}

/// A stored group row, without its permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub name: String,
    pub prefix: String,
    pub is_default: bool,
}

impl GroupRow {
    /// Row for a newly created group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            is_default: false,
        }
    }
}

/// A group's ordered allow and deny lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPermissions {
    pub allowed: Vec<String>,
    pub denied: Vec<String>,
}

/// A group row together with its permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub row: GroupRow,
    pub permissions: GroupPermissions,
}

/// Asynchronous persistence backend for groups and players
#[async_trait]
pub trait PermissionStorage: Send + Sync + 'static {
    /// Load a player row; `Ok(None)` if the player has never been seen
    async fn fetch_player(&self, id: PlayerId) -> StorageResult<Option<PlayerRow>>;

    /// Persist a new player row on the default group with no expiry
    async fn create_player(&self, id: PlayerId) -> StorageResult<PlayerRow>;

    /// Overwrite a player's group assignment and expiry
    async fn update_player_group(
        &self,
        id: PlayerId,
        group: &GroupAssignment,
        expiry: RankExpiry,
    ) -> StorageResult<()>;

    /// Move a player to the default group with no expiry, only if the stored
    /// rank still equals `lapsed`
    ///
    /// Returns `false` when the row is missing or holds a different rank.
    async fn demote_player(&self, id: PlayerId, lapsed: &Rank) -> StorageResult<bool>;

    /// Load every group with its permissions
    async fn fetch_all_groups(&self) -> StorageResult<Vec<GroupRecord>>;

    /// Load one group row; `Ok(None)` if it does not exist
    async fn fetch_group(&self, name: &str) -> StorageResult<Option<GroupRow>>;

    /// Load one group's allow and deny lists
    async fn fetch_group_permissions(&self, name: &str) -> StorageResult<GroupPermissions>;

    async fn create_group(&self, name: &str) -> StorageResult<()>;

    async fn delete_group(&self, name: &str) -> StorageResult<()>;

    async fn set_group_prefix(&self, name: &str, prefix: &str) -> StorageResult<()>;

    /// Flag a group as default and clear the flag on every other group
    async fn set_group_default(&self, name: &str) -> StorageResult<()>;

    async fn add_group_permission(
        &self,
        name: &str,
        pattern: &str,
        kind: PatternKind,
    ) -> StorageResult<()>;

    async fn remove_group_permission(
        &self,
        name: &str,
        pattern: &str,
        kind: PatternKind,
    ) -> StorageResult<()>;
}
