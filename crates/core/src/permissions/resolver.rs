//! Override resolver - composes group decisions with the host's own answer
//!
//! The host server already has a permission system. For every query this
//! resolver decides whose answer wins:
//!
//! | player cached | group opinion | `check_permission`      | `is_permission_set`     |
//! |---------------|---------------|-------------------------|-------------------------|
//! | no            | -             | host                    | host                    |
//! | yes           | set           | group decision          | `true`                  |
//! | yes           | unset         | host                    | host                    |
//!
//! "Set" is checked before "granted": an unset permission must defer to the
//! host instead of returning the implicit deny of an empty group.

use std::sync::Arc;

use super::types::Decision;
use crate::player::PlayerId;
use crate::store::{GroupStore, PlayerStore};

/// The host's pre-existing permission decision for one entity
pub trait HostFallback {
    /// Whether the host grants the permission
    fn has_permission(&self, permission: &str) -> bool;

    /// Whether the host has any opinion on the permission
    fn is_permission_set(&self, permission: &str) -> bool;
}

/// A host answer captured up front
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackDecision {
    pub granted: bool,
    pub set: bool,
}

impl FallbackDecision {
    /// The host explicitly grants the permission
    pub const GRANTED: Self = Self {
        granted: true,
        set: true,
    };

    /// The host explicitly denies the permission
    pub const DENIED: Self = Self {
        granted: false,
        set: true,
    };

    /// The host has no opinion
    pub const UNSET: Self = Self {
        granted: false,
        set: false,
    };
}

impl HostFallback for FallbackDecision {
    fn has_permission(&self, _permission: &str) -> bool {
        self.granted
    }

    fn is_permission_set(&self, _permission: &str) -> bool {
        self.set
    }
}

/// Compose a group decision with the host's grant
///
/// The group wins whenever it has an opinion.
pub fn compose_has<H: HostFallback + ?Sized>(
    decision: Decision,
    permission: &str,
    host: &H,
) -> bool {
    if decision.is_set() {
        decision.is_granted()
    } else {
        host.has_permission(permission)
    }
}

/// Compose a group decision with the host's "is set"
///
/// Never hides a permission the host already considers set.
pub fn compose_is_set<H: HostFallback + ?Sized>(
    decision: Decision,
    permission: &str,
    host: &H,
) -> bool {
    decision.is_set() || host.is_permission_set(permission)
}

/// Query-time bridge between cached player records and the host fallback
///
/// Only reads caches; never waits on storage.
pub struct OverrideResolver {
    groups: Arc<GroupStore>,
    players: Arc<PlayerStore>,
}

impl OverrideResolver {
    pub fn new(groups: Arc<GroupStore>, players: Arc<PlayerStore>) -> Self {
        Self { groups, players }
    }

    /// Decision of the player's resolved group, `None` if the player is not cached
    pub fn group_decision(&self, player: PlayerId, permission: &str) -> Option<Decision> {
        self.players
            .get_cached(player)
            .map(|record| record.decide(&self.groups, permission))
    }

    /// Final answer to "does this player have the permission"
    pub fn check_permission<H: HostFallback + ?Sized>(
        &self,
        player: PlayerId,
        permission: &str,
        host: &H,
    ) -> bool {
        match self.group_decision(player, permission) {
            Some(decision) => compose_has(decision, permission, host),
            None => host.has_permission(permission),
        }
    }

    /// Final answer to "is the permission set for this player"
    pub fn is_permission_set<H: HostFallback + ?Sized>(
        &self,
        player: PlayerId,
        permission: &str,
        host: &H,
    ) -> bool {
        match self.group_decision(player, permission) {
            Some(decision) => compose_is_set(decision, permission, host),
            None => host.is_permission_set(permission),
        }
    }
}
