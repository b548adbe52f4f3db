//! Player records - a player's group assignment and rank expiry
//!
//! An unassigned player resolves through the store's default group, so a change
//! of default group never requires touching player records.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::permissions::{Decision, PermissionGroup};
use crate::store::GroupStore;

/// Stable external identity of a player
pub type PlayerId = uuid::Uuid;

/// Current wall-clock time in epoch milliseconds
pub fn current_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Which group a player is assigned to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum GroupAssignment {
    /// Resolve via the store's default group
    #[default]
    Default,
    /// An explicitly assigned group
    Named(String),
}

impl GroupAssignment {
    /// Map a stored group column, where the empty string means "default"
    pub fn from_name(name: &str) -> Self {
        if name.is_empty() {
            GroupAssignment::Default
        } else {
            GroupAssignment::Named(name.to_string())
        }
    }

    /// The explicit group name, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            GroupAssignment::Default => None,
            GroupAssignment::Named(name) => Some(name),
        }
    }

    /// Column form for storage backends that encode "default" as `""`
    pub fn as_column(&self) -> &str {
        self.name().unwrap_or("")
    }
}

/// When a time-bound group assignment lapses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RankExpiry {
    /// The assignment is permanent
    #[default]
    Never,
    /// Absolute deadline in epoch milliseconds
    At(i64),
}

impl RankExpiry {
    /// Map a stored expiry column, where `-1` means "never"
    pub fn from_millis(millis: i64) -> Self {
        if millis == -1 {
            RankExpiry::Never
        } else {
            RankExpiry::At(millis)
        }
    }

    /// Column form for storage backends that encode "never" as `-1`
    pub fn as_millis(self) -> i64 {
        match self {
            RankExpiry::Never => -1,
            RankExpiry::At(millis) => millis,
        }
    }

    /// Deadline `duration` after `now`, or [`RankExpiry::Never`] without one
    ///
    /// Deadlines past the representable range clamp to `i64::MAX`.
    pub fn after(now: i64, duration: Option<Duration>) -> Self {
        match duration {
            Some(d) => {
                let millis = i64::try_from(d.as_millis()).unwrap_or(i64::MAX);
                RankExpiry::At(now.saturating_add(millis))
            }
            None => RankExpiry::Never,
        }
    }

    /// `true` iff there is a deadline and `now` is strictly past it
    pub fn is_expired(self, now: i64) -> bool {
        match self {
            RankExpiry::Never => false,
            RankExpiry::At(deadline) => now > deadline,
        }
    }
}

/// Group assignment and expiry, always read and written together
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rank {
    pub group: GroupAssignment,
    pub expiry: RankExpiry,
}

/// Cached state of one player
#[derive(Debug)]
pub struct PlayerRecord {
    player_id: PlayerId,
    rank: RwLock<Rank>,
}

impl PlayerRecord {
    /// Create a record with an explicit rank
    pub fn new(player_id: PlayerId, group: GroupAssignment, expiry: RankExpiry) -> Self {
        Self {
            player_id,
            rank: RwLock::new(Rank { group, expiry }),
        }
    }

    /// A newly provisioned record: default group, no expiry
    pub fn provisioned(player_id: PlayerId) -> Self {
        Self::new(player_id, GroupAssignment::Default, RankExpiry::Never)
    }

    /// The player's identity
    pub fn id(&self) -> PlayerId {
        self.player_id
    }

    /// Snapshot of the rank
    pub fn rank(&self) -> Rank {
        self.rank.read().clone()
    }

    /// Current group assignment
    pub fn group(&self) -> GroupAssignment {
        self.rank.read().group.clone()
    }

    /// Current expiry
    pub fn expiry(&self) -> RankExpiry {
        self.rank.read().expiry
    }

    pub fn set_group(&self, group: GroupAssignment) {
        self.rank.write().group = group;
    }

    pub fn set_expiry(&self, expiry: RankExpiry) {
        self.rank.write().expiry = expiry;
    }

    /// Replace group and expiry in one step
    pub fn set_rank(&self, group: GroupAssignment, expiry: RankExpiry) {
        *self.rank.write() = Rank { group, expiry };
    }

    /// Whether the rank has lapsed at `now`
    pub fn is_rank_expired(&self, now: i64) -> bool {
        self.rank.read().expiry.is_expired(now)
    }

    /// Reset to the default group if the rank has lapsed at `now`
    ///
    /// Check and reset happen under one write lock, so a concurrent rank
    /// assignment is never overwritten by a stale expiry. Returns the lapsed
    /// rank if the record was demoted.
    pub fn demote_if_expired(&self, now: i64) -> Option<Rank> {
        let mut rank = self.rank.write();
        if !rank.expiry.is_expired(now) {
            return None;
        }
        Some(std::mem::take(&mut *rank))
    }

    /// The group this player's checks run against
    ///
    /// The assigned group if it is cached, else the store's default group.
    pub fn resolve_group(&self, groups: &GroupStore) -> Option<Arc<PermissionGroup>> {
        let assigned = match self.rank.read().group.name() {
            Some(name) => groups.get_cached(name),
            None => None,
        };
        assigned.or_else(|| groups.default_group())
    }

    /// Resolve a permission through the player's group
    ///
    /// [`Decision::Unset`] when no group resolves.
    pub fn decide(&self, groups: &GroupStore, permission: &str) -> Decision {
        self.resolve_group(groups)
            .map(|group| group.decide(permission))
            .unwrap_or(Decision::Unset)
    }

    /// Check if the player's group grants the permission
    pub fn has_permission(&self, groups: &GroupStore, permission: &str) -> bool {
        self.decide(groups, permission).is_granted()
    }

    /// Check if the player's group has any opinion on the permission
    pub fn is_permission_set(&self, groups: &GroupStore, permission: &str) -> bool {
        self.decide(groups, permission).is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_assignment_columns() {
        assert_eq!(GroupAssignment::from_name(""), GroupAssignment::Default);
        assert_eq!(
            GroupAssignment::from_name("admin"),
            GroupAssignment::Named("admin".to_string())
        );
        assert_eq!(GroupAssignment::Default.as_column(), "");
        assert_eq!(GroupAssignment::Named("vip".into()).as_column(), "vip");
    }

    #[test]
    fn test_rank_expiry_columns() {
        assert_eq!(RankExpiry::from_millis(-1), RankExpiry::Never);
        assert_eq!(RankExpiry::from_millis(1000), RankExpiry::At(1000));
        assert_eq!(RankExpiry::Never.as_millis(), -1);
        assert_eq!(RankExpiry::At(42).as_millis(), 42);
    }

    #[test]
    fn test_rank_expiry() {
        assert!(!RankExpiry::Never.is_expired(i64::MAX));
        assert!(!RankExpiry::At(1000).is_expired(1000));
        assert!(RankExpiry::At(1000).is_expired(1001));
    }

    #[test]
    fn test_rank_expiry_after() {
        assert_eq!(RankExpiry::after(1000, None), RankExpiry::Never);
        assert_eq!(
            RankExpiry::after(1000, Some(Duration::from_secs(5))),
            RankExpiry::At(6000)
        );
    }

    #[test]
    fn test_rank_expiry_after_huge_duration_clamps() {
        let now = 1_700_000_000_000;
        let duration = crate::duration::parse_duration_input("200000000000d").unwrap();

        let expiry = RankExpiry::after(now, Some(duration));
        assert_eq!(expiry, RankExpiry::At(i64::MAX));
        assert!(!expiry.is_expired(now));
        assert_eq!(RankExpiry::from_millis(expiry.as_millis()), expiry);

        assert_eq!(
            RankExpiry::after(now, Some(Duration::MAX)),
            RankExpiry::At(i64::MAX)
        );
    }

    #[test]
    fn test_demote_if_expired() {
        let record = PlayerRecord::new(
            PlayerId::new_v4(),
            GroupAssignment::Named("vip".into()),
            RankExpiry::At(1000),
        );

        assert_eq!(record.demote_if_expired(500), None);
        assert_eq!(record.group(), GroupAssignment::Named("vip".into()));

        let lapsed = record.demote_if_expired(1500).unwrap();
        assert_eq!(lapsed.group, GroupAssignment::Named("vip".into()));
        assert_eq!(lapsed.expiry, RankExpiry::At(1000));
        assert_eq!(record.rank(), Rank::default());

        // Already on default with no expiry
        assert_eq!(record.demote_if_expired(i64::MAX), None);
    }

    #[test]
    fn test_never_expiring_rank_is_never_demoted() {
        let record = PlayerRecord::new(
            PlayerId::new_v4(),
            GroupAssignment::Named("admin".into()),
            RankExpiry::Never,
        );

        assert!(record.demote_if_expired(i64::MAX).is_none());
        assert_eq!(record.group(), GroupAssignment::Named("admin".into()));
    }

    #[test]
    fn test_provisioned_record() {
        let id = PlayerId::new_v4();
        let record = PlayerRecord::provisioned(id);

        assert_eq!(record.id(), id);
        assert_eq!(record.group(), GroupAssignment::Default);
        assert_eq!(record.expiry(), RankExpiry::Never);
    }
}
