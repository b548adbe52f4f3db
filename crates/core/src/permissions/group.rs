//! Permission groups - named allow/deny pattern lists with a decision memo

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::pattern::PatternCache;
use super::types::{Decision, PatternKind};

/// Ordered allow and deny lists, guarded together so a scan always sees one
/// consistent version of both
#[derive(Debug, Default)]
struct PatternLists {
    allowed: Vec<String>,
    denied: Vec<String>,
}

impl PatternLists {
    fn list(&self, kind: PatternKind) -> &Vec<String> {
        match kind {
            PatternKind::Allow => &self.allowed,
            PatternKind::Deny => &self.denied,
        }
    }

    fn list_mut(&mut self, kind: PatternKind) -> &mut Vec<String> {
        match kind {
            PatternKind::Allow => &mut self.allowed,
            PatternKind::Deny => &mut self.denied,
        }
    }
}

/// A named bundle of allow/deny wildcard patterns
///
/// Resolution scans the allow list first, then the deny list; within a list the
/// first matching pattern wins. Results are memoized per concrete permission.
#[derive(Debug)]
pub struct PermissionGroup {
    name: String,
    prefix: RwLock<String>,
    is_default: AtomicBool,
    lists: RwLock<PatternLists>,
    memo: DashMap<String, Decision>,
    patterns: Arc<PatternCache>,
}

impl PermissionGroup {
    /// Create a group with the given pattern lists
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        is_default: bool,
        allowed: Vec<String>,
        denied: Vec<String>,
        patterns: Arc<PatternCache>,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: RwLock::new(prefix.into()),
            is_default: AtomicBool::new(is_default),
            lists: RwLock::new(PatternLists { allowed, denied }),
            memo: DashMap::new(),
            patterns,
        }
    }

    /// Create a freshly created group: no prefix, not default, no patterns
    pub fn empty(name: impl Into<String>, patterns: Arc<PatternCache>) -> Self {
        Self::new(name, "", false, Vec::new(), Vec::new(), patterns)
    }

    /// The unique group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current display prefix
    pub fn prefix(&self) -> String {
        self.prefix.read().clone()
    }

    /// Replace the display prefix
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        *self.prefix.write() = prefix.into();
    }

    /// Whether this group is flagged as the default group
    pub fn is_default(&self) -> bool {
        self.is_default.load(Ordering::Acquire)
    }

    /// Only [`GroupStore`](crate::store::GroupStore) flips this, to keep the
    /// single-default invariant
    pub(crate) fn set_default_flag(&self, value: bool) {
        self.is_default.store(value, Ordering::Release);
    }

    /// Snapshot of the allow list, in scan order
    pub fn allowed(&self) -> Vec<String> {
        self.lists.read().allowed.clone()
    }

    /// Snapshot of the deny list, in scan order
    pub fn denied(&self) -> Vec<String> {
        self.lists.read().denied.clone()
    }

    /// Resolve a permission against the pattern lists
    ///
    /// Memoized; the memo entry is written while the lists are read-locked so a
    /// concurrent mutation can never leave a stale decision behind.
    pub fn decide(&self, permission: &str) -> Decision {
        if let Some(decision) = self.memo.get(permission) {
            return *decision;
        }

        let lists = self.lists.read();
        let decision = self.scan(&lists, permission);
        self.memo.insert(permission.to_string(), decision);
        decision
    }

    fn scan(&self, lists: &PatternLists, permission: &str) -> Decision {
        let any_match = |patterns: &[String]| {
            patterns
                .iter()
                .any(|pattern| self.patterns.compile(pattern).matches(permission))
        };

        if any_match(&lists.allowed) {
            Decision::Allowed
        } else if any_match(&lists.denied) {
            Decision::Denied
        } else {
            Decision::Unset
        }
    }

    /// Check if the group grants a permission
    ///
    /// A permission no pattern matches is implicitly denied.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.decide(permission).is_granted()
    }

    /// Check if any allow or deny pattern matches the permission
    pub fn is_permission_set(&self, permission: &str) -> bool {
        self.decide(permission).is_set()
    }

    /// Drop the memoized decision for one exact permission string
    pub fn invalidate(&self, permission: &str) {
        self.memo.remove(permission);
    }

    /// Drop every memoized decision
    pub fn clear_memo(&self) {
        self.memo.clear();
    }

    /// Number of memoized decisions
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Append a pattern to the end of a list
    ///
    /// Returns `false` if the list already contains it. A wildcard can change
    /// the outcome of any number of permissions, so the whole memo is cleared.
    pub fn add_pattern(&self, kind: PatternKind, pattern: &str) -> bool {
        let mut lists = self.lists.write();
        let list = lists.list_mut(kind);
        if list.iter().any(|p| p == pattern) {
            return false;
        }
        list.push(pattern.to_string());
        self.memo.clear();
        true
    }

    /// Remove a pattern from a list, preserving the order of the rest
    ///
    /// Returns `false` if it was not present.
    pub fn remove_pattern(&self, kind: PatternKind, pattern: &str) -> bool {
        let mut lists = self.lists.write();
        let list = lists.list_mut(kind);
        let Some(index) = list.iter().position(|p| p == pattern) else {
            return false;
        };
        list.remove(index);
        self.memo.clear();
        true
    }

    /// Check if a list contains the exact pattern
    pub fn contains_pattern(&self, kind: PatternKind, pattern: &str) -> bool {
        self.lists.read().list(kind).iter().any(|p| p == pattern)
    }
}
