//! Group store - in-memory cache of every known permission group
//!
//! Groups are cached forever and only dropped on explicit deletion or
//! invalidation. Cache misses load through storage with at most one concurrent
//! fetch per group name; "not found" and storage failures are never cached.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::flight::SingleFlight;
use crate::permissions::{PatternCache, PermissionGroup};
use crate::storage::{GroupRecord, PermissionStorage};

/// Cached groups plus the default-group back-reference
///
/// Shared with in-flight load tasks, which insert into it directly.
#[derive(Debug, Default)]
struct GroupCache {
    groups: DashMap<String, Arc<PermissionGroup>>,
    default_group: RwLock<Option<Arc<PermissionGroup>>>,
}

impl GroupCache {
    fn get(&self, name: &str) -> Option<Arc<PermissionGroup>> {
        self.groups.get(name).map(|group| Arc::clone(group.value()))
    }

    /// Insert or replace a group, keeping the default back-reference coherent
    fn insert(&self, group: Arc<PermissionGroup>) {
        self.groups
            .insert(group.name().to_string(), Arc::clone(&group));

        if group.is_default() {
            self.promote(group);
        } else {
            let mut default = self.default_group.write();
            if matches!(&*default, Some(d) if d.name() == group.name()) {
                *default = None;
            }
        }
    }

    /// Make `group` the single default group
    fn promote(&self, group: Arc<PermissionGroup>) {
        let mut default = self.default_group.write();
        if let Some(previous) = default.take() {
            if !Arc::ptr_eq(&previous, &group) {
                previous.set_default_flag(false);
            }
        }
        group.set_default_flag(true);
        *default = Some(group);
    }

    fn remove(&self, name: &str) -> Option<Arc<PermissionGroup>> {
        let (_, removed) = self.groups.remove(name)?;

        let mut default = self.default_group.write();
        if matches!(&*default, Some(d) if d.name() == name) {
            *default = None;
        }
        Some(removed)
    }
}

fn build_group(record: GroupRecord, patterns: &Arc<PatternCache>) -> Arc<PermissionGroup> {
    let GroupRecord { row, permissions } = record;
    Arc::new(PermissionGroup::new(
        row.name,
        row.prefix,
        row.is_default,
        permissions.allowed,
        permissions.denied,
        Arc::clone(patterns),
    ))
}

/// Fetch one group with its permissions and cache it
async fn fetch_group(
    storage: Arc<dyn PermissionStorage>,
    patterns: Arc<PatternCache>,
    cache: Arc<GroupCache>,
    name: String,
) -> Option<Arc<PermissionGroup>> {
    let row = match storage.fetch_group(&name).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            tracing::debug!("Group {} not found in storage", name);
            return None;
        }
        Err(e) => {
            tracing::warn!("Could not load group {}: {}", name, e);
            return None;
        }
    };

    let permissions = match storage.fetch_group_permissions(&name).await {
        Ok(permissions) => permissions,
        Err(e) => {
            tracing::warn!("Could not load permissions of group {}: {}", name, e);
            return None;
        }
    };

    let group = build_group(GroupRecord { row, permissions }, &patterns);
    cache.insert(Arc::clone(&group));
    tracing::debug!("Cached group {} from storage", name);
    Some(group)
}

/// In-memory cache of permission groups keyed by name
pub struct GroupStore {
    storage: Arc<dyn PermissionStorage>,
    patterns: Arc<PatternCache>,
    cache: Arc<GroupCache>,
    loads: SingleFlight<String, Arc<PermissionGroup>>,
}

impl GroupStore {
    /// Create an empty store loading from `storage` and compiling through `patterns`
    pub fn new(storage: Arc<dyn PermissionStorage>, patterns: Arc<PatternCache>) -> Self {
        Self {
            storage,
            patterns,
            cache: Arc::new(GroupCache::default()),
            loads: SingleFlight::new(),
        }
    }

    /// The pattern cache shared by every group of this store
    pub fn patterns(&self) -> &Arc<PatternCache> {
        &self.patterns
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Get a group from cache, loading it from storage on a miss
    ///
    /// Resolves to `None` if the group does not exist or storage failed; neither
    /// outcome is cached.
    pub async fn get_or_load(&self, name: &str) -> Option<Arc<PermissionGroup>> {
        if let Some(group) = self.cache.get(name) {
            return Some(group);
        }

        let storage = Arc::clone(&self.storage);
        let patterns = Arc::clone(&self.patterns);
        let cache = Arc::clone(&self.cache);
        let key = name.to_string();

        self.loads
            .load(
                key.clone(),
                || self.cache.get(name),
                move || fetch_group(storage, patterns, cache, key),
            )
            .await
    }

    /// Get a group from cache without touching storage
    pub fn get_cached(&self, name: &str) -> Option<Arc<PermissionGroup>> {
        self.cache.get(name)
    }

    /// Check if a group is cached
    pub fn contains(&self, name: &str) -> bool {
        self.cache.groups.contains_key(name)
    }

    /// The current default group, if one is cached
    pub fn default_group(&self) -> Option<Arc<PermissionGroup>> {
        self.cache.default_group.read().clone()
    }

    /// Names of every cached group
    pub fn names(&self) -> Vec<String> {
        self.cache
            .groups
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of cached groups
    pub fn len(&self) -> usize {
        self.cache.groups.len()
    }

    /// Check if no group is cached
    pub fn is_empty(&self) -> bool {
        self.cache.groups.is_empty()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Insert or replace a cached group
    ///
    /// A group flagged default becomes the store's default group.
    pub fn insert(&self, group: Arc<PermissionGroup>) {
        self.cache.insert(group);
    }

    /// Make a cached group the default, clearing the flag on the previous one
    ///
    /// Call only after the matching storage write succeeded. Returns `false` if
    /// the group is not cached.
    pub fn set_default(&self, name: &str) -> bool {
        match self.cache.get(name) {
            Some(group) => {
                self.cache.promote(group);
                true
            }
            None => false,
        }
    }

    /// Remove a group from cache, clearing the default if it pointed at it
    ///
    /// The removed group's decision memo is dropped as well.
    pub fn remove(&self, name: &str) -> Option<Arc<PermissionGroup>> {
        let removed = self.cache.remove(name)?;
        removed.clear_memo();
        tracing::debug!("Removed group {} from cache", name);
        Some(removed)
    }

    /// Drop a cached entry so the next lookup reloads it from storage
    pub fn invalidate_entry(&self, name: &str) {
        self.remove(name);
    }

    /// Bulk-load every group from storage
    ///
    /// Failure is logged and tolerated: lookups then load groups lazily.
    /// Returns the number of groups cached.
    pub async fn build_initial_cache(&self) -> usize {
        let records = match self.storage.fetch_all_groups().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Could not cache groups as loading from storage failed: {}", e);
                return 0;
            }
        };

        let count = records.len();
        for record in records {
            self.cache.insert(build_group(record, &self.patterns));
        }

        tracing::info!("Cached {} group(s) on start-up", count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{GroupPermissions, GroupRow, MemoryStorage};
    use std::time::Duration;

    fn row(name: &str, is_default: bool) -> GroupRow {
        GroupRow {
            name: name.to_string(),
            prefix: String::new(),
            is_default,
        }
    }

    fn store_with(storage: Arc<MemoryStorage>) -> GroupStore {
        GroupStore::new(storage, Arc::new(PatternCache::new()))
    }

    #[tokio::test]
    async fn test_get_or_load_caches_hit() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_group(
            row("vip", false),
            GroupPermissions {
                allowed: vec!["fly.*".into()],
                denied: vec![],
            },
        );
        let store = store_with(Arc::clone(&storage));

        assert!(store.get_cached("vip").is_none());

        let group = store.get_or_load("vip").await.unwrap();
        assert!(group.has_permission("fly.use"));
        assert!(store.get_cached("vip").is_some());

        store.get_or_load("vip").await.unwrap();
        assert_eq!(storage.group_fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_group_is_not_cached() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(Arc::clone(&storage));

        assert!(store.get_or_load("ghost").await.is_none());
        assert!(store.get_or_load("ghost").await.is_none());

        assert!(store.is_empty());
        assert_eq!(storage.group_fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_cached() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_group(row("vip", false), GroupPermissions::default());
        storage.set_available(false);
        let store = store_with(Arc::clone(&storage));

        assert!(store.get_or_load("vip").await.is_none());
        assert!(!store.contains("vip"));

        storage.set_available(true);
        assert!(store.get_or_load("vip").await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_fetch_once() {
        let storage = Arc::new(MemoryStorage::new().with_latency(Duration::from_millis(50)));
        storage.insert_group(row("admin", false), GroupPermissions::default());
        let store = Arc::new(store_with(Arc::clone(&storage)));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.get_or_load("admin").await }));
        }

        let mut loaded = Vec::new();
        for handle in handles {
            loaded.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(storage.group_fetch_count(), 1);
        assert!(loaded.iter().all(|g| Arc::ptr_eq(g, &loaded[0])));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_build_initial_cache_sets_default() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_group(row("guest", true), GroupPermissions::default());
        storage.insert_group(row("admin", false), GroupPermissions::default());
        let store = store_with(Arc::clone(&storage));

        assert_eq!(store.build_initial_cache().await, 2);
        assert_eq!(store.default_group().unwrap().name(), "guest");

        let mut names = store.names();
        names.sort();
        assert_eq!(names, vec!["admin".to_string(), "guest".to_string()]);
    }

    #[tokio::test]
    async fn test_build_initial_cache_failure_is_tolerated() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_group(row("guest", true), GroupPermissions::default());
        storage.set_available(false);
        let store = store_with(Arc::clone(&storage));

        assert_eq!(store.build_initial_cache().await, 0);
        assert!(store.is_empty());

        // Lazy load still works once storage recovers
        storage.set_available(true);
        assert!(store.get_or_load("guest").await.is_some());
        assert_eq!(store.default_group().unwrap().name(), "guest");
    }

    #[test]
    fn test_single_default_invariant() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let patterns = Arc::clone(store.patterns());
        store.insert(Arc::new(PermissionGroup::empty("a", Arc::clone(&patterns))));
        store.insert(Arc::new(PermissionGroup::empty("b", Arc::clone(&patterns))));

        assert!(store.set_default("a"));
        assert!(store.set_default("b"));
        assert!(!store.set_default("missing"));

        let a = store.get_cached("a").unwrap();
        let b = store.get_cached("b").unwrap();
        assert!(!a.is_default());
        assert!(b.is_default());
        assert!(Arc::ptr_eq(&store.default_group().unwrap(), &b));
    }

    #[test]
    fn test_remove_clears_default() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let patterns = Arc::clone(store.patterns());
        let group = Arc::new(PermissionGroup::new(
            "guest",
            "",
            true,
            vec!["*".into()],
            vec![],
            patterns,
        ));
        store.insert(Arc::clone(&group));
        assert!(group.has_permission("anything"));
        assert!(store.default_group().is_some());

        let removed = store.remove("guest").unwrap();
        assert_eq!(removed.memo_len(), 0);
        assert!(store.default_group().is_none());
        assert!(!store.contains("guest"));
        assert!(store.remove("guest").is_none());
    }
}
