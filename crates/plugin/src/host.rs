//! Host bridge - putting the engine in front of the host's permission checks
//!
//! How a permission checker gets swapped into a live player entity is host
//! specific, so it stays behind [`PermissionInstaller`]. The plugin only asks
//! for the player's current checker and hands back a [`HostPermissible`]
//! that wraps it: the wrapped checker keeps answering whenever the player's
//! group has no opinion, so grants the host already made are preserved.

use std::fmt;
use std::sync::Arc;

use rankguard_core::{HostFallback, PermissionEngine, PlayerId};

/// A permission checker the host can call from any thread
pub type SharedChecker = Arc<dyn HostFallback + Send + Sync>;

/// Errors raised by a host while installing a checker
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The host has no entity for this player (e.g. already disconnected)
    #[error("No host entity for player {0}")]
    EntityNotFound(PlayerId),

    /// The host refused the installation
    #[error("Installation rejected: {0}")]
    Rejected(String),
}

/// Capability the host provides for installing permission checkers
pub trait PermissionInstaller: Send + Sync + 'static {
    /// The checker currently answering for `player`
    fn current(&self, player: PlayerId) -> Result<SharedChecker, InstallError>;

    /// Make `checker` answer for `player` from now on
    fn install(&self, player: PlayerId, checker: SharedChecker) -> Result<(), InstallError>;

    /// Forget whatever was installed for `player`
    ///
    /// Returns `true` if something was installed.
    fn uninstall(&self, player: PlayerId) -> bool;
}

/// Per-player checker composing the engine with the host's existing checker
pub struct HostPermissible {
    engine: Arc<PermissionEngine>,
    player: PlayerId,
    fallback: SharedChecker,
}

impl HostPermissible {
    pub fn new(engine: Arc<PermissionEngine>, player: PlayerId, fallback: SharedChecker) -> Self {
        Self {
            engine,
            player,
            fallback,
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// The host checker consulted when the group has no opinion
    pub fn fallback(&self) -> &SharedChecker {
        &self.fallback
    }
}

impl HostFallback for HostPermissible {
    fn has_permission(&self, permission: &str) -> bool {
        self.engine
            .check_permission(self.player, permission, self.fallback.as_ref())
    }

    fn is_permission_set(&self, permission: &str) -> bool {
        self.engine
            .is_permission_set(self.player, permission, self.fallback.as_ref())
    }
}

impl fmt::Debug for HostPermissible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostPermissible")
            .field("player", &self.player)
            .finish_non_exhaustive()
    }
}

/// Wrap the player's current checker and install the result
pub fn install_permissible<I: PermissionInstaller + ?Sized>(
    installer: &I,
    engine: &Arc<PermissionEngine>,
    player: PlayerId,
) -> Result<Arc<HostPermissible>, InstallError> {
    let existing = installer.current(player)?;
    let permissible = Arc::new(HostPermissible::new(Arc::clone(engine), player, existing));
    installer.install(player, Arc::clone(&permissible) as SharedChecker)?;
    tracing::debug!("Installed permission checker for player {}", player);
    Ok(permissible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rankguard_core::{
        FallbackDecision, GroupPermissions, GroupRow, MemoryStorage, PermissionStorage,
    };

    fn engine_with_guest() -> Arc<PermissionEngine> {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_group(
            GroupRow {
                name: "guest".into(),
                prefix: String::new(),
                is_default: true,
            },
            GroupPermissions {
                allowed: vec!["chat.*".into()],
                denied: vec!["build.*".into()],
            },
        );
        let storage: Arc<dyn PermissionStorage> = storage;
        Arc::new(PermissionEngine::new(storage))
    }

    #[tokio::test]
    async fn test_permissible_composes_engine_and_host() {
        let engine = engine_with_guest();
        engine.build_initial_cache().await;
        let player = PlayerId::new_v4();
        engine.handle_login(player).await;

        let permissible = HostPermissible::new(
            Arc::clone(&engine),
            player,
            Arc::new(FallbackDecision::GRANTED),
        );

        // Group opinion wins
        assert!(permissible.has_permission("chat.send"));
        assert!(!permissible.has_permission("build.place"));
        // Host grant preserved where the group is silent
        assert!(permissible.has_permission("host.only"));
        assert!(permissible.is_permission_set("host.only"));
    }

    #[tokio::test]
    async fn test_permissible_defers_before_login() {
        let engine = engine_with_guest();
        engine.build_initial_cache().await;

        let permissible = HostPermissible::new(
            engine,
            PlayerId::new_v4(),
            Arc::new(FallbackDecision::UNSET),
        );

        assert!(!permissible.has_permission("chat.send"));
        assert!(!permissible.is_permission_set("chat.send"));
    }
}
