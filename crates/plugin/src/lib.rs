//! Rankguard Plugin - Host Bridge
//!
//! Boots the permission engine inside a game server and connects it to the
//! host's player lifecycle:
//!
//! ```text
//! load:   config ─► logging ─► engine(storage) ─► initial group cache ─► expiry sweeper
//! login:  load or provision record, demote a lapsed rank
//! join:   install HostPermissible, warm the player's group, build join message
//! chat:   prepend the group prefix to the player's message
//! quit:   uninstall checker, evict record
//! ```

pub mod host;
pub mod logging;

use std::sync::Arc;

use rankguard_core::{
    ConfigError, EngineConfig, PermissionEngine, PermissionStorage, PlayerId, SweeperHandle,
};
use tracing::info;

pub use host::{install_permissible, HostPermissible, InstallError, PermissionInstaller, SharedChecker};
pub use logging::init_logging;

/// Plugin errors
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Install(#[from] InstallError),
}

/// Join broadcast, with the player's group prefix when there is one
pub fn join_message(prefix: Option<&str>, player_name: &str) -> String {
    match prefix {
        Some(prefix) => format!("[{}] {} joined the game", prefix, player_name),
        None => format!("{} joined the game", player_name),
    }
}

/// Chat line, with the player's group prefix when there is one
pub fn chat_message(prefix: Option<&str>, player_name: &str, message: &str) -> String {
    match prefix {
        Some(prefix) => format!("[{}] {} > {}", prefix, player_name, message),
        None => format!("{} > {}", player_name, message),
    }
}

/// A running Rankguard instance
pub struct RankguardPlugin<I: PermissionInstaller> {
    config: EngineConfig,
    engine: Arc<PermissionEngine>,
    installer: I,
    sweeper: Option<SweeperHandle>,
}

impl<I: PermissionInstaller> RankguardPlugin<I> {
    /// Load the config file and start the plugin
    ///
    /// Must be called from within a tokio runtime.
    pub async fn load(
        storage: Arc<dyn PermissionStorage>,
        installer: I,
    ) -> Result<Self, PluginError> {
        let config = EngineConfig::load()?;
        Ok(Self::start(config, storage, installer).await)
    }

    /// Start the plugin with an explicit config
    pub async fn start(
        config: EngineConfig,
        storage: Arc<dyn PermissionStorage>,
        installer: I,
    ) -> Self {
        init_logging(config.debug);
        info!("Rankguard loading...");

        let engine = Arc::new(PermissionEngine::new(storage));
        if config.warm_cache_on_start {
            engine.build_initial_cache().await;
        }

        let sweeper = engine.spawn_sweeper(config.sweep_interval());
        info!("Rankguard loaded");

        Self {
            config,
            engine,
            installer,
            sweeper: Some(sweeper),
        }
    }

    pub fn engine(&self) -> &Arc<PermissionEngine> {
        &self.engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn installer(&self) -> &I {
        &self.installer
    }

    /// Re-read the config file and restart the sweeper if its interval changed
    pub async fn reload_config(&mut self) -> Result<(), PluginError> {
        let mut config = self.config.clone();
        config.reload()?;
        self.apply_config(config).await;
        Ok(())
    }

    /// Swap in a new config
    pub async fn apply_config(&mut self, config: EngineConfig) {
        let interval_changed = config.sweep_interval() != self.config.sweep_interval();
        self.config = config;

        if interval_changed {
            if let Some(sweeper) = self.sweeper.take() {
                sweeper.shutdown().await;
            }
            self.sweeper = Some(self.engine.spawn_sweeper(self.config.sweep_interval()));
        }
    }

    // ========================================================================
    // Player Lifecycle
    // ========================================================================

    /// Player is connecting; runs before they are in the world
    pub async fn on_player_login(&self, player: PlayerId) {
        self.engine.handle_login(player).await;
    }

    /// Player entered the world
    ///
    /// # Returns
    /// The join message to broadcast.
    pub async fn on_player_join(
        &self,
        player: PlayerId,
        player_name: &str,
    ) -> Result<String, PluginError> {
        install_permissible(&self.installer, &self.engine, player)?;
        let prefix = self.engine.handle_join(player).await;
        Ok(join_message(prefix.as_deref(), player_name))
    }

    /// Player sent a chat message
    ///
    /// # Returns
    /// The formatted line to broadcast in place of the original.
    pub async fn on_player_chat(
        &self,
        player: PlayerId,
        player_name: &str,
        message: &str,
    ) -> String {
        let prefix = self.engine.load_prefix(player).await;
        chat_message(prefix.as_deref(), player_name, message)
    }

    /// Player left the server
    pub fn on_player_quit(&self, player: PlayerId) {
        self.installer.uninstall(player);
        self.engine.handle_disconnect(player);
    }

    /// Stop background work
    pub async fn shutdown(mut self) {
        info!("Rankguard shutting down...");
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.shutdown().await;
        }
    }
}
