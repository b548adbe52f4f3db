//! Expiry sweeper - periodic demotion of lapsed ranks
//!
//! Every cached player is scanned on a fixed interval. A player whose rank
//! deadline has passed is moved back to the default group in cache, the same
//! change is written to storage, and rank-expired listeners are fired.
//!
//! Polling rather than per-player timers means expiry fires even for players
//! who make no permission queries while their rank runs out.
//!
//! # Shutdown
//!
//! [`SweeperHandle::shutdown`] stops the loop and waits for the current cycle.
//! Dropping the handle without it aborts the task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::listeners::{Listeners, RankExpired};
use crate::player::{current_millis, PlayerId, PlayerRecord};
use crate::storage::PermissionStorage;
use crate::store::PlayerStore;

/// Demote `record` if its rank lapsed at `now`
///
/// Cache first, then storage. The storage write only applies while the row still
/// holds the lapsed rank, so an assignment made in between is kept. A failed
/// write is logged; the cache keeps the demotion and a later assignment
/// overwrites the stale row.
pub(crate) async fn demote_expired(
    storage: &dyn PermissionStorage,
    record: &PlayerRecord,
    now: i64,
) -> Option<RankExpired> {
    let lapsed = record.demote_if_expired(now)?;
    let player_id = record.id();

    info!(
        "Rank {:?} of player {} expired, moved to default group",
        lapsed.group.name().unwrap_or("<default>"),
        player_id
    );

    match storage.demote_player(player_id, &lapsed).await {
        Ok(true) => {}
        Ok(false) => debug!("Stored rank of player {} changed, demotion not persisted", player_id),
        Err(e) => warn!("Could not persist demotion of player {}: {}", player_id, e),
    }

    Some(RankExpired {
        player_id,
        group: lapsed.group,
        expiry: lapsed.expiry,
    })
}

/// Scans cached players for expired ranks
pub struct ExpirySweeper {
    storage: Arc<dyn PermissionStorage>,
    players: Arc<PlayerStore>,
    listeners: Arc<Listeners>,
}

impl ExpirySweeper {
    pub fn new(
        storage: Arc<dyn PermissionStorage>,
        players: Arc<PlayerStore>,
        listeners: Arc<Listeners>,
    ) -> Self {
        Self {
            storage,
            players,
            listeners,
        }
    }

    /// Run one sweep cycle at time `now` (epoch milliseconds)
    ///
    /// # Returns
    /// The players demoted in this cycle.
    pub async fn sweep(&self, now: i64) -> Vec<PlayerId> {
        let records = self.players.records();
        let storage = self.storage.as_ref();

        let events: Vec<RankExpired> = join_all(
            records
                .iter()
                .map(|record| demote_expired(storage, record, now)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        for event in &events {
            self.listeners.fire_rank_expired(event);
        }

        if !events.is_empty() {
            debug!("Sweep demoted {} player(s)", events.len());
        }

        events.into_iter().map(|event| event.player_id).collect()
    }

    /// Run [`sweep`](Self::sweep) on a tokio interval until shut down
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> SweeperHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_sweep_loop(self, interval, command_rx));

        info!("Expiry sweeper started, interval {:?}", interval);

        SweeperHandle {
            command_tx,
            handle: Some(handle),
            shutdown_initiated: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// Background Task
// ============================================================================

/// Control messages for the sweep loop
#[derive(Debug, Clone, Copy)]
enum SweeperCommand {
    /// Run a cycle now, outside the interval
    Trigger,
    Shutdown,
}

async fn run_sweep_loop(
    sweeper: Arc<ExpirySweeper>,
    period: Duration,
    mut command_rx: mpsc::UnboundedReceiver<SweeperCommand>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // First tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sweeper.sweep(current_millis()).await;
            }

            cmd = command_rx.recv() => match cmd {
                Some(SweeperCommand::Trigger) => {
                    sweeper.sweep(current_millis()).await;
                }
                Some(SweeperCommand::Shutdown) | None => {
                    debug!("Expiry sweeper shutting down");
                    break;
                }
            },
        }
    }
}

/// Handle to a running sweep loop
pub struct SweeperHandle {
    command_tx: mpsc::UnboundedSender<SweeperCommand>,
    handle: Option<JoinHandle<()>>,
    shutdown_initiated: AtomicBool,
}

impl SweeperHandle {
    /// Run a sweep cycle as soon as possible
    pub fn trigger(&self) {
        let _ = self.command_tx.send(SweeperCommand::Trigger);
    }

    /// Check if the loop task is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for it to finish
    pub async fn shutdown(mut self) {
        self.shutdown_initiated.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(SweeperCommand::Shutdown);

        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(()) => info!("Expiry sweeper stopped"),
                Err(e) => warn!("Expiry sweeper shutdown error: {}", e),
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.handle.take() {
            warn!("SweeperHandle dropped without shutdown(), aborting sweep task");
            handle.abort();
        }
    }
}
