//! Background sync scheduling.
//!
//! The engine itself is synchronous and runs a cycle only when asked.
//! The scheduler owns the asking: a periodic timer, offline-to-online
//! connectivity transitions, and enqueue notifications each trigger a
//! cycle on the blocking thread pool. Cycles never run on the async
//! runtime threads.

use crate::engine::{SyncCycleReport, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::records::RecordStore;
use crate::remote::RemoteClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Drives an engine from a background task.
///
/// Dropping the scheduler leaves the task running; call
/// [`shutdown`](Self::shutdown) to stop it cleanly.
pub struct SyncScheduler<R: RemoteClient, S: RecordStore> {
    engine: Arc<SyncEngine<R, S>>,
    paused: Arc<AtomicBool>,
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

impl<R, S> SyncScheduler<R, S>
where
    R: RemoteClient + 'static,
    S: RecordStore + 'static,
{
    /// Spawns the scheduling task on the current tokio runtime.
    ///
    /// The first timer tick fires immediately, so an online engine
    /// performs a catch-up sync at startup.
    pub fn spawn(engine: Arc<SyncEngine<R, S>>) -> Self {
        let paused = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(Notify::new());
        let task = tokio::spawn(run_loop(
            Arc::clone(&engine),
            Arc::clone(&paused),
            Arc::clone(&stop),
        ));

        Self {
            engine,
            paused,
            stop,
            task,
        }
    }

    /// Suspends the periodic timer.
    ///
    /// Only the timer is affected: enqueue notifications,
    /// connectivity-restore triggers, and
    /// [`force_sync`](Self::force_sync) still run. Pause exists to
    /// quiet the background cadence, not to take the engine offline.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("sync scheduling paused");
    }

    /// Resumes scheduled syncing.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("sync scheduling resumed");
    }

    /// Returns true if the periodic timer is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Runs a cycle now, regardless of pause state.
    ///
    /// # Errors
    ///
    /// Surfaces [`SyncError::CycleInProgress`] when a scheduled cycle
    /// is already running, so interactive callers can tell the user.
    pub async fn force_sync(&self) -> SyncResult<SyncCycleReport> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.sync_cycle())
            .await
            .map_err(|e| SyncError::Task(e.to_string()))?
    }

    /// Stops the scheduling task and waits for it to finish.
    pub async fn shutdown(self) {
        self.stop.notify_one();
        if let Err(e) = self.task.await {
            warn!(error = %e, "sync scheduler task failed during shutdown");
        }
    }
}

async fn run_loop<R, S>(
    engine: Arc<SyncEngine<R, S>>,
    paused: Arc<AtomicBool>,
    stop: Arc<Notify>,
) where
    R: RemoteClient + 'static,
    S: RecordStore + 'static,
{
    let mut interval = tokio::time::interval(engine.config().sync_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let connectivity = engine.connectivity();
    let mut transitions = connectivity.watch();
    let mut was_online = *transitions.borrow_and_update();

    debug!(
        interval = ?engine.config().sync_interval,
        online = was_online,
        "sync scheduler started"
    );

    loop {
        tokio::select! {
            _ = stop.notified() => {
                debug!("sync scheduler stopping");
                break;
            }
            _ = interval.tick() => {
                if paused.load(Ordering::SeqCst) || !connectivity.is_online() {
                    continue;
                }
                run_cycle(&engine).await;
            }
            changed = transitions.changed() => {
                if changed.is_err() {
                    // The monitor is gone; without connectivity signals
                    // the scheduler cannot do its job, so it stops.
                    warn!("connectivity monitor dropped; stopping scheduler");
                    break;
                }
                let online = *transitions.borrow_and_update();
                if online && !was_online {
                    // Coming back online flushes whatever queued up
                    // while offline, even during a pause.
                    info!("connectivity restored; syncing");
                    run_cycle(&engine).await;
                }
                was_online = online;
            }
            _ = engine.sync_requested() => {
                // Enqueue kicks run even during a pause: a producer's
                // fresh mutation should not wait for the next resume.
                if !connectivity.is_online() {
                    continue;
                }
                run_cycle(&engine).await;
            }
        }
    }
}

/// Runs one cycle on the blocking pool. An already-running cycle is a
/// no-op; failures are logged, never fatal to the scheduler.
async fn run_cycle<R, S>(engine: &Arc<SyncEngine<R, S>>)
where
    R: RemoteClient + 'static,
    S: RecordStore + 'static,
{
    let engine = Arc::clone(engine);
    match tokio::task::spawn_blocking(move || engine.try_sync()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(error = %e, "scheduled sync cycle failed"),
        Err(e) => warn!(error = %e, "sync cycle task failed"),
    }
}
