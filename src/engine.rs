use crate::clock::Clock;
use crate::error::Result;
use crate::monitor::InactivityMonitor;
use crate::notify::{NotificationScheduler, Notifier};
use crate::persistence::TaskPersistence;
use crate::reset::ResetCoordinator;
use crate::session::TrackingSession;
use crate::settings::SettingsStore;
use crate::store::TaskStore;
use crate::ticker::{Cadence, INACTIVITY_SWEEP_SECS, RESET_SWEEP_SECS};
use chrono::Duration;
use std::sync::{Arc, Mutex};

struct Cadences {
    inactivity: Cadence,
    reset: Cadence,
}

/// Wires the engine's components together and drives the periodic work.
///
/// The caller owns the loop: `tick` is cheap and meant to be called on the
/// display cadence; the sweeps run themselves on their own coarser
/// cadences inside it. Sweep failures are logged, never propagated; the
/// loop must keep running.
pub struct Engine {
    pub store: Arc<TaskStore>,
    pub session: TrackingSession,
    pub scheduler: Arc<NotificationScheduler>,
    pub monitor: InactivityMonitor,
    pub reset: ResetCoordinator,
    clock: Arc<dyn Clock>,
    cadences: Mutex<Cadences>,
}

impl Engine {
    pub fn new(
        persistence: Arc<dyn TaskPersistence>,
        settings: Arc<SettingsStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(TaskStore::new(persistence, clock.clone()));
        let scheduler = Arc::new(NotificationScheduler::new(
            store.clone(),
            settings.clone(),
            notifier,
        ));
        let session = TrackingSession::new(store.clone(), scheduler.clone(), clock.clone());
        let monitor = InactivityMonitor::new(store.clone(), settings.clone());
        let reset = ResetCoordinator::new(store.clone(), settings, clock.clone());

        Self {
            store,
            session,
            scheduler,
            monitor,
            reset,
            clock,
            cadences: Mutex::new(Cadences {
                inactivity: Cadence::new(Duration::seconds(INACTIVITY_SWEEP_SECS)),
                reset: Cadence::new(Duration::seconds(RESET_SWEEP_SECS)),
            }),
        }
    }

    /// One cooperative tick: run whichever sweeps are due and poll the
    /// reminder scheduler.
    pub fn tick(&self) {
        let now = self.clock.now();
        let (inactivity_due, reset_due) = {
            let mut cadences = self.cadences.lock().unwrap();
            (cadences.inactivity.due(now), cadences.reset.due(now))
        };

        if inactivity_due {
            if let Err(err) = self.monitor.sweep() {
                log::error!("inactivity sweep failed: {}", err);
            }
        }
        if reset_due {
            if let Err(err) = self.reset.sweep() {
                log::error!("reset sweep failed: {}", err);
            }
        }
        self.scheduler.poll(now);
    }

    /// Ordered shutdown: cancel pending reminders, stop-and-commit a
    /// running session, then take a final synchronous save so no accrual
    /// is lost. Sweeps stop because the caller stops ticking.
    pub fn shutdown(&self) -> Result<()> {
        self.scheduler.cancel();
        if let Err(err) = self.session.stop() {
            log::error!("final session commit failed to save: {}", err);
        }
        self.store.save()
    }
}
