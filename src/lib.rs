//! Task lifecycle and time-tracking engine.
//!
//! Tasks move between three status-partitioned collections (in progress,
//! pending, completed) owned by [`store::TaskStore`]; a single
//! [`session::TrackingSession`] converts wall-clock spans into committed
//! elapsed time; periodic sweeps demote stale tasks
//! ([`monitor::InactivityMonitor`]) and roll completed tasks into daily
//! archives ([`reset::ResetCoordinator`]). Persistence, notifications and
//! the clock are trait boundaries so every piece runs under test with
//! in-memory doubles and a manual clock.

pub mod clock;
pub mod domain;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod persistence;
pub mod reset;
pub mod session;
pub mod settings;
pub mod store;
pub mod ticker;

pub use clock::{Clock, SystemClock};
pub use domain::{TaskPriority, TaskRecord, TaskStatus};
pub use engine::Engine;
pub use error::{Error, Result};
pub use monitor::InactivityMonitor;
pub use notify::{DesktopNotifier, NotificationScheduler, Notifier};
pub use persistence::{DataPaths, JsonFileStore, TaskPersistence};
pub use reset::ResetCoordinator;
pub use session::TrackingSession;
pub use settings::{Settings, SettingsStore};
pub use store::{StateChanged, TaskCollections, TaskStore};
