//! Per-database batch accumulation and trigger decisions.
//!
//! Each database has its own window behind its own mutex, so databases
//! never contend with each other once their window exists.

use parking_lot::Mutex;
use sink_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct DatabaseWindow {
    pending: u64,
    in_flight: bool,
}

/// Counts data points per database against a fixed threshold.
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: u64,
    windows: Mutex<HashMap<String, Arc<Mutex<DatabaseWindow>>>>,
}

impl BatchAccumulator {
    pub fn new(batch_size: u64) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::configuration("batch_size must be positive"));
        }
        Ok(Self {
            batch_size,
            windows: Mutex::new(HashMap::new()),
        })
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    fn window(&self, db_name: &str) -> Arc<Mutex<DatabaseWindow>> {
        let mut windows = self.windows.lock();
        match windows.get(db_name) {
            Some(window) => window.clone(),
            None => {
                let window = Arc::new(Mutex::new(DatabaseWindow::default()));
                windows.insert(db_name.to_string(), window.clone());
                window
            }
        }
    }

    /// Adds `points` to the database's counter.
    ///
    /// Returns a permit when the threshold is reached and no task is in
    /// flight for the database. The counter is reset to zero, dropping any
    /// excess over the threshold.
    ///
    /// A crossing seen while a task is in flight stays pending; the running
    /// task picks it up through [`TriggerPermit::renew`].
    pub fn record(&self, db_name: &str, points: u64) -> Option<TriggerPermit> {
        let window = self.window(db_name);
        let mut state = window.lock();
        state.pending = state.pending.saturating_add(points);

        if state.pending < self.batch_size || state.in_flight {
            return None;
        }

        state.pending = 0;
        state.in_flight = true;
        drop(state);

        Some(TriggerPermit {
            db_name: db_name.to_string(),
            batch_size: self.batch_size,
            window,
            released: false,
        })
    }

    /// Points counted since the last trigger.
    pub fn pending(&self, db_name: &str) -> u64 {
        self.windows
            .lock()
            .get(db_name)
            .map(|window| window.lock().pending)
            .unwrap_or(0)
    }

    /// Whether an insight task currently holds the database's permit.
    pub fn in_flight(&self, db_name: &str) -> bool {
        self.windows
            .lock()
            .get(db_name)
            .map(|window| window.lock().in_flight)
            .unwrap_or(false)
    }
}

/// Exclusive right to run one insight task for a database.
///
/// Dropping it lets the database trigger again.
#[derive(Debug)]
pub struct TriggerPermit {
    db_name: String,
    batch_size: u64,
    window: Arc<Mutex<DatabaseWindow>>,
    released: bool,
}

impl TriggerPermit {
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Finishes the current task.
    ///
    /// If the threshold was reached while the task ran, the counter is reset
    /// and the permit is handed back for another round. Otherwise the
    /// database is released. Both happen under the window lock, so a
    /// concurrent `record` either sees the permit held and leaves its points
    /// for the renewal, or sees it released and triggers itself.
    pub fn renew(mut self) -> Option<TriggerPermit> {
        let mut state = self.window.lock();
        if state.pending >= self.batch_size {
            state.pending = 0;
            drop(state);
            return Some(self);
        }

        state.in_flight = false;
        drop(state);
        self.released = true;
        None
    }
}

impl Drop for TriggerPermit {
    fn drop(&mut self) {
        if !self.released {
            self.window.lock().in_flight = false;
        }
    }
}
