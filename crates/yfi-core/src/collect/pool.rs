//! Bounded worker pool for catalog execution.
//!
//! A fixed set of scoped worker threads pulls catalog indices from a shared
//! counter, so a hanging unit only ever occupies its own worker. Results come
//! back over a channel and are put back in catalog order.
//!
//! Failure isolation: a unit that panics is recorded through
//! [`CatalogUnit::failed`] and its siblings keep running. The pool call itself
//! only fails when not a single worker thread can be spawned.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Default number of concurrently running units.
pub const DEFAULT_MAX_PARALLEL: usize = 5;

/// Errors that prevent a catalog from running at all.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no worker thread could be spawned: {0}")]
    NoWorkers(String),
}

/// Work executed once per catalog entry.
pub trait CatalogUnit: Sync {
    type Task: Sync;
    type Output: Send;

    /// Key under which the entry's result is reported.
    fn name<'a>(&self, task: &'a Self::Task) -> &'a str;

    fn run(&self, task: &Self::Task) -> Self::Output;

    /// Result recorded when [`CatalogUnit::run`] panicked.
    fn failed(&self, task: &Self::Task, reason: &str) -> Self::Output;
}

/// Per-entry results, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogResults<R> {
    entries: Vec<(String, R)>,
}

impl<R> CatalogResults<R> {
    pub fn from_entries(entries: Vec<(String, R)>) -> Self {
        CatalogResults { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&R> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &R)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl<R> Default for CatalogResults<R> {
    fn default() -> Self {
        CatalogResults {
            entries: Vec::new(),
        }
    }
}

impl<R: Serialize> Serialize for CatalogResults<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, result) in &self.entries {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}

/// Bounded-concurrency catalog executor.
#[derive(Debug, Clone, Copy)]
pub struct TaskPool {
    max_parallel: usize,
}

impl Default for TaskPool {
    fn default() -> Self {
        TaskPool::new(DEFAULT_MAX_PARALLEL)
    }
}

impl TaskPool {
    /// A pool of at most `max_parallel` workers (at least one).
    pub fn new(max_parallel: usize) -> Self {
        TaskPool {
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Run every catalog entry and return one result per entry.
    #[instrument(skip_all, fields(units = catalog.len(), max_parallel = self.max_parallel))]
    pub fn run_all<U: CatalogUnit>(
        &self,
        catalog: &[U::Task],
        unit: &U,
    ) -> Result<CatalogResults<U::Output>, PoolError> {
        if catalog.is_empty() {
            return Ok(CatalogResults::default());
        }

        let start = Instant::now();
        let workers = self.max_parallel.min(catalog.len());
        let next = AtomicUsize::new(0);
        let mut slots: Vec<Option<U::Output>> = (0..catalog.len()).map(|_| None).collect();

        info!(units = catalog.len(), workers, "pool started");

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<(usize, U::Output)>();
            let mut spawned = 0usize;
            let mut last_error = None;

            for id in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let spawn = thread::Builder::new()
                    .name(format!("yfi-pool-{}", id))
                    .spawn_scoped(scope, move || worker(unit, catalog, next, tx));
                match spawn {
                    Ok(_) => spawned += 1,
                    Err(e) => {
                        warn!(worker = id, error = %e, "failed to spawn pool worker");
                        last_error = Some(e);
                    }
                }
            }
            drop(tx);

            if spawned == 0 {
                let reason = last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no workers requested".to_string());
                return Err(PoolError::NoWorkers(reason));
            }

            for (idx, output) in rx {
                if let Some(slot) = slots.get_mut(idx) {
                    *slot = Some(output);
                }
            }
            Ok(())
        })?;

        let entries = catalog
            .iter()
            .zip(slots)
            .map(|(task, slot)| {
                let name = unit.name(task).to_string();
                let output = match slot {
                    Some(output) => output,
                    None => {
                        error!(unit = %name, "unit produced no result");
                        unit.failed(task, "worker exited without a result")
                    }
                };
                (name, output)
            })
            .collect();

        info!(
            units = catalog.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "pool finished"
        );
        Ok(CatalogResults::from_entries(entries))
    }
}

fn worker<U: CatalogUnit>(
    unit: &U,
    catalog: &[U::Task],
    next: &AtomicUsize,
    tx: mpsc::Sender<(usize, U::Output)>,
) {
    loop {
        let idx = next.fetch_add(1, Ordering::SeqCst);
        let Some(task) = catalog.get(idx) else {
            break;
        };
        let name = unit.name(task);
        let started = Instant::now();

        let output = match panic::catch_unwind(AssertUnwindSafe(|| unit.run(task))) {
            Ok(output) => output,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(unit = %name, reason = %reason, "unit panicked");
                unit.failed(task, &reason)
            }
        };
        debug!(
            unit = %name,
            duration_ms = started.elapsed().as_millis() as u64,
            "unit finished"
        );

        if tx.send((idx, output)).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unit panicked".to_string()
    }
}
