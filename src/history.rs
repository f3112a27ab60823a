//! The append-only object history consumed by the history reconciler.
//!
//! Every object is logged under an id of the form `application:share:uid`.
//! Entries are never removed; at most the trailing entry of an id may be
//! replaced by a newer one of the same action.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Action, HistoryEntry, LogEntry};

/// How an entry's timestamp has to compare with the one given to
/// [`HistoryStore::get_by_timestamp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    /// Strictly later.
    Greater,
    /// Later or at the same instant.
    GreaterOrEqual,
    /// Strictly earlier.
    Less,
    /// Earlier or at the same instant.
    LessOrEqual,
    /// At the same instant.
    Equal,
}

impl Comparison {
    fn holds(self, left: &DateTime<Utc>, right: &DateTime<Utc>) -> bool {
        match self {
            Comparison::Greater => left > right,
            Comparison::GreaterOrEqual => left >= right,
            Comparison::Less => left < right,
            Comparison::LessOrEqual => left <= right,
            Comparison::Equal => left == right,
        }
    }
}

/// Restricts the entries considered by [`HistoryStore::get_by_timestamp`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryFilter {
    /// Only entries with this action.
    Action(Action),
    /// Only entries with any other action.
    NotAction(Action),
}

impl HistoryFilter {
    fn accepts(&self, entry: &HistoryEntry) -> bool {
        match *self {
            HistoryFilter::Action(action) => entry.action == action,
            HistoryFilter::NotAction(action) => entry.action != action,
        }
    }
}

/// An append-only log of object actions.
pub trait HistoryStore {
    /// Append `entry` to the history of `id` and return the timestamp it was logged with.
    ///
    /// With `replace_last`, a trailing entry carrying the same action is
    /// replaced instead of appended to.
    fn log(&mut self, id: &str, entry: LogEntry, replace_last: bool) -> Result<DateTime<Utc>>;

    /// Every entry logged for `id`, oldest first.
    fn get_history(&self, id: &str) -> Result<Vec<HistoryEntry>>;

    /// When `action` was most recently logged for `id`.
    fn get_action_timestamp(&self, id: &str, action: Action) -> Result<Option<DateTime<Utc>>>;

    /// Ids starting with `id_prefix` that have an entry passing all `filters`
    /// whose timestamp compares with `timestamp` as `op` demands, each with the
    /// latest such timestamp.
    fn get_by_timestamp(
        &self,
        op: Comparison,
        timestamp: DateTime<Utc>,
        filters: &[HistoryFilter],
        id_prefix: &str,
    ) -> Result<BTreeMap<String, DateTime<Utc>>>;
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A [`HistoryStore`] kept in memory.
///
/// Clones share the same log.
#[derive(Clone)]
pub struct MemoryHistory {
    entries: Arc<Mutex<BTreeMap<String, Vec<HistoryEntry>>>>,
    clock: Clock,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        MemoryHistory::new()
    }
}

impl fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHistory")
            .field("entries", &*self.lock())
            .finish()
    }
}

impl MemoryHistory {
    /// An empty log stamping entries with the current time.
    pub fn new() -> MemoryHistory {
        MemoryHistory::with_clock(Utc::now)
    }

    /// An empty log stamping entries with whatever `clock` returns.
    pub fn with_clock<F>(clock: F) -> MemoryHistory
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        MemoryHistory {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            clock: Arc::new(clock),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<HistoryEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every logged id.
    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

impl HistoryStore for MemoryHistory {
    fn log(&mut self, id: &str, entry: LogEntry, replace_last: bool) -> Result<DateTime<Utc>> {
        let timestamp = (self.clock)();
        let mut entries = self.lock();
        let history = entries.entry(id.to_string()).or_default();
        let replace = replace_last
            && history
                .last()
                .map_or(false, |last| last.action == entry.action);
        if replace {
            history.pop();
        }
        history.push(HistoryEntry::new(entry, timestamp));
        Ok(timestamp)
    }

    fn get_history(&self, id: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self.lock().get(id).cloned().unwrap_or_default())
    }

    fn get_action_timestamp(&self, id: &str, action: Action) -> Result<Option<DateTime<Utc>>> {
        Ok(self.lock().get(id).and_then(|history| {
            history
                .iter()
                .filter(|e| e.action == action)
                .map(|e| e.timestamp)
                .max()
        }))
    }

    fn get_by_timestamp(
        &self,
        op: Comparison,
        timestamp: DateTime<Utc>,
        filters: &[HistoryFilter],
        id_prefix: &str,
    ) -> Result<BTreeMap<String, DateTime<Utc>>> {
        let entries = self.lock();
        let mut found = BTreeMap::new();
        for (id, history) in entries.iter().filter(|(id, _)| id.starts_with(id_prefix)) {
            let latest = history
                .iter()
                .filter(|e| op.holds(&e.timestamp, &timestamp))
                .filter(|e| filters.iter().all(|f| f.accepts(e)))
                .map(|e| e.timestamp)
                .max();
            if let Some(latest) = latest {
                found.insert(id.clone(), latest);
            }
        }
        Ok(found)
    }
}
