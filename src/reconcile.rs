//! Keeps the object history of a folder in step with the backend.
//!
//! Backends report changes as pairs of added and removed backend ids. An
//! update shows up as the removal of the old id and the addition of a new one
//! for the same uid, so a removal is only logged as `delete` once the uid is
//! confirmed gone from the folder.
//!
//! History ids are `application:share:uid`. The application comes from the
//! folder type, the share from the folder's `share_name` parameter.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::error::{ConfigurationError, Result};
use crate::history::{Comparison, HistoryStore};
use crate::storage::Storage;
use crate::types::{
    Action, Bid, ChangeSet, FolderType, HistoryEntry, LogEntry, ObjectIndex, Parameters, Stamp,
    SyncParams,
};

/// What the reconciler needs to know about a folder.
#[derive(Clone, Debug, PartialEq)]
pub struct FolderContext<'a> {
    /// The folder path.
    pub path: &'a str,
    /// The resolved folder type.
    pub folder_type: FolderType,
    /// The folder's share parameters.
    pub parameters: Parameters,
}

/// The part of the history owned by one share.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    application: String,
    share: String,
}

impl Scope {
    /// The prefix of every object id in the share.
    pub fn prefix(&self) -> String {
        format!("{}:{}:", self.application, self.share)
    }

    /// The id the share's synchronization markers are logged under.
    pub fn marker(&self) -> String {
        format!("{}:{}", self.application, self.share)
    }
}

/// The most recent entry. Of two entries logged at the same instant, a
/// `delete` counts as the later one.
pub fn latest(history: &[HistoryEntry]) -> Option<&HistoryEntry> {
    history.iter().fold(None, |best, entry| match best {
        Some(best) if best.timestamp > entry.timestamp => Some(best),
        Some(best) if best.timestamp == entry.timestamp && best.action == Action::Delete => {
            Some(best)
        }
        _ => Some(entry),
    })
}

/// Reconciles an object history with a folder's content.
#[derive(Debug)]
pub struct HistoryReconciler<H> {
    history: H,
    applications: BTreeMap<FolderType, String>,
}

impl<H: HistoryStore> HistoryReconciler<H> {
    /// A reconciler logging to `history`, attributing folder types to applications.
    pub fn new(history: H, applications: BTreeMap<FolderType, String>) -> HistoryReconciler<H> {
        HistoryReconciler {
            history,
            applications,
        }
    }

    /// The history store.
    pub fn history(&self) -> &H {
        &self.history
    }

    /// The history scope of `folder`.
    pub fn scope(
        &self,
        folder: &FolderContext<'_>,
    ) -> std::result::Result<Scope, ConfigurationError> {
        let application = self
            .applications
            .get(&folder.folder_type)
            .ok_or_else(|| ConfigurationError::NoApplication(folder.folder_type.clone()))?;
        let share = folder
            .parameters
            .share_name()
            .ok_or_else(|| ConfigurationError::NoShareName(folder.path.to_string()))?;
        Ok(Scope {
            application: application.clone(),
            share: share.to_string(),
        })
    }

    /// Log what changed in `folder`.
    ///
    /// Folders that cannot be attributed to an application and share have no
    /// history; they are skipped without error.
    pub fn synchronize<S: Storage + ?Sized>(
        &mut self,
        backend: &mut S,
        folder: &FolderContext<'_>,
        params: SyncParams,
    ) -> Result<()> {
        match self.scope(folder) {
            Ok(scope) => self.reconcile(backend, folder.path, &scope.prefix(), params),
            Err(e) => {
                debug!("no history for {}: {}", folder.path, e);
                Ok(())
            }
        }
    }

    pub(crate) fn reconcile<S: Storage + ?Sized>(
        &mut self,
        backend: &mut S,
        path: &str,
        prefix: &str,
        params: SyncParams,
    ) -> Result<()> {
        let stamp = backend.stamp(path)?;
        match params.changes {
            Some(ref changes) if !params.is_reset => {
                debug!(
                    "applying {} additions and {} removals to {}",
                    changes.added.len(),
                    changes.deleted.len(),
                    prefix
                );
                self.apply(backend, path, prefix, &stamp, changes)
            }
            _ => {
                debug!("comparing the complete content of {} with {}", path, prefix);
                self.complete(backend, path, prefix, &stamp)
            }
        }
    }

    fn apply<S: Storage + ?Sized>(
        &mut self,
        backend: &mut S,
        path: &str,
        prefix: &str,
        stamp: &Stamp,
        changes: &ChangeSet,
    ) -> Result<()> {
        for (bid, uid) in &changes.added {
            self.update_log(&format!("{}{}", prefix, uid), bid, stamp)?;
        }
        let mut current: Option<ObjectIndex> = None;
        for (bid, uid) in &changes.deleted {
            let id = format!("{}{}", prefix, uid);
            if self.history.get_history(&id)?.is_empty() {
                trace!("{} was never logged, ignoring its removal", uid);
                continue;
            }
            if current.is_none() {
                current = Some(backend.object_index(path)?);
            }
            if current.as_ref().map_or(false, |c| c.contains_key(uid)) {
                trace!("{} was replaced, not deleted", uid);
                continue;
            }
            let entry = LogEntry::object(Action::Delete, bid.clone(), stamp.clone());
            self.history.log(&id, entry, true)?;
        }
        Ok(())
    }

    fn complete<S: Storage + ?Sized>(
        &mut self,
        backend: &mut S,
        path: &str,
        prefix: &str,
        stamp: &Stamp,
    ) -> Result<()> {
        let objects = backend.object_index(path)?;
        let mut seen = BTreeSet::new();
        for (uid, bid) in &objects {
            let id = format!("{}{}", prefix, uid);
            self.update_log(&id, bid, stamp)?;
            seen.insert(id);
        }

        let logged = self
            .history
            .get_by_timestamp(Comparison::Greater, DateTime::<Utc>::MIN_UTC, &[], prefix)?;
        for id in logged.keys().filter(|id| !seen.contains(*id)) {
            let history = self.history.get_history(id)?;
            let last = match latest(&history) {
                Some(last) if last.action != Action::Delete => last,
                _ => continue,
            };
            trace!("{} is gone", id);
            let entry = LogEntry {
                action: Action::Delete,
                bid: last.bid.clone(),
                stamp: Some(stamp.clone()),
            };
            self.history.log(id, entry, true)?;
        }
        Ok(())
    }

    fn update_log(&mut self, id: &str, bid: &Bid, stamp: &Stamp) -> Result<()> {
        let history = self.history.get_history(id)?;
        let action = match latest(&history) {
            None => Some(Action::Add),
            Some(last) if last.action == Action::Delete => Some(Action::Add),
            Some(last) => {
                let replaced = last.bid.as_ref() != Some(bid);
                let reset = last.stamp.as_ref().map_or(false, |s| s.is_reset(stamp));
                if replaced || reset {
                    Some(Action::Modify)
                } else {
                    None
                }
            }
        };
        match action {
            Some(action) => {
                trace!("{} {}", action, id);
                let entry = LogEntry::object(action, bid.clone(), stamp.clone());
                self.history.log(id, entry, false)?;
            }
            None => trace!("{} unchanged", id),
        }
        Ok(())
    }
}

/// A [`HistoryReconciler`] that notices when another process synchronized a
/// share in the meantime.
///
/// After every pass a `sync` marker is logged for the share. A caller whose
/// view of the folder predates the latest marker may hold a change set that
/// misses what the other process saw, so the change set is dropped and the
/// complete folder content is compared instead.
#[derive(Debug)]
pub struct CachedHistoryReconciler<H> {
    inner: HistoryReconciler<H>,
    last_sync: HashMap<String, DateTime<Utc>>,
}

impl<H: HistoryStore> CachedHistoryReconciler<H> {
    /// Wrap a reconciler.
    pub fn new(inner: HistoryReconciler<H>) -> CachedHistoryReconciler<H> {
        CachedHistoryReconciler {
            inner,
            last_sync: HashMap::new(),
        }
    }

    /// The history store.
    pub fn history(&self) -> &H {
        self.inner.history()
    }

    /// When this process last completed a pass over `scope`.
    pub fn last_sync(&self, scope: &Scope) -> Option<DateTime<Utc>> {
        self.last_sync.get(&scope.marker()).copied()
    }

    /// Log what changed in `folder` and record the pass.
    pub fn synchronize<S: Storage + ?Sized>(
        &mut self,
        backend: &mut S,
        folder: &FolderContext<'_>,
        mut params: SyncParams,
    ) -> Result<()> {
        let scope = match self.inner.scope(folder) {
            Ok(scope) => scope,
            Err(e) => {
                debug!("no history for {}: {}", folder.path, e);
                return Ok(());
            }
        };
        let marker = scope.marker();

        if params.changes.is_some() {
            let recorded = self
                .inner
                .history
                .get_action_timestamp(&marker, Action::Sync)?;
            if let Some(recorded) = recorded {
                let effective = params
                    .last_sync
                    .or_else(|| self.last_sync.get(&marker).copied());
                if effective.map_or(true, |last| last < recorded) {
                    warn!(
                        "{} was synchronized elsewhere at {}, discarding reported changes",
                        marker, recorded
                    );
                    params.changes = None;
                }
            }
        }

        self.inner
            .reconcile(backend, folder.path, &scope.prefix(), params)?;
        let timestamp = self.inner.history.log(&marker, LogEntry::sync(), true)?;
        self.last_sync.insert(marker, timestamp);
        Ok(())
    }
}
