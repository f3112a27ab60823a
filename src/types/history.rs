use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A backend-assigned identifier for one stored instance of an object.
///
/// Backend ids are opaque: replacing an object yields a new id, but nothing may
/// be inferred from how two ids compare. The derived ordering only exists so
/// that ids can key sorted maps.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bid(String);

impl Bid {
    /// Wrap a backend id.
    pub fn new(id: impl Into<String>) -> Self {
        Bid(id.into())
    }

    /// The raw backend id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Bid {
    fn from(s: &str) -> Self {
        Bid::new(s)
    }
}

impl From<String> for Bid {
    fn from(s: String) -> Self {
        Bid(s)
    }
}

impl From<u32> for Bid {
    fn from(uid: u32) -> Self {
        Bid(uid.to_string())
    }
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A synchronization token describing the state of a folder's content.
///
/// Stamps are only ever compared through [`Stamp::is_reset`]: a reset means
/// that backend ids seen under the older stamp can no longer be trusted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    validity: String,
    token: String,
}

impl Stamp {
    /// Build a stamp from the folder's id validity and its current content token.
    pub fn new(validity: impl Into<String>, token: impl Into<String>) -> Self {
        Stamp {
            validity: validity.into(),
            token: token.into(),
        }
    }

    /// Whether the backend invalidated its ids between `other` and `self`.
    pub fn is_reset(&self, other: &Stamp) -> bool {
        self.validity != other.validity
    }
}

/// The kind of a history entry.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The object appeared.
    Add,
    /// The object was replaced or its folder was reset.
    Modify,
    /// The object disappeared.
    Delete,
    /// A synchronization pass completed for a whole folder.
    Sync,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Add => "add",
            Action::Modify => "modify",
            Action::Delete => "delete",
            Action::Sync => "sync",
        })
    }
}

/// What gets handed to a history store; the store adds the timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// What happened.
    pub action: Action,
    /// The backend id the action refers to.
    pub bid: Option<Bid>,
    /// The folder stamp at the time of the action.
    pub stamp: Option<Stamp>,
}

impl LogEntry {
    /// An object action.
    pub fn object(action: Action, bid: Bid, stamp: Stamp) -> Self {
        LogEntry {
            action,
            bid: Some(bid),
            stamp: Some(stamp),
        }
    }

    /// A folder synchronization marker.
    pub fn sync() -> Self {
        LogEntry {
            action: Action::Sync,
            bid: None,
            stamp: None,
        }
    }
}

/// One recorded history entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// What happened.
    pub action: Action,
    /// The backend id the action refers to.
    pub bid: Option<Bid>,
    /// The folder stamp at the time of the action.
    pub stamp: Option<Stamp>,
    /// When the entry was logged.
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Stamp a log entry.
    pub fn new(entry: LogEntry, timestamp: DateTime<Utc>) -> Self {
        HistoryEntry {
            action: entry.action,
            bid: entry.bid,
            stamp: entry.stamp,
            timestamp,
        }
    }
}

/// The uid of every object in a folder mapped to its current backend id.
pub type ObjectIndex = BTreeMap<String, Bid>;

/// Changes a backend reported since the previous synchronization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Newly stored backend ids and the uid of the object each one holds.
    pub added: BTreeMap<Bid, String>,
    /// Removed backend ids and the uid of the object each one held.
    pub deleted: BTreeMap<Bid, String>,
}

impl ChangeSet {
    /// Record an added object.
    pub fn add(mut self, bid: impl Into<Bid>, uid: impl Into<String>) -> Self {
        self.added.insert(bid.into(), uid.into());
        self
    }

    /// Record a removed object.
    pub fn delete(mut self, bid: impl Into<Bid>, uid: impl Into<String>) -> Self {
        self.deleted.insert(bid.into(), uid.into());
        self
    }
}

/// Parameters of a history synchronization pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncParams {
    /// Reported changes. Without them, the complete folder content is compared with the log.
    pub changes: Option<ChangeSet>,
    /// When the caller's view of the folder was last synchronized.
    pub last_sync: Option<DateTime<Utc>>,
    /// The backend invalidated its ids; reported changes cannot be applied.
    pub is_reset: bool,
}

impl SyncParams {
    /// Synchronize by applying reported changes.
    pub fn changes(changes: ChangeSet) -> Self {
        SyncParams {
            changes: Some(changes),
            ..SyncParams::default()
        }
    }

    /// Declare when the caller last synchronized.
    pub fn last_sync(mut self, last_sync: DateTime<Utc>) -> Self {
        self.last_sync = Some(last_sync);
        self
    }
}
