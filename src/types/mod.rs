//! This module contains the types shared by the folder catalog, the share cache and the history
//! reconciler.

use std::collections::BTreeMap;

mod folder;
mod history;
mod namespace;

pub use self::folder::{Folder, FolderType, Parameters, TypeAnnotation};
pub use self::history::{
    Action, Bid, ChangeSet, HistoryEntry, LogEntry, ObjectIndex, Stamp, SyncParams,
};
pub use self::namespace::{Namespace, NamespaceElement, NamespaceKind};

/// Annotation values of several folders, keyed by folder path.
pub type Annotations = BTreeMap<String, String>;

/// Folders claiming the same default, by type and owner.
///
/// The first claimant of each list is the folder that was elected; every
/// further entry lost the election but is kept so that the collision can be
/// fixed by whoever consumes the list.
pub type Duplicates = BTreeMap<FolderType, BTreeMap<String, Vec<String>>>;
