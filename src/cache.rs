//! The persistent store behind the folder catalog and the share attribute cache.
//!
//! A [`CacheStore`] holds four things: the raw folder list and type
//! annotations as reported by the backend, the derived query results, a
//! long-term tier for data that should survive list synchronization, and the
//! serialized namespace. Writes are staged and become visible to other users of
//! the same store only once [`CacheStore::save`] is called.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::types::Annotations;

/// The derived indices kept in a [`CacheStore`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryKey {
    /// Folder path to resolved folder type.
    Types,
    /// Folder path to folder record.
    Folders,
    /// Folder path to owner.
    Owners,
    /// Folder type to folder path to folder record.
    ByType,
    /// Folder type to the elected personal default folder.
    Defaults,
    /// Owner to folder type to the elected default folder.
    PersonalDefaults,
    /// Folder type to owner to every folder claiming that owner's default.
    Duplicates,
    /// Folder path to share description.
    ShareDescriptions,
    /// Folder path to share parameters.
    ShareParameters,
}

impl QueryKey {
    /// The name the query is stored under.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKey::Types => "TYPES",
            QueryKey::Folders => "FOLDERS",
            QueryKey::Owners => "OWNERS",
            QueryKey::ByType => "BY_TYPE",
            QueryKey::Defaults => "DEFAULTS",
            QueryKey::PersonalDefaults => "PERSONAL_DEFAULTS",
            QueryKey::Duplicates => "DUPLICATES",
            QueryKey::ShareDescriptions => "SHARE_DESCRIPTIONS",
            QueryKey::ShareParameters => "SHARE_PARAMETERS",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage for the synchronized folder list and everything derived from it.
pub trait CacheStore {
    /// Replace the raw folder list and folder type annotations.
    fn store(&mut self, folders: &[String], annotations: &Annotations);

    /// The raw folder list, `None` before the first [`CacheStore::store`].
    fn folders(&self) -> Option<Vec<String>>;

    /// The raw folder type annotations, `None` before the first [`CacheStore::store`].
    fn folder_types(&self) -> Option<Annotations>;

    /// Whether a query result is stored under `key`.
    fn has_query(&self, key: QueryKey) -> bool;

    /// The query result stored under `key`.
    fn get_query(&self, key: QueryKey) -> Option<Value>;

    /// Store a query result.
    fn set_query(&mut self, key: QueryKey, value: Value);

    /// Whether a long-term value is stored under `key`.
    fn has_long_term(&self, key: QueryKey) -> bool;

    /// The long-term value stored under `key`.
    fn get_long_term(&self, key: QueryKey) -> Option<Value>;

    /// Store a long-term value.
    fn set_long_term(&mut self, key: QueryKey, value: Value);

    /// Whether a namespace was recorded. A store without one is cold.
    fn has_namespace(&self) -> bool;

    /// The serialized namespace.
    fn get_namespace(&self) -> Option<String>;

    /// Record the serialized namespace.
    fn set_namespace(&mut self, namespace: String);

    /// Publish every staged write at once.
    fn save(&mut self) -> Result<()>;
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
struct Snapshot {
    folders: Option<Vec<String>>,
    annotations: Option<Annotations>,
    queries: BTreeMap<&'static str, Value>,
    long_term: BTreeMap<&'static str, Value>,
    namespace: Option<String>,
}

/// A [`CacheStore`] kept in memory.
///
/// Clones are handles onto the same published state, which is how several
/// components (or processes) share one store. Each handle stages its own
/// writes on a private copy until it calls [`CacheStore::save`]; the last
/// handle to save wins.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    shared: Arc<Mutex<Snapshot>>,
    staged: Option<Snapshot>,
}

impl MemoryCache {
    /// An empty, cold cache.
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }

    fn published(&self) -> MutexGuard<'_, Snapshot> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        match self.staged {
            Some(ref staged) => f(staged),
            None => f(&*self.published()),
        }
    }

    fn stage(&mut self) -> &mut Snapshot {
        if self.staged.is_none() {
            let copy = self.published().clone();
            self.staged = Some(copy);
        }
        self.staged.get_or_insert_with(Snapshot::default)
    }

    /// Whether this handle holds writes nobody else can see yet.
    pub fn is_dirty(&self) -> bool {
        self.staged.is_some()
    }

    /// The published contents as JSON with a stable key order.
    pub fn dump(&self) -> Result<String> {
        Ok(serde_json::to_string(&*self.published())?)
    }
}

impl CacheStore for MemoryCache {
    fn store(&mut self, folders: &[String], annotations: &Annotations) {
        let staged = self.stage();
        staged.folders = Some(folders.to_vec());
        staged.annotations = Some(annotations.clone());
    }

    fn folders(&self) -> Option<Vec<String>> {
        self.read(|s| s.folders.clone())
    }

    fn folder_types(&self) -> Option<Annotations> {
        self.read(|s| s.annotations.clone())
    }

    fn has_query(&self, key: QueryKey) -> bool {
        self.read(|s| s.queries.contains_key(key.as_str()))
    }

    fn get_query(&self, key: QueryKey) -> Option<Value> {
        self.read(|s| s.queries.get(key.as_str()).cloned())
    }

    fn set_query(&mut self, key: QueryKey, value: Value) {
        self.stage().queries.insert(key.as_str(), value);
    }

    fn has_long_term(&self, key: QueryKey) -> bool {
        self.read(|s| s.long_term.contains_key(key.as_str()))
    }

    fn get_long_term(&self, key: QueryKey) -> Option<Value> {
        self.read(|s| s.long_term.get(key.as_str()).cloned())
    }

    fn set_long_term(&mut self, key: QueryKey, value: Value) {
        self.stage().long_term.insert(key.as_str(), value);
    }

    fn has_namespace(&self) -> bool {
        self.read(|s| s.namespace.is_some())
    }

    fn get_namespace(&self) -> Option<String> {
        self.read(|s| s.namespace.clone())
    }

    fn set_namespace(&mut self, namespace: String) {
        self.stage().namespace = Some(namespace);
    }

    fn save(&mut self) -> Result<()> {
        if let Some(staged) = self.staged.take() {
            *self.published() = staged;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cold_until_namespace_saved() {
        let mut cache = MemoryCache::new();
        assert!(!cache.has_namespace());
        assert_eq!(cache.folders(), None);
        cache.set_namespace("{}".into());
        cache.save().unwrap();
        assert!(cache.has_namespace());
    }

    #[test]
    fn writes_are_invisible_to_other_handles_until_saved() {
        let mut writer = MemoryCache::new();
        let reader = writer.clone();
        writer.store(&["INBOX".to_string()], &Annotations::new());
        writer.set_query(QueryKey::Types, json!({"INBOX": "mail"}));
        assert!(writer.has_query(QueryKey::Types));
        assert!(!reader.has_query(QueryKey::Types));
        assert_eq!(reader.folders(), None);

        writer.save().unwrap();
        assert!(!writer.is_dirty());
        assert_eq!(reader.get_query(QueryKey::Types), Some(json!({"INBOX": "mail"})));
        assert_eq!(reader.folders(), Some(vec!["INBOX".to_string()]));
    }

    #[test]
    fn tiers_are_separate() {
        let mut cache = MemoryCache::new();
        cache.set_long_term(QueryKey::ShareParameters, json!({}));
        cache.save().unwrap();
        assert!(cache.has_long_term(QueryKey::ShareParameters));
        assert!(!cache.has_query(QueryKey::ShareParameters));
    }

    #[test]
    fn dump_is_stable() {
        let mut cache = MemoryCache::new();
        cache.set_query(QueryKey::Owners, json!({"b": 1, "a": 2}));
        cache.set_query(QueryKey::Defaults, json!({}));
        cache.save().unwrap();
        let first = cache.dump().unwrap();
        cache.set_query(QueryKey::Defaults, json!({}));
        cache.set_query(QueryKey::Owners, json!({"a": 2, "b": 1}));
        cache.save().unwrap();
        assert_eq!(first, cache.dump().unwrap());
        assert!(first.find("DEFAULTS").unwrap() < first.find("OWNERS").unwrap());
    }
}
