//! The cached folder list.
//!
//! A [`FolderCatalog`] mirrors the backend's folder list, type annotations
//! and namespace into a [`CacheStore`] together with every query derived
//! from them. All derived data is recomputed from the raw data in one place
//! and written with a single [`CacheStore::save`], so readers never see a
//! half-updated catalog.
//!
//! Until the first [`FolderCatalog::synchronize`] the catalog is cold: every
//! accessor returns `None` and incremental updates are skipped.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cache::{CacheStore, QueryKey};
use crate::driver::ANNOTATION_FOLDER_TYPE;
use crate::error::Result;
use crate::index::{default_claim, FolderIndex};
use crate::storage::Storage;
use crate::types::{Annotations, Duplicates, Folder, FolderType, Namespace};

/// Receives folder lifecycle events after the backend applied them.
pub trait FolderListener {
    /// `folder` was created with the given raw type annotation.
    fn folder_created(&mut self, folder: &str, folder_type: Option<&str>) -> Result<()>;

    /// `folder` was deleted.
    fn folder_deleted(&mut self, folder: &str) -> Result<()>;

    /// `old` was renamed to `new`.
    fn folder_renamed(&mut self, old: &str, new: &str) -> Result<()>;
}

struct Listing {
    namespace: Namespace,
    folders: Vec<String>,
    annotations: Annotations,
}

/// Folder list, types, owners and default folders kept in a cache.
#[derive(Debug)]
pub struct FolderCatalog<C> {
    cache: C,
}

impl<C: CacheStore> FolderCatalog<C> {
    /// A catalog backed by `cache`.
    pub fn new(cache: C) -> FolderCatalog<C> {
        FolderCatalog { cache }
    }

    /// Whether the catalog holds a synchronized folder list.
    pub fn is_warm(&self) -> bool {
        self.cache.has_namespace()
    }

    /// Replace the catalog with the backend's current folder list.
    ///
    /// Nothing is written unless the backend answered every request.
    pub fn synchronize<S: Storage + ?Sized>(&mut self, backend: &mut S) -> Result<()> {
        let namespace = backend.namespace()?;
        let folders = backend.list_folders()?;
        let annotations = backend.list_annotation(ANNOTATION_FOLDER_TYPE)?;
        debug!("synchronizing {} folders", folders.len());
        self.commit(Listing {
            namespace,
            folders,
            annotations,
        })
    }

    fn load(&self) -> Result<Option<Listing>> {
        let namespace = match self.cache.get_namespace() {
            Some(namespace) => serde_json::from_str(&namespace)?,
            None => return Ok(None),
        };
        Ok(Some(Listing {
            namespace,
            folders: self.cache.folders().unwrap_or_default(),
            annotations: self.cache.folder_types().unwrap_or_default(),
        }))
    }

    fn commit(&mut self, listing: Listing) -> Result<()> {
        let index = FolderIndex::build(
            &listing.folders,
            &listing.annotations,
            &listing.namespace,
        );
        let namespace = serde_json::to_string(&listing.namespace)?;
        let queries = index.queries()?;

        self.cache.store(&listing.folders, &listing.annotations);
        self.cache.set_namespace(namespace);
        for (key, value) in queries {
            self.cache.set_query(key, value);
        }
        self.cache.save()
    }

    fn update<F>(&mut self, what: &str, patch: F) -> Result<()>
    where
        F: FnOnce(&mut Listing),
    {
        match self.load()? {
            Some(mut listing) => {
                patch(&mut listing);
                self.commit(listing)
            }
            None => {
                debug!("catalog is cold, skipping update after {}", what);
                Ok(())
            }
        }
    }

    /// Record a folder the backend just created.
    pub fn update_after_create_folder(
        &mut self,
        folder: &str,
        folder_type: Option<&str>,
    ) -> Result<()> {
        self.update("create", |listing| {
            if !listing.folders.iter().any(|f| f == folder) {
                listing.folders.push(folder.to_string());
            }
            if let Some(folder_type) = folder_type {
                listing
                    .annotations
                    .insert(folder.to_string(), folder_type.to_string());
            }
        })
    }

    /// Forget a folder the backend just deleted.
    pub fn update_after_delete_folder(&mut self, folder: &str) -> Result<()> {
        self.update("delete", |listing| {
            listing.folders.retain(|f| f != folder);
            listing.annotations.remove(folder);
        })
    }

    /// Move a folder the backend just renamed, keeping its listing position.
    pub fn update_after_rename_folder(&mut self, old: &str, new: &str) -> Result<()> {
        self.update("rename", |listing| {
            if let Some(f) = listing.folders.iter_mut().find(|f| f.as_str() == old) {
                *f = new.to_string();
            }
            if let Some(annotation) = listing.annotations.remove(old) {
                listing.annotations.insert(new.to_string(), annotation);
            }
        })
    }

    /// Record a folder type annotation the backend just stored.
    pub fn update_after_set_type(&mut self, folder: &str, annotation: &str) -> Result<()> {
        self.update("set type", |listing| {
            listing
                .annotations
                .insert(folder.to_string(), annotation.to_string());
        })
    }

    /// Make `folder` the default folder of its type.
    ///
    /// `previous` is demoted to the bare type. Both annotations are written
    /// to `backend` before the catalog is recomputed; if the second write
    /// fails, the first is still recorded. The policy checks use the cached
    /// annotations when the catalog is warm and the backend otherwise.
    pub fn set_default<S: Storage + ?Sized>(
        &mut self,
        backend: &mut S,
        folder: &str,
        previous: Option<&str>,
    ) -> Result<()> {
        match self.load()? {
            Some(mut listing) => {
                let current = listing.annotations.get(folder).map(String::as_str);
                let writes = default_claim(&listing.namespace, folder, current, previous)?;
                let mut written = 0;
                let mut outcome = Ok(());
                for (path, value) in writes {
                    if let Err(e) = backend.set_annotation(&path, ANNOTATION_FOLDER_TYPE, &value) {
                        outcome = Err(e);
                        break;
                    }
                    listing.annotations.insert(path, value);
                    written += 1;
                }
                if written > 0 {
                    let committed = self.commit(listing);
                    outcome.and(committed)
                } else {
                    outcome
                }
            }
            None => {
                let namespace = backend.namespace()?;
                let current = backend.get_annotation(folder, ANNOTATION_FOLDER_TYPE)?;
                let writes = default_claim(&namespace, folder, current.as_deref(), previous)?;
                for (path, value) in writes {
                    backend.set_annotation(&path, ANNOTATION_FOLDER_TYPE, &value)?;
                }
                Ok(())
            }
        }
    }

    /// Default claims that lost an election.
    ///
    /// A cache written without this query is resolved again from its raw
    /// folder list.
    pub fn duplicate_defaults(&self) -> Result<Option<Duplicates>> {
        if let Some(duplicates) = self.query(QueryKey::Duplicates)? {
            return Ok(Some(duplicates));
        }
        Ok(self.load()?.map(|listing| {
            FolderIndex::build(&listing.folders, &listing.annotations, &listing.namespace)
                .duplicates
        }))
    }

    fn query<T: DeserializeOwned>(&self, key: QueryKey) -> Result<Option<T>> {
        if !self.is_warm() {
            return Ok(None);
        }
        match self.cache.get_query(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// The raw folder list.
    pub fn folders(&self) -> Option<Vec<String>> {
        if !self.is_warm() {
            return None;
        }
        self.cache.folders()
    }

    /// The raw folder type annotations.
    pub fn annotations(&self) -> Option<Annotations> {
        if !self.is_warm() {
            return None;
        }
        self.cache.folder_types()
    }

    /// The cached namespace.
    pub fn namespace(&self) -> Result<Option<Namespace>> {
        Ok(self.load()?.map(|listing| listing.namespace))
    }

    /// Folder path to resolved type.
    pub fn folder_types(&self) -> Result<Option<BTreeMap<String, FolderType>>> {
        self.query(QueryKey::Types)
    }

    /// Folder path to folder record.
    pub fn folder_records(&self) -> Result<Option<BTreeMap<String, Folder>>> {
        self.query(QueryKey::Folders)
    }

    /// Folder path to owner.
    pub fn owners(&self) -> Result<Option<BTreeMap<String, String>>> {
        self.query(QueryKey::Owners)
    }

    /// Folder type to folder path to folder record.
    pub fn by_type(&self) -> Result<Option<BTreeMap<FolderType, BTreeMap<String, Folder>>>> {
        self.query(QueryKey::ByType)
    }

    /// The authenticated user's default folder of each type.
    pub fn defaults(&self) -> Result<Option<BTreeMap<FolderType, String>>> {
        self.query(QueryKey::Defaults)
    }

    /// Every owner's default folder of each type.
    pub fn personal_defaults(
        &self,
    ) -> Result<Option<BTreeMap<String, BTreeMap<FolderType, String>>>> {
        self.query(QueryKey::PersonalDefaults)
    }
}

impl<C: CacheStore> FolderListener for FolderCatalog<C> {
    fn folder_created(&mut self, folder: &str, folder_type: Option<&str>) -> Result<()> {
        self.update_after_create_folder(folder, folder_type)
    }

    fn folder_deleted(&mut self, folder: &str) -> Result<()> {
        self.update_after_delete_folder(folder)
    }

    fn folder_renamed(&mut self, old: &str, new: &str) -> Result<()> {
        self.update_after_rename_folder(old, new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::driver::mock::MockDriver;
    use crate::driver::Driver;
    use crate::error::{Error, PolicyViolation};
    use crate::storage::Base;

    fn backend() -> (MockDriver, Base<MockDriver>) {
        let driver = MockDriver::new("test")
            .with_folder("INBOX", None)
            .with_folder("Calendar", Some("event.default"))
            .with_folder("Calendar1", Some("event"))
            .with_folder("shared/Calendar", Some("event"));
        (driver.clone(), Base::new(driver))
    }

    fn synchronized() -> (MockDriver, Base<MockDriver>, MemoryCache, FolderCatalog<MemoryCache>) {
        let (driver, mut base) = backend();
        let cache = MemoryCache::new();
        let mut catalog = FolderCatalog::new(cache.clone());
        catalog.synchronize(&mut base).unwrap();
        (driver, base, cache, catalog)
    }

    #[test]
    fn cold_catalog() {
        let mut catalog = FolderCatalog::new(MemoryCache::new());
        assert!(!catalog.is_warm());
        assert_eq!(catalog.folders(), None);
        assert_eq!(catalog.folder_types().unwrap(), None);
        assert_eq!(catalog.duplicate_defaults().unwrap(), None);
        catalog.update_after_create_folder("Notes", Some("note")).unwrap();
        catalog.update_after_delete_folder("Notes").unwrap();
        catalog.update_after_rename_folder("A", "B").unwrap();
        assert!(!catalog.is_warm());
    }

    #[test]
    fn synchronize_fills_every_query() {
        let (_, _, cache, catalog) = synchronized();
        assert!(catalog.is_warm());
        assert_eq!(
            catalog.folders().unwrap(),
            vec!["INBOX", "Calendar", "Calendar1", "shared/Calendar"]
        );
        assert_eq!(catalog.folder_types().unwrap().unwrap()["Calendar1"], FolderType::Event);
        assert_eq!(catalog.owners().unwrap().unwrap()["shared/Calendar"], "anonymous");
        assert_eq!(catalog.defaults().unwrap().unwrap()[&FolderType::Event], "Calendar");
        assert_eq!(
            catalog.by_type().unwrap().unwrap()[&FolderType::Event].len(),
            3
        );
        for key in [
            QueryKey::Types,
            QueryKey::Folders,
            QueryKey::Owners,
            QueryKey::ByType,
            QueryKey::Defaults,
            QueryKey::PersonalDefaults,
        ] {
            assert!(cache.has_query(key), "{} missing", key);
        }
    }

    #[test]
    fn synchronize_twice_is_idempotent() {
        let (_, mut base, cache, mut catalog) = synchronized();
        let first = cache.dump().unwrap();
        catalog.synchronize(&mut base).unwrap();
        assert_eq!(first, cache.dump().unwrap());
    }

    #[test]
    fn failed_synchronize_keeps_the_old_catalog() {
        let (driver, mut base, cache, mut catalog) = synchronized();
        let before = cache.dump().unwrap();
        driver.clone().create_folder("Notes").unwrap();
        driver.fail("list_annotation");
        assert!(catalog.synchronize(&mut base).is_err());
        assert_eq!(before, cache.dump().unwrap());
    }

    #[test]
    fn incremental_updates_follow_the_backend() {
        let (driver, _, _, mut catalog) = synchronized();
        let mut backend = driver.clone();
        backend.create_folder("Notes").unwrap();
        catalog.update_after_create_folder("Notes", Some("note")).unwrap();
        backend.rename_folder("Calendar1", "Work").unwrap();
        catalog.update_after_rename_folder("Calendar1", "Work").unwrap();
        backend.delete_folder("INBOX").unwrap();
        catalog.update_after_delete_folder("INBOX").unwrap();

        assert_eq!(catalog.folders().unwrap(), driver.folders());
        let types = catalog.folder_types().unwrap().unwrap();
        assert_eq!(types["Notes"], FolderType::Note);
        assert_eq!(types["Work"], FolderType::Event);
        assert!(!types.contains_key("INBOX"));
        assert!(!catalog.annotations().unwrap().contains_key("Calendar1"));
    }

    #[test]
    fn set_default_promotes_and_demotes() {
        let (driver, mut base, _, mut catalog) = synchronized();
        catalog
            .set_default(&mut base, "Calendar1", Some("Calendar"))
            .unwrap();
        assert_eq!(
            driver.annotation("Calendar1", ANNOTATION_FOLDER_TYPE).as_deref(),
            Some("event.default")
        );
        assert_eq!(
            driver.annotation("Calendar", ANNOTATION_FOLDER_TYPE).as_deref(),
            Some("event")
        );
        assert_eq!(catalog.defaults().unwrap().unwrap()[&FolderType::Event], "Calendar1");
        assert!(catalog.duplicate_defaults().unwrap().unwrap().is_empty());
    }

    #[test]
    fn set_default_on_shared_folder_is_rejected() {
        let (driver, mut base, cache, mut catalog) = synchronized();
        let before = cache.dump().unwrap();
        driver.clear_calls();
        match catalog.set_default(&mut base, "shared/Calendar", None) {
            Err(Error::Policy(PolicyViolation::NotPersonal(folder))) => {
                assert_eq!(folder, "shared/Calendar")
            }
            other => unreachable!("expected a policy violation, got {:?}", other),
        }
        assert_eq!(before, cache.dump().unwrap());
        assert_eq!(driver.count("set_annotation"), 0);
    }

    #[test]
    fn set_default_on_untyped_folder_is_rejected() {
        let (_, mut base, _, mut catalog) = synchronized();
        match catalog.set_default(&mut base, "INBOX", None) {
            Err(Error::Policy(PolicyViolation::Untyped(_))) => {}
            other => unreachable!("expected a policy violation, got {:?}", other),
        }
    }

    #[test]
    fn set_default_while_cold_writes_through() {
        let (driver, mut base) = backend();
        let mut catalog = FolderCatalog::new(MemoryCache::new());
        catalog.set_default(&mut base, "Calendar1", None).unwrap();
        assert_eq!(
            driver.annotation("Calendar1", ANNOTATION_FOLDER_TYPE).as_deref(),
            Some("event.default")
        );
        assert!(!catalog.is_warm());
        assert!(catalog.set_default(&mut base, "shared/Calendar", None).is_err());
    }

    #[test]
    fn interrupted_set_default_keeps_the_written_half() {
        let (driver, mut base, _, mut catalog) = synchronized();
        driver.clone().delete_folder("Calendar1").unwrap();
        match catalog.set_default(&mut base, "Calendar1", Some("Calendar")) {
            Err(e) => assert!(e.is_backend()),
            Ok(()) => unreachable!("Calendar1 is gone from the backend"),
        }
        assert_eq!(
            driver.annotation("Calendar", ANNOTATION_FOLDER_TYPE).as_deref(),
            Some("event")
        );
        assert_eq!(catalog.annotations().unwrap()["Calendar"], "event");
        assert!(!catalog.defaults().unwrap().unwrap().contains_key(&FolderType::Event));
    }

    #[test]
    fn duplicates_follow_another_handle() {
        let (driver, mut base, cache, early) = synchronized();
        assert!(early.duplicate_defaults().unwrap().unwrap().is_empty());

        driver.clone().create_folder("Work").unwrap();
        driver
            .clone()
            .set_annotation("Work", ANNOTATION_FOLDER_TYPE, "event.default")
            .unwrap();
        let mut late = FolderCatalog::new(cache);
        late.synchronize(&mut base).unwrap();

        assert!(early.folder_records().unwrap().unwrap()["Work"].default);
        let duplicates = early.duplicate_defaults().unwrap().unwrap();
        assert_eq!(duplicates[&FolderType::Event]["test"], vec!["Calendar", "Work"]);
        assert_eq!(Some(duplicates), late.duplicate_defaults().unwrap());
    }

    #[test]
    fn duplicates_are_recomputed_by_a_fresh_process() {
        let driver = MockDriver::new("test")
            .with_folder("Calendar", Some("event.default"))
            .with_folder("Work", Some("event.default"));
        let mut base = Base::new(driver);
        let cache = MemoryCache::new();
        FolderCatalog::new(cache.clone())
            .synchronize(&mut base)
            .unwrap();

        let fresh = FolderCatalog::new(cache);
        let duplicates = fresh.duplicate_defaults().unwrap().unwrap();
        assert_eq!(duplicates[&FolderType::Event]["test"], vec!["Calendar", "Work"]);
        assert_eq!(fresh.defaults().unwrap().unwrap()[&FolderType::Event], "Calendar");
    }
}
