use std::collections::BTreeMap;

use tracing::trace;

use crate::cache::CacheStore;
use crate::catalog::{FolderCatalog, FolderListener};
use crate::driver::{
    ANNOTATION_FOLDER_TYPE, ANNOTATION_SHARE_DESCRIPTION, ANNOTATION_SHARE_PARAMETERS,
};
use crate::error::{BackendError, Result};
use crate::history::HistoryStore;
use crate::reconcile::{CachedHistoryReconciler, FolderContext, HistoryReconciler};
use crate::share::ShareAttributeCache;
use crate::types::{
    Annotations, Duplicates, Folder, FolderType, Namespace, ObjectIndex, Parameters, Stamp,
    SyncParams,
};

use super::Storage;

/// Serves folder and share queries from a [`CacheStore`].
///
/// While the catalog is cold, queries fall through to the layer below.
/// Writes always go to the layer below first; the caches are only updated
/// once the write succeeded.
#[derive(Debug)]
pub struct Cache<S, C, H> {
    inner: S,
    catalog: FolderCatalog<C>,
    shares: ShareAttributeCache<C>,
    history: CachedHistoryReconciler<H>,
}

impl<S, C, H> Cache<S, C, H>
where
    S: Storage,
    C: CacheStore + Clone,
    H: HistoryStore,
{
    /// Cache the folders of `inner` in `cache` and log object history to `history`.
    ///
    /// `applications` maps folder types to the application name used in history ids.
    pub fn new(
        inner: S,
        cache: C,
        history: H,
        applications: BTreeMap<FolderType, String>,
    ) -> Cache<S, C, H> {
        Cache {
            inner,
            catalog: FolderCatalog::new(cache.clone()),
            shares: ShareAttributeCache::new(cache),
            history: CachedHistoryReconciler::new(HistoryReconciler::new(history, applications)),
        }
    }

    /// The folder catalog.
    pub fn catalog(&self) -> &FolderCatalog<C> {
        &self.catalog
    }

    /// The history reconciler.
    pub fn history(&self) -> &CachedHistoryReconciler<H> {
        &self.history
    }

    fn notify<F>(&mut self, mut event: F) -> Result<()>
    where
        F: FnMut(&mut dyn FolderListener) -> Result<()>,
    {
        let listeners: [&mut dyn FolderListener; 2] = [&mut self.catalog, &mut self.shares];
        for listener in listeners {
            event(listener)?;
        }
        Ok(())
    }
}

impl<S, C, H> Storage for Cache<S, C, H>
where
    S: Storage,
    C: CacheStore + Clone,
    H: HistoryStore,
{
    fn list_folders(&mut self) -> Result<Vec<String>> {
        match self.catalog.folders() {
            Some(folders) => Ok(folders),
            None => self.inner.list_folders(),
        }
    }

    fn list_annotation(&mut self, key: &str) -> Result<Annotations> {
        if key == ANNOTATION_FOLDER_TYPE {
            if let Some(annotations) = self.catalog.annotations() {
                return Ok(annotations);
            }
        }
        self.inner.list_annotation(key)
    }

    fn get_annotation(&mut self, folder: &str, key: &str) -> Result<Option<String>> {
        self.inner.get_annotation(folder, key)
    }

    fn set_annotation(&mut self, folder: &str, key: &str, value: &str) -> Result<()> {
        self.inner.set_annotation(folder, key, value)?;
        match key {
            ANNOTATION_FOLDER_TYPE => self.catalog.update_after_set_type(folder, value),
            ANNOTATION_SHARE_DESCRIPTION | ANNOTATION_SHARE_PARAMETERS => {
                self.shares.invalidate(folder)
            }
            _ => Ok(()),
        }
    }

    fn namespace(&mut self) -> Result<Namespace> {
        match self.catalog.namespace()? {
            Some(namespace) => Ok(namespace),
            None => self.inner.namespace(),
        }
    }

    fn create_folder(&mut self, folder: &str, folder_type: Option<&str>) -> Result<()> {
        // The folder must reach the catalog even if typing it fails.
        self.inner.create_folder(folder, None)?;
        self.notify(|listener| listener.folder_created(folder, None))?;
        match folder_type {
            Some(folder_type) => self.set_annotation(folder, ANNOTATION_FOLDER_TYPE, folder_type),
            None => Ok(()),
        }
    }

    fn delete_folder(&mut self, folder: &str) -> Result<()> {
        self.inner.delete_folder(folder)?;
        self.notify(|listener| listener.folder_deleted(folder))
    }

    fn rename_folder(&mut self, old: &str, new: &str) -> Result<()> {
        self.inner.rename_folder(old, new)?;
        self.notify(|listener| listener.folder_renamed(old, new))
    }

    fn stamp(&mut self, folder: &str) -> Result<Stamp> {
        self.inner.stamp(folder)
    }

    fn object_index(&mut self, folder: &str) -> Result<ObjectIndex> {
        self.inner.object_index(folder)
    }

    fn folder_types(&mut self) -> Result<BTreeMap<String, FolderType>> {
        match self.catalog.folder_types()? {
            Some(types) => Ok(types),
            None => self.inner.folder_types(),
        }
    }

    fn folder(&mut self, folder: &str) -> Result<Folder> {
        match self.catalog.folder_records()? {
            Some(mut records) => records
                .remove(folder)
                .ok_or_else(|| BackendError::MissingFolder(folder.to_string()).into()),
            None => self.inner.folder(folder),
        }
    }

    fn folders_by_type(&mut self, folder_type: &FolderType) -> Result<Vec<Folder>> {
        match self.catalog.by_type()? {
            Some(mut by_type) => Ok(by_type
                .remove(folder_type)
                .map(|folders| folders.into_values().collect())
                .unwrap_or_default()),
            None => self.inner.folders_by_type(folder_type),
        }
    }

    fn owners(&mut self) -> Result<BTreeMap<String, String>> {
        match self.catalog.owners()? {
            Some(owners) => Ok(owners),
            None => self.inner.owners(),
        }
    }

    fn defaults(&mut self) -> Result<BTreeMap<FolderType, String>> {
        match self.catalog.defaults()? {
            Some(defaults) => Ok(defaults),
            None => self.inner.defaults(),
        }
    }

    fn personal_defaults(&mut self) -> Result<BTreeMap<String, BTreeMap<FolderType, String>>> {
        match self.catalog.personal_defaults()? {
            Some(defaults) => Ok(defaults),
            None => self.inner.personal_defaults(),
        }
    }

    fn duplicate_defaults(&mut self) -> Result<Duplicates> {
        match self.catalog.duplicate_defaults()? {
            Some(duplicates) => Ok(duplicates),
            None => self.inner.duplicate_defaults(),
        }
    }

    fn set_default(&mut self, folder: &str, previous: Option<&str>) -> Result<()> {
        self.catalog.set_default(&mut self.inner, folder, previous)
    }

    fn description(&mut self, folder: &str) -> Result<Option<String>> {
        self.shares.description(&mut self.inner, folder)
    }

    fn set_description(&mut self, folder: &str, description: &str) -> Result<()> {
        self.shares
            .set_description(&mut self.inner, folder, description)
    }

    fn parameters(&mut self, folder: &str) -> Result<Parameters> {
        self.shares.parameters(&mut self.inner, folder)
    }

    fn set_parameters(&mut self, folder: &str, parameters: &Parameters) -> Result<()> {
        self.shares
            .set_parameters(&mut self.inner, folder, parameters)
    }

    fn synchronize(&mut self) -> Result<()> {
        self.catalog.synchronize(&mut self.inner)?;
        self.shares.synchronize()
    }

    fn synchronize_data(&mut self, folder: &str, params: SyncParams) -> Result<()> {
        let folder_type = self.folder(folder)?.folder_type;
        let parameters = self.shares.parameters(&mut self.inner, folder)?;
        trace!("synchronizing history of {} as {}", folder, folder_type);
        let context = FolderContext {
            path: folder,
            folder_type,
            parameters,
        };
        self.history
            .synchronize(&mut self.inner, &context, params)
    }
}
