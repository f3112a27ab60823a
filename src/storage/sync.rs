use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::error::Result;
use crate::types::{
    Annotations, Duplicates, Folder, FolderType, Namespace, ObjectIndex, Parameters, Stamp,
    SyncParams,
};

use super::Storage;

/// Synchronizes lazily: the folder list before the first list query, the
/// history of a folder before the first access to its content.
///
/// Explicit calls to [`Storage::synchronize`] and
/// [`Storage::synchronize_data`] are always passed on.
#[derive(Debug)]
pub struct Synchronization<S> {
    inner: S,
    synchronized: bool,
    folders: HashSet<String>,
}

impl<S: Storage> Synchronization<S> {
    /// Wrap `inner`.
    pub fn new(inner: S) -> Synchronization<S> {
        Synchronization {
            inner,
            synchronized: false,
            folders: HashSet::new(),
        }
    }

    /// Whether the folder list was synchronized by this layer.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    fn list(&mut self) -> Result<()> {
        if !self.synchronized {
            debug!("synchronizing folder list before first use");
            self.inner.synchronize()?;
            self.synchronized = true;
        }
        Ok(())
    }

    fn data(&mut self, folder: &str) -> Result<()> {
        self.list()?;
        if !self.folders.contains(folder) {
            debug!("synchronizing history of {} before first use", folder);
            self.inner.synchronize_data(folder, SyncParams::default())?;
            self.folders.insert(folder.to_string());
        }
        Ok(())
    }
}

impl<S: Storage> Storage for Synchronization<S> {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        self.list()?;
        self.inner.list_folders()
    }

    fn list_annotation(&mut self, key: &str) -> Result<Annotations> {
        self.list()?;
        self.inner.list_annotation(key)
    }

    fn get_annotation(&mut self, folder: &str, key: &str) -> Result<Option<String>> {
        self.inner.get_annotation(folder, key)
    }

    fn set_annotation(&mut self, folder: &str, key: &str, value: &str) -> Result<()> {
        self.inner.set_annotation(folder, key, value)
    }

    fn namespace(&mut self) -> Result<Namespace> {
        self.list()?;
        self.inner.namespace()
    }

    fn create_folder(&mut self, folder: &str, folder_type: Option<&str>) -> Result<()> {
        self.inner.create_folder(folder, folder_type)
    }

    fn delete_folder(&mut self, folder: &str) -> Result<()> {
        self.inner.delete_folder(folder)?;
        self.folders.remove(folder);
        Ok(())
    }

    fn rename_folder(&mut self, old: &str, new: &str) -> Result<()> {
        self.inner.rename_folder(old, new)?;
        if self.folders.remove(old) {
            self.folders.insert(new.to_string());
        }
        Ok(())
    }

    fn stamp(&mut self, folder: &str) -> Result<Stamp> {
        self.data(folder)?;
        self.inner.stamp(folder)
    }

    fn object_index(&mut self, folder: &str) -> Result<ObjectIndex> {
        self.data(folder)?;
        self.inner.object_index(folder)
    }

    fn folder_types(&mut self) -> Result<BTreeMap<String, FolderType>> {
        self.list()?;
        self.inner.folder_types()
    }

    fn folder(&mut self, folder: &str) -> Result<Folder> {
        self.list()?;
        self.inner.folder(folder)
    }

    fn folders_by_type(&mut self, folder_type: &FolderType) -> Result<Vec<Folder>> {
        self.list()?;
        self.inner.folders_by_type(folder_type)
    }

    fn owners(&mut self) -> Result<BTreeMap<String, String>> {
        self.list()?;
        self.inner.owners()
    }

    fn defaults(&mut self) -> Result<BTreeMap<FolderType, String>> {
        self.list()?;
        self.inner.defaults()
    }

    fn personal_defaults(&mut self) -> Result<BTreeMap<String, BTreeMap<FolderType, String>>> {
        self.list()?;
        self.inner.personal_defaults()
    }

    fn duplicate_defaults(&mut self) -> Result<Duplicates> {
        self.list()?;
        self.inner.duplicate_defaults()
    }

    fn set_default(&mut self, folder: &str, previous: Option<&str>) -> Result<()> {
        self.list()?;
        self.inner.set_default(folder, previous)
    }

    fn description(&mut self, folder: &str) -> Result<Option<String>> {
        self.inner.description(folder)
    }

    fn set_description(&mut self, folder: &str, description: &str) -> Result<()> {
        self.inner.set_description(folder, description)
    }

    fn parameters(&mut self, folder: &str) -> Result<Parameters> {
        self.inner.parameters(folder)
    }

    fn set_parameters(&mut self, folder: &str, parameters: &Parameters) -> Result<()> {
        self.inner.set_parameters(folder, parameters)
    }

    fn synchronize(&mut self) -> Result<()> {
        self.inner.synchronize()?;
        self.synchronized = true;
        Ok(())
    }

    fn synchronize_data(&mut self, folder: &str, params: SyncParams) -> Result<()> {
        self.inner.synchronize_data(folder, params)?;
        self.folders.insert(folder.to_string());
        Ok(())
    }
}
