use std::collections::BTreeMap;

use tracing::{debug, error};

use crate::error::Result;
use crate::types::{
    Annotations, Duplicates, Folder, FolderType, Namespace, ObjectIndex, Parameters, Stamp,
    SyncParams,
};

use super::Storage;

/// Records every call that reaches the layer below.
///
/// Calls are logged at `debug` before they are made; failures are logged at
/// `error` and returned unchanged.
#[derive(Debug)]
pub struct Log<S> {
    inner: S,
    id: String,
}

impl<S: Storage> Log<S> {
    /// Log calls to `inner`, labelling each line with `id`.
    pub fn new(inner: S, id: impl Into<String>) -> Log<S> {
        Log {
            inner,
            id: id.into(),
        }
    }

    /// The wrapped storage.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

fn report<T>(id: &str, action: &str, result: Result<T>) -> Result<T> {
    if let Err(ref e) = result {
        error!("{}: {} failed: {}", id, action, e);
    }
    result
}

impl<S: Storage> Storage for Log<S> {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        debug!("{}: listing folders", self.id);
        let folders = report(&self.id, "listing folders", self.inner.list_folders())?;
        debug!("{}: listed {} folders", self.id, folders.len());
        Ok(folders)
    }

    fn list_annotation(&mut self, key: &str) -> Result<Annotations> {
        debug!("{}: listing annotation {}", self.id, key);
        let annotations = report(
            &self.id,
            "listing annotations",
            self.inner.list_annotation(key),
        )?;
        debug!("{}: listed {} values of {}", self.id, annotations.len(), key);
        Ok(annotations)
    }

    fn get_annotation(&mut self, folder: &str, key: &str) -> Result<Option<String>> {
        debug!("{}: reading {} of {}", self.id, key, folder);
        report(&self.id, "reading annotation", self.inner.get_annotation(folder, key))
    }

    fn set_annotation(&mut self, folder: &str, key: &str, value: &str) -> Result<()> {
        debug!("{}: setting {} of {} to {:?}", self.id, key, folder, value);
        report(
            &self.id,
            "setting annotation",
            self.inner.set_annotation(folder, key, value),
        )
    }

    fn namespace(&mut self) -> Result<Namespace> {
        debug!("{}: reading namespace", self.id);
        report(&self.id, "reading namespace", self.inner.namespace())
    }

    fn create_folder(&mut self, folder: &str, folder_type: Option<&str>) -> Result<()> {
        debug!(
            "{}: creating {} ({})",
            self.id,
            folder,
            folder_type.unwrap_or("mail")
        );
        report(
            &self.id,
            "creating folder",
            self.inner.create_folder(folder, folder_type),
        )
    }

    fn delete_folder(&mut self, folder: &str) -> Result<()> {
        debug!("{}: deleting {}", self.id, folder);
        report(&self.id, "deleting folder", self.inner.delete_folder(folder))
    }

    fn rename_folder(&mut self, old: &str, new: &str) -> Result<()> {
        debug!("{}: renaming {} to {}", self.id, old, new);
        report(&self.id, "renaming folder", self.inner.rename_folder(old, new))
    }

    fn stamp(&mut self, folder: &str) -> Result<Stamp> {
        debug!("{}: reading stamp of {}", self.id, folder);
        report(&self.id, "reading stamp", self.inner.stamp(folder))
    }

    fn object_index(&mut self, folder: &str) -> Result<ObjectIndex> {
        debug!("{}: listing objects in {}", self.id, folder);
        let objects = report(&self.id, "listing objects", self.inner.object_index(folder))?;
        debug!("{}: {} holds {} objects", self.id, folder, objects.len());
        Ok(objects)
    }

    fn folder_types(&mut self) -> Result<BTreeMap<String, FolderType>> {
        debug!("{}: resolving folder types", self.id);
        report(&self.id, "resolving folder types", self.inner.folder_types())
    }

    fn folder(&mut self, folder: &str) -> Result<Folder> {
        debug!("{}: resolving {}", self.id, folder);
        report(&self.id, "resolving folder", self.inner.folder(folder))
    }

    fn folders_by_type(&mut self, folder_type: &FolderType) -> Result<Vec<Folder>> {
        debug!("{}: listing {} folders", self.id, folder_type);
        report(
            &self.id,
            "listing folders by type",
            self.inner.folders_by_type(folder_type),
        )
    }

    fn owners(&mut self) -> Result<BTreeMap<String, String>> {
        debug!("{}: resolving owners", self.id);
        report(&self.id, "resolving owners", self.inner.owners())
    }

    fn defaults(&mut self) -> Result<BTreeMap<FolderType, String>> {
        debug!("{}: resolving default folders", self.id);
        report(&self.id, "resolving default folders", self.inner.defaults())
    }

    fn personal_defaults(&mut self) -> Result<BTreeMap<String, BTreeMap<FolderType, String>>> {
        debug!("{}: resolving default folders of every owner", self.id);
        report(
            &self.id,
            "resolving default folders",
            self.inner.personal_defaults(),
        )
    }

    fn duplicate_defaults(&mut self) -> Result<Duplicates> {
        debug!("{}: resolving duplicate default folders", self.id);
        report(
            &self.id,
            "resolving duplicate default folders",
            self.inner.duplicate_defaults(),
        )
    }

    fn set_default(&mut self, folder: &str, previous: Option<&str>) -> Result<()> {
        debug!(
            "{}: making {} the default folder (was {:?})",
            self.id, folder, previous
        );
        report(
            &self.id,
            "setting default folder",
            self.inner.set_default(folder, previous),
        )
    }

    fn description(&mut self, folder: &str) -> Result<Option<String>> {
        debug!("{}: reading description of {}", self.id, folder);
        report(&self.id, "reading description", self.inner.description(folder))
    }

    fn set_description(&mut self, folder: &str, description: &str) -> Result<()> {
        debug!("{}: setting description of {}", self.id, folder);
        report(
            &self.id,
            "setting description",
            self.inner.set_description(folder, description),
        )
    }

    fn parameters(&mut self, folder: &str) -> Result<Parameters> {
        debug!("{}: reading parameters of {}", self.id, folder);
        report(&self.id, "reading parameters", self.inner.parameters(folder))
    }

    fn set_parameters(&mut self, folder: &str, parameters: &Parameters) -> Result<()> {
        debug!("{}: setting parameters of {}", self.id, folder);
        report(
            &self.id,
            "setting parameters",
            self.inner.set_parameters(folder, parameters),
        )
    }

    fn synchronize(&mut self) -> Result<()> {
        debug!("{}: synchronizing folder list", self.id);
        report(&self.id, "synchronizing", self.inner.synchronize())
    }

    fn synchronize_data(&mut self, folder: &str, params: SyncParams) -> Result<()> {
        debug!("{}: synchronizing history of {}", self.id, folder);
        report(
            &self.id,
            "synchronizing history",
            self.inner.synchronize_data(folder, params),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;
    use crate::error::{BackendError, Error};
    use crate::storage::Base;

    #[test]
    fn passes_calls_through() {
        let driver = MockDriver::new("test").with_folder("INBOX", None);
        let mut log = Log::new(Base::new(driver.clone()), "kolab");
        assert_eq!(log.list_folders().unwrap(), vec!["INBOX"]);
        log.create_folder("Notes", Some("note")).unwrap();
        assert_eq!(driver.folders(), vec!["INBOX", "Notes"]);
    }

    #[test]
    fn errors_are_returned_unchanged() {
        let driver = MockDriver::new("test").with_err("list_folders");
        let mut log = Log::new(Base::new(driver), "kolab");
        match log.list_folders() {
            Err(Error::Backend(BackendError::Failed { operation, .. })) => {
                assert_eq!(operation, "list_folders")
            }
            other => unreachable!("unexpected {:?}", other),
        }
        match log.delete_folder("Nope") {
            Err(Error::Backend(BackendError::MissingFolder(f))) => assert_eq!(f, "Nope"),
            other => unreachable!("unexpected {:?}", other),
        }
    }
}
