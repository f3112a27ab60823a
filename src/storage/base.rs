use std::collections::BTreeMap;

use crate::driver::{
    Driver, ANNOTATION_FOLDER_TYPE, ANNOTATION_SHARE_DESCRIPTION, ANNOTATION_SHARE_PARAMETERS,
};
use crate::error::{BackendError, Result};
use crate::index::{default_claim, FolderIndex};
use crate::types::{
    Annotations, Duplicates, Folder, FolderType, Namespace, ObjectIndex, Parameters, Stamp,
    SyncParams,
};

use super::Storage;

/// The bottom of the stack: answers every query straight from a [`Driver`].
///
/// Folder queries list all folders and annotations on each call. There is
/// nothing to synchronize at this level, so both synchronization calls
/// succeed without doing anything.
#[derive(Debug)]
pub struct Base<D> {
    driver: D,
}

impl<D: Driver> Base<D> {
    /// Wrap a driver.
    pub fn new(driver: D) -> Base<D> {
        Base { driver }
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The wrapped driver, mutably.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    fn index(&mut self) -> Result<FolderIndex> {
        let namespace = self.driver.namespace()?;
        let folders = self.driver.list_folders()?;
        let annotations = self.driver.list_annotation(ANNOTATION_FOLDER_TYPE)?;
        Ok(FolderIndex::build(&folders, &annotations, &namespace))
    }
}

impl<D: Driver> Storage for Base<D> {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        self.driver.list_folders()
    }

    fn list_annotation(&mut self, key: &str) -> Result<Annotations> {
        self.driver.list_annotation(key)
    }

    fn get_annotation(&mut self, folder: &str, key: &str) -> Result<Option<String>> {
        self.driver.get_annotation(folder, key)
    }

    fn set_annotation(&mut self, folder: &str, key: &str, value: &str) -> Result<()> {
        self.driver.set_annotation(folder, key, value)
    }

    fn namespace(&mut self) -> Result<Namespace> {
        self.driver.namespace()
    }

    fn create_folder(&mut self, folder: &str, folder_type: Option<&str>) -> Result<()> {
        self.driver.create_folder(folder)?;
        if let Some(folder_type) = folder_type {
            self.driver
                .set_annotation(folder, ANNOTATION_FOLDER_TYPE, folder_type)?;
        }
        Ok(())
    }

    fn delete_folder(&mut self, folder: &str) -> Result<()> {
        self.driver.delete_folder(folder)
    }

    fn rename_folder(&mut self, old: &str, new: &str) -> Result<()> {
        self.driver.rename_folder(old, new)
    }

    fn stamp(&mut self, folder: &str) -> Result<Stamp> {
        self.driver.stamp(folder)
    }

    fn object_index(&mut self, folder: &str) -> Result<ObjectIndex> {
        self.driver.object_index(folder)
    }

    fn folder_types(&mut self) -> Result<BTreeMap<String, FolderType>> {
        Ok(self.index()?.types)
    }

    fn folder(&mut self, folder: &str) -> Result<Folder> {
        self.index()?
            .folders
            .remove(folder)
            .ok_or_else(|| BackendError::MissingFolder(folder.to_string()).into())
    }

    fn folders_by_type(&mut self, folder_type: &FolderType) -> Result<Vec<Folder>> {
        Ok(self
            .index()?
            .by_type
            .remove(folder_type)
            .map(|folders| folders.into_values().collect())
            .unwrap_or_default())
    }

    fn owners(&mut self) -> Result<BTreeMap<String, String>> {
        Ok(self.index()?.owners)
    }

    fn defaults(&mut self) -> Result<BTreeMap<FolderType, String>> {
        Ok(self.index()?.defaults)
    }

    fn personal_defaults(&mut self) -> Result<BTreeMap<String, BTreeMap<FolderType, String>>> {
        Ok(self.index()?.personal_defaults)
    }

    fn duplicate_defaults(&mut self) -> Result<Duplicates> {
        Ok(self.index()?.duplicates)
    }

    fn set_default(&mut self, folder: &str, previous: Option<&str>) -> Result<()> {
        let namespace = self.driver.namespace()?;
        let current = self.driver.get_annotation(folder, ANNOTATION_FOLDER_TYPE)?;
        for (path, value) in default_claim(&namespace, folder, current.as_deref(), previous)? {
            self.driver
                .set_annotation(&path, ANNOTATION_FOLDER_TYPE, &value)?;
        }
        Ok(())
    }

    fn description(&mut self, folder: &str) -> Result<Option<String>> {
        self.driver
            .get_annotation(folder, ANNOTATION_SHARE_DESCRIPTION)
    }

    fn set_description(&mut self, folder: &str, description: &str) -> Result<()> {
        self.driver
            .set_annotation(folder, ANNOTATION_SHARE_DESCRIPTION, description)
    }

    fn parameters(&mut self, folder: &str) -> Result<Parameters> {
        match self
            .driver
            .get_annotation(folder, ANNOTATION_SHARE_PARAMETERS)?
        {
            Some(encoded) => Parameters::decode(&encoded),
            None => Ok(Parameters::default()),
        }
    }

    fn set_parameters(&mut self, folder: &str, parameters: &Parameters) -> Result<()> {
        let encoded = parameters.encode()?;
        self.driver
            .set_annotation(folder, ANNOTATION_SHARE_PARAMETERS, &encoded)
    }

    fn synchronize(&mut self) -> Result<()> {
        Ok(())
    }

    fn synchronize_data(&mut self, _folder: &str, _params: SyncParams) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;
    use crate::error::{Error, PolicyViolation};

    fn base() -> (MockDriver, Base<MockDriver>) {
        let driver = MockDriver::new("test")
            .with_folder("INBOX", Some("event"))
            .with_folder("Calendar", Some("event.default"))
            .with_folder("Calendar1", Some("event"))
            .with_folder("user/john/Notes", Some("note.default"));
        (driver.clone(), Base::new(driver))
    }

    #[test]
    fn queries_are_computed_from_the_driver() {
        let (driver, mut base) = base();
        assert_eq!(base.folder_types().unwrap()["INBOX"], FolderType::Event);
        assert!(!base.folder("INBOX").unwrap().default);
        assert_eq!(base.defaults().unwrap()[&FolderType::Event], "Calendar");
        assert!(!base.defaults().unwrap().contains_key(&FolderType::Note));
        assert_eq!(
            base.personal_defaults().unwrap()["john"][&FolderType::Note],
            "user/john/Notes"
        );
        assert_eq!(base.owners().unwrap()["user/john/Notes"], "john");
        let events: Vec<String> = base
            .folders_by_type(&FolderType::Event)
            .unwrap()
            .into_iter()
            .map(|f| f.folder)
            .collect();
        assert_eq!(events, vec!["Calendar", "Calendar1", "INBOX"]);
        assert!(base.folders_by_type(&FolderType::Task).unwrap().is_empty());
        assert!(driver.count("list_folders") >= 7);
    }

    #[test]
    fn missing_folder() {
        let (_, mut base) = base();
        match base.folder("Nope") {
            Err(Error::Backend(BackendError::MissingFolder(f))) => assert_eq!(f, "Nope"),
            other => unreachable!("unexpected {:?}", other),
        }
    }

    #[test]
    fn create_with_type() {
        let (driver, mut base) = base();
        base.create_folder("Tasks", Some("task.default")).unwrap();
        assert_eq!(
            driver.annotation("Tasks", ANNOTATION_FOLDER_TYPE).as_deref(),
            Some("task.default")
        );
        assert_eq!(base.defaults().unwrap()[&FolderType::Task], "Tasks");
    }

    #[test]
    fn set_default_without_cache() {
        let (driver, mut base) = base();
        base.set_default("Calendar1", Some("Calendar")).unwrap();
        assert_eq!(base.defaults().unwrap()[&FolderType::Event], "Calendar1");
        assert_eq!(
            driver.annotation("Calendar", ANNOTATION_FOLDER_TYPE).as_deref(),
            Some("event")
        );
        match base.set_default("user/john/Notes", None) {
            Err(Error::Policy(PolicyViolation::NotPersonal(_))) => {}
            other => unreachable!("unexpected {:?}", other),
        }
    }

    #[test]
    fn share_attributes_round_trip_through_annotations() {
        let (driver, mut base) = base();
        assert_eq!(base.description("Calendar").unwrap(), None);
        assert_eq!(base.parameters("Calendar").unwrap(), Parameters::default());

        let mut params = Parameters::default();
        params.insert(Parameters::SHARE_NAME, "cal");
        base.set_parameters("Calendar", &params).unwrap();
        base.set_description("Calendar", "Work").unwrap();
        assert_eq!(base.parameters("Calendar").unwrap().share_name(), Some("cal"));
        assert_eq!(base.description("Calendar").unwrap().as_deref(), Some("Work"));
        assert!(driver
            .annotation("Calendar", ANNOTATION_SHARE_PARAMETERS)
            .is_some());
    }
}
