//! An in-memory [`Driver`] for tests.
//!
//! Enable the `test_helpers` feature to use it from outside this crate:
//!
//! ```toml
//! [dev-dependencies]
//! kolab-storage = { version = "0.1", features = ["test_helpers"] }
//! ```
//!
//! A [`MockDriver`] is a handle: clones share the same folders, so a test can
//! keep one clone to change the backend while another one is owned by the
//! storage stack under test.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Driver;
use crate::error::{BackendError, Result};
use crate::types::{Annotations, Bid, Namespace, ObjectIndex, Stamp};

#[derive(Debug)]
struct MockFolder {
    path: String,
    annotations: Annotations,
    objects: ObjectIndex,
    validity: u32,
    next_uid: u32,
}

#[derive(Debug)]
struct MockState {
    namespace: Namespace,
    folders: Vec<MockFolder>,
    next_validity: u32,
    calls: Vec<String>,
    failing: HashSet<String>,
}

impl MockState {
    fn record(&mut self, operation: &str) -> Result<()> {
        self.calls.push(operation.to_string());
        if self.failing.contains(operation) {
            return Err(BackendError::Failed {
                operation: operation.to_string(),
                reason: "MockDriver Error".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn position(&self, folder: &str) -> Option<usize> {
        self.folders.iter().position(|f| f.path == folder)
    }

    fn folder(&mut self, folder: &str) -> Result<&mut MockFolder> {
        match self.position(folder) {
            Some(pos) => Ok(&mut self.folders[pos]),
            None => Err(BackendError::MissingFolder(folder.to_string()).into()),
        }
    }

    fn create(&mut self, folder: &str) -> Result<()> {
        if self.position(folder).is_some() {
            return Err(BackendError::FolderExists(folder.to_string()).into());
        }
        self.next_validity += 1;
        self.folders.push(MockFolder {
            path: folder.to_string(),
            annotations: Annotations::new(),
            objects: ObjectIndex::new(),
            validity: self.next_validity,
            next_uid: 1,
        });
        Ok(())
    }
}

/// A backend keeping folders, annotations and objects in memory.
#[derive(Clone, Debug)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// An empty backend for `user` using [`Namespace::fixed`].
    pub fn new(user: &str) -> MockDriver {
        MockDriver {
            state: Arc::new(Mutex::new(MockState {
                namespace: Namespace::fixed(user),
                folders: Vec::new(),
                next_validity: 0,
                calls: Vec::new(),
                failing: HashSet::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the namespace layout.
    pub fn with_namespace(self, namespace: Namespace) -> MockDriver {
        self.lock().namespace = namespace;
        self
    }

    /// Add a folder, optionally carrying a folder type annotation.
    pub fn with_folder(self, folder: &str, folder_type: Option<&str>) -> MockDriver {
        {
            let mut state = self.lock();
            if state.create(folder).is_ok() {
                if let (Some(value), Some(pos)) = (folder_type, state.position(folder)) {
                    state.folders[pos]
                        .annotations
                        .insert(super::ANNOTATION_FOLDER_TYPE.to_string(), value.to_string());
                }
            }
        }
        self
    }

    /// Set an annotation on an existing folder.
    pub fn with_annotation(self, folder: &str, key: &str, value: &str) -> MockDriver {
        if let Ok(f) = self.lock().folder(folder) {
            f.annotations.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Make every call to `operation` fail.
    pub fn with_err(self, operation: &str) -> MockDriver {
        self.fail(operation);
        self
    }

    /// Make every call to `operation` fail from now on.
    pub fn fail(&self, operation: &str) {
        self.lock().failing.insert(operation.to_string());
    }

    /// Stop failing any operation.
    pub fn recover(&self) {
        self.lock().failing.clear();
    }

    /// Store a new object with `uid` and return its backend id.
    pub fn add_object(&self, folder: &str, uid: &str) -> Option<Bid> {
        let mut state = self.lock();
        let f = state.folder(folder).ok()?;
        let bid = Bid::from(f.next_uid);
        f.next_uid += 1;
        f.objects.insert(uid.to_string(), bid.clone());
        Some(bid)
    }

    /// Store `uid` under a new backend id, as a backend does when an object is updated.
    pub fn replace_object(&self, folder: &str, uid: &str) -> Option<Bid> {
        self.add_object(folder, uid)
    }

    /// Remove the object with `uid` and return the backend id it had.
    pub fn remove_object(&self, folder: &str, uid: &str) -> Option<Bid> {
        self.lock().folder(folder).ok()?.objects.remove(uid)
    }

    /// Invalidate all backend ids of `folder`, renumbering its objects.
    pub fn reset_folder(&self, folder: &str) {
        let mut state = self.lock();
        state.next_validity += 1;
        let validity = state.next_validity;
        if let Ok(f) = state.folder(folder) {
            f.validity = validity;
            f.next_uid = 1;
            let uids: Vec<String> = f.objects.keys().cloned().collect();
            for uid in uids {
                let bid = Bid::from(f.next_uid);
                f.next_uid += 1;
                f.objects.insert(uid, bid);
            }
        }
    }

    /// The value of annotation `key` on `folder`.
    pub fn annotation(&self, folder: &str, key: &str) -> Option<String> {
        self.lock()
            .folder(folder)
            .ok()
            .and_then(|f| f.annotations.get(key).cloned())
    }

    /// The current folder paths in listing order.
    pub fn folders(&self) -> Vec<String> {
        self.lock().folders.iter().map(|f| f.path.clone()).collect()
    }

    /// Every driver operation called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// How often `operation` was called.
    pub fn count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

impl Driver for MockDriver {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        let mut state = self.lock();
        state.record("list_folders")?;
        Ok(state.folders.iter().map(|f| f.path.clone()).collect())
    }

    fn list_annotation(&mut self, key: &str) -> Result<Annotations> {
        let mut state = self.lock();
        state.record("list_annotation")?;
        Ok(state
            .folders
            .iter()
            .filter_map(|f| f.annotations.get(key).map(|v| (f.path.clone(), v.clone())))
            .collect())
    }

    fn get_annotation(&mut self, folder: &str, key: &str) -> Result<Option<String>> {
        let mut state = self.lock();
        state.record("get_annotation")?;
        Ok(state.folder(folder)?.annotations.get(key).cloned())
    }

    fn set_annotation(&mut self, folder: &str, key: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        state.record("set_annotation")?;
        state
            .folder(folder)?
            .annotations
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn namespace(&mut self) -> Result<Namespace> {
        let mut state = self.lock();
        state.record("namespace")?;
        Ok(state.namespace.clone())
    }

    fn create_folder(&mut self, folder: &str) -> Result<()> {
        let mut state = self.lock();
        state.record("create_folder")?;
        state.create(folder)
    }

    fn delete_folder(&mut self, folder: &str) -> Result<()> {
        let mut state = self.lock();
        state.record("delete_folder")?;
        match state.position(folder) {
            Some(pos) => {
                state.folders.remove(pos);
                Ok(())
            }
            None => Err(BackendError::MissingFolder(folder.to_string()).into()),
        }
    }

    fn rename_folder(&mut self, old: &str, new: &str) -> Result<()> {
        let mut state = self.lock();
        state.record("rename_folder")?;
        if state.position(new).is_some() {
            return Err(BackendError::FolderExists(new.to_string()).into());
        }
        state.folder(old)?.path = new.to_string();
        Ok(())
    }

    fn stamp(&mut self, folder: &str) -> Result<Stamp> {
        let mut state = self.lock();
        state.record("stamp")?;
        let f = state.folder(folder)?;
        Ok(Stamp::new(f.validity.to_string(), f.next_uid.to_string()))
    }

    fn object_index(&mut self, folder: &str) -> Result<ObjectIndex> {
        let mut state = self.lock();
        state.record("object_index")?;
        Ok(state.folder(folder)?.objects.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ANNOTATION_FOLDER_TYPE;
    use crate::error::Error;

    #[test]
    fn lists_in_creation_order() {
        let mut driver = MockDriver::new("test")
            .with_folder("INBOX", None)
            .with_folder("Calendar", Some("event.default"));
        assert_eq!(driver.list_folders().unwrap(), vec!["INBOX", "Calendar"]);
        let annotations = driver.list_annotation(ANNOTATION_FOLDER_TYPE).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations["Calendar"], "event.default");
    }

    #[test]
    fn clones_share_state() {
        let driver = MockDriver::new("test").with_folder("Calendar", Some("event"));
        let mut other = driver.clone();
        other.set_annotation("Calendar", ANNOTATION_FOLDER_TYPE, "event.default").unwrap();
        assert_eq!(
            driver.annotation("Calendar", ANNOTATION_FOLDER_TYPE).as_deref(),
            Some("event.default")
        );
        assert_eq!(driver.calls(), vec!["set_annotation"]);
    }

    #[test]
    fn injected_failure() {
        let mut driver = MockDriver::new("test").with_err("list_folders");
        match driver.list_folders() {
            Err(Error::Backend(BackendError::Failed { operation, .. })) => {
                assert_eq!(operation, "list_folders")
            }
            other => unreachable!("expected a backend failure, got {:?}", other),
        }
        driver.recover();
        assert!(driver.list_folders().is_ok());
    }

    #[test]
    fn rename_keeps_position_and_annotations() {
        let mut driver = MockDriver::new("test")
            .with_folder("A", Some("note"))
            .with_folder("B", None);
        driver.rename_folder("A", "C").unwrap();
        assert_eq!(driver.folders(), vec!["C", "B"]);
        assert_eq!(driver.annotation("C", ANNOTATION_FOLDER_TYPE).as_deref(), Some("note"));
        assert!(driver.rename_folder("C", "B").is_err());
    }

    #[test]
    fn replaced_objects_get_new_bids() {
        let mut driver = MockDriver::new("test").with_folder("Calendar", Some("event"));
        let first = driver.add_object("Calendar", "abc").unwrap();
        let second = driver.replace_object("Calendar", "abc").unwrap();
        assert_ne!(first, second);
        assert_eq!(driver.object_index("Calendar").unwrap()["abc"], second);
    }

    #[test]
    fn reset_changes_validity() {
        let mut driver = MockDriver::new("test").with_folder("Calendar", Some("event"));
        driver.add_object("Calendar", "abc").unwrap();
        let before = driver.stamp("Calendar").unwrap();
        driver.reset_folder("Calendar");
        assert!(driver.stamp("Calendar").unwrap().is_reset(&before));
    }
}
