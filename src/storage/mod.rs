//! The storage stack: a backend wrapped in layers adding logging, caching and
//! lazy synchronization.
//!
//! Each layer implements [`Storage`] and owns the layer below it. The usual
//! composition, outermost first, is
//!
//! ```text
//! Synchronization -> Cache -> Log -> Base -> Driver
//! ```
//!
//! and is assembled by [`StorageBuilder`](crate::StorageBuilder).

use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{
    Annotations, Duplicates, Folder, FolderType, Namespace, ObjectIndex, Parameters, Stamp,
    SyncParams,
};

mod base;
mod cache;
mod log;
mod sync;

pub use self::base::Base;
pub use self::cache::Cache;
pub use self::log::Log;
pub use self::sync::Synchronization;

/// Everything a consumer can ask of the folder store.
///
/// The first group of methods mirrors the backend; the second resolves folder
/// semantics on top of it.
pub trait Storage {
    /// All folders, in the order the backend reports them.
    fn list_folders(&mut self) -> Result<Vec<String>>;

    /// The value of annotation `key` for every folder that has one.
    fn list_annotation(&mut self, key: &str) -> Result<Annotations>;

    /// The value of annotation `key` on `folder`.
    fn get_annotation(&mut self, folder: &str, key: &str) -> Result<Option<String>>;

    /// Set annotation `key` on `folder`.
    fn set_annotation(&mut self, folder: &str, key: &str, value: &str) -> Result<()>;

    /// The namespace layout.
    fn namespace(&mut self) -> Result<Namespace>;

    /// Create `folder`, optionally with a raw folder type annotation such as `event.default`.
    fn create_folder(&mut self, folder: &str, folder_type: Option<&str>) -> Result<()>;

    /// Delete `folder`.
    fn delete_folder(&mut self, folder: &str) -> Result<()>;

    /// Rename `old` to `new`.
    fn rename_folder(&mut self, old: &str, new: &str) -> Result<()>;

    /// The current content stamp of `folder`.
    fn stamp(&mut self, folder: &str) -> Result<Stamp>;

    /// Every object uid in `folder` with its backend id.
    fn object_index(&mut self, folder: &str) -> Result<ObjectIndex>;

    /// Folder path to resolved folder type.
    fn folder_types(&mut self) -> Result<BTreeMap<String, FolderType>>;

    /// The record of `folder`.
    fn folder(&mut self, folder: &str) -> Result<Folder>;

    /// Every folder of `folder_type`, ordered by path.
    fn folders_by_type(&mut self, folder_type: &FolderType) -> Result<Vec<Folder>>;

    /// Folder path to owner.
    fn owners(&mut self) -> Result<BTreeMap<String, String>>;

    /// The authenticated user's default folder of each type.
    fn defaults(&mut self) -> Result<BTreeMap<FolderType, String>>;

    /// The default folders of every owner.
    fn personal_defaults(&mut self) -> Result<BTreeMap<String, BTreeMap<FolderType, String>>>;

    /// Default claims that lost an election.
    fn duplicate_defaults(&mut self) -> Result<Duplicates>;

    /// Make `folder` the default of its type, demoting `previous`.
    fn set_default(&mut self, folder: &str, previous: Option<&str>) -> Result<()>;

    /// The share description of `folder`.
    fn description(&mut self, folder: &str) -> Result<Option<String>>;

    /// Set the share description of `folder`.
    fn set_description(&mut self, folder: &str, description: &str) -> Result<()>;

    /// The share parameters of `folder`.
    fn parameters(&mut self, folder: &str) -> Result<Parameters>;

    /// Set the share parameters of `folder`.
    fn set_parameters(&mut self, folder: &str, parameters: &Parameters) -> Result<()>;

    /// Refresh the folder list.
    fn synchronize(&mut self) -> Result<()>;

    /// Bring the object history of `folder` up to date.
    fn synchronize_data(&mut self, folder: &str, params: SyncParams) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        (**self).list_folders()
    }

    fn list_annotation(&mut self, key: &str) -> Result<Annotations> {
        (**self).list_annotation(key)
    }

    fn get_annotation(&mut self, folder: &str, key: &str) -> Result<Option<String>> {
        (**self).get_annotation(folder, key)
    }

    fn set_annotation(&mut self, folder: &str, key: &str, value: &str) -> Result<()> {
        (**self).set_annotation(folder, key, value)
    }

    fn namespace(&mut self) -> Result<Namespace> {
        (**self).namespace()
    }

    fn create_folder(&mut self, folder: &str, folder_type: Option<&str>) -> Result<()> {
        (**self).create_folder(folder, folder_type)
    }

    fn delete_folder(&mut self, folder: &str) -> Result<()> {
        (**self).delete_folder(folder)
    }

    fn rename_folder(&mut self, old: &str, new: &str) -> Result<()> {
        (**self).rename_folder(old, new)
    }

    fn stamp(&mut self, folder: &str) -> Result<Stamp> {
        (**self).stamp(folder)
    }

    fn object_index(&mut self, folder: &str) -> Result<ObjectIndex> {
        (**self).object_index(folder)
    }

    fn folder_types(&mut self) -> Result<BTreeMap<String, FolderType>> {
        (**self).folder_types()
    }

    fn folder(&mut self, folder: &str) -> Result<Folder> {
        (**self).folder(folder)
    }

    fn folders_by_type(&mut self, folder_type: &FolderType) -> Result<Vec<Folder>> {
        (**self).folders_by_type(folder_type)
    }

    fn owners(&mut self) -> Result<BTreeMap<String, String>> {
        (**self).owners()
    }

    fn defaults(&mut self) -> Result<BTreeMap<FolderType, String>> {
        (**self).defaults()
    }

    fn personal_defaults(&mut self) -> Result<BTreeMap<String, BTreeMap<FolderType, String>>> {
        (**self).personal_defaults()
    }

    fn duplicate_defaults(&mut self) -> Result<Duplicates> {
        (**self).duplicate_defaults()
    }

    fn set_default(&mut self, folder: &str, previous: Option<&str>) -> Result<()> {
        (**self).set_default(folder, previous)
    }

    fn description(&mut self, folder: &str) -> Result<Option<String>> {
        (**self).description(folder)
    }

    fn set_description(&mut self, folder: &str, description: &str) -> Result<()> {
        (**self).set_description(folder, description)
    }

    fn parameters(&mut self, folder: &str) -> Result<Parameters> {
        (**self).parameters(folder)
    }

    fn set_parameters(&mut self, folder: &str, parameters: &Parameters) -> Result<()> {
        (**self).set_parameters(folder, parameters)
    }

    fn synchronize(&mut self) -> Result<()> {
        (**self).synchronize()
    }

    fn synchronize_data(&mut self, folder: &str, params: SyncParams) -> Result<()> {
        (**self).synchronize_data(folder, params)
    }
}
