//! The backend capability set consumed by this crate.
//!
//! Folders carry their groupware semantics in METADATA annotations (see [RFC
//! 5464](https://tools.ietf.org/html/rfc5464)): the folder type lives in
//! [`ANNOTATION_FOLDER_TYPE`], share descriptions and parameters in the
//! `share-` entries below the Horde vendor tree. A driver exposes those
//! annotations together with the folder list and a per-folder view of the
//! stored objects.

use crate::error::Result;
use crate::types::{Annotations, Namespace, ObjectIndex, Stamp};

#[cfg(any(test, feature = "test_helpers"))]
pub mod mock;

/// The annotation holding the folder type, e.g. `event.default`.
pub const ANNOTATION_FOLDER_TYPE: &str = "/shared/vendor/kolab/folder-type";

/// The annotation holding the share description.
pub const ANNOTATION_SHARE_DESCRIPTION: &str = "/shared/vendor/horde/share-description";

/// The annotation holding the base64 encoded share parameters.
pub const ANNOTATION_SHARE_PARAMETERS: &str = "/shared/vendor/horde/share-params";

/// Access to the remote folder store.
///
/// Every call is a blocking round trip; timeouts and cancellation are whatever
/// the implementation provides.
pub trait Driver {
    /// All folders visible to the user, in the order the backend reports them.
    fn list_folders(&mut self) -> Result<Vec<String>>;

    /// The value of annotation `key` for every folder that has one.
    fn list_annotation(&mut self, key: &str) -> Result<Annotations>;

    /// The value of annotation `key` on `folder`, if set.
    fn get_annotation(&mut self, folder: &str, key: &str) -> Result<Option<String>>;

    /// Set annotation `key` on `folder`.
    fn set_annotation(&mut self, folder: &str, key: &str, value: &str) -> Result<()>;

    /// The namespace layout for the authenticated user.
    fn namespace(&mut self) -> Result<Namespace>;

    /// Create `folder`.
    fn create_folder(&mut self, folder: &str) -> Result<()>;

    /// Delete `folder`.
    fn delete_folder(&mut self, folder: &str) -> Result<()>;

    /// Rename `old` to `new`, keeping its content and annotations.
    fn rename_folder(&mut self, old: &str, new: &str) -> Result<()>;

    /// The current content stamp of `folder`.
    fn stamp(&mut self, folder: &str) -> Result<Stamp>;

    /// Every object uid in `folder` with its current backend id.
    fn object_index(&mut self, folder: &str) -> Result<ObjectIndex>;
}
