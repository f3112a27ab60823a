//! Folder list and object history synchronization for Kolab groupware stores.
//!
//! A Kolab store is an IMAP mailbox tree whose folders carry their groupware
//! meaning in annotations: the folder type (`event`, `contact`, ...), whether
//! the folder is the user's default folder of that type, and the description
//! and parameters of the share it backs. This crate keeps a local cache of
//! that tree consistent with the backend and records, per object, when it was
//! added, modified or deleted.
//!
//! The backend itself is reached through a [`Driver`](driver::Driver). The
//! [`StorageBuilder`] wraps a driver in the layers of a [`Storage`] stack:
//!
//! ```no_run
//! # use kolab_storage::driver::Driver;
//! # use kolab_storage::{MemoryCache, MemoryHistory, Storage, StorageBuilder, SyncParams};
//! fn show<D: Driver + 'static>(driver: D) -> Result<(), kolab_storage::Error> {
//!     let mut storage =
//!         StorageBuilder::new(driver).build(MemoryCache::new(), MemoryHistory::new());
//!
//!     for (folder_type, folder) in storage.defaults()? {
//!         println!("default {} folder: {}", folder_type, folder);
//!     }
//!
//!     for (folder_type, owners) in storage.duplicate_defaults()? {
//!         for (owner, folders) in owners {
//!             println!("{} has {} default {} folders", owner, folders.len(), folder_type);
//!         }
//!     }
//!
//!     storage.synchronize_data("Calendar", SyncParams::default())?;
//!     Ok(())
//! }
//! ```
//!
//! Nothing in this crate installs a `tracing` subscriber; pick one in the
//! application to see what the stack is doing.

pub mod cache;
pub mod catalog;
pub mod driver;
pub mod error;
pub mod history;
pub mod index;
pub mod reconcile;
pub mod share;
pub mod storage;
pub mod types;

mod builder;

pub use crate::builder::{Config, StorageBuilder};
pub use crate::cache::{CacheStore, MemoryCache, QueryKey};
pub use crate::catalog::{FolderCatalog, FolderListener};
pub use crate::error::{Error, Result};
pub use crate::history::{HistoryStore, MemoryHistory};
pub use crate::reconcile::{CachedHistoryReconciler, HistoryReconciler};
pub use crate::share::ShareAttributeCache;
pub use crate::storage::Storage;
pub use crate::types::*;
