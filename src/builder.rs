use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cache::CacheStore;
use crate::driver::Driver;
use crate::error::Result;
use crate::history::HistoryStore;
use crate::storage::{Base, Cache, Log, Storage, Synchronization};
use crate::types::FolderType;

/// Settings for assembling a storage stack.
///
/// Every field has a default, so a configuration file only needs to name
/// what it changes:
///
/// ```
/// # use kolab_storage::Config;
/// # fn main() -> Result<(), kolab_storage::Error> {
/// let config = Config::from_json(r#"{ "log": false }"#)?;
/// assert!(!config.log);
/// assert!(config.synchronize);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log every backend call.
    pub log: bool,
    /// The label prefixed to log lines.
    pub log_id: String,
    /// Synchronize the folder list and folder history on first use.
    pub synchronize: bool,
    /// The application name used in history ids, per folder type.
    pub applications: BTreeMap<FolderType, String>,
}

impl Default for Config {
    fn default() -> Self {
        let applications = [
            (FolderType::Event, "calendar"),
            (FolderType::Contact, "contacts"),
            (FolderType::Note, "notes"),
            (FolderType::Task, "tasks"),
        ]
        .into_iter()
        .map(|(folder_type, app)| (folder_type, app.to_string()))
        .collect();
        Config {
            log: true,
            log_id: "kolab".to_string(),
            synchronize: true,
            applications,
        }
    }
}

impl Config {
    /// Read a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Config> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Assembles the layers of a [`Storage`] stack around a [`Driver`].
///
/// An uncached stack talks to the backend on every query; a cached stack
/// keeps the folder list in a [`CacheStore`] and the object history in a
/// [`HistoryStore`]:
/// ```no_run
/// # use kolab_storage::driver::Driver;
/// # use kolab_storage::{MemoryCache, MemoryHistory, Storage, StorageBuilder};
/// fn calendars<D: Driver + 'static>(driver: D) -> Result<Vec<String>, kolab_storage::Error> {
///     let mut storage = StorageBuilder::new(driver)
///         .log_id("wrobel")
///         .build(MemoryCache::new(), MemoryHistory::new());
///     let folders = storage.folders_by_type(&"event".into())?;
///     Ok(folders.into_iter().map(|f| f.folder).collect())
/// }
/// ```
#[derive(Debug)]
pub struct StorageBuilder<D> {
    driver: D,
    config: Config,
}

impl<D> StorageBuilder<D>
where
    D: Driver + 'static,
{
    /// Make a new `StorageBuilder` for `driver` with the default [`Config`].
    pub fn new(driver: D) -> Self {
        StorageBuilder {
            driver,
            config: Config::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Log every backend call, or don't.
    pub fn log(mut self, enabled: bool) -> Self {
        self.config.log = enabled;
        self
    }

    /// Label log lines with `id`.
    pub fn log_id(mut self, id: &str) -> Self {
        self.config.log_id = id.to_string();
        self
    }

    /// Synchronize on first use, or leave synchronization to the caller.
    pub fn synchronize(mut self, enabled: bool) -> Self {
        self.config.synchronize = enabled;
        self
    }

    /// Attribute folders of `folder_type` to `application` in history ids.
    pub fn application(mut self, folder_type: FolderType, application: &str) -> Self {
        self.config
            .applications
            .insert(folder_type, application.to_string());
        self
    }

    fn backend(self) -> (Box<dyn Storage>, Config) {
        let base = Base::new(self.driver);
        let backend: Box<dyn Storage> = if self.config.log {
            Box::new(Log::new(base, self.config.log_id.clone()))
        } else {
            Box::new(base)
        };
        (backend, self.config)
    }

    fn outer<S: Storage + 'static>(storage: S, config: &Config) -> Box<dyn Storage> {
        if config.synchronize {
            Box::new(Synchronization::new(storage))
        } else {
            Box::new(storage)
        }
    }

    /// A stack answering every query from the backend.
    pub fn build_uncached(self) -> Box<dyn Storage> {
        let (backend, config) = self.backend();
        Self::outer(backend, &config)
    }

    /// A stack caching folder data in `cache` and logging object history to `history`.
    pub fn build<C, H>(self, cache: C, history: H) -> Box<dyn Storage>
    where
        C: CacheStore + Clone + 'static,
        H: HistoryStore + 'static,
    {
        let (backend, config) = self.backend();
        let cached = Cache::new(backend, cache, history, config.applications.clone());
        Self::outer(cached, &config)
    }
}
