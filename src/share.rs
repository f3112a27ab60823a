//! Cached share descriptions and parameters.
//!
//! Descriptions change whenever a user edits a share and are kept in the
//! regular query tier, which is reset on every list synchronization.
//! Parameters identify the share behind a folder and only change through this
//! layer, so they go to the long-term tier.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use tracing::trace;

use crate::cache::{CacheStore, QueryKey};
use crate::catalog::FolderListener;
use crate::error::Result;
use crate::storage::Storage;
use crate::types::Parameters;

type Descriptions = BTreeMap<String, Option<String>>;
type ParameterMap = BTreeMap<String, Parameters>;

/// Share attributes read through a cache.
#[derive(Debug)]
pub struct ShareAttributeCache<C> {
    cache: C,
}

impl<C: CacheStore> ShareAttributeCache<C> {
    /// A share cache backed by `cache`.
    pub fn new(cache: C) -> ShareAttributeCache<C> {
        ShareAttributeCache { cache }
    }

    fn descriptions(&self) -> Result<Descriptions> {
        decode(self.cache.get_query(QueryKey::ShareDescriptions))
    }

    fn parameter_map(&self) -> Result<ParameterMap> {
        decode(self.cache.get_long_term(QueryKey::ShareParameters))
    }

    fn store_descriptions(&mut self, descriptions: &Descriptions) -> Result<()> {
        self.cache
            .set_query(QueryKey::ShareDescriptions, serde_json::to_value(descriptions)?);
        self.cache.save()
    }

    fn store_parameters(&mut self, parameters: &ParameterMap) -> Result<()> {
        self.cache
            .set_long_term(QueryKey::ShareParameters, serde_json::to_value(parameters)?);
        self.cache.save()
    }

    /// The description of `folder`, fetched from `backend` on a miss.
    pub fn description<S: Storage + ?Sized>(
        &mut self,
        backend: &mut S,
        folder: &str,
    ) -> Result<Option<String>> {
        let mut descriptions = self.descriptions()?;
        if let Some(description) = descriptions.get(folder) {
            trace!("description of {} served from cache", folder);
            return Ok(description.clone());
        }
        let description = backend.description(folder)?;
        descriptions.insert(folder.to_string(), description.clone());
        self.store_descriptions(&descriptions)?;
        Ok(description)
    }

    /// The parameters of `folder`, fetched from `backend` on a miss.
    pub fn parameters<S: Storage + ?Sized>(
        &mut self,
        backend: &mut S,
        folder: &str,
    ) -> Result<Parameters> {
        let mut parameters = self.parameter_map()?;
        if let Some(params) = parameters.get(folder) {
            trace!("parameters of {} served from cache", folder);
            return Ok(params.clone());
        }
        let params = backend.parameters(folder)?;
        parameters.insert(folder.to_string(), params.clone());
        self.store_parameters(&parameters)?;
        Ok(params)
    }

    /// Store a new description on `backend`, then in the cache.
    pub fn set_description<S: Storage + ?Sized>(
        &mut self,
        backend: &mut S,
        folder: &str,
        description: &str,
    ) -> Result<()> {
        backend.set_description(folder, description)?;
        let mut descriptions = self.descriptions()?;
        descriptions.insert(folder.to_string(), Some(description.to_string()));
        self.store_descriptions(&descriptions)
    }

    /// Store new parameters on `backend`, then in the cache.
    pub fn set_parameters<S: Storage + ?Sized>(
        &mut self,
        backend: &mut S,
        folder: &str,
        params: &Parameters,
    ) -> Result<()> {
        backend.set_parameters(folder, params)?;
        let mut parameters = self.parameter_map()?;
        parameters.insert(folder.to_string(), params.clone());
        self.store_parameters(&parameters)
    }

    /// Forget everything cached about `folder`.
    pub fn invalidate(&mut self, folder: &str) -> Result<()> {
        let mut descriptions = self.descriptions()?;
        if descriptions.remove(folder).is_some() {
            self.store_descriptions(&descriptions)?;
        }
        let mut parameters = self.parameter_map()?;
        if parameters.remove(folder).is_some() {
            self.store_parameters(&parameters)?;
        }
        Ok(())
    }

    /// Drop the cached descriptions. Parameters are kept.
    pub fn synchronize(&mut self) -> Result<()> {
        self.store_descriptions(&Descriptions::new())
    }
}

fn decode<T: DeserializeOwned + Default>(value: Option<serde_json::Value>) -> Result<T> {
    match value {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(T::default()),
    }
}

fn relocate<V>(map: &mut BTreeMap<String, V>, old: &str, new: &str) -> bool {
    match map.remove(old) {
        Some(value) => {
            map.insert(new.to_string(), value);
            true
        }
        None => false,
    }
}

impl<C: CacheStore> FolderListener for ShareAttributeCache<C> {
    fn folder_created(&mut self, _folder: &str, _folder_type: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn folder_deleted(&mut self, folder: &str) -> Result<()> {
        self.invalidate(folder)
    }

    fn folder_renamed(&mut self, old: &str, new: &str) -> Result<()> {
        let mut descriptions = self.descriptions()?;
        if relocate(&mut descriptions, old, new) {
            self.store_descriptions(&descriptions)?;
        }
        let mut parameters = self.parameter_map()?;
        if relocate(&mut parameters, old, new) {
            self.store_parameters(&parameters)?;
        }
        Ok(())
    }
}
