//! Resource Cache
//!
//! UUID-keyed map of live resources. For any id there is at most one resource
//! object alive at a time; every component that asks for the id gets a clone
//! of the same `Arc`.
//!
//! The cache holds one strong reference per entry. An entry is evicted only
//! on request, and only when that reference is the last one. Core resources
//! are pinned and never evicted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::database::ResourceDatabase;
use crate::errors::{Error, Result};
use crate::io::FileSystem;
use crate::loader::GpuUploader;
use crate::resources::{
    ErasedResource, Resource, ResourceId, ResourcePayload, ResourceType, downcast,
};

/// References to an entry held by the cache itself.
const CACHE_HOLDING_COUNT: usize = 1;

#[derive(Default)]
struct CacheInner {
    entries: FxHashMap<ResourceId, Arc<dyn ErasedResource>>,
    pinned: FxHashSet<ResourceId>,
}

pub struct ResourceCache {
    inner: RwLock<CacheInner>,
    database: Arc<ResourceDatabase>,
    fs: Arc<dyn FileSystem>,
}

/// Reads and decodes the library file of `uuid`.
///
/// A missing file maps to [`Error::NotFound`] so callers can fall back.
pub(crate) fn decode_file<T: ResourcePayload>(
    fs: &dyn FileSystem,
    uuid: ResourceId,
    path: &Path,
) -> Result<T> {
    let start = Instant::now();
    let bytes = fs.load(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(uuid),
        _ => Error::Io(e),
    })?;
    let payload = T::deserialize(&bytes)?;
    log::info!(
        "{:?} {uuid} loaded from {} in {:.2} ms.",
        T::KIND,
        path.display(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(payload)
}

impl ResourceCache {
    pub fn new(database: Arc<ResourceDatabase>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            inner: RwLock::default(),
            database,
            fs,
        }
    }

    pub(crate) fn fs(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.fs)
    }

    /// Library path of `uuid`, checked against the expected type.
    pub(crate) fn resolve<T: ResourcePayload>(&self, uuid: ResourceId) -> Result<PathBuf> {
        let exported = self.database.resolve(uuid).ok_or(Error::NotFound(uuid))?;
        if exported.kind != T::KIND {
            return Err(Error::TypeMismatch {
                uuid,
                expected: T::KIND,
                found: exported.kind,
            });
        }
        Ok(exported.exported_path)
    }

    fn cached<T: ResourcePayload>(&self, uuid: ResourceId) -> Result<Option<Arc<Resource<T>>>> {
        let erased = self.inner.read().entries.get(&uuid).cloned();
        erased.map(downcast::<T>).transpose()
    }

    /// Returns the shared instance of `uuid`, loading it on a miss.
    ///
    /// A hit with a payload does no I/O. A cached instance whose payload has
    /// not arrived is filled in place, so the instance identity never changes.
    pub fn try_load<T: ResourcePayload>(&self, uuid: ResourceId) -> Result<Arc<Resource<T>>> {
        if let Some(hit) = self.cached::<T>(uuid)? {
            log::debug!("{:?} {uuid} exists in cache.", T::KIND);
            if !hit.has_payload() {
                hit.set_payload(decode_file::<T>(&*self.fs, uuid, hit.exported_path())?);
            }
            return Ok(hit);
        }

        let path = self.resolve::<T>(uuid)?;
        let payload = decode_file::<T>(&*self.fs, uuid, &path)?;
        let resource = Arc::new(Resource::with_payload(uuid, path, payload));
        self.add_resource_to_cache(resource)
    }

    /// Like [`try_load`](Self::try_load), but logs the failure and returns
    /// `None` so rendering code can substitute a fallback.
    pub fn load<T: ResourcePayload>(&self, uuid: ResourceId) -> Option<Arc<Resource<T>>> {
        match self.try_load(uuid) {
            Ok(resource) => Some(resource),
            Err(e) => {
                log::error!("Failed to load {:?} {uuid}: {e}", T::KIND);
                None
            }
        }
    }

    /// Pure lookup, never does I/O. A type mismatch reads as a miss.
    pub fn retrieve_from_cache_if_exist<T: ResourcePayload>(
        &self,
        uuid: ResourceId,
    ) -> Option<Arc<Resource<T>>> {
        self.cached::<T>(uuid).ok().flatten()
    }

    pub fn retrieve_erased(&self, uuid: ResourceId) -> Option<Arc<dyn ErasedResource>> {
        self.inner.read().entries.get(&uuid).cloned()
    }

    /// Inserts an instance produced elsewhere and returns the instance that
    /// is now cached for its id.
    ///
    /// If the id is already cached, the existing instance wins and `resource`
    /// is dropped.
    pub fn add_resource_to_cache<T: ResourcePayload>(
        &self,
        resource: Arc<Resource<T>>,
    ) -> Result<Arc<Resource<T>>> {
        let uuid = resource.uuid();
        let mut inner = self.inner.write();
        if let Some(existing) = inner.entries.get(&uuid) {
            let existing = downcast::<T>(Arc::clone(existing))?;
            if !Arc::ptr_eq(&existing, &resource) {
                log::debug!("{:?} {uuid} already cached, discarding duplicate instance.", T::KIND);
            }
            return Ok(existing);
        }
        inner.entries.insert(uuid, Arc::clone(&resource) as Arc<dyn ErasedResource>);
        Ok(resource)
    }

    /// Inserts a resource that must stay cached for the process lifetime.
    pub(crate) fn pin<T: ResourcePayload>(&self, resource: &Arc<Resource<T>>) {
        let uuid = resource.uuid();
        let mut inner = self.inner.write();
        inner
            .entries
            .insert(uuid, Arc::clone(resource) as Arc<dyn ErasedResource>);
        inner.pinned.insert(uuid);
    }

    /// Evicts `uuid` if nothing outside the cache references it.
    ///
    /// Returns `true` when the entry was removed. Pinned entries and entries
    /// with any outstanding reference are left alone.
    pub fn remove_from_cache_if_unreferenced(&self, uuid: ResourceId) -> bool {
        let mut inner = self.inner.write();
        if inner.pinned.contains(&uuid) {
            return false;
        }
        let unreferenced = inner
            .entries
            .get(&uuid)
            .is_some_and(|e| Arc::strong_count(e) <= CACHE_HOLDING_COUNT);
        if unreferenced {
            inner.entries.remove(&uuid);
            log::debug!("Resource {uuid} evicted from cache.");
        }
        unreferenced
    }

    /// Evicts every unpinned entry nobody references. Runs only when called.
    pub fn evict_unreferenced(&self) -> usize {
        let mut inner = self.inner.write();
        let CacheInner { entries, pinned } = &mut *inner;
        let before = entries.len();
        entries.retain(|id, e| pinned.contains(id) || Arc::strong_count(e) > CACHE_HOLDING_COUNT);
        before - entries.len()
    }

    /// Uploads the payload of a cached resource and marks it initialized.
    /// Must be called on the thread that owns the graphics context.
    pub fn init_resource(
        &self,
        uuid: ResourceId,
        kind: ResourceType,
        uploader: &mut dyn GpuUploader,
    ) -> Result<()> {
        let erased = self.retrieve_erased(uuid).ok_or(Error::NotFound(uuid))?;
        if erased.kind() != kind {
            return Err(Error::TypeMismatch {
                uuid,
                expected: kind,
                found: erased.kind(),
            });
        }
        erased.initialize(uploader)
    }

    pub fn contains(&self, uuid: ResourceId) -> bool {
        self.inner.read().entries.contains_key(&uuid)
    }

    pub fn is_pinned(&self, uuid: ResourceId) -> bool {
        self.inner.read().pinned.contains(&uuid)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}
