//! Resource Manager
//!
//! The narrow interface the rest of the engine talks to: import by path,
//! load by id, release when done. Cloning is cheap; every clone shares the
//! same database, cache and loader.

use std::path::Path;
use std::sync::Arc;

use crate::cache::ResourceCache;
use crate::config::LibraryConfig;
use crate::core_resources::{CoreResource, CoreResources};
use crate::database::{BuildReport, ResourceDatabase};
use crate::errors::Result;
use crate::importer::{ImportOutcome, Importer};
use crate::io::{FileSystem, LocalFileSystem};
use crate::loader::{BackgroundLoader, GpuUploader, LoadEvent, Requester};
use crate::resources::{
    ErasedResource, Material, Resource, ResourceId, ResourcePayload, ResourceType, Texture,
};

#[derive(Clone)]
pub struct ResourceManager {
    pub config: Arc<LibraryConfig>,
    pub database: Arc<ResourceDatabase>,
    pub cache: Arc<ResourceCache>,
    pub importer: Arc<Importer>,
    loader: Arc<BackgroundLoader>,
    core: Arc<CoreResources>,
}

impl ResourceManager {
    /// Creates the manager and installs the core resources. The database is
    /// empty until [`startup`](Self::startup) runs.
    pub fn new(config: LibraryConfig, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let config = Arc::new(config);
        let database = Arc::new(ResourceDatabase::new());
        let cache = Arc::new(ResourceCache::new(Arc::clone(&database), Arc::clone(&fs)));
        let importer = Arc::new(Importer::new(
            Arc::clone(&config),
            fs,
            Arc::clone(&database),
        ));
        let loader = Arc::new(BackgroundLoader::new(
            Arc::clone(&cache),
            config.loader_threads,
        )?);
        let core = Arc::new(CoreResources::install(&cache));

        Ok(Self {
            config,
            database,
            cache,
            importer,
            loader,
            core,
        })
    }

    /// Manager over the local disk.
    pub fn local(config: LibraryConfig) -> Result<Self> {
        Self::new(config, Arc::new(LocalFileSystem))
    }

    /// Indexes every meta file of the asset tree.
    pub fn startup(&self) -> Result<BuildReport> {
        let fs = self.cache.fs();
        self.database.build(&*fs, &self.config)
    }

    // ========================================================================
    // Import
    // ========================================================================

    pub fn import(&self, source: impl AsRef<Path>) -> Result<ImportOutcome> {
        self.importer.import(source.as_ref())
    }

    pub fn import_all(&self) -> Result<Vec<(std::path::PathBuf, Result<ImportOutcome>)>> {
        self.importer.import_directory()
    }

    // ========================================================================
    // Synchronous loading
    // ========================================================================

    pub fn load<T: ResourcePayload>(&self, uuid: ResourceId) -> Option<Arc<Resource<T>>> {
        self.cache.load(uuid)
    }

    pub fn try_load<T: ResourcePayload>(&self, uuid: ResourceId) -> Result<Arc<Resource<T>>> {
        self.cache.try_load(uuid)
    }

    pub fn retrieve_from_cache_if_exist<T: ResourcePayload>(
        &self,
        uuid: ResourceId,
    ) -> Option<Arc<Resource<T>>> {
        self.cache.retrieve_from_cache_if_exist(uuid)
    }

    // ========================================================================
    // Background loading
    // ========================================================================

    pub fn request<T: ResourcePayload>(
        &self,
        uuid: ResourceId,
        requester: Requester,
    ) -> Result<Arc<Resource<T>>> {
        self.loader.request(uuid, requester)
    }

    /// Installs finished background loads. Render thread only.
    pub fn finalize_pending(&self, uploader: &mut dyn GpuUploader) -> Vec<LoadEvent> {
        self.loader.finalize_pending(uploader)
    }

    pub fn pending_loads(&self) -> usize {
        self.loader.pending()
    }

    /// Uploads a cached resource. Render thread only.
    pub fn init_resource(
        &self,
        uuid: ResourceId,
        kind: ResourceType,
        uploader: &mut dyn GpuUploader,
    ) -> Result<()> {
        self.cache.init_resource(uuid, kind, uploader)
    }

    /// Uploads the core resources. Render thread only.
    pub fn init_core_resources(&self, uploader: &mut dyn GpuUploader) -> Result<()> {
        self.core.initialize(&self.cache, uploader)
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// Evicts `uuid` if the cache holds the last reference to it.
    pub fn remove_resource_from_cache_if_needed(&self, uuid: ResourceId) -> bool {
        self.cache.remove_from_cache_if_unreferenced(uuid)
    }

    pub fn evict_unreferenced(&self) -> usize {
        self.cache.evict_unreferenced()
    }

    // ========================================================================
    // Fallbacks
    // ========================================================================

    #[must_use]
    pub fn default_material(&self) -> Arc<Resource<Material>> {
        Arc::clone(&self.core.default_material)
    }

    #[must_use]
    pub fn checkerboard_texture(&self) -> Arc<Resource<Texture>> {
        Arc::clone(&self.core.checkerboard)
    }

    #[must_use]
    pub fn fallback_texture(&self) -> Arc<Resource<Texture>> {
        Arc::clone(&self.core.fallback_texture)
    }

    /// Core resource to draw in place of a missing resource of `kind`.
    #[must_use]
    pub fn fallback_for(&self, kind: ResourceType) -> Option<Arc<dyn ErasedResource>> {
        let core = match kind {
            ResourceType::Material => CoreResource::DefaultMaterial,
            ResourceType::Texture => CoreResource::CheckerboardTexture,
            _ => return None,
        };
        self.cache.retrieve_erased(core.id())
    }
}
