//! Core resources: the default material and the fallback textures.
//!
//! They are generated in memory at startup, live under reserved ids, and are
//! pinned in the cache for the lifetime of the process. Rendering code swaps
//! them in whenever a real resource is missing or failed to load.

use std::sync::Arc;

use crate::cache::ResourceCache;
use crate::errors::Result;
use crate::loader::GpuUploader;
use crate::resources::{Material, Resource, ResourceId, ResourceType, Texture, TextureSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum CoreResource {
    DefaultMaterial = 1,
    CheckerboardTexture = 2,
    FallbackTexture = 3,
    BlackTexture = 4,
}

impl CoreResource {
    pub const ALL: [Self; 4] = [
        Self::DefaultMaterial,
        Self::CheckerboardTexture,
        Self::FallbackTexture,
        Self::BlackTexture,
    ];

    #[inline]
    #[must_use]
    pub fn id(self) -> ResourceId {
        ResourceId(self as u64)
    }

    #[must_use]
    pub fn kind(self) -> ResourceType {
        match self {
            Self::DefaultMaterial => ResourceType::Material,
            _ => ResourceType::Texture,
        }
    }
}

const CHECKERBOARD_SIZE: u32 = 64;
const CHECKERBOARD_CELLS: u32 = 8;

/// Root references to the core resources.
pub struct CoreResources {
    pub default_material: Arc<Resource<Material>>,
    pub checkerboard: Arc<Resource<Texture>>,
    pub fallback_texture: Arc<Resource<Texture>>,
    pub black_texture: Arc<Resource<Texture>>,
}

impl CoreResources {
    /// Builds the core resources and pins them in `cache`.
    pub fn install(cache: &ResourceCache) -> Self {
        let mut material = Material::default();
        material.set_texture(TextureSlot::Diffuse, CoreResource::CheckerboardTexture.id());

        let core = Self {
            default_material: Arc::new(Resource::with_payload(
                CoreResource::DefaultMaterial.id(),
                "",
                material,
            )),
            checkerboard: Arc::new(Resource::with_payload(
                CoreResource::CheckerboardTexture.id(),
                "",
                Texture::checkerboard(CHECKERBOARD_SIZE, CHECKERBOARD_CELLS),
            )),
            fallback_texture: Arc::new(Resource::with_payload(
                CoreResource::FallbackTexture.id(),
                "",
                Texture::solid([255, 255, 255, 255]),
            )),
            black_texture: Arc::new(Resource::with_payload(
                CoreResource::BlackTexture.id(),
                "",
                Texture::solid([0, 0, 0, 255]),
            )),
        };

        cache.pin(&core.default_material);
        cache.pin(&core.checkerboard);
        cache.pin(&core.fallback_texture);
        cache.pin(&core.black_texture);
        core
    }

    /// Uploads every core resource. Render thread only.
    pub fn initialize(&self, cache: &ResourceCache, uploader: &mut dyn GpuUploader) -> Result<()> {
        for core in CoreResource::ALL {
            cache.init_resource(core.id(), core.kind(), uploader)?;
        }
        Ok(())
    }
}
