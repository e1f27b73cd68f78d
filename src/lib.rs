#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Resource import and caching for the Myth engine.
//!
//! Source assets are imported once into an engine-native binary library,
//! indexed by id through their meta sidecars, and shared at runtime through a
//! cache that keeps at most one instance per id alive.

pub mod cache;
pub mod codec;
pub mod config;
pub mod core_resources;
pub mod database;
pub mod errors;
pub mod fingerprint;
pub mod importer;
pub mod io;
pub mod loader;
pub mod manager;
pub mod meta;
pub mod resources;

pub use cache::ResourceCache;
pub use codec::BinaryCodec;
pub use config::{DuplicatePolicy, LibraryConfig};
pub use core_resources::{CoreResource, CoreResources};
pub use database::{BuildReport, ResourceDatabase};
pub use errors::{CorruptDataError, Error, ImportError, Result};
pub use fingerprint::{Fingerprint, FingerprintPolicy};
pub use importer::{GltfSceneParser, ImportOutcome, Importer, SceneParser};
pub use io::{FileSystem, LocalFileSystem};
pub use loader::{BackgroundLoader, GpuUploader, LoadEvent, NullUploader, Requester};
pub use manager::ResourceManager;
pub use meta::{ExportedResource, ImportKind, ImportOptions};
pub use resources::{
    Animation, ErasedResource, Material, Mesh, Resource, ResourceId, ResourcePayload,
    ResourceType, Skeleton, Texture, TextureSlot, Vertex,
};
