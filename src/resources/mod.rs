//! Resource Objects
//!
//! A resource is split in two halves:
//!
//! - **Metadata** (`uuid`, type, exported path) exists as soon as the
//!   [`Resource`] object is created, and never changes afterwards.
//! - **Payload** (vertex buffers, pixels, ...) arrives later, from a synchronous
//!   load or a background task, and is uploaded to the GPU on the thread that
//!   owns the graphics context. [`Resource::is_initialized`] only turns true
//!   after that upload.
//!
//! Rendering code checks `is_initialized()` and skips the resource otherwise;
//! it never blocks on a payload.

pub mod animation;
pub mod material;
pub mod mesh;
pub mod skeleton;
pub mod texture;

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::BinaryCodec;
use crate::errors::{Error, Result};
use crate::loader::GpuUploader;

pub use animation::{Animation, Channel, KeyFrame};
pub use material::{Material, TextureSlot};
pub use mesh::{Mesh, Vertex};
pub use skeleton::{Joint, Skeleton};
pub use texture::{FilterMode, Texture, TextureSampling, WrapMode};

/// Persistent 64-bit resource identifier. `0` means "no resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl ResourceId {
    pub const NONE: Self = Self(0);

    /// Upper bound (inclusive) of the ids reserved for core resources.
    pub const RESERVED_MAX: u64 = 16;

    /// Draws a fresh id from a v4 UUID folded down to 64 bits.
    ///
    /// Never returns [`ResourceId::NONE`] or a reserved core id.
    #[must_use]
    pub fn generate() -> Self {
        loop {
            let (hi, lo) = Uuid::new_v4().as_u64_pair();
            let id = hi ^ lo;
            if id > Self::RESERVED_MAX {
                return Self(id);
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub fn is_reserved(self) -> bool {
        self.0 != 0 && self.0 <= Self::RESERVED_MAX
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ResourceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Mesh,
    Texture,
    Material,
    Skeleton,
    Animation,
    StateMachine,
}

impl ResourceType {
    /// File extension used for this type inside the library tree.
    #[must_use]
    pub fn library_extension(self) -> &'static str {
        match self {
            Self::Mesh => "mesh",
            Self::Texture => "tex",
            Self::Material => "mat",
            Self::Skeleton => "skel",
            Self::Animation => "anim",
            Self::StateMachine => "stm",
        }
    }
}

/// A payload type that can live in a [`Resource`].
pub trait ResourcePayload: BinaryCodec + Send + Sync + 'static {
    const KIND: ResourceType;

    /// Hands the decoded payload to the renderer. Must run on the thread that
    /// owns the graphics context.
    fn upload(&self, uuid: ResourceId, uploader: &mut dyn GpuUploader) -> Result<()>;
}

/// A shared resource: immutable metadata plus a late-bound payload.
pub struct Resource<T> {
    uuid: ResourceId,
    exported_path: PathBuf,
    initialized: AtomicBool,
    loading: AtomicBool,
    payload: RwLock<Option<T>>,
}

impl<T: ResourcePayload> Resource<T> {
    /// Creates a metadata-only resource; the payload is installed later.
    pub fn new(uuid: ResourceId, exported_path: impl Into<PathBuf>) -> Self {
        Self {
            uuid,
            exported_path: exported_path.into(),
            initialized: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            payload: RwLock::new(None),
        }
    }

    pub fn with_payload(uuid: ResourceId, exported_path: impl Into<PathBuf>, payload: T) -> Self {
        Self {
            uuid,
            exported_path: exported_path.into(),
            initialized: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            payload: RwLock::new(Some(payload)),
        }
    }

    #[inline]
    pub fn uuid(&self) -> ResourceId {
        self.uuid
    }

    #[inline]
    pub fn kind(&self) -> ResourceType {
        T::KIND
    }

    #[inline]
    pub fn exported_path(&self) -> &Path {
        &self.exported_path
    }

    /// True once the payload has been uploaded and the resource can be drawn.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn has_payload(&self) -> bool {
        self.payload.read().is_some()
    }

    /// Read access to the payload, if it has arrived.
    pub fn payload(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.payload.read(), Option::as_ref).ok()
    }

    pub(crate) fn set_payload(&self, payload: T) {
        *self.payload.write() = Some(payload);
    }

    /// Claims the right to load the payload. Only one loader at a time wins.
    pub(crate) fn try_begin_load(&self) -> bool {
        self.loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_load(&self) {
        self.loading.store(false, Ordering::Release);
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("uuid", &self.uuid)
            .field("exported_path", &self.exported_path)
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Type-erased view of a [`Resource`], used by the cache and the loader.
pub trait ErasedResource: Any + Send + Sync {
    fn uuid(&self) -> ResourceId;

    fn kind(&self) -> ResourceType;

    fn exported_path(&self) -> &Path;

    fn is_initialized(&self) -> bool;

    fn has_payload(&self) -> bool;

    /// Installs a payload produced by a background task. The box must hold the
    /// concrete payload type of this resource.
    fn install_payload(&self, payload: Box<dyn Any + Send>) -> Result<()>;

    /// Uploads the payload and flips `initialized`. A no-op when already
    /// initialized; an error when no payload is present yet.
    fn initialize(&self, uploader: &mut dyn GpuUploader) -> Result<()>;

    /// Releases the load claim taken when the payload request was issued.
    fn end_load(&self);

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: ResourcePayload> ErasedResource for Resource<T> {
    fn uuid(&self) -> ResourceId {
        self.uuid
    }

    fn kind(&self) -> ResourceType {
        T::KIND
    }

    fn exported_path(&self) -> &Path {
        &self.exported_path
    }

    fn is_initialized(&self) -> bool {
        Resource::is_initialized(self)
    }

    fn has_payload(&self) -> bool {
        Resource::has_payload(self)
    }

    fn install_payload(&self, payload: Box<dyn Any + Send>) -> Result<()> {
        let payload = payload
            .downcast::<T>()
            .map_err(|_| Error::PayloadMismatch(self.uuid))?;
        self.set_payload(*payload);
        Ok(())
    }

    fn initialize(&self, uploader: &mut dyn GpuUploader) -> Result<()> {
        if Resource::is_initialized(self) {
            return Ok(());
        }
        let guard = self.payload.read();
        let payload = guard.as_ref().ok_or(Error::PayloadPending(self.uuid))?;
        payload.upload(self.uuid, uploader)?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn end_load(&self) {
        Resource::end_load(self);
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Recovers the concrete resource behind an erased handle.
pub(crate) fn downcast<T: ResourcePayload>(
    erased: Arc<dyn ErasedResource>,
) -> Result<Arc<Resource<T>>> {
    let uuid = erased.uuid();
    let found = erased.kind();
    erased
        .into_any()
        .downcast::<Resource<T>>()
        .map_err(|_| Error::TypeMismatch {
            uuid,
            expected: T::KIND,
            found,
        })
}
