//! Background Loading
//!
//! [`BackgroundLoader::request`] hands back the resource object immediately
//! (metadata only) and reads its payload on a worker thread. Finished payloads
//! queue up on a channel until the render thread calls
//! [`BackgroundLoader::finalize_pending`], which installs them, runs the GPU
//! upload through a [`GpuUploader`] and reports one [`LoadEvent`] per waiting
//! requester.
//!
//! The requester is passed explicitly with every request, so concurrent
//! loads for different components never share attribution state.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Runtime;

use crate::cache::{ResourceCache, decode_file};
use crate::errors::{Error, Result};
use crate::resources::{
    Animation, ErasedResource, Material, Mesh, Resource, ResourceId, ResourcePayload,
    ResourceType, Skeleton, Texture,
};

/// Render-side collaborator that turns payloads into GPU objects.
///
/// Every method defaults to a no-op so headless users only implement what
/// they draw.
pub trait GpuUploader {
    fn upload_mesh(&mut self, _uuid: ResourceId, _mesh: &Mesh) -> Result<()> {
        Ok(())
    }

    fn upload_texture(&mut self, _uuid: ResourceId, _texture: &Texture) -> Result<()> {
        Ok(())
    }

    fn upload_material(&mut self, _uuid: ResourceId, _material: &Material) -> Result<()> {
        Ok(())
    }

    fn upload_skeleton(&mut self, _uuid: ResourceId, _skeleton: &Skeleton) -> Result<()> {
        Ok(())
    }

    fn upload_animation(&mut self, _uuid: ResourceId, _animation: &Animation) -> Result<()> {
        Ok(())
    }
}

/// Uploader for headless use: accepts everything, creates nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUploader;

impl GpuUploader for NullUploader {}

/// Identifies who asked for a load (typically a component id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Requester(pub u64);

#[derive(Debug)]
pub enum LoadEvent {
    /// The payload is installed and uploaded; the resource can be drawn.
    Ready {
        uuid: ResourceId,
        kind: ResourceType,
        requester: Requester,
    },
    /// The payload could not be produced. The resource stays uninitialized;
    /// draw a fallback instead.
    Failed {
        uuid: ResourceId,
        kind: ResourceType,
        requester: Requester,
        error: Arc<Error>,
    },
}

impl LoadEvent {
    #[must_use]
    pub fn uuid(&self) -> ResourceId {
        match self {
            Self::Ready { uuid, .. } | Self::Failed { uuid, .. } => *uuid,
        }
    }

    #[must_use]
    pub fn requester(&self) -> Requester {
        match self {
            Self::Ready { requester, .. } | Self::Failed { requester, .. } => *requester,
        }
    }
}

enum Outcome {
    Payload(Box<dyn Any + Send>),
    /// The payload was already present when requested; only the upload is left.
    AlreadyPresent,
    Failed(Error),
}

/// A finished request. Holding the resource keeps the cache entry from being
/// evicted until the completion is finalized.
struct Completed {
    resource: Arc<dyn ErasedResource>,
    outcome: Outcome,
}

pub struct BackgroundLoader {
    runtime: Runtime,
    cache: Arc<ResourceCache>,
    tx: flume::Sender<Completed>,
    rx: flume::Receiver<Completed>,
    /// Requesters to notify per id, filled while a load is queued or in flight.
    waiting: Mutex<FxHashMap<ResourceId, Vec<Requester>>>,
}

impl BackgroundLoader {
    pub fn new(cache: Arc<ResourceCache>, worker_threads: usize) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("myth-resource-loader")
            .build()
            .map_err(|e| Error::Runtime(e.to_string()))?;
        let (tx, rx) = flume::unbounded();
        Ok(Self {
            runtime,
            cache,
            tx,
            rx,
            waiting: Mutex::new(FxHashMap::default()),
        })
    }

    /// Returns the shared instance for `uuid` right away and makes sure its
    /// payload is on its way.
    ///
    /// Unknown ids and type mismatches fail synchronously. Everything after
    /// that is reported through [`finalize_pending`](Self::finalize_pending).
    pub fn request<T: ResourcePayload>(
        &self,
        uuid: ResourceId,
        requester: Requester,
    ) -> Result<Arc<Resource<T>>> {
        let resource = match self.cache.retrieve_from_cache_if_exist::<T>(uuid) {
            Some(hit) => hit,
            None => {
                let path = self.cache.resolve::<T>(uuid)?;
                self.cache
                    .add_resource_to_cache(Arc::new(Resource::<T>::new(uuid, path)))?
            }
        };

        // The load claim is only released under this lock, so a requester is
        // either picked up by the load in flight or starts a new one.
        let mut waiting = self.waiting.lock();
        waiting.entry(uuid).or_default().push(requester);
        if resource.has_payload() {
            self.complete(Completed {
                resource: Arc::clone(&resource) as Arc<dyn ErasedResource>,
                outcome: Outcome::AlreadyPresent,
            });
        } else if resource.try_begin_load() {
            self.spawn_load(&resource);
        }
        drop(waiting);
        Ok(resource)
    }

    fn spawn_load<T: ResourcePayload>(&self, resource: &Arc<Resource<T>>) {
        let fs = self.cache.fs();
        let tx = self.tx.clone();
        let resource = Arc::clone(resource);
        self.runtime.spawn_blocking(move || {
            let outcome =
                match decode_file::<T>(&*fs, resource.uuid(), resource.exported_path()) {
                    Ok(payload) => Outcome::Payload(Box::new(payload)),
                    Err(e) => Outcome::Failed(e),
                };
            // The receiver lives as long as the loader; a send can only fail
            // during shutdown, when nobody is left to notify.
            let _ = tx.send(Completed {
                resource: resource as Arc<dyn ErasedResource>,
                outcome,
            });
        });
    }

    fn complete(&self, completed: Completed) {
        let _ = self.tx.send(completed);
    }

    /// Installs every finished payload and uploads it. Render thread only.
    pub fn finalize_pending(&self, uploader: &mut dyn GpuUploader) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        for Completed { resource, outcome } in self.rx.try_iter() {
            let uuid = resource.uuid();
            let kind = resource.kind();
            let claimed = !matches!(outcome, Outcome::AlreadyPresent);
            let result = Self::finalize_one(&*resource, outcome, uploader);

            let requesters = {
                let mut waiting = self.waiting.lock();
                if claimed {
                    resource.end_load();
                }
                waiting.remove(&uuid).unwrap_or_default()
            };

            match result {
                Ok(()) => events.extend(requesters.into_iter().map(|requester| LoadEvent::Ready {
                    uuid,
                    kind,
                    requester,
                })),
                Err(error) => {
                    log::error!("Background load of {kind:?} {uuid} failed: {error}");
                    let error = Arc::new(error);
                    events.extend(requesters.into_iter().map(|requester| LoadEvent::Failed {
                        uuid,
                        kind,
                        requester,
                        error: Arc::clone(&error),
                    }));
                }
            }
        }
        events
    }

    fn finalize_one(
        resource: &dyn ErasedResource,
        outcome: Outcome,
        uploader: &mut dyn GpuUploader,
    ) -> Result<()> {
        match outcome {
            Outcome::Payload(payload) => {
                resource.install_payload(payload)?;
                resource.initialize(uploader)
            }
            Outcome::AlreadyPresent => resource.initialize(uploader),
            Outcome::Failed(error) => Err(error),
        }
    }

    /// Requests with a load queued or in flight.
    pub fn pending(&self) -> usize {
        self.waiting.lock().len()
    }
}
