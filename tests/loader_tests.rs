//! Background Loader Tests
//!
//! Tests for:
//! - request: metadata available immediately, payload after finalize
//! - One load and one instance for many requesters, one event each
//! - Failed loads: Failed events, resource stays uninitialized and cached
//! - An in-flight load keeps its entry from being evicted

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{Project, register_mesh, register_texture, triangle_mesh};
use myth_library::{
    Error, GpuUploader, LoadEvent, LocalFileSystem, Mesh, NullUploader, Requester,
    ResourceId, ResourceManager, Texture,
};

fn manager(project: &Project) -> ResourceManager {
    ResourceManager::new(project.config.clone(), Arc::new(LocalFileSystem)).unwrap()
}

/// Calls `finalize_pending` until `count` events arrived or five seconds pass.
fn finalize_until(
    manager: &ResourceManager,
    uploader: &mut dyn GpuUploader,
    count: usize,
) -> Vec<LoadEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut events = Vec::new();
    while events.len() < count && Instant::now() < deadline {
        events.extend(manager.finalize_pending(uploader));
        std::thread::sleep(Duration::from_millis(5));
    }
    events
}

#[derive(Default)]
struct RecordingUploader {
    textures: Vec<ResourceId>,
}

impl GpuUploader for RecordingUploader {
    fn upload_texture(&mut self, uuid: ResourceId, _texture: &Texture) -> myth_library::Result<()> {
        self.textures.push(uuid);
        Ok(())
    }
}

// ============================================================================
// Requests
// ============================================================================

#[test]
fn request_returns_metadata_then_payload() {
    let project = Project::new();
    let manager = manager(&project);
    let path = register_mesh(
        &project.config,
        &manager.database,
        "a.gltf",
        ResourceId(2_000),
        &triangle_mesh(),
    );

    let mesh = manager
        .request::<Mesh>(ResourceId(2_000), Requester(1))
        .unwrap();
    assert_eq!(mesh.uuid(), ResourceId(2_000));
    assert_eq!(mesh.exported_path(), path.as_path());
    assert!(!mesh.is_initialized());

    let events = finalize_until(&manager, &mut NullUploader, 1);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        LoadEvent::Ready {
            requester: Requester(1),
            ..
        }
    ));
    assert!(mesh.is_initialized());
    assert_eq!(*mesh.payload().unwrap(), triangle_mesh());
    assert_eq!(manager.pending_loads(), 0);

    // Synchronous loads now hit the same instance.
    let loaded = manager.try_load::<Mesh>(ResourceId(2_000)).unwrap();
    assert!(Arc::ptr_eq(&mesh, &loaded));
}

#[test]
fn many_requesters_share_one_instance_and_upload() {
    let project = Project::new();
    let manager = manager(&project);
    register_texture(
        &project.config,
        &manager.database,
        ResourceId(2_100),
        &Texture::solid([5, 6, 7, 8]),
    );

    let requested: Vec<_> = (0..4)
        .map(|i| {
            manager
                .request::<Texture>(ResourceId(2_100), Requester(i))
                .unwrap()
        })
        .collect();
    for resource in &requested[1..] {
        assert!(Arc::ptr_eq(&requested[0], resource));
    }

    let mut uploader = RecordingUploader::default();
    let events = finalize_until(&manager, &mut uploader, 4);
    assert_eq!(events.len(), 4);
    let mut requesters: Vec<u64> = events.iter().map(|e| e.requester().0).collect();
    requesters.sort_unstable();
    assert_eq!(requesters, [0, 1, 2, 3]);
    assert!(events.iter().all(|e| matches!(e, LoadEvent::Ready { .. })));
    assert_eq!(uploader.textures, vec![ResourceId(2_100)]);
    assert!(requested[0].is_initialized());
}

#[test]
fn request_for_loaded_resource_reports_ready() {
    let project = Project::new();
    let manager = manager(&project);
    register_texture(
        &project.config,
        &manager.database,
        ResourceId(2_200),
        &Texture::solid([1; 4]),
    );
    let loaded = manager.try_load::<Texture>(ResourceId(2_200)).unwrap();

    let requested = manager
        .request::<Texture>(ResourceId(2_200), Requester(9))
        .unwrap();
    assert!(Arc::ptr_eq(&loaded, &requested));
    let events = finalize_until(&manager, &mut NullUploader, 1);
    assert!(matches!(
        events.as_slice(),
        [LoadEvent::Ready {
            requester: Requester(9),
            ..
        }]
    ));
    assert!(loaded.is_initialized());
}

#[test]
fn unknown_id_fails_synchronously() {
    let project = Project::new();
    let manager = manager(&project);
    let cached_before = manager.cache.len();

    let err = manager
        .request::<Mesh>(ResourceId(42), Requester(1))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(ResourceId(42))));
    assert_eq!(manager.cache.len(), cached_before);
    assert_eq!(manager.pending_loads(), 0);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn corrupt_file_reports_failed_and_keeps_instance() {
    let project = Project::new();
    let manager = manager(&project);
    let path = register_mesh(
        &project.config,
        &manager.database,
        "a.gltf",
        ResourceId(2_300),
        &triangle_mesh(),
    );
    std::fs::write(&path, [1, 2, 3]).unwrap();

    let mesh = manager
        .request::<Mesh>(ResourceId(2_300), Requester(4))
        .unwrap();
    let events = finalize_until(&manager, &mut NullUploader, 1);
    match events.as_slice() {
        [LoadEvent::Failed {
            requester, error, ..
        }] => {
            assert_eq!(*requester, Requester(4));
            assert!(matches!(**error, Error::CorruptData(_)));
        }
        other => panic!("unexpected events: {other:?}"),
    }
    assert!(!mesh.is_initialized());
    assert!(!mesh.has_payload());

    // The file is fixed; the same instance is filled in place.
    std::fs::write(&path, myth_library::BinaryCodec::serialize(&triangle_mesh())).unwrap();
    let retried = manager
        .request::<Mesh>(ResourceId(2_300), Requester(5))
        .unwrap();
    assert!(Arc::ptr_eq(&mesh, &retried));
    let events = finalize_until(&manager, &mut NullUploader, 1);
    assert!(matches!(events.as_slice(), [LoadEvent::Ready { .. }]));
    assert!(mesh.is_initialized());
}

#[test]
fn in_flight_load_keeps_entry_cached() {
    let project = Project::new();
    let manager = manager(&project);
    register_mesh(
        &project.config,
        &manager.database,
        "a.gltf",
        ResourceId(2_400),
        &triangle_mesh(),
    );

    let mesh = manager
        .request::<Mesh>(ResourceId(2_400), Requester(1))
        .unwrap();
    let ptr = Arc::as_ptr(&mesh);
    drop(mesh);

    // The pending load holds the instance until it is finalized.
    assert_eq!(manager.pending_loads(), 1);
    assert!(!manager.remove_resource_from_cache_if_needed(ResourceId(2_400)));
    assert_eq!(manager.evict_unreferenced(), 0);

    let events = finalize_until(&manager, &mut NullUploader, 1);
    assert!(matches!(events.as_slice(), [LoadEvent::Ready { .. }]));
    let cached = manager
        .retrieve_from_cache_if_exist::<Mesh>(ResourceId(2_400))
        .unwrap();
    assert_eq!(Arc::as_ptr(&cached), ptr);
    assert!(cached.is_initialized());
    drop(cached);

    // Finalized and unreferenced: now it may go.
    assert!(manager.remove_resource_from_cache_if_needed(ResourceId(2_400)));
}

#[test]
fn requesters_of_a_failed_load_each_get_one_event() {
    let project = Project::new();
    let manager = manager(&project);
    let path = register_mesh(
        &project.config,
        &manager.database,
        "a.gltf",
        ResourceId(2_500),
        &triangle_mesh(),
    );
    std::fs::write(&path, [0; 5]).unwrap();

    let mesh = manager
        .request::<Mesh>(ResourceId(2_500), Requester(1))
        .unwrap();
    manager
        .request::<Mesh>(ResourceId(2_500), Requester(2))
        .unwrap();
    let events = finalize_until(&manager, &mut NullUploader, 2);
    let mut failed: Vec<u64> = events
        .iter()
        .filter(|e| matches!(e, LoadEvent::Failed { .. }))
        .map(|e| e.requester().0)
        .collect();
    failed.sort_unstable();
    assert_eq!(failed, [1, 2]);
    assert_eq!(manager.pending_loads(), 0);

    // The claim is released with the failure; the next request loads afresh
    // and is reported on its own.
    std::fs::write(&path, myth_library::BinaryCodec::serialize(&triangle_mesh())).unwrap();
    manager
        .request::<Mesh>(ResourceId(2_500), Requester(3))
        .unwrap();
    let events = finalize_until(&manager, &mut NullUploader, 1);
    assert!(matches!(
        events.as_slice(),
        [LoadEvent::Ready {
            requester: Requester(3),
            ..
        }]
    ));
    assert!(mesh.is_initialized());
    assert_eq!(manager.pending_loads(), 0);
}
