//! Resource Database Tests
//!
//! Tests for:
//! - Build: scanning meta sidecars, skipping unreadable ones
//! - Duplicate ids: first in path order wins, or the build is rejected
//! - AddEntry idempotence and child id resolution

mod common;

use std::path::PathBuf;

use common::Project;
use myth_library::meta::META_VERSION;
use myth_library::{
    DuplicatePolicy, Error, ExportedResource, Fingerprint, ImportKind, ImportOptions,
    LocalFileSystem, ResourceDatabase, ResourceId, ResourceType,
};

fn texture_record(project: &Project, source: &str, uuid: u64) -> ImportOptions {
    ImportOptions {
        version: META_VERSION,
        uuid: ResourceId(uuid),
        importer: ImportKind::Texture,
        source_path: project.asset(source),
        exported_path: project
            .config
            .textures_dir()
            .join(format!("{uuid}.tex")),
        fingerprint: Fingerprint::ContentHash(uuid),
        children: Vec::new(),
    }
}

fn write_meta(project: &Project, record: &ImportOptions) -> PathBuf {
    let meta = project.config.meta_path(&record.source_path);
    record.write(&LocalFileSystem, &meta).unwrap();
    meta
}

// ============================================================================
// Build
// ============================================================================

#[test]
fn build_indexes_every_meta_file() {
    let project = Project::new();
    write_meta(&project, &texture_record(&project, "a.png", 100));
    std::fs::create_dir_all(project.asset("nested")).unwrap();
    write_meta(&project, &texture_record(&project, "nested/b.png", 200));

    let database = ResourceDatabase::new();
    let report = database.build(&LocalFileSystem, &project.config).unwrap();
    assert_eq!(report.loaded, 2);
    assert!(report.skipped.is_empty());
    assert!(database.contains(ResourceId(100)));
    assert!(database.contains(ResourceId(200)));

    let resolved = database.resolve(ResourceId(200)).unwrap();
    assert_eq!(resolved.kind, ResourceType::Texture);
    assert!(resolved.exported_path.ends_with("200.tex"));

    let by_source = database.find_by_source(&project.asset("nested/b.png")).unwrap();
    assert_eq!(by_source.uuid, ResourceId(200));
    assert!(database.find_by_source(&project.asset("c.png")).is_none());
}

#[test]
fn build_without_asset_tree_is_empty() {
    let project = Project::new();
    std::fs::remove_dir_all(&project.config.assets_root).unwrap();
    let database = ResourceDatabase::new();
    let report = database.build(&LocalFileSystem, &project.config).unwrap();
    assert_eq!(report.loaded, 0);
    assert!(database.is_empty());
}

#[test]
fn unreadable_meta_is_skipped_not_fatal() {
    let project = Project::new();
    write_meta(&project, &texture_record(&project, "good.png", 5_000));
    project.write_asset("bad.png.meta", b"{ not json");

    let database = ResourceDatabase::new();
    let report = database.build(&LocalFileSystem, &project.config).unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].0.ends_with("bad.png.meta"));
    assert!(database.contains(ResourceId(5_000)));
}

// ============================================================================
// Duplicate Ids
// ============================================================================

#[test]
fn duplicate_id_keeps_first_meta_in_path_order() {
    let project = Project::new();
    // Written in reverse order to make sure discovery order does not matter.
    write_meta(&project, &texture_record(&project, "zebra.png", 777));
    write_meta(&project, &texture_record(&project, "apple.png", 777));

    let database = ResourceDatabase::new();
    let report = database.build(&LocalFileSystem, &project.config).unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(report.duplicates.len(), 1);
    assert_eq!(report.duplicates[0].uuid, ResourceId(777));
    assert!(report.duplicates[0].kept.ends_with("apple.png"));
    assert!(report.duplicates[0].shadowed.ends_with("zebra.png"));

    let record = database.lookup(ResourceId(777)).unwrap();
    assert!(record.source_path.ends_with("apple.png"));
}

#[test]
fn reject_policy_fails_the_build() {
    let mut project = Project::new();
    project.config.duplicate_policy = DuplicatePolicy::Reject;
    write_meta(&project, &texture_record(&project, "one.png", 31));
    write_meta(&project, &texture_record(&project, "two.png", 31));

    let database = ResourceDatabase::new();
    let err = database.build(&LocalFileSystem, &project.config).unwrap_err();
    assert!(matches!(err, Error::DuplicateUuid { uuid: ResourceId(31), .. }));
}

// ============================================================================
// AddEntry
// ============================================================================

#[test]
fn add_entry_is_a_noop_for_known_ids() {
    let project = Project::new();
    let database = ResourceDatabase::new();
    assert!(database.add_entry(texture_record(&project, "a.png", 9)));

    let mut other = texture_record(&project, "other.png", 9);
    other.fingerprint = Fingerprint::ContentHash(12345);
    assert!(!database.add_entry(other));

    let record = database.lookup(ResourceId(9)).unwrap();
    assert!(record.source_path.ends_with("a.png"));
    assert_eq!(database.len(), 1);
}

#[test]
fn add_entry_from_meta_reads_the_sidecar() {
    let project = Project::new();
    let meta = write_meta(&project, &texture_record(&project, "c.png", 64));
    let database = ResourceDatabase::new();
    assert!(database.add_entry_from_meta(&LocalFileSystem, &meta).unwrap());
    assert!(!database.add_entry_from_meta(&LocalFileSystem, &meta).unwrap());
    assert!(database.find_by_source(&project.asset("c.png")).is_some());
}

#[test]
fn model_children_resolve_through_their_parent() {
    let project = Project::new();
    let record = ImportOptions {
        version: META_VERSION,
        uuid: ResourceId(1_000),
        importer: ImportKind::Model,
        source_path: project.asset("robot.gltf"),
        exported_path: project.config.meshes_dir().join("robot_1000"),
        fingerprint: Fingerprint::ContentHash(1),
        children: vec![
            ExportedResource {
                uuid: ResourceId(1_001),
                kind: ResourceType::Mesh,
                name: "Body0".into(),
                exported_path: project.config.meshes_dir().join("robot_1000/Body0.mesh"),
            },
            ExportedResource {
                uuid: ResourceId(1_002),
                kind: ResourceType::Skeleton,
                name: "Rig".into(),
                exported_path: project
                    .config
                    .meshes_dir()
                    .join("robot_1000/Skeletons/Rig.skel"),
            },
        ],
    };
    let database = ResourceDatabase::new();
    assert!(database.add_entry(record));

    assert_eq!(database.len(), 3);
    assert_eq!(
        database.resolve(ResourceId(1_002)).unwrap().kind,
        ResourceType::Skeleton
    );
    // The model id itself has no library file.
    assert!(database.resolve(ResourceId(1_000)).is_none());
    assert_eq!(
        database.lookup(ResourceId(1_001)).unwrap().uuid,
        ResourceId(1_000)
    );

    // A second record claiming a child id is refused as a whole.
    let mut clash = texture_record(&project, "clash.png", 1_001);
    clash.children.clear();
    assert!(!database.add_entry(clash));
}

#[test]
fn fresh_ids_avoid_known_and_reserved_ids() {
    let database = ResourceDatabase::new();
    for _ in 0..64 {
        let id = database.fresh_id();
        assert!(!id.is_reserved());
        assert!(!database.contains(id));
    }
}
