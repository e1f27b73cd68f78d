//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use base64::Engine;
use myth_library::meta::META_VERSION;
use myth_library::{
    BinaryCodec, ExportedResource, FileSystem, Fingerprint, ImportKind, ImportOptions,
    LibraryConfig, LocalFileSystem, Mesh, ResourceDatabase, ResourceId, ResourceType, Texture,
    Vertex,
};
use tempfile::TempDir;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Temporary project directory with `Assets/` and `Library/`.
pub struct Project {
    pub dir: TempDir,
    pub config: LibraryConfig,
}

impl Project {
    pub fn new() -> Self {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let config = LibraryConfig::rooted_at(dir.path());
        std::fs::create_dir_all(&config.assets_root).unwrap();
        Self { dir, config }
    }

    pub fn asset(&self, name: &str) -> PathBuf {
        self.config.assets_root.join(name)
    }

    pub fn write_asset(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.asset(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Every file below `root`, relative to it, sorted.
    pub fn files_under(&self, root: &Path) -> Vec<PathBuf> {
        if !root.exists() {
            return Vec::new();
        }
        LocalFileSystem
            .walk(root)
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect()
    }

    pub fn library_files(&self) -> Vec<PathBuf> {
        self.files_under(&self.config.library_root)
    }

    pub fn meta_files(&self) -> Vec<PathBuf> {
        self.files_under(&self.config.assets_root)
            .into_iter()
            .filter(|p| self.config.is_meta_file(p))
            .collect()
    }
}

pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba(rgba),
    ));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// One triangle: positions (36 bytes) followed by u16 indices (6 bytes).
fn triangle_buffer() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices: [u16; 3] = [0, 1, 2];
    let mut bytes = Vec::new();
    for p in positions {
        bytes.extend_from_slice(&p.to_le_bytes());
    }
    for i in indices {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes
}

/// glTF with two mesh nodes (`Cube`, translated by 100 units, and `Lid`)
/// sharing one material whose base color texture is `texture_uri`.
pub fn two_mesh_gltf(texture_uri: &str) -> String {
    let buffer = triangle_buffer();
    let data = base64::engine::general_purpose::STANDARD.encode(&buffer);
    let primitive = r#"{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }"#;
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0, 1] }}],
  "nodes": [
    {{ "name": "Cube", "mesh": 0, "translation": [100.0, 0.0, 0.0] }},
    {{ "name": "Lid", "mesh": 1 }}
  ],
  "meshes": [
    {{ "name": "A", "primitives": [{primitive}] }},
    {{ "name": "B", "primitives": [{primitive}] }}
  ],
  "materials": [{{ "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }} }}],
  "textures": [{{ "source": 0 }}],
  "images": [{{ "uri": "{texture_uri}" }}],
  "buffers": [{{ "byteLength": {len}, "uri": "data:application/octet-stream;base64,{data}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
        len = buffer.len()
    )
}

/// Key times, translations, rotations and inverse bind matrices, packed
/// little-endian at offsets 0, 8, 32 and 64.
fn rig_buffer() -> Vec<u8> {
    let half = std::f32::consts::FRAC_1_SQRT_2;
    let mut floats: Vec<f32> = vec![0.0, 1.0];
    floats.extend([0.0, 0.0, 0.0, 0.0, 100.0, 0.0]);
    floats.extend([0.0, 0.0, 0.0, 1.0, 0.0, half, 0.0, half]);
    floats.extend(glam::Mat4::IDENTITY.to_cols_array());
    floats.extend(glam::Mat4::from_translation(glam::Vec3::new(0.0, -100.0, 0.0)).to_cols_array());
    floats.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// glTF with a two-joint skin (`Hips` -> `Spine`, the spine 100 units up)
/// named `Rig`, and a clip `Wave` moving and turning the spine over one
/// second.
pub fn rigged_gltf() -> String {
    let buffer = rig_buffer();
    let data = base64::engine::general_purpose::STANDARD.encode(&buffer);
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [
    {{ "name": "Hips", "children": [1] }},
    {{ "name": "Spine", "translation": [0.0, 100.0, 0.0] }}
  ],
  "skins": [{{ "name": "Rig", "joints": [0, 1], "inverseBindMatrices": 3 }}],
  "animations": [{{
    "name": "Wave",
    "channels": [
      {{ "sampler": 0, "target": {{ "node": 1, "path": "translation" }} }},
      {{ "sampler": 1, "target": {{ "node": 1, "path": "rotation" }} }}
    ],
    "samplers": [
      {{ "input": 0, "output": 1, "interpolation": "LINEAR" }},
      {{ "input": 0, "output": 2, "interpolation": "LINEAR" }}
    ]
  }}],
  "buffers": [{{ "byteLength": {len}, "uri": "data:application/octet-stream;base64,{data}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 8 }},
    {{ "buffer": 0, "byteOffset": 8, "byteLength": 24 }},
    {{ "buffer": 0, "byteOffset": 32, "byteLength": 32 }},
    {{ "buffer": 0, "byteOffset": 64, "byteLength": 128 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR",
       "min": [0.0], "max": [1.0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 2, "type": "VEC3" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC4" }},
    {{ "bufferView": 3, "componentType": 5126, "count": 2, "type": "MAT4" }}
  ]
}}"#,
        len = buffer.len()
    )
}

pub fn triangle_mesh() -> Mesh {
    let vertex = |x: f32, y: f32| Vertex {
        position: [x, y, 0.0],
        normal: [0.0, 0.0, 1.0],
        tex_coords: [x, y],
    };
    Mesh::new(
        vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)],
        vec![0, 1, 2],
        vec!["Library/Textures/9.tex".to_string()],
    )
}

/// Writes `mesh` into the library and indexes it under `uuid` through a
/// model record owned by `source`.
pub fn register_mesh(
    config: &LibraryConfig,
    database: &ResourceDatabase,
    source: &str,
    uuid: ResourceId,
    mesh: &Mesh,
) -> PathBuf {
    let path = config.meshes_dir().join(format!("{uuid}.mesh"));
    LocalFileSystem.save(&path, &mesh.serialize()).unwrap();
    let record = ImportOptions {
        version: META_VERSION,
        uuid: ResourceId(uuid.0 + 1_000_000),
        importer: ImportKind::Model,
        source_path: config.assets_root.join(source),
        exported_path: config.meshes_dir(),
        fingerprint: Fingerprint::ContentHash(0),
        children: vec![ExportedResource {
            uuid,
            kind: ResourceType::Mesh,
            name: format!("mesh{uuid}"),
            exported_path: path.clone(),
        }],
    };
    assert!(database.add_entry(record));
    path
}

/// Writes `texture` into the library and indexes it under `uuid`.
pub fn register_texture(
    config: &LibraryConfig,
    database: &ResourceDatabase,
    uuid: ResourceId,
    texture: &Texture,
) -> PathBuf {
    let path = config.textures_dir().join(format!("{uuid}.tex"));
    LocalFileSystem.save(&path, &texture.serialize()).unwrap();
    let record = ImportOptions {
        version: META_VERSION,
        uuid,
        importer: ImportKind::Texture,
        source_path: config.assets_root.join(format!("{uuid}.png")),
        exported_path: path.clone(),
        fingerprint: Fingerprint::ContentHash(0),
        children: Vec::new(),
    };
    assert!(database.add_entry(record));
    path
}

/// Local file system that counts mutating calls, and can be told to fail
/// meta sidecar writes.
#[derive(Default)]
pub struct CountingFs {
    inner: LocalFileSystem,
    pub writes: AtomicUsize,
    fail_meta: AtomicBool,
}

impl CountingFs {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_meta_writes(&self, fail: bool) {
        self.fail_meta.store(fail, Ordering::SeqCst);
    }

    fn count(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl FileSystem for CountingFs {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn load(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.inner.load(path)
    }

    fn save(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        self.count();
        let is_meta = path.extension().is_some_and(|e| e == "meta");
        if is_meta && self.fail_meta.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("disk full"));
        }
        self.inner.save(path, bytes)
    }

    fn make_directory(&self, path: &Path) -> std::io::Result<()> {
        self.count();
        self.inner.make_directory(path)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        self.count();
        self.inner.remove(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        self.count();
        self.inner.rename(from, to)
    }

    fn list_dir(&self, path: &Path) -> std::io::Result<Vec<PathBuf>> {
        self.inner.list_dir(path)
    }

    fn modified_millis(&self, path: &Path) -> std::io::Result<u64> {
        self.inner.modified_millis(path)
    }
}
