//! Neutral scene graph produced by a [`SceneParser`].
//!
//! The model importer only ever sees these types, so a new source format is
//! one parser away.

use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use glam::Mat4;

pub type ParseError = Box<dyn StdError + Send + Sync>;

/// Decomposes a model source file into an [`ImportedScene`].
pub trait SceneParser: Send + Sync {
    /// Whether this parser understands files with extension `ext` (lowercase).
    fn handles(&self, ext: &str) -> bool;

    /// `source` is the path the bytes were read from; relative references in
    /// the file resolve against its parent directory.
    fn parse(&self, source: &Path, bytes: &[u8]) -> Result<ImportedScene, ParseError>;
}

#[derive(Debug, Default)]
pub struct ImportedScene {
    pub roots: Vec<SceneNode>,
    pub meshes: Vec<ImportedMesh>,
    pub textures: Vec<TextureSource>,
    pub skins: Vec<ImportedSkin>,
    pub animations: Vec<ImportedAnimation>,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: Option<String>,
    /// Transform relative to the parent node.
    pub transform: Mat4,
    /// Indices into [`ImportedScene::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportedMesh {
    pub positions: Vec<[f32; 3]>,
    /// Empty when the source has no normals.
    pub normals: Vec<[f32; 3]>,
    /// Empty when the source has no texture coordinates.
    pub tex_coords: Vec<[f32; 2]>,
    /// `None` for non-indexed geometry.
    pub indices: Option<Vec<u32>>,
    /// Indices into [`ImportedScene::textures`], in slot order.
    pub textures: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureSource {
    /// Image file, relative to the model's directory unless absolute.
    File(PathBuf),
    /// Image stored inside the model file.
    Embedded { name: String },
}

#[derive(Debug, Clone)]
pub struct ImportedSkin {
    pub name: String,
    pub joints: Vec<SkinJoint>,
}

#[derive(Debug, Clone)]
pub struct SkinJoint {
    pub name: String,
    /// Index into the owning skin's joint list.
    pub parent: Option<usize>,
    pub inverse_bind: Mat4,
}

#[derive(Debug, Clone)]
pub struct ImportedAnimation {
    pub name: String,
    pub tracks: Vec<NodeTrack>,
}

/// Animated translation/rotation of one node. Keys are `(seconds, value)`,
/// sorted by time.
#[derive(Debug, Clone)]
pub struct NodeTrack {
    pub node: String,
    pub rest_translation: [f32; 3],
    pub rest_rotation: [f32; 4],
    pub translations: Vec<(f32, [f32; 3])>,
    pub rotations: Vec<(f32, [f32; 4])>,
}
