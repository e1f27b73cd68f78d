//! Library Configuration
//!
//! [`LibraryConfig`] describes where source assets and library files live and
//! how the importer decides that a source has changed.
//!
//! ```rust,ignore
//! use myth_library::{LibraryConfig, FingerprintPolicy};
//!
//! let config = LibraryConfig {
//!     assets_root: "game/Assets".into(),
//!     library_root: "game/Library".into(),
//!     fingerprint: FingerprintPolicy::ModifiedTime,
//!     ..Default::default()
//! };
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::fingerprint::FingerprintPolicy;

/// What `ResourceDatabase::build` does when two meta files claim the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Keep the first meta file in path order, warn about the rest.
    #[default]
    KeepFirst,
    /// Keep neither: fail the build so the collision gets fixed.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub assets_root: PathBuf,
    pub library_root: PathBuf,
    /// Appended to the full source file name: `box.gltf` → `box.gltf.meta`.
    pub meta_extension: String,
    pub fingerprint: FingerprintPolicy,
    /// Unit-scale correction applied to decomposed model transforms.
    pub scale_factor: f32,
    pub duplicate_policy: DuplicatePolicy,
    /// Worker threads of the background loader runtime.
    pub loader_threads: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            assets_root: PathBuf::from("Assets"),
            library_root: PathBuf::from("Library"),
            meta_extension: "meta".to_string(),
            fingerprint: FingerprintPolicy::ContentHash,
            scale_factor: 0.01,
            duplicate_policy: DuplicatePolicy::KeepFirst,
            loader_threads: 2,
        }
    }
}

impl LibraryConfig {
    /// Config rooted at `root`, with `Assets/` and `Library/` beneath it.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            assets_root: root.join("Assets"),
            library_root: root.join("Library"),
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    // Library layout

    #[must_use]
    pub fn meshes_dir(&self) -> PathBuf {
        self.library_root.join("Meshes")
    }

    #[must_use]
    pub fn textures_dir(&self) -> PathBuf {
        self.library_root.join("Textures")
    }

    #[must_use]
    pub fn materials_dir(&self) -> PathBuf {
        self.library_root.join("Materials")
    }

    /// Sidecar path for a source asset.
    #[must_use]
    pub fn meta_path(&self, source: &Path) -> PathBuf {
        let mut name = source.as_os_str().to_os_string();
        name.push(".");
        name.push(&self.meta_extension);
        PathBuf::from(name)
    }

    #[must_use]
    pub fn is_meta_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.meta_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = LibraryConfig::from_json_str(
            r#"{ "library_root": "out/lib", "fingerprint": "ModifiedTime" }"#,
        )
        .unwrap();
        assert_eq!(config.library_root, PathBuf::from("out/lib"));
        assert_eq!(config.fingerprint, FingerprintPolicy::ModifiedTime);
        assert_eq!(config.assets_root, PathBuf::from("Assets"));
        assert!((config.scale_factor - 0.01).abs() < f32::EPSILON);
    }

    #[test]
    fn meta_path_keeps_source_extension() {
        let config = LibraryConfig::default();
        let meta = config.meta_path(Path::new("Assets/box.gltf"));
        assert_eq!(meta, PathBuf::from("Assets/box.gltf.meta"));
        assert!(config.is_meta_file(&meta));
        assert!(!config.is_meta_file(Path::new("Assets/box.gltf")));
    }
}
