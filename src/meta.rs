//! Meta sidecar records.
//!
//! Each imported source asset gets a JSON sidecar next to it holding the
//! [`ImportOptions`] record: the fingerprint seen at import time, the id
//! assigned to the asset, and every library file the import produced.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::io::FileSystem;
use crate::resources::{ResourceId, ResourceType};

pub const META_VERSION: u32 = 1;

/// Which importer produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Model,
    Texture,
}

/// One library file produced by an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedResource {
    pub uuid: ResourceId,
    pub kind: ResourceType,
    pub name: String,
    pub exported_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub version: u32,
    pub uuid: ResourceId,
    pub importer: ImportKind,
    pub source_path: PathBuf,
    /// Library file (textures) or output directory (models).
    pub exported_path: PathBuf,
    pub fingerprint: Fingerprint,
    /// Resources contained in a model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExportedResource>,
}

impl ImportOptions {
    pub fn read(fs: &dyn FileSystem, meta_path: &Path) -> Result<Self> {
        let bytes = fs.load(meta_path)?;
        serde_json::from_slice(&bytes).map_err(|source| Error::Meta {
            path: meta_path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, fs: &dyn FileSystem, meta_path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| Error::Meta {
            path: meta_path.to_path_buf(),
            source,
        })?;
        fs.save(meta_path, &json)?;
        Ok(())
    }

    /// Every library file this record knows about, loadable by id.
    pub fn resources(&self) -> impl Iterator<Item = ExportedResource> + '_ {
        let own = match self.importer {
            ImportKind::Texture => Some(ExportedResource {
                uuid: self.uuid,
                kind: ResourceType::Texture,
                name: self
                    .source_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                exported_path: self.exported_path.clone(),
            }),
            ImportKind::Model => None,
        };
        own.into_iter().chain(self.children.iter().cloned())
    }

    /// Every id this record claims: its own plus its children's.
    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        std::iter::once(self.uuid).chain(self.children.iter().map(|c| c.uuid))
    }

    /// The library file registered under `uuid`, if this record owns one.
    #[must_use]
    pub fn resolve(&self, uuid: ResourceId) -> Option<ExportedResource> {
        self.resources().find(|r| r.uuid == uuid)
    }

    #[must_use]
    pub fn child(&self, name: &str, kind: ResourceType) -> Option<&ExportedResource> {
        self.children.iter().find(|c| c.name == name && c.kind == kind)
    }
}
