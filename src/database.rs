//! Resource Database
//!
//! Process-wide index from [`ResourceId`] to the [`ImportOptions`] record that
//! produced it. Built once at startup by scanning every meta sidecar in the
//! asset tree, then appended to as new imports complete.
//!
//! Child ids (the meshes, skeletons and animations inside a model) map to
//! their parent's record, so any id can be resolved to its library file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::{DuplicatePolicy, LibraryConfig};
use crate::errors::{Error, Result};
use crate::io::FileSystem;
use crate::meta::{ExportedResource, ImportOptions};
use crate::resources::ResourceId;

/// An id claimed by more than one meta file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateUuid {
    pub uuid: ResourceId,
    /// Source of the record that stayed in the database.
    pub kept: PathBuf,
    /// Source of the record that was dropped.
    pub shadowed: PathBuf,
}

/// Outcome of [`ResourceDatabase::build`].
#[derive(Debug, Default)]
pub struct BuildReport {
    pub loaded: usize,
    /// Meta files that could not be read or parsed, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    pub duplicates: Vec<DuplicateUuid>,
}

#[derive(Default)]
struct DatabaseInner {
    entries: FxHashMap<ResourceId, Arc<ImportOptions>>,
    by_source: FxHashMap<PathBuf, ResourceId>,
}

impl DatabaseInner {
    /// First id of `record` that is already taken, with the record holding it.
    fn collision(&self, record: &ImportOptions) -> Option<(ResourceId, Arc<ImportOptions>)> {
        record
            .ids()
            .find_map(|id| self.entries.get(&id).map(|held| (id, Arc::clone(held))))
    }

    fn insert(&mut self, record: Arc<ImportOptions>) {
        for id in record.ids() {
            self.entries.insert(id, Arc::clone(&record));
        }
        self.by_source.insert(record.source_path.clone(), record.uuid);
    }

    fn remove(&mut self, record: &ImportOptions) {
        for id in record.ids() {
            self.entries.remove(&id);
        }
        self.by_source.remove(&record.source_path);
    }
}

#[derive(Default)]
pub struct ResourceDatabase {
    inner: RwLock<DatabaseInner>,
}

impl ResourceDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans `config.assets_root` for meta files and indexes them.
    ///
    /// Unreadable meta files are skipped with a warning. Id collisions follow
    /// `config.duplicate_policy`; meta files are visited in path order, so
    /// "first" is deterministic.
    pub fn build(&self, fs: &dyn FileSystem, config: &LibraryConfig) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        if !fs.is_dir(&config.assets_root) {
            log::info!(
                "Asset tree {} does not exist, database is empty.",
                config.assets_root.display()
            );
            return Ok(report);
        }

        let metas = fs
            .walk(&config.assets_root)?
            .into_iter()
            .filter(|p| config.is_meta_file(p));

        let mut inner = self.inner.write();
        for meta_path in metas {
            let record = match ImportOptions::read(fs, &meta_path) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping meta file {}: {e}", meta_path.display());
                    report.skipped.push((meta_path, e.to_string()));
                    continue;
                }
            };

            if let Some((uuid, held)) = inner.collision(&record) {
                match config.duplicate_policy {
                    DuplicatePolicy::KeepFirst => {
                        log::warn!(
                            "Duplicate resource id {uuid}: {} shadowed by {}",
                            record.source_path.display(),
                            held.source_path.display()
                        );
                        report.duplicates.push(DuplicateUuid {
                            uuid,
                            kept: held.source_path.clone(),
                            shadowed: record.source_path,
                        });
                        continue;
                    }
                    DuplicatePolicy::Reject => {
                        return Err(Error::DuplicateUuid {
                            uuid,
                            first: held.source_path.clone(),
                            second: record.source_path,
                        });
                    }
                }
            }

            inner.insert(Arc::new(record));
            report.loaded += 1;
        }

        log::info!(
            "Resource database built: {} records, {} skipped, {} duplicates.",
            report.loaded,
            report.skipped.len(),
            report.duplicates.len()
        );
        Ok(report)
    }

    /// Inserts a record. Returns `false` (and changes nothing) if any of its
    /// ids is already indexed.
    pub fn add_entry(&self, record: ImportOptions) -> bool {
        let mut inner = self.inner.write();
        if let Some((uuid, held)) = inner.collision(&record) {
            if held.source_path != record.source_path {
                log::warn!(
                    "Resource id {uuid} from {} already indexed for {}",
                    record.source_path.display(),
                    held.source_path.display()
                );
            }
            return false;
        }
        inner.insert(Arc::new(record));
        true
    }

    /// Reads a meta file and inserts its record.
    pub fn add_entry_from_meta(&self, fs: &dyn FileSystem, meta_path: &Path) -> Result<bool> {
        let record = ImportOptions::read(fs, meta_path)?;
        Ok(self.add_entry(record))
    }

    /// Swaps the record for a re-imported source with `record`.
    ///
    /// Returns `false`, leaving the database unchanged, if an id of `record`
    /// is held by a record of another source.
    pub(crate) fn replace_entry(&self, record: ImportOptions) -> bool {
        let mut inner = self.inner.write();
        let previous = inner
            .by_source
            .get(&record.source_path)
            .and_then(|id| inner.entries.get(id))
            .cloned();
        let clash = record.ids().any(|id| {
            inner
                .entries
                .get(&id)
                .is_some_and(|held| previous.as_ref().is_none_or(|p| !Arc::ptr_eq(p, held)))
        });
        if clash {
            return false;
        }
        if let Some(previous) = previous {
            inner.remove(&previous);
        }
        inner.insert(Arc::new(record));
        true
    }

    pub fn lookup(&self, uuid: ResourceId) -> Option<Arc<ImportOptions>> {
        self.inner.read().entries.get(&uuid).cloned()
    }

    /// The library file registered under `uuid`.
    pub fn resolve(&self, uuid: ResourceId) -> Option<ExportedResource> {
        self.lookup(uuid)?.resolve(uuid)
    }

    pub fn find_by_source(&self, source: &Path) -> Option<Arc<ImportOptions>> {
        let inner = self.inner.read();
        let id = inner.by_source.get(source)?;
        inner.entries.get(id).cloned()
    }

    pub fn contains(&self, uuid: ResourceId) -> bool {
        self.inner.read().entries.contains_key(&uuid)
    }

    /// Number of indexed ids, children included.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// A fresh id not yet present in the database.
    pub fn fresh_id(&self) -> ResourceId {
        let inner = self.inner.read();
        loop {
            let id = ResourceId::generate();
            if !inner.entries.contains_key(&id) {
                return id;
            }
        }
    }
}
