//! Importer
//!
//! Converts source assets (glTF models, image files) into library files and a
//! meta sidecar, and registers the result with the [`ResourceDatabase`].
//!
//! # Import steps
//!
//! 1. **Dedup**: if the sidecar exists, its fingerprint matches the source and
//!    every library file it lists is present, the recorded outcome is returned
//!    without writing anything.
//! 2. **Decompose**: the source is converted into payloads that are written
//!    under a `.partial` staging path.
//! 3. **Commit**: staging is renamed into place, then the sidecar is written
//!    and the database updated. The previous output stays aside until the
//!    sidecar is written, and is put back if that write fails.
//!
//! A failure in any step removes the staging output; no sidecar is written
//! and the database is left untouched.

mod gltf;
mod model;
pub mod scene;
mod texture;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::config::LibraryConfig;
use crate::database::ResourceDatabase;
use crate::errors::{Error, ImportError, Result};
use crate::fingerprint::{Fingerprint, FingerprintPolicy};
use crate::io::FileSystem;
use crate::meta::{ExportedResource, ImportKind, ImportOptions};
use crate::resources::ResourceId;

pub use self::gltf::GltfSceneParser;
pub use self::scene::SceneParser;

const TEXTURE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tga"];

/// Result of a successful [`Importer::import`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub uuid: ResourceId,
    /// Library file (textures) or output directory (models).
    pub exported_path: PathBuf,
    /// Every loadable library file the import produced.
    pub resources: Vec<ExportedResource>,
    /// `true` when the source was already imported and nothing was written.
    pub reused: bool,
}

impl ImportOutcome {
    fn from_record(record: &ImportOptions, reused: bool) -> Self {
        Self {
            uuid: record.uuid,
            exported_path: record.exported_path.clone(),
            resources: record.resources().collect(),
            reused,
        }
    }
}

pub struct Importer {
    config: Arc<LibraryConfig>,
    fs: Arc<dyn FileSystem>,
    database: Arc<ResourceDatabase>,
    parser: Box<dyn SceneParser>,
    /// Serializes imports so a re-import never races another import of the
    /// same source.
    lock: Mutex<()>,
}

impl Importer {
    /// Importer with the glTF scene parser.
    pub fn new(
        config: Arc<LibraryConfig>,
        fs: Arc<dyn FileSystem>,
        database: Arc<ResourceDatabase>,
    ) -> Self {
        Self::with_parser(config, fs, database, Box::new(GltfSceneParser))
    }

    pub fn with_parser(
        config: Arc<LibraryConfig>,
        fs: Arc<dyn FileSystem>,
        database: Arc<ResourceDatabase>,
        parser: Box<dyn SceneParser>,
    ) -> Self {
        Self {
            config,
            fs,
            database,
            parser,
            lock: Mutex::new(()),
        }
    }

    /// Imports one source asset, or returns the existing import if the
    /// source has not changed.
    pub fn import(&self, source: &Path) -> Result<ImportOutcome> {
        let _guard = self.lock.lock();
        self.import_unlocked(source)
    }

    /// Imports every importable source below `config.assets_root`, textures
    /// first so models find their textures already imported.
    ///
    /// One failing source does not stop the others.
    pub fn import_directory(&self) -> Result<Vec<(PathBuf, Result<ImportOutcome>)>> {
        let _guard = self.lock.lock();
        if !self.fs.is_dir(&self.config.assets_root) {
            return Ok(Vec::new());
        }

        let mut sources: Vec<(ImportKind, PathBuf)> = self
            .fs
            .walk(&self.config.assets_root)?
            .into_iter()
            .filter_map(|path| self.kind_of(&path).map(|kind| (kind, path)))
            .collect();
        sources.sort_by_key(|(kind, _)| *kind != ImportKind::Texture);

        let mut outcomes = Vec::with_capacity(sources.len());
        for (_, path) in sources {
            let outcome = self.import_unlocked(&path);
            if let Err(e) = &outcome {
                log::error!("Import of {} failed: {e}", path.display());
            }
            outcomes.push((path, outcome));
        }
        Ok(outcomes)
    }

    fn kind_of(&self, path: &Path) -> Option<ImportKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if TEXTURE_EXTENSIONS.contains(&ext.as_str()) {
            Some(ImportKind::Texture)
        } else if self.parser.handles(&ext) {
            Some(ImportKind::Model)
        } else {
            None
        }
    }

    fn import_unlocked(&self, source: &Path) -> Result<ImportOutcome> {
        let kind = self
            .kind_of(source)
            .ok_or_else(|| ImportError::Unsupported(source.to_path_buf()))?;
        if !self.fs.exists(source) {
            return Err(ImportError::SourceMissing(source.to_path_buf()).into());
        }

        if let Some(record) = self.already_imported(source, kind) {
            log::debug!("{} already imported as {}.", source.display(), record.uuid);
            // The database may not know the record yet if the sidecar was
            // written by another process.
            if !self.database.contains(record.uuid) {
                self.database.add_entry(record.clone());
            }
            return Ok(ImportOutcome::from_record(&record, true));
        }

        let bytes = self
            .fs
            .load(source)
            .map_err(|_| ImportError::SourceMissing(source.to_path_buf()))?;
        let fingerprint = self.fingerprint(source, &bytes)?;
        let previous = self.previous_record(source);

        let record = match kind {
            ImportKind::Texture => {
                self.import_texture(source, &bytes, fingerprint, previous.as_ref())?
            }
            ImportKind::Model => {
                self.import_model(source, &bytes, fingerprint, previous.as_ref())?
            }
        };
        log::info!(
            "Imported {} as {} ({} resources).",
            source.display(),
            record.uuid,
            record.resources().count()
        );
        Ok(ImportOutcome::from_record(&record, false))
    }

    fn fingerprint(&self, source: &Path, bytes: &[u8]) -> Result<Fingerprint> {
        match self.config.fingerprint {
            FingerprintPolicy::ContentHash => Ok(Fingerprint::of_bytes(bytes)),
            policy => Fingerprint::compute(&*self.fs, source, policy),
        }
    }

    /// The sidecar record of `source`, whatever its state.
    fn previous_record(&self, source: &Path) -> Option<ImportOptions> {
        let meta_path = self.config.meta_path(source);
        if !self.fs.exists(&meta_path) {
            return None;
        }
        match ImportOptions::read(&*self.fs, &meta_path) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Ignoring unreadable meta file {}: {e}", meta_path.display());
                None
            }
        }
    }

    /// The sidecar record of `source` if it is current: same importer, same
    /// fingerprint, and every library file it lists still on disk.
    fn already_imported(&self, source: &Path, kind: ImportKind) -> Option<ImportOptions> {
        let record = self.previous_record(source)?;
        if record.importer != kind || record.fingerprint.policy() != self.config.fingerprint {
            return None;
        }
        let current = Fingerprint::compute(&*self.fs, source, self.config.fingerprint).ok()?;
        if current != record.fingerprint {
            log::info!("{} changed since its last import.", source.display());
            return None;
        }
        let complete = self.fs.exists(&record.exported_path)
            && record.resources().all(|r| self.fs.exists(&r.exported_path));
        complete.then_some(record)
    }

    /// Moves `staged` into place, writes the sidecar and indexes the record.
    fn commit(
        &self,
        staged: Staged<'_>,
        record: ImportOptions,
        previous: Option<&ImportOptions>,
    ) -> Result<()> {
        let committed = staged.commit()?;

        let meta_path = self.config.meta_path(&record.source_path);
        if let Err(e) = record.write(&*self.fs, &meta_path) {
            committed.roll_back();
            return Err(match e {
                Error::Io(io) => ImportError::write(meta_path, io).into(),
                other => other,
            });
        }
        committed.finish();

        if let Some(previous) = previous.filter(|p| p.exported_path != record.exported_path) {
            if self.fs.exists(&previous.exported_path) {
                if let Err(e) = self.fs.remove(&previous.exported_path) {
                    log::warn!(
                        "Could not remove stale output {}: {e}",
                        previous.exported_path.display()
                    );
                }
            }
        }

        if !self.database.replace_entry(record) {
            log::warn!(
                "Imported record for {} collides with an indexed id.",
                meta_path.display()
            );
        }
        Ok(())
    }

    /// An id unused by the database and by `taken`, which it joins.
    fn fresh_id(&self, taken: &mut FxHashSet<ResourceId>) -> ResourceId {
        loop {
            let id = self.database.fresh_id();
            if taken.insert(id) {
                return id;
            }
        }
    }
}

/// Output written under `<target>.partial` until committed.
///
/// Dropping an uncommitted guard removes the staging path.
struct Staged<'a> {
    fs: &'a dyn FileSystem,
    partial: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl<'a> Staged<'a> {
    fn new(fs: &'a dyn FileSystem, target: PathBuf) -> Self {
        let partial = with_suffix(&target, "partial");
        if fs.exists(&partial) {
            // Leftover from an interrupted import.
            let _ = fs.remove(&partial);
        }
        Self {
            fs,
            partial,
            target,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.partial
    }

    fn target(&self) -> &Path {
        &self.target
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> std::result::Result<(), ImportError> {
        self.fs
            .save(path, bytes)
            .map_err(|e| ImportError::write(path, e))
    }

    /// Replaces `target` with the staged output. The previous target is kept
    /// aside as a backup until the returned [`Committed`] is finished or
    /// rolled back.
    fn commit(mut self) -> std::result::Result<Committed<'a>, ImportError> {
        let backup = with_suffix(&self.target, "old");
        let had_previous = self.fs.exists(&self.target);
        if had_previous {
            if self.fs.exists(&backup) {
                let _ = self.fs.remove(&backup);
            }
            self.fs
                .rename(&self.target, &backup)
                .map_err(|e| ImportError::write(&self.target, e))?;
        }

        if let Err(e) = self.fs.rename(&self.partial, &self.target) {
            if had_previous {
                let _ = self.fs.rename(&backup, &self.target);
            }
            return Err(ImportError::write(&self.target, e));
        }
        self.committed = true;

        Ok(Committed {
            fs: self.fs,
            target: self.target.clone(),
            backup: had_previous.then_some(backup),
        })
    }
}

/// Output moved into place, with the previous output still kept aside.
struct Committed<'a> {
    fs: &'a dyn FileSystem,
    target: PathBuf,
    backup: Option<PathBuf>,
}

impl Committed<'_> {
    /// Drops the backup of the previous output.
    fn finish(self) {
        if let Some(backup) = &self.backup {
            if let Err(e) = self.fs.remove(backup) {
                log::warn!("Could not remove {}: {e}", backup.display());
            }
        }
    }

    /// Removes the new output and puts the previous one back.
    fn roll_back(self) {
        if let Err(e) = self.fs.remove(&self.target) {
            log::warn!("Could not remove {}: {e}", self.target.display());
        }
        if let Some(backup) = &self.backup {
            if let Err(e) = self.fs.rename(backup, &self.target) {
                log::warn!(
                    "Could not restore {} from {}: {e}",
                    self.target.display(),
                    backup.display()
                );
            }
        }
    }
}

impl Drop for Staged<'_> {
    fn drop(&mut self) {
        if !self.committed && self.fs.exists(&self.partial) {
            if let Err(e) = self.fs.remove(&self.partial) {
                log::warn!("Could not remove staging output {}: {e}", self.partial.display());
            }
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// File-name-safe version of a node, skin or clip name.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize("Arm/Left"), "Arm_Left");
        assert_eq!(sanitize(" ..hidden "), "hidden");
        assert_eq!(sanitize("..."), "unnamed");
    }

    #[test]
    fn staging_suffix_keeps_full_name() {
        assert_eq!(
            with_suffix(Path::new("Library/Textures/5.tex"), "partial"),
            PathBuf::from("Library/Textures/5.tex.partial")
        );
    }
}
