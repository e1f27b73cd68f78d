use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Byte-oriented storage the importer and loaders run against.
///
/// Everything the pipeline touches on disk goes through this trait, so tests
/// and non-filesystem backends can swap it out.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn load(&self, path: &Path) -> std::io::Result<Vec<u8>>;

    fn save(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()>;

    /// Creates `path` and any missing parents. Succeeds if it already exists.
    fn make_directory(&self, path: &Path) -> std::io::Result<()>;

    /// Removes a file, or a directory with everything below it.
    fn remove(&self, path: &Path) -> std::io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    /// Direct children of a directory, in no particular order.
    fn list_dir(&self, path: &Path) -> std::io::Result<Vec<PathBuf>>;

    fn modified_millis(&self, path: &Path) -> std::io::Result<u64>;

    /// Every file below `root`, sorted by path so walks are deterministic.
    fn walk(&self, root: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in self.list_dir(&dir)? {
                if self.is_dir(&entry) {
                    pending.push(entry);
                } else {
                    files.push(entry);
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Local disk backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn load(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn save(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)
    }

    fn make_directory(&self, path: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        std::fs::rename(from, to)
    }

    fn list_dir(&self, path: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }

    fn modified_millis(&self, path: &Path) -> std::io::Result<u64> {
        let modified = std::fs::metadata(path)?.modified()?;
        let since = modified
            .duration_since(UNIX_EPOCH)
            .map_err(std::io::Error::other)?;
        Ok(since.as_millis() as u64)
    }
}
