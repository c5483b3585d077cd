//! Include-file resolution.
//!
//! The preprocessor resolves `#include` names through a [`FileLoader`] so
//! the engine itself never touches the filesystem. The driver supplies a
//! filesystem-backed loader; tests supply a virtual one.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

/// A file produced by include resolution.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    /// The name to display for this file.
    pub name: String,
    /// The resolved filesystem path, if the file has one.
    pub real_path: Option<String>,
    pub content: String,
}

/// Resolves include names to file contents.
pub trait FileLoader {
    /// Resolve an include. `including_dir` is the directory of the file
    /// containing the directive, used for quoted includes.
    fn load(&self, name: &str, is_angled: bool, including_dir: Option<&str>) -> Option<LoadedFile>;
}

/// Filesystem-backed loader searching the including directory (for quoted
/// includes) and then the configured include directories.
#[derive(Debug, Default)]
pub struct FsLoader {
    pub include_dirs: Vec<PathBuf>,
}

impl FsLoader {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        Self { include_dirs }
    }

    fn try_path(path: &Path) -> Option<LoadedFile> {
        let content = std::fs::read_to_string(path).ok()?;
        let real_path = std::fs::canonicalize(path)
            .ok()
            .map(|p| p.to_string_lossy().into_owned());
        Some(LoadedFile {
            name: path.to_string_lossy().into_owned(),
            real_path,
            content,
        })
    }
}

impl FileLoader for FsLoader {
    fn load(&self, name: &str, is_angled: bool, including_dir: Option<&str>) -> Option<LoadedFile> {
        if !is_angled {
            if let Some(dir) = including_dir {
                if let Some(f) = Self::try_path(&Path::new(dir).join(name)) {
                    return Some(f);
                }
            }
        }
        for dir in &self.include_dirs {
            if let Some(f) = Self::try_path(&dir.join(name)) {
                return Some(f);
            }
        }
        None
    }
}

/// In-memory loader for tests and library embedding. Registered files get a
/// synthetic real path under `/virtual/` so their locations render as valid.
#[derive(Debug, Default)]
pub struct VirtualLoader {
    files: FxHashMap<String, String>,
}

impl VirtualLoader {
    pub fn new() -> Self {
        Self { files: FxHashMap::default() }
    }

    pub fn add(&mut self, name: &str, content: &str) {
        self.files.insert(name.to_string(), content.to_string());
    }
}

impl FileLoader for VirtualLoader {
    fn load(&self, name: &str, _is_angled: bool, _including_dir: Option<&str>) -> Option<LoadedFile> {
        self.files.get(name).map(|content| LoadedFile {
            name: name.to_string(),
            real_path: Some(format!("/virtual/{}", name)),
            content: content.clone(),
        })
    }
}
