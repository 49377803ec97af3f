use crate::pattern;
use crate::types::StrHashMap;

use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Modification times seen by the coordinator, plus `VPATH` lookup.
#[derive(Default)]
pub struct MetadataCache {
    mtimes: StrHashMap::<Option::<SystemTime>>,
    /// `vpath PATTERN DIRS` directives in declaration order.
    vpaths: Vec::<(String, Vec::<String>)>,
    /// Directories from the `VPATH` variable.
    vpath_dirs: Vec::<String>,
}

impl MetadataCache {
    #[inline]
    pub fn new(vpaths: Vec::<(String, Vec::<String>)>, vpath_dirs: Vec::<String>) -> Self {
        Self { vpaths, vpath_dirs, ..Self::default() }
    }

    /// `None` for a missing file.
    pub fn mtime(&mut self, path: &str) -> Option::<SystemTime> {
        if let Some(m) = self.mtimes.get(path) {
            return *m
        }
        let m = fs::metadata(path).and_then(|m| m.modified()).ok();
        self.mtimes.insert(path.to_owned(), m);
        m
    }

    #[inline]
    pub fn exists(&mut self, path: &str) -> bool {
        self.mtime(path).is_some()
    }

    #[inline]
    pub fn invalidate(&mut self, path: &str) {
        self.mtimes.remove(path);
    }

    /// Finds `name` in the current directory or along the search paths.
    pub fn resolve_path(&mut self, name: &str) -> Option::<String> {
        if self.exists(name) {
            return Some(name.to_owned())
        }
        if name.starts_with('/') {
            return None
        }
        let dirs = self.vpaths.iter()
            .filter(|(p, _)| pattern::matches(p, name))
            .flat_map(|(_, dirs)| dirs.iter())
            .chain(self.vpath_dirs.iter())
            .map(|dir| Path::new(dir).join(name).to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        dirs.into_iter().find(|candidate| self.exists(candidate))
    }

    /// The path to compare timestamps against: the search result or the name itself.
    #[inline]
    pub fn path_of(&mut self, name: &str) -> String {
        self.resolve_path(name).unwrap_or_else(|| name.to_owned())
    }
}
