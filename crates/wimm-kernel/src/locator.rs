//! Tool location: is an imaging tool installed, and where?
//!
//! Lookups are pure queries against a directory list captured up front.
//! Nothing here writes to the process environment: a tool found outside the
//! search path is recorded in [`ToolLocations`] and handed to the spawn call
//! as an explicit executable path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use wimm_types::Backend;

/// Answers "where is this executable?".
///
/// Absence is an ordinary answer, not an error.
pub trait ToolLocator: Send + Sync {
    /// Find an executable by file name.
    fn locate(&self, name: &str) -> Option<PathBuf>;

    /// Find the executable implementing a backend.
    fn locate_backend(&self, backend: Backend) -> Option<PathBuf> {
        locate_any(self, backend.executable_names())
    }
}

/// First hit among `names`, in order.
fn locate_any<L: ToolLocator + ?Sized>(locator: &L, names: &[&str]) -> Option<PathBuf> {
    names.iter().find_map(|name| locator.locate(name))
}

/// Searches an ordered list of directories, like a shell resolving `PATH`.
#[derive(Debug, Clone)]
pub struct SearchPathLocator {
    dirs: Vec<PathBuf>,
    native_platform: bool,
}

impl SearchPathLocator {
    /// Search exactly these directories.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            native_platform: cfg!(windows),
        }
    }

    /// Search the directories in the current `PATH`.
    pub fn from_env() -> Self {
        let dirs = std::env::var_os("PATH")
            .map(|path| std::env::split_paths(&path).collect())
            .unwrap_or_default();
        Self::new(dirs)
    }

    /// Search `extra` before the existing directories.
    pub fn with_extra_dirs(mut self, extra: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut dirs: Vec<PathBuf> = extra.into_iter().collect();
        dirs.append(&mut self.dirs);
        self.dirs = dirs;
        self
    }

    /// Override whether platform-native tools may be reported.
    ///
    /// Defaults to true only on Windows, the one platform shipping `dism`.
    pub fn with_native_platform(mut self, native: bool) -> Self {
        self.native_platform = native;
        self
    }

    /// Directories searched, in order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl ToolLocator for SearchPathLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        if name.trim().is_empty() {
            return None;
        }

        // A name with a directory part is checked as-is
        if Path::new(name).components().count() > 1 {
            let path = PathBuf::from(name);
            return is_executable(&path).then_some(path);
        }

        for dir in &self.dirs {
            if dir.as_os_str().is_empty() {
                continue;
            }
            for candidate in candidate_names(name) {
                let full = dir.join(&candidate);
                if is_executable(&full) {
                    tracing::debug!(tool = name, path = %full.display(), "located tool");
                    return Some(full);
                }
            }
        }

        None
    }

    fn locate_backend(&self, backend: Backend) -> Option<PathBuf> {
        if backend.is_platform_native() && !self.native_platform {
            return None;
        }
        locate_any(self, backend.executable_names())
    }
}

/// File names to try for `name`; Windows also accepts an implied `.exe`.
fn candidate_names(name: &str) -> Vec<String> {
    let mut names = vec![name.to_string()];
    if cfg!(windows) && Path::new(name).extension().is_none() {
        names.push(format!("{}.exe", name));
    }
    names
}

/// Whether `path` is a regular file we could execute.
///
/// Missing paths, directories and (on Unix) files without any execute bit
/// all answer false.
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Tool paths registered explicitly by the caller.
///
/// Consulted before the search path. Stands in for prepending a freshly
/// acquired tool's directory to `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ToolLocations {
    paths: BTreeMap<Backend, PathBuf>,
}

impl ToolLocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record where a backend's executable lives, replacing any earlier entry.
    pub fn register(&mut self, backend: Backend, path: PathBuf) {
        self.paths.insert(backend, path);
    }

    /// The registered path, if it is still executable.
    pub fn get(&self, backend: Backend) -> Option<PathBuf> {
        self.paths
            .get(&backend)
            .filter(|path| is_executable(path))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FromIterator<(Backend, PathBuf)> for ToolLocations {
    fn from_iter<I: IntoIterator<Item = (Backend, PathBuf)>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

/// Locator that consults registered locations, then a fallback locator.
pub struct LayeredLocator<'a> {
    locations: &'a ToolLocations,
    fallback: &'a dyn ToolLocator,
}

impl<'a> LayeredLocator<'a> {
    pub fn new(locations: &'a ToolLocations, fallback: &'a dyn ToolLocator) -> Self {
        Self {
            locations,
            fallback,
        }
    }
}

impl ToolLocator for LayeredLocator<'_> {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.fallback.locate(name)
    }

    fn locate_backend(&self, backend: Backend) -> Option<PathBuf> {
        self.locations
            .get(backend)
            .or_else(|| self.fallback.locate_backend(backend))
    }
}
